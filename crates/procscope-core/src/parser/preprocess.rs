//! Tokenizer-based preprocessing of a statement batch.
//!
//! `sqlparser`'s T-SQL grammar does not cover several statement kinds this
//! system must attribute (EXEC argument forms, BULK INSERT, UPDATE
//! STATISTICS, UPDATETEXT/WRITETEXT) and rejects procedural plumbing
//! (DECLARE, SET, PRINT, control flow). This pass walks the token stream,
//! lifts the attributable statements out as [`AuxiliaryStatement`] records,
//! blanks everything the parser cannot take, and reduces a CREATE/ALTER
//! PROCEDURE batch to its body. Blanked spans are overwritten with spaces,
//! newlines preserved, so parse-error positions stay meaningful.

use sqlparser::dialect::MsSqlDialect;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer};

/// A statement recognized and extracted before parsing. The classifier
/// attributes these exactly like AST nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxiliaryStatement {
    /// EXEC/EXECUTE of a named procedure.
    Execute { name: String },
    /// EXEC with an inline parenthesized string list: dynamic SQL.
    DynamicExecute,
    /// The target of an `INSERT INTO t EXEC ...` statement.
    Insert { target: String },
    /// BULK INSERT target.
    BulkInsert { target: String },
    /// UPDATE STATISTICS target.
    UpdateStatistics { target: String },
    /// UPDATETEXT/WRITETEXT target column (multi-part, decoration stripped).
    UpdateText { column: Vec<String>, bulk: bool },
    /// TRUNCATE TABLE target.
    Truncate { target: String },
}

/// Result of preprocessing: the text handed to the parser plus the extracted
/// statements.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub sql: String,
    pub auxiliaries: Vec<AuxiliaryStatement>,
}

/// Keywords that begin a new statement at paren depth zero. Used to find the
/// end of an extracted statement when no semicolon terminates it. WITH is
/// deliberately absent: it appears mid-statement in table hints and would
/// truncate EXEC argument scans.
const STMT_START: &[&str] = &[
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "MERGE",
    "TRUNCATE",
    "DECLARE",
    "SET",
    "IF",
    "WHILE",
    "BEGIN",
    "END",
    "ELSE",
    "EXEC",
    "EXECUTE",
    "PRINT",
    "RETURN",
    "RAISERROR",
    "WAITFOR",
    "GOTO",
    "BREAK",
    "CONTINUE",
    "OPEN",
    "CLOSE",
    "FETCH",
    "DEALLOCATE",
    "USE",
    "COMMIT",
    "ROLLBACK",
    "SAVE",
    "CREATE",
    "ALTER",
    "DROP",
    "GRANT",
    "REVOKE",
    "DENY",
    "BULK",
    "UPDATETEXT",
    "WRITETEXT",
    "GO",
];

/// Statement-initial keywords that are blanked wholesale: they never
/// contribute entities and routinely defeat the parser.
const STRIPPED: &[&str] = &[
    "DECLARE",
    "PRINT",
    "RAISERROR",
    "RETURN",
    "GOTO",
    "BREAK",
    "CONTINUE",
    "WAITFOR",
    "OPEN",
    "CLOSE",
    "FETCH",
    "DEALLOCATE",
    "USE",
    "COMMIT",
    "ROLLBACK",
    "SAVE",
    "GRANT",
    "REVOKE",
    "DENY",
];

/// Preprocess one batch. Never fails: if the text cannot be tokenized it is
/// returned unchanged and the parser reports the error.
pub fn preprocess(batch: &str) -> Preprocessed {
    let dialect = MsSqlDialect {};
    let tokens = match Tokenizer::new(&dialect, batch).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(_) => {
            return Preprocessed {
                sql: batch.to_string(),
                auxiliaries: Vec::new(),
            }
        }
    };

    let mut pass = Preprocessor::new(batch, tokens);
    pass.run();
    pass.finish()
}

struct Preprocessor<'a> {
    src: &'a str,
    tokens: Vec<TokenWithSpan>,
    /// Byte offset of each token start (same length as `tokens`).
    starts: Vec<usize>,
    pos: usize,
    depth: i64,
    case_depth: u32,
    at_stmt_start: bool,
    blanks: Vec<(usize, usize)>,
    aux: Vec<AuxiliaryStatement>,
}

impl<'a> Preprocessor<'a> {
    fn new(src: &'a str, tokens: Vec<TokenWithSpan>) -> Self {
        let line_offsets = compute_line_offsets(src);
        let starts = tokens
            .iter()
            .map(|t| {
                location_to_byte_offset(
                    src,
                    &line_offsets,
                    t.span.start.line as usize,
                    t.span.start.column as usize,
                )
            })
            .collect();
        Self {
            src,
            tokens,
            starts,
            pos: 0,
            depth: 0,
            case_depth: 0,
            at_stmt_start: true,
            blanks: Vec::new(),
            aux: Vec::new(),
        }
    }

    fn run(&mut self) {
        while self.pos < self.tokens.len() {
            let i = self.pos;
            match &self.tokens[i].token {
                Token::Whitespace(_) => self.pos += 1,
                Token::SemiColon => {
                    if self.depth == 0 {
                        self.at_stmt_start = true;
                    }
                    self.pos += 1;
                }
                Token::LParen => {
                    self.depth += 1;
                    self.at_stmt_start = false;
                    self.pos += 1;
                }
                Token::RParen => {
                    self.depth = (self.depth - 1).max(0);
                    self.at_stmt_start = false;
                    self.pos += 1;
                }
                Token::Word(w) if w.quote_style.is_none() && !w.value.starts_with('@') => {
                    let keyword = w.value.to_uppercase();
                    self.handle_keyword(i, &keyword);
                }
                _ => {
                    self.at_stmt_start = false;
                    self.pos += 1;
                }
            }
        }
    }

    fn handle_keyword(&mut self, i: usize, keyword: &str) {
        if self.depth != 0 {
            if keyword == "CASE" {
                self.case_depth += 1;
            } else if keyword == "END" {
                self.case_depth = self.case_depth.saturating_sub(1);
            }
            self.pos += 1;
            return;
        }

        match keyword {
            "CASE" => {
                self.case_depth += 1;
                self.at_stmt_start = false;
                self.pos += 1;
            }
            "END" => self.handle_end(i),
            "BEGIN" => self.handle_begin(i),
            "IF" | "WHILE" => {
                // Flatten control flow: blank the keyword and its condition
                // so the guarded statements still parse standalone.
                self.pos += 1;
                let end = self.scan_statement_end();
                self.blank(i, end);
                self.at_stmt_start = true;
            }
            "ELSE" if self.case_depth == 0 => {
                self.pos += 1;
                self.blank_token(i);
                self.at_stmt_start = true;
            }
            "EXEC" | "EXECUTE" => self.handle_exec(i),
            "INSERT" if self.at_stmt_start => self.handle_insert(i),
            "UPDATE" => self.handle_update(i),
            "BULK" => self.handle_bulk(i),
            "TRUNCATE" => self.handle_truncate(i),
            "UPDATETEXT" | "WRITETEXT" => self.handle_updatetext(i),
            "CREATE" | "ALTER" if self.at_stmt_start => self.handle_create(i),
            "SET" if self.at_stmt_start => {
                self.pos += 1;
                let end = self.scan_statement_end();
                self.blank(i, end);
                self.at_stmt_start = true;
            }
            _ if STRIPPED.contains(&keyword) => {
                self.pos += 1;
                let end = self.scan_statement_end();
                self.blank(i, end);
                self.at_stmt_start = true;
            }
            "GO" if self.at_stmt_start => {
                self.pos += 1;
                self.blank_token(i);
                self.at_stmt_start = true;
            }
            _ => {
                self.at_stmt_start = false;
                self.pos += 1;
            }
        }
    }

    /// Block END (TRY/CATCH pairs and bare BEGIN...END wrappers) is blanked;
    /// the END of a CASE expression is kept.
    fn handle_end(&mut self, i: usize) {
        if self.case_depth > 0 {
            self.case_depth -= 1;
            self.at_stmt_start = false;
            self.pos += 1;
            return;
        }
        self.pos += 1;
        if let Some(j) = self.peek_significant() {
            if matches!(self.keyword_at(j).as_deref(), Some("TRY") | Some("CATCH")) {
                self.pos = j + 1;
                self.blank(i, self.start_of(self.pos));
                self.at_stmt_start = true;
                return;
            }
        }
        self.blank_token(i);
        self.at_stmt_start = true;
    }

    fn handle_begin(&mut self, i: usize) {
        self.pos += 1;
        if let Some(j) = self.peek_significant() {
            match self.keyword_at(j).as_deref() {
                Some("TRY") | Some("CATCH") => {
                    self.pos = j + 1;
                    self.blank(i, self.start_of(self.pos));
                    self.at_stmt_start = true;
                    return;
                }
                Some("TRAN") | Some("TRANSACTION") | Some("DISTRIBUTED") => {
                    // Transaction statements carry no entities.
                    let end = self.scan_statement_end();
                    self.blank(i, end);
                    self.at_stmt_start = true;
                    return;
                }
                _ => {}
            }
        }
        // Bare block BEGIN from flattened control flow.
        self.blank_token(i);
        self.at_stmt_start = true;
    }

    fn handle_exec(&mut self, i: usize) {
        self.pos += 1;
        self.skip_whitespace();

        // EXECUTE AS ... (security context switch): blank without a record.
        if self.current_keyword().as_deref() == Some("AS") {
            let end = self.scan_statement_end();
            self.blank(i, end);
            self.at_stmt_start = true;
            return;
        }

        // Optional return-value capture: EXEC @ret = name ...
        if let Some(Token::Word(w)) = self.current_token() {
            if w.value.starts_with('@') {
                let saved = self.pos;
                self.pos += 1;
                self.skip_whitespace();
                if matches!(self.current_token(), Some(Token::Eq)) {
                    self.pos += 1;
                    self.skip_whitespace();
                } else {
                    self.pos = saved;
                }
            }
        }

        if matches!(self.current_token(), Some(Token::LParen)) {
            // EXEC ('...'): inline literal-string executable.
            let end = self.scan_statement_end();
            self.blank(i, end);
            self.aux.push(AuxiliaryStatement::DynamicExecute);
            self.at_stmt_start = true;
            return;
        }

        if let Some(parts) = self.parse_multipart_name() {
            let end = self.scan_statement_end();
            self.blank(i, end);
            self.aux.push(AuxiliaryStatement::Execute {
                name: parts.join("."),
            });
        } else {
            let end = self.scan_statement_end();
            self.blank(i, end);
        }
        self.at_stmt_start = true;
    }

    /// INSERT INTO target EXEC ... feeds a procedure's result set into a
    /// table. The insert half is recorded as an auxiliary target and the
    /// EXEC half re-enters the main loop. Any other INSERT is left for the
    /// parser.
    fn handle_insert(&mut self, i: usize) {
        self.pos += 1;
        self.skip_whitespace();
        if self.current_keyword().as_deref() == Some("INTO") {
            self.pos += 1;
            self.skip_whitespace();
        }
        let Some(parts) = self.parse_multipart_name() else {
            self.pos = i + 1;
            self.at_stmt_start = false;
            return;
        };
        self.skip_whitespace();
        if matches!(self.current_token(), Some(Token::LParen)) {
            self.skip_balanced_parens();
            self.skip_whitespace();
        }
        if matches!(self.current_keyword().as_deref(), Some("EXEC") | Some("EXECUTE")) {
            self.blank(i, self.start_of(self.pos));
            self.aux.push(AuxiliaryStatement::Insert {
                target: parts.join("."),
            });
            self.at_stmt_start = true;
        } else {
            self.pos = i + 1;
            self.at_stmt_start = false;
        }
    }

    fn handle_update(&mut self, i: usize) {
        self.pos += 1;
        self.skip_whitespace();
        if self.current_keyword().as_deref() == Some("STATISTICS") {
            self.pos += 1;
            self.skip_whitespace();
            let target = self
                .parse_multipart_name()
                .map(|parts| parts.join("."))
                .unwrap_or_default();
            let end = self.scan_statement_end();
            self.blank(i, end);
            if !target.is_empty() {
                self.aux.push(AuxiliaryStatement::UpdateStatistics { target });
            }
            self.at_stmt_start = true;
        } else {
            self.pos = i + 1;
            self.at_stmt_start = false;
        }
    }

    fn handle_bulk(&mut self, i: usize) {
        self.pos += 1;
        self.skip_whitespace();
        if self.current_keyword().as_deref() == Some("INSERT") {
            self.pos += 1;
            self.skip_whitespace();
            let target = self
                .parse_multipart_name()
                .map(|parts| parts.join("."))
                .unwrap_or_default();
            let end = self.scan_statement_end();
            self.blank(i, end);
            if !target.is_empty() {
                self.aux.push(AuxiliaryStatement::BulkInsert { target });
            }
            self.at_stmt_start = true;
        } else {
            self.pos = i + 1;
            self.at_stmt_start = false;
        }
    }

    fn handle_truncate(&mut self, i: usize) {
        self.pos += 1;
        self.skip_whitespace();
        if self.current_keyword().as_deref() == Some("TABLE") {
            self.pos += 1;
            self.skip_whitespace();
        }
        let target = self
            .parse_multipart_name()
            .map(|parts| parts.join("."))
            .unwrap_or_default();
        let end = self.scan_statement_end();
        self.blank(i, end);
        if !target.is_empty() {
            self.aux.push(AuxiliaryStatement::Truncate { target });
        }
        self.at_stmt_start = true;
    }

    fn handle_updatetext(&mut self, i: usize) {
        self.pos += 1;
        self.skip_whitespace();
        let bulk = if self.current_keyword().as_deref() == Some("BULK") {
            self.pos += 1;
            self.skip_whitespace();
            true
        } else {
            false
        };
        let column = self.parse_multipart_name();
        let end = self.scan_statement_end();
        self.blank(i, end);
        if let Some(column) = column {
            self.aux.push(AuxiliaryStatement::UpdateText { column, bulk });
        }
        self.at_stmt_start = true;
    }

    /// CREATE/ALTER [OR ALTER] PROC[EDURE] name ... AS: blank the header so
    /// only the body reaches the parser. The AS that terminates the header
    /// is the one followed by a statement-start keyword, which skips
    /// `@param AS type` declarations. Other CREATE/ALTER statements are left
    /// for the parser.
    fn handle_create(&mut self, i: usize) {
        let saved = self.pos;
        self.pos += 1;
        self.skip_whitespace();
        if self.current_keyword().as_deref() == Some("OR") {
            self.pos += 1;
            self.skip_whitespace();
            if self.current_keyword().as_deref() == Some("ALTER") {
                self.pos += 1;
                self.skip_whitespace();
            }
        }
        if !matches!(
            self.current_keyword().as_deref(),
            Some("PROC") | Some("PROCEDURE")
        ) {
            self.pos = saved + 1;
            self.at_stmt_start = false;
            return;
        }

        // Scan for the header-terminating AS at depth zero.
        let mut depth = 0i64;
        while self.pos < self.tokens.len() {
            match &self.tokens[self.pos].token {
                Token::LParen => depth += 1,
                Token::RParen => depth = (depth - 1).max(0),
                Token::Word(w) if w.quote_style.is_none() && depth == 0 => {
                    if w.value.eq_ignore_ascii_case("AS") {
                        let after = self.peek_significant_from(self.pos + 1);
                        let follows_body = match after {
                            Some(j) => match self.keyword_at(j).as_deref() {
                                Some(kw) => STMT_START.contains(&kw) || kw == "WITH",
                                None => false,
                            },
                            None => true,
                        };
                        if follows_body {
                            self.pos += 1;
                            self.blank(i, self.start_of(self.pos));
                            self.at_stmt_start = true;
                            return;
                        }
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        // No body found: blank the whole batch.
        self.blank(i, self.src.len());
        self.at_stmt_start = true;
    }

    /// Consume tokens to the end of the current statement: a semicolon at
    /// depth zero (consumed), a statement-start keyword at depth zero (not
    /// consumed), or end of input. Returns the blank-span end offset.
    fn scan_statement_end(&mut self) -> usize {
        let mut depth = 0i64;
        while self.pos < self.tokens.len() {
            match &self.tokens[self.pos].token {
                Token::LParen => depth += 1,
                Token::RParen => depth = (depth - 1).max(0),
                Token::SemiColon if depth == 0 => {
                    self.pos += 1;
                    return self.start_of(self.pos);
                }
                Token::Word(w) if w.quote_style.is_none() && depth == 0 => {
                    let kw = w.value.to_uppercase();
                    if !w.value.starts_with('@') && STMT_START.contains(&kw.as_str()) {
                        return self.start_of(self.pos);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        self.src.len()
    }

    /// Parse a multi-part identifier at the current position. Bracket
    /// decoration is stripped (the tokenizer already unquotes values).
    fn parse_multipart_name(&mut self) -> Option<Vec<String>> {
        let mut parts = Vec::new();
        loop {
            match self.current_token() {
                Some(Token::Word(w)) if !w.value.starts_with('@') => {
                    parts.push(w.value.clone());
                    self.pos += 1;
                }
                _ => break,
            }
            let saved = self.pos;
            self.skip_whitespace();
            if matches!(self.current_token(), Some(Token::Period)) {
                self.pos += 1;
                self.skip_whitespace();
            } else {
                self.pos = saved;
                break;
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts)
        }
    }

    fn skip_balanced_parens(&mut self) {
        let mut depth = 0i64;
        while self.pos < self.tokens.len() {
            match &self.tokens[self.pos].token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth <= 0 {
                        self.pos += 1;
                        return;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current_token(), Some(Token::Whitespace(_))) {
            self.pos += 1;
        }
    }

    fn current_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn current_keyword(&self) -> Option<String> {
        self.keyword_at(self.pos)
    }

    fn keyword_at(&self, i: usize) -> Option<String> {
        match self.tokens.get(i).map(|t| &t.token) {
            Some(Token::Word(w)) if w.quote_style.is_none() && !w.value.starts_with('@') => {
                Some(w.value.to_uppercase())
            }
            _ => None,
        }
    }

    fn peek_significant(&self) -> Option<usize> {
        self.peek_significant_from(self.pos)
    }

    fn peek_significant_from(&self, from: usize) -> Option<usize> {
        (from..self.tokens.len()).find(|&j| !matches!(self.tokens[j].token, Token::Whitespace(_)))
    }

    fn start_of(&self, i: usize) -> usize {
        self.starts.get(i).copied().unwrap_or(self.src.len())
    }

    fn blank_token(&mut self, i: usize) {
        self.blank(i, self.start_of(i + 1));
    }

    fn blank(&mut self, from_token: usize, end_offset: usize) {
        let start = self.start_of(from_token);
        if end_offset > start {
            self.blanks.push((start, end_offset));
        }
    }

    fn finish(self) -> Preprocessed {
        let mut bytes = self.src.as_bytes().to_vec();
        for (start, end) in &self.blanks {
            let end = (*end).min(bytes.len());
            for b in &mut bytes[*start..end] {
                if *b != b'\n' && *b != b'\r' {
                    *b = b' ';
                }
            }
        }
        let sql = String::from_utf8(bytes).unwrap_or_else(|_| self.src.to_string());
        Preprocessed {
            sql,
            auxiliaries: self.aux,
        }
    }
}

/// Byte offset of each line start.
fn compute_line_offsets(src: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    for (i, b) in src.bytes().enumerate() {
        if b == b'\n' {
            offsets.push(i + 1);
        }
    }
    offsets
}

/// Convert a 1-based tokenizer (line, column) to a byte offset, clamped to
/// the source length.
fn location_to_byte_offset(src: &str, line_offsets: &[usize], line: usize, column: usize) -> usize {
    let line_start = line_offsets
        .get(line.saturating_sub(1))
        .copied()
        .unwrap_or(src.len());
    (line_start + column.saturating_sub(1)).min(src.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aux(sql: &str) -> Vec<AuxiliaryStatement> {
        preprocess(sql).auxiliaries
    }

    #[test]
    fn exec_named_procedure_is_extracted() {
        let pre = preprocess("EXEC dbo.LogAudit;");
        assert_eq!(
            pre.auxiliaries,
            vec![AuxiliaryStatement::Execute {
                name: "dbo.LogAudit".to_string()
            }]
        );
        assert!(pre.sql.trim().is_empty());
    }

    #[test]
    fn exec_bracketed_name() {
        assert_eq!(
            aux("EXECUTE [dbo].[Log Audit];"),
            vec![AuxiliaryStatement::Execute {
                name: "dbo.Log Audit".to_string()
            }]
        );
    }

    #[test]
    fn exec_with_arguments_and_no_semicolon() {
        let pre = preprocess("EXEC dbo.Archive @from = '2020-01-01', @count = 10\nSELECT 1");
        assert_eq!(
            pre.auxiliaries,
            vec![AuxiliaryStatement::Execute {
                name: "dbo.Archive".to_string()
            }]
        );
        // The following statement survives.
        assert!(pre.sql.contains("SELECT 1"));
        assert!(!pre.sql.contains("Archive"));
    }

    #[test]
    fn exec_return_capture() {
        assert_eq!(
            aux("EXEC @rc = dbo.Validate;"),
            vec![AuxiliaryStatement::Execute {
                name: "dbo.Validate".to_string()
            }]
        );
    }

    #[test]
    fn exec_inline_string_is_dynamic() {
        assert_eq!(
            aux("EXEC ('DROP TABLE dbo.Stale');"),
            vec![AuxiliaryStatement::DynamicExecute]
        );
    }

    #[test]
    fn execute_as_is_stripped_without_record() {
        assert!(aux("EXECUTE AS OWNER;").is_empty());
    }

    #[test]
    fn insert_exec_records_both_halves() {
        let got = aux("INSERT INTO dbo.AuditRows EXEC dbo.GetRows;");
        assert_eq!(
            got,
            vec![
                AuxiliaryStatement::Insert {
                    target: "dbo.AuditRows".to_string()
                },
                AuxiliaryStatement::Execute {
                    name: "dbo.GetRows".to_string()
                },
            ]
        );
    }

    #[test]
    fn insert_select_is_left_for_the_parser() {
        let pre = preprocess("INSERT INTO dbo.Archive SELECT * FROM dbo.Users;");
        assert!(pre.auxiliaries.is_empty());
        assert!(pre.sql.contains("INSERT INTO dbo.Archive"));
    }

    #[test]
    fn bulk_insert_target() {
        assert_eq!(
            aux("BULK INSERT dbo.ImportStage FROM 'C:\\data\\f.csv' WITH (FIELDTERMINATOR = ',');"),
            vec![AuxiliaryStatement::BulkInsert {
                target: "dbo.ImportStage".to_string()
            }]
        );
    }

    #[test]
    fn update_statistics_target() {
        assert_eq!(
            aux("UPDATE STATISTICS dbo.Orders;"),
            vec![AuxiliaryStatement::UpdateStatistics {
                target: "dbo.Orders".to_string()
            }]
        );
    }

    #[test]
    fn plain_update_is_left_for_the_parser() {
        let pre = preprocess("UPDATE dbo.Orders SET Total = 0;");
        assert!(pre.auxiliaries.is_empty());
        assert!(pre.sql.contains("UPDATE dbo.Orders SET Total = 0;"));
    }

    #[test]
    fn updatetext_and_bulk_variant() {
        assert_eq!(
            aux("UPDATETEXT Documents.Body @ptr 0 0 'new';"),
            vec![AuxiliaryStatement::UpdateText {
                column: vec!["Documents".to_string(), "Body".to_string()],
                bulk: false
            }]
        );
        assert_eq!(
            aux("WRITETEXT BULK Documents.Body @ptr 'new';"),
            vec![AuxiliaryStatement::UpdateText {
                column: vec!["Documents".to_string(), "Body".to_string()],
                bulk: true
            }]
        );
    }

    #[test]
    fn truncate_table_target() {
        assert_eq!(
            aux("TRUNCATE TABLE dbo.Staging;"),
            vec![AuxiliaryStatement::Truncate {
                target: "dbo.Staging".to_string()
            }]
        );
    }

    #[test]
    fn declare_and_set_are_blanked() {
        let pre = preprocess("DECLARE @i INT;\nSET @i = 1;\nSELECT * FROM dbo.T;");
        assert!(pre.auxiliaries.is_empty());
        assert!(!pre.sql.contains("DECLARE"));
        assert!(!pre.sql.contains("SET @i"));
        assert!(pre.sql.contains("SELECT * FROM dbo.T;"));
    }

    #[test]
    fn declare_table_variable_is_blanked() {
        let pre = preprocess("DECLARE @t TABLE (Id INT, Name VARCHAR(10));\nSELECT 1;");
        assert!(!pre.sql.contains("TABLE"));
        assert!(pre.sql.contains("SELECT 1;"));
    }

    #[test]
    fn cursor_declaration_keeps_its_select() {
        let pre = preprocess("DECLARE c CURSOR FOR SELECT Id FROM dbo.Widgets;");
        assert!(!pre.sql.contains("CURSOR"));
        assert!(pre.sql.contains("SELECT Id FROM dbo.Widgets;"));
    }

    #[test]
    fn update_set_keyword_is_not_treated_as_statement() {
        let pre = preprocess("UPDATE dbo.T SET Val = 1 WHERE Id = 2;");
        assert!(pre.sql.contains("SET Val = 1"));
    }

    #[test]
    fn control_flow_is_flattened() {
        let pre = preprocess("IF @x = 1 BEGIN UPDATE dbo.T SET V = 1; END ELSE BEGIN DELETE FROM dbo.U; END");
        assert!(!pre.sql.contains("IF"));
        assert!(!pre.sql.to_uppercase().contains("BEGIN"));
        assert!(!pre.sql.contains("ELSE"));
        assert!(pre.sql.contains("UPDATE dbo.T SET V = 1;"));
        assert!(pre.sql.contains("DELETE FROM dbo.U;"));
    }

    #[test]
    fn case_expression_end_is_preserved() {
        let pre = preprocess("SELECT CASE WHEN a = 1 THEN 2 ELSE 3 END FROM dbo.T;");
        assert!(pre.sql.contains("CASE WHEN a = 1 THEN 2 ELSE 3 END"));
    }

    #[test]
    fn try_catch_wrappers_are_blanked() {
        let pre = preprocess("BEGIN TRY UPDATE dbo.T SET V = 1; END TRY BEGIN CATCH PRINT 'x'; END CATCH");
        assert!(!pre.sql.contains("TRY"));
        assert!(!pre.sql.contains("CATCH"));
        assert!(!pre.sql.contains("PRINT"));
        assert!(pre.sql.contains("UPDATE dbo.T SET V = 1;"));
    }

    #[test]
    fn transaction_statements_are_blanked() {
        let pre = preprocess("BEGIN TRAN;\nUPDATE dbo.T SET V = 1;\nCOMMIT;");
        assert!(!pre.sql.to_uppercase().contains("TRAN"));
        assert!(!pre.sql.contains("COMMIT"));
        assert!(pre.sql.contains("UPDATE dbo.T SET V = 1;"));
    }

    #[test]
    fn procedure_header_is_reduced_to_body() {
        let pre = preprocess(
            "CREATE PROCEDURE dbo.GetOrders @CustomerId INT, @Top INT = 10 AS BEGIN SELECT * FROM dbo.Orders; END",
        );
        assert!(!pre.sql.contains("PROCEDURE"));
        assert!(!pre.sql.contains("@Top"));
        assert!(pre.sql.contains("SELECT * FROM dbo.Orders;"));
    }

    #[test]
    fn procedure_header_with_param_as_type() {
        let pre = preprocess("CREATE PROC dbo.P @a AS INT AS SELECT * FROM dbo.T;");
        assert!(pre.sql.contains("SELECT * FROM dbo.T;"));
        assert!(!pre.sql.contains("@a"));
    }

    #[test]
    fn or_alter_header_is_reduced() {
        let pre = preprocess("CREATE OR ALTER PROCEDURE dbo.P AS SELECT 1;");
        assert!(!pre.sql.contains("PROCEDURE"));
        assert!(pre.sql.contains("SELECT 1;"));
    }

    #[test]
    fn blanking_preserves_line_structure() {
        let src = "DECLARE @i INT;\nSELECT * FROM dbo.T;";
        let pre = preprocess(src);
        assert_eq!(pre.sql.lines().count(), src.lines().count());
        // The surviving statement is still on line 2.
        assert!(pre.sql.lines().nth(1).unwrap().contains("SELECT"));
    }
}
