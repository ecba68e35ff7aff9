//! Recursive-descent parser with one token of lookahead.
//!
//! Comments never reach the grammar. [`AnnotatedTokens`] splits the
//! lexer output into two streams: code tokens, and annotations pulled
//! out of `# AI_<Type>: value` comments. The parser queues annotations
//! until the next assignment and binds them to that key.
//!
//! Errors are recorded as [`Diagnostic`]s and the parser resynchronizes
//! at the next statement boundary, so a bad line never hides the rest
//! of the file.

use core::mem;

use crate::ast::{
    Annotation, Assignment, Case, Condition, Expression, Import, LogicBlockExpr, Metadata,
    Program, Section, Statement, TermDefinition,
};
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::lexer::{Lexer, Token, TokenKind};

const UNEXPECTED_TOKEN: &str = "P0001";
const ILLEGAL_CHARACTER: &str = "P0002";
const INVALID_NUMBER: &str = "P0003";
const UNTERMINATED_BLOCK: &str = "P0004";

/// Result of parsing a single source file.
#[derive(Debug)]
pub struct ParseOutput {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// The program, or every diagnostic if any of them is an error.
    pub fn into_program(self) -> Result<Program, CoreError> {
        if self.has_errors() {
            Err(CoreError::Syntax(self.diagnostics))
        } else {
            Ok(self.program)
        }
    }
}

pub fn parse(source: &str) -> ParseOutput {
    Parser::new(source).parse_program()
}

/// One item of the split lexer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexed {
    Token(Token),
    Annotation(Annotation),
}

/// Lexer adapter that drops ordinary comments and turns annotation
/// comments into [`Lexed::Annotation`] items.
pub struct AnnotatedTokens<'src> {
    lexer: Lexer<'src>,
    held: Option<Token>,
}

impl<'src> AnnotatedTokens<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            lexer: Lexer::new(source),
            held: None,
        }
    }

    pub fn next_item(&mut self) -> Lexed {
        loop {
            let token = self.pull();
            if !token.is(TokenKind::Comment) {
                return Lexed::Token(token);
            }
            if let Some(annotation) = self.annotation_from(&token) {
                return Lexed::Annotation(annotation);
            }
        }
    }

    fn pull(&mut self) -> Token {
        self.held.take().unwrap_or_else(|| self.lexer.next_token())
    }

    fn annotation_from(&mut self, comment: &Token) -> Option<Annotation> {
        let text = comment.literal.trim();
        let rest = text.strip_prefix("AI_")?;
        let (kind, value) = rest.split_once(':')?;
        let kind = kind.trim();
        if kind.is_empty() || kind.contains(char::is_whitespace) {
            return None;
        }

        let mut value = value.trim().to_string();
        if value.starts_with('{') {
            let mut depth = brace_delta(&value);
            let mut lines = vec![value];
            while depth > 0 {
                let next = self.pull();
                match next.kind {
                    TokenKind::Newline => continue,
                    TokenKind::Comment => {
                        depth += brace_delta(&next.literal);
                        lines.push(next.literal.trim().to_string());
                    }
                    _ => {
                        // Code before the closing brace ends the annotation.
                        self.held = Some(next);
                        break;
                    }
                }
            }
            value = strip_outer_braces(&lines.join("\n"));
        } else if let Some(inner) = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
        {
            value = inner.to_string();
        }

        Some(Annotation {
            kind: kind.to_string(),
            value,
            line: comment.line,
            target: None,
        })
    }
}

fn brace_delta(text: &str) -> i32 {
    text.chars().fold(0, |depth, ch| match ch {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

fn strip_outer_braces(text: &str) -> String {
    let text = text.trim();
    match text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        Some(inner) => inner.trim().to_string(),
        None => text.to_string(),
    }
}

pub struct Parser<'src> {
    tokens: AnnotatedTokens<'src>,
    current: Token,
    peek: Token,
    /// Annotations waiting for the next assignment.
    pending: Vec<Annotation>,
    /// Active `[section]` prefix.
    section: Option<String>,
    program: Program,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let eof = Token {
            kind: TokenKind::Eof,
            literal: String::new(),
            line: 1,
            column: 1,
        };
        let mut parser = Parser {
            tokens: AnnotatedTokens::new(source),
            current: eof.clone(),
            peek: eof,
            pending: Vec::new(),
            section: None,
            program: Program::default(),
            diagnostics: Vec::new(),
        };
        parser.advance();
        parser.advance();
        parser
    }

    pub fn parse_program(mut self) -> ParseOutput {
        while !self.current.is(TokenKind::Eof) {
            match self.parse_statement() {
                Some(stmt) => self.program.statements.push(stmt),
                None if !matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof) => {
                    self.synchronize()
                }
                None => {}
            }
            self.advance();
        }

        // Trailing annotations have no key to document.
        let leftover = mem::take(&mut self.pending);
        self.program.annotations.extend(leftover);

        ParseOutput {
            program: self.program,
            diagnostics: self.diagnostics,
        }
    }

    fn advance(&mut self) {
        let next = loop {
            match self.tokens.next_item() {
                Lexed::Token(token) => break token,
                Lexed::Annotation(annotation) => self.pending.push(annotation),
            }
        };
        self.current = mem::replace(&mut self.peek, next);
    }

    /// Skip to a newline or to just before a token that can start a statement.
    fn synchronize(&mut self) {
        while !self.current.is(TokenKind::Eof) {
            if self.current.is(TokenKind::Newline) {
                return;
            }
            if starts_statement(self.peek.kind) {
                return;
            }
            self.advance();
        }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.current.kind {
            TokenKind::At => self.parse_metadata_or_import(),
            TokenKind::Ident => self.parse_assignment(),
            TokenKind::LBracket => self.parse_section(),
            TokenKind::Minus => self.parse_term_definition(),
            TokenKind::Newline | TokenKind::Eof => None,
            TokenKind::Illegal => {
                let message = format!("illegal character `{}`", self.current.literal);
                self.error_at_current(message, ILLEGAL_CHARACTER);
                None
            }
            other => {
                self.error_at_current(format!("unexpected {other} at start of statement"), UNEXPECTED_TOKEN);
                None
            }
        }
    }

    fn parse_section(&mut self) -> Option<Statement> {
        let line = self.current.line;
        self.expect_peek(TokenKind::Ident)?;
        let name = self.current.literal.clone();
        self.expect_peek(TokenKind::RBracket)?;
        self.section = Some(name.clone());
        Some(Statement::Section(Section { name, line }))
    }

    fn parse_metadata_or_import(&mut self) -> Option<Statement> {
        let (line, column) = (self.current.line, self.current.column);
        self.expect_peek(TokenKind::Ident)?;
        let key = self.current.literal.clone();

        if key == "import" {
            self.expect_peek(TokenKind::Ident)?;
            let namespace = self.current.literal.clone();
            self.program.imports.push(namespace.clone());
            return Some(Statement::Import(Import { namespace, line }));
        }

        self.expect_peek(TokenKind::Colon)?;
        match self.peek.kind {
            TokenKind::Ident | TokenKind::Number | TokenKind::Str => {
                self.advance();
                Some(Statement::Metadata(Metadata {
                    key,
                    value: self.current.literal.clone(),
                    line,
                    column,
                }))
            }
            _ => {
                self.peek_error("metadata value");
                None
            }
        }
    }

    fn parse_term_definition(&mut self) -> Option<Statement> {
        let line = self.current.line;
        let name = self.parse_term_name()?;
        self.expect_peek(TokenKind::Assign)?;
        self.expect_peek(TokenKind::Str)?;
        let term = TermDefinition {
            name: name.clone(),
            value: self.current.literal.clone(),
            line,
        };
        self.program.terms.entry(name).or_insert_with(|| term.clone());
        Some(Statement::Term(term))
    }

    /// `-name` or `-multi-part-name`, starting at the `-`.
    fn parse_term_name(&mut self) -> Option<String> {
        self.expect_peek(TokenKind::Ident)?;
        let mut name = self.current.literal.clone();
        while self.peek.is(TokenKind::Minus) {
            self.advance();
            self.expect_peek(TokenKind::Ident)?;
            name.push('-');
            name.push_str(&self.current.literal);
        }
        Some(name)
    }

    fn parse_assignment(&mut self) -> Option<Statement> {
        let name = self.current.literal.clone();
        let (line, column) = (self.current.line, self.current.column);
        // Everything queued so far precedes this key.
        let annotations = mem::take(&mut self.pending);

        let value = match self.peek.kind {
            TokenKind::Assign => {
                self.advance();
                self.advance();
                self.parse_expression()
            }
            TokenKind::LParen => self.parse_block(),
            _ => {
                self.peek_error("`=` or `(`");
                None
            }
        };

        let target = value.as_ref().map(|_| self.qualify(&name));
        self.program
            .annotations
            .extend(annotations.into_iter().map(|ann| Annotation {
                target: target.clone(),
                ..ann
            }));

        Some(Statement::Assign(Assignment {
            name,
            value: value?,
            line,
            column,
        }))
    }

    fn parse_expression(&mut self) -> Option<Expression> {
        match self.current.kind {
            TokenKind::Str => Some(Expression::Str(self.current.literal.clone())),
            TokenKind::LBrace if self.peek.is(TokenKind::Minus) => {
                self.advance();
                let name = self.parse_term_name()?;
                self.expect_peek(TokenKind::RBrace)?;
                Some(Expression::TermRef(name))
            }
            _ => {
                let message = format!("expected expression after `=`, found {}", self.current.kind);
                self.error_at_current(message, UNEXPECTED_TOKEN);
                None
            }
        }
    }

    fn parse_block(&mut self) -> Option<Expression> {
        self.advance();
        let header = self.parse_block_header();
        let Some(argument) = header else {
            self.skip_failed_block(self.current.is(TokenKind::LBrace));
            return None;
        };

        let mut cases = Vec::new();
        loop {
            self.advance();
            match self.current.kind {
                TokenKind::Newline | TokenKind::Comma => continue,
                TokenKind::RBrace => break,
                TokenKind::Eof => {
                    self.error_at_current("unterminated logic block, expected `}`", UNTERMINATED_BLOCK);
                    return None;
                }
                TokenKind::LBracket => match self.parse_case() {
                    Some(case) => cases.push(case),
                    None => {
                        self.skip_failed_block(true);
                        return None;
                    }
                },
                other => {
                    let message = format!("expected `[` to start a case, found {other}");
                    self.error_at_current(message, UNEXPECTED_TOKEN);
                    self.skip_failed_block(true);
                    return None;
                }
            }
        }

        Some(Expression::Block(LogicBlockExpr { argument, cases }))
    }

    /// `(arg) {`, starting at `(`; returns the argument name.
    fn parse_block_header(&mut self) -> Option<String> {
        self.expect_peek(TokenKind::Ident)?;
        let argument = self.current.literal.clone();
        self.expect_peek(TokenKind::RParen)?;
        self.expect_peek(TokenKind::LBrace)?;
        Some(argument)
    }

    /// Leave `current` on the block's closing brace so the remaining cases
    /// are not read as statements. Without an opened brace, stop at the
    /// end of the line unless a `{` shows up first.
    fn skip_failed_block(&mut self, mut opened: bool) {
        loop {
            match self.current.kind {
                TokenKind::Eof => return,
                TokenKind::RBrace if opened => return,
                TokenKind::LBrace => opened = true,
                TokenKind::Newline if !opened => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_case(&mut self) -> Option<Case> {
        let line = self.current.line;
        self.advance();

        let condition = match self.current.kind {
            TokenKind::Number if self.peek.is(TokenKind::DotRange) => {
                let start = self.current.literal.clone();
                self.advance();
                self.expect_peek(TokenKind::Number)?;
                let end = self.current.literal.clone();
                match (start.parse::<i64>(), end.parse::<i64>()) {
                    (Ok(start), Ok(end)) => Condition::Range { start, end },
                    _ => {
                        let message = format!("invalid range bounds `{start}..{end}`");
                        self.error_at_current(message, INVALID_NUMBER);
                        return None;
                    }
                }
            }
            TokenKind::Number => match self.current.literal.parse::<i64>() {
                Ok(n) => Condition::Exact(n),
                Err(_) => {
                    let message = format!("expected an integer condition, found `{}`", self.current.literal);
                    self.error_at_current(message, INVALID_NUMBER);
                    return None;
                }
            },
            TokenKind::Ident => Condition::Keyword(self.current.literal.clone()),
            other => {
                self.error_at_current(format!("expected condition, found {other}"), UNEXPECTED_TOKEN);
                return None;
            }
        };

        self.expect_peek(TokenKind::RBracket)?;
        self.expect_peek(TokenKind::Arrow)?;
        self.expect_peek(TokenKind::Str)?;

        Some(Case {
            condition,
            value: self.current.literal.clone(),
            line,
        })
    }

    fn qualify(&self, name: &str) -> String {
        match &self.section {
            Some(section) => format!("{section}.{name}"),
            None => name.to_string(),
        }
    }

    fn expect_peek(&mut self, kind: TokenKind) -> Option<()> {
        if self.peek.is(kind) {
            self.advance();
            Some(())
        } else {
            self.peek_error(&kind.to_string());
            None
        }
    }

    fn peek_error(&mut self, expected: &str) {
        let message = format!("expected {expected}, found {}", self.peek.kind);
        let diag = Diagnostic::error(message, self.peek.line, self.peek.column)
            .with_code(UNEXPECTED_TOKEN);
        self.diagnostics.push(diag);
    }

    fn error_at_current(&mut self, message: impl Into<String>, code: &'static str) {
        let diag = Diagnostic::error(message, self.current.line, self.current.column).with_code(code);
        self.diagnostics.push(diag);
    }
}

fn starts_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident | TokenKind::At | TokenKind::LBracket | TokenKind::Minus
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_clean(source: &str) -> Program {
        let output = parse(source);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        output.program
    }

    #[test]
    fn parses_string_assignment() {
        let program = parse_clean("title = \"My App\"\n");
        assert_eq!(
            program.statements,
            vec![Statement::Assign(Assignment {
                name: "title".to_string(),
                value: Expression::Str("My App".to_string()),
                line: 1,
                column: 1,
            })]
        );
    }

    #[test]
    fn parses_metadata_section_and_import() {
        let program = parse_clean("@lang: pl\n@version: 1.0\n@import common\n[auth]\nlogin = \"Zaloguj\"\n");
        assert_eq!(program.imports, vec!["common".to_string()]);
        let kinds: Vec<_> = program
            .statements
            .iter()
            .map(|s| match s {
                Statement::Metadata(m) => format!("meta:{}={}", m.key, m.value),
                Statement::Import(i) => format!("import:{}", i.namespace),
                Statement::Section(s) => format!("section:{}", s.name),
                Statement::Assign(a) => format!("assign:{}", a.name),
                Statement::Term(t) => format!("term:{}", t.name),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "meta:lang=pl",
                "meta:version=1.0",
                "import:common",
                "section:auth",
                "assign:login"
            ]
        );
    }

    #[test]
    fn parses_logic_block_cases() {
        let program = parse_clean(
            "items(n) {\n    [0] => \"none\"\n    [2..4] => \"a few\"\n    [one] => \"one\"\n    [other] => \"{n} items\"\n}\n",
        );
        let Some(Statement::Assign(assign)) = program.statements.first() else {
            panic!("expected assignment");
        };
        let Expression::Block(block) = &assign.value else {
            panic!("expected block");
        };
        assert_eq!(block.argument, "n");
        let conditions: Vec<_> = block.cases.iter().map(|c| c.condition.clone()).collect();
        assert_eq!(
            conditions,
            vec![
                Condition::Exact(0),
                Condition::Range { start: 2, end: 4 },
                Condition::Keyword("one".to_string()),
                Condition::Keyword("other".to_string()),
            ]
        );
        assert_eq!(block.cases[3].value, "{n} items");
    }

    #[test]
    fn block_cases_may_share_a_line_with_commas() {
        let program = parse_clean("g(x) { [male] => \"He\", [female] => \"She\" }");
        let Some(Statement::Assign(assign)) = program.statements.first() else {
            panic!("expected assignment");
        };
        let Expression::Block(block) = &assign.value else {
            panic!("expected block");
        };
        assert_eq!(block.cases.len(), 2);
    }

    #[test]
    fn parses_terms_and_term_references() {
        let program = parse_clean("-brand-name = \"Acme\"\nproduct = {-brand-name}\n");
        assert_eq!(program.terms["brand-name"].value, "Acme");
        let Some(Statement::Assign(assign)) = program.statements.get(1) else {
            panic!("expected assignment");
        };
        assert_eq!(assign.value, Expression::TermRef("brand-name".to_string()));
    }

    #[test]
    fn malformed_assignment_between_valid_ones() {
        let output = parse("a = \"first\"\nb \"oops\"\nc = \"second\"\n");
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].line, 2);
        assert_eq!(output.program.statements.len(), 2);
        assert!(output.has_errors());
    }

    #[test]
    fn missing_value_reports_line() {
        let output = parse("a = \"x\"\nb =\nc = \"y\"");
        assert_eq!(output.diagnostics.len(), 1);
        assert!(output.diagnostics[0].to_string().contains("line 2"));
        assert_eq!(output.program.statements.len(), 2);
    }

    #[test]
    fn bad_case_skips_rest_of_block() {
        let output = parse("n(x) {\n  [one] => \"a\"\n  [1.5] => \"b\"\n  [other] => \"c\"\n}\nafter = \"ok\"\n");
        assert_eq!(output.diagnostics.len(), 1, "{:?}", output.diagnostics);
        let names: Vec<_> = output.program.assignments().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["after"]);
    }

    #[test]
    fn illegal_character_is_reported_and_skipped() {
        let output = parse("a = \"x\"\n;\nb = \"y\"\n");
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].code, Some(ILLEGAL_CHARACTER));
        assert_eq!(output.program.statements.len(), 2);
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let output = parse("n(x) {\n [one] => \"a\"\n");
        assert!(output.has_errors());
        assert!(output.program.statements.is_empty());
    }

    #[test]
    fn annotation_binds_to_next_assignment_only() {
        let program = parse_clean(
            "first = \"1\"\n# AI_Context: Greeting on the home page\n\n# plain comment\n\ngreeting = \"Hello\"\nlast = \"2\"\n",
        );
        assert_eq!(program.annotations.len(), 1);
        let ann = &program.annotations[0];
        assert_eq!(ann.kind, "Context");
        assert_eq!(ann.value, "Greeting on the home page");
        assert_eq!(ann.line, 2);
        assert_eq!(ann.target.as_deref(), Some("greeting"));
        assert_eq!(program.annotations_for("first").count(), 0);
        assert_eq!(program.annotations_for("last").count(), 0);
    }

    #[test]
    fn annotation_target_is_section_qualified() {
        let program = parse_clean("[auth]\n# AI_Tone: \"friendly\"\nlogin = \"Log in\"\n");
        assert_eq!(program.annotations[0].target.as_deref(), Some("auth.login"));
        assert_eq!(program.annotations[0].value, "friendly");
    }

    #[test]
    fn multi_line_annotation_collects_until_balanced() {
        let program = parse_clean(
            "# AI_Examples: {\n#   \"short\": \"Hi\",\n#   \"long\": \"Hello there\"\n# }\ngreeting = \"Hi\"\n",
        );
        assert_eq!(program.annotations.len(), 1);
        assert_eq!(
            program.annotations[0].value,
            "\"short\": \"Hi\",\n\"long\": \"Hello there\""
        );
        assert_eq!(program.annotations[0].target.as_deref(), Some("greeting"));
    }

    #[test]
    fn unclosed_multi_line_annotation_keeps_following_code() {
        let program = parse_clean("# AI_Examples: {\n# \"a\": 1\ngreeting = \"Hi\"\n");
        assert_eq!(program.assignments().count(), 1);
        assert_eq!(program.annotations[0].target.as_deref(), Some("greeting"));
    }

    #[test]
    fn trailing_annotation_has_no_target() {
        let program = parse_clean("a = \"x\"\n# AI_Context: dangling\n");
        assert_eq!(program.annotations.len(), 1);
        assert_eq!(program.annotations[0].target, None);
    }

    #[test]
    fn annotation_of_failed_assignment_is_unbound() {
        let output = parse("# AI_Context: broken\nbad \"x\"\ngood = \"y\"\n");
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.program.annotations.len(), 1);
        assert_eq!(output.program.annotations[0].target, None);
    }

    #[test]
    fn non_annotation_comments_are_ignored() {
        let program = parse_clean("# AI note without colon\n# Context: nope\nx = \"1\"\n");
        assert!(program.annotations.is_empty());
    }

    #[test]
    fn section_persists_until_next_header() {
        let source = "[a]\nx = \"1\"\ny = \"2\"\n[b]\n# AI_Context: z doc\nz = \"3\"\n";
        let program = parse_clean(source);
        assert_eq!(program.annotations[0].target.as_deref(), Some("b.z"));
    }
}
