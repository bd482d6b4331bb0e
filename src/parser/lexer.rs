//! Lexer for request files.
//!
//! Scans the input once, left to right, and produces a flat token stream.
//! Structural markers (`###`, comments, `<`, `<>`, `>`, `--boundary`) are only
//! recognized as the first token of a line; variables and colons are
//! recognized anywhere. Horizontal whitespace is never emitted as a token but
//! is recorded on the following token so lines can be rebuilt verbatim.

use super::error::LexError;
use super::token::{Token, TokenKind};
use crate::models::HttpMethod;
use log::trace;

/// Turns request-file text into tokens.
///
/// The returned stream always ends with a single [`TokenKind::Eof`] token.
///
/// # Errors
///
/// Returns a [`LexError`] for an unterminated `{{` or `> {%` block.
///
/// # Examples
///
/// ```
/// use restflow::parser::lexer::tokenize;
/// use restflow::parser::token::TokenKind;
///
/// let tokens = tokenize("GET https://example.com").unwrap();
/// assert_eq!(tokens[0].kind, TokenKind::Method);
/// assert_eq!(tokens[1].kind, TokenKind::Url);
/// ```
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    let tokens = Lexer::new(text).run()?;
    trace!("tokenized {} bytes into {} tokens", text.len(), tokens.len());
    Ok(tokens)
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    offset: usize,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
    line_has_token: bool,
    pending_space: String,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
            line_has_token: false,
            pending_space: String::new(),
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    let mark = self.mark();
                    self.bump();
                    self.push(TokenKind::Newline, mark, "\n");
                    self.line_has_token = false;
                }
                '\r' => {
                    self.bump();
                }
                c if c.is_whitespace() => {
                    self.bump();
                    self.pending_space.push(c);
                }
                _ => {
                    self.scan_token()?;
                    self.line_has_token = true;
                }
            }
        }

        let mark = self.mark();
        self.push(TokenKind::Eof, mark, "");
        Ok(self.tokens)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn mark(&self) -> Mark {
        Mark {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn slice_from(&self, mark: Mark) -> &'a str {
        &self.source[mark.offset..self.offset]
    }

    fn push(&mut self, kind: TokenKind, mark: Mark, text: impl Into<String>) {
        let mut token = Token::new(kind, text, mark.line, mark.column, mark.offset);
        token.space_before = std::mem::take(&mut self.pending_space);
        self.tokens.push(token);
    }

    fn skip_horizontal_space(&mut self) {
        while matches!(self.peek(), Some(c) if c != '\n' && c.is_whitespace()) {
            self.bump();
        }
    }

    /// Consumes up to (not including) the next newline; a trailing `\r` is dropped.
    fn consume_line(&mut self) -> &'a str {
        let mark = self.mark();
        while matches!(self.peek(), Some(c) if c != '\n') {
            self.bump();
        }
        self.slice_from(mark).trim_end_matches('\r')
    }

    /// Byte length of the word at the cursor: up to whitespace or `{{`.
    fn word_len(&self) -> usize {
        let rest = self.rest();
        let mut len = 0;
        for (idx, c) in rest.char_indices() {
            if c.is_whitespace() || rest[idx..].starts_with("{{") {
                break;
            }
            len = idx + c.len_utf8();
        }
        len
    }

    fn next_is_space(&self, n: usize) -> bool {
        matches!(self.peek_nth(n), Some(c) if c != '\n' && c.is_whitespace())
    }

    fn scan_token(&mut self) -> Result<(), LexError> {
        let mark = self.mark();
        let rest = self.rest();
        let at_line_start = !self.line_has_token;

        if at_line_start {
            if rest.starts_with("###") {
                let text = self.consume_line();
                self.push(TokenKind::Separator, mark, text);
                return Ok(());
            }
            if rest.starts_with('#') || rest.starts_with("//") {
                let text = self.consume_line();
                self.push(TokenKind::Comment, mark, text);
                return Ok(());
            }
            if rest.starts_with("<>") {
                self.bump_n(2);
                self.push(TokenKind::ResponseRefStart, mark, "<>");
                self.scan_line_argument(TokenKind::ResponseRefPath);
                return Ok(());
            }
            if rest.starts_with('<') && self.next_is_space(1) {
                self.bump();
                self.push(TokenKind::FileRef, mark, "<");
                self.scan_line_argument(TokenKind::FilePath);
                return Ok(());
            }
            if rest.starts_with('>') && (self.next_is_space(1) || rest[1..].starts_with("{%")) {
                return self.scan_handler(mark);
            }
        }

        if rest.starts_with("{{") {
            return self.scan_variable(mark);
        }

        if rest.starts_with(':') {
            self.bump();
            self.push(TokenKind::Colon, mark, ":");
            return Ok(());
        }

        let word_len = self.word_len();
        let word = &rest[..word_len];

        if at_line_start && word.len() > 2 && word.starts_with("--") {
            self.bump_n(word.chars().count());
            let kind = if word.len() > 4 && word.ends_with("--") {
                TokenKind::BoundaryEnd
            } else {
                TokenKind::Boundary
            };
            self.push(kind, mark, word);
            return Ok(());
        }

        if at_line_start && HttpMethod::parse(word).is_some() && self.next_is_space(word.len()) {
            self.bump_n(word.len());
            self.push(TokenKind::Method, mark, word);
            return Ok(());
        }

        if word.starts_with("HTTP/") {
            self.bump_n(word.chars().count());
            self.push(TokenKind::HttpVersion, mark, word);
            return Ok(());
        }

        if is_url_shaped(word) {
            self.bump_n(word.chars().count());
            self.push(TokenKind::Url, mark, word);
            return Ok(());
        }

        if at_line_start {
            if let Some(idx) = word.find(':') {
                // `Name:` splits into a header name and a synthesized colon;
                // whatever follows the colon is scanned as the next token.
                let name = &word[..idx];
                self.bump_n(name.chars().count());
                self.push(TokenKind::HeaderName, mark, name);
                let colon = self.mark();
                self.bump();
                self.push(TokenKind::Colon, colon, ":");
                return Ok(());
            }
        }

        self.bump_n(word.chars().count());
        self.push(TokenKind::Text, mark, word);
        Ok(())
    }

    /// Emits the rest of the line, trimmed, as a single token of `kind`.
    fn scan_line_argument(&mut self, kind: TokenKind) {
        self.skip_horizontal_space();
        let mark = self.mark();
        let text = self.consume_line().trim_end();
        if !text.is_empty() {
            self.push(kind, mark, text);
        }
    }

    fn scan_handler(&mut self, start: Mark) -> Result<(), LexError> {
        self.bump();
        self.skip_horizontal_space();

        if !self.rest().starts_with("{%") {
            let mark = self.mark();
            let path = self.consume_line().trim_end();
            self.push(TokenKind::HandlerFile, mark, path);
            return Ok(());
        }

        self.bump_n(2);
        let text = self.slice_from(start);
        self.push(TokenKind::HandlerStart, start, text);

        let code_start = self.mark();
        let mut depth = 0usize;
        let mut quotes = QuoteState::default();
        loop {
            let Some(c) = self.peek() else {
                return Err(LexError::UnterminatedHandler {
                    line: start.line,
                    column: start.column,
                    offset: start.offset,
                });
            };
            if quotes.is_code(c) {
                match c {
                    '%' if depth == 0 && self.peek_nth(1) == Some('}') => break,
                    '{' => depth += 1,
                    '}' => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            self.bump();
        }

        let code = self.slice_from(code_start);
        self.push(TokenKind::HandlerCode, code_start, code);
        let end = self.mark();
        self.bump_n(2);
        self.push(TokenKind::HandlerEnd, end, "%}");
        Ok(())
    }

    fn scan_variable(&mut self, start: Mark) -> Result<(), LexError> {
        self.bump_n(2);
        self.push(TokenKind::VariableStart, start, "{{");

        let name_start = self.mark();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedVariable {
                        line: start.line,
                        column: start.column,
                        offset: start.offset,
                    });
                }
                Some('}') if self.peek_nth(1) == Some('}') => break,
                Some(_) => {
                    self.bump();
                }
            }
        }

        let name = self.slice_from(name_start);
        self.push(TokenKind::VariableName, name_start, name);
        let end = self.mark();
        self.bump_n(2);
        self.push(TokenKind::VariableEnd, end, "}}");
        Ok(())
    }
}

/// Tracks string literals while scanning handler script text.
///
/// `'` and `"` strings end at a newline; backtick strings may span lines.
#[derive(Debug, Default)]
pub(crate) struct QuoteState {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteState {
    /// Feeds the next character. Returns `true` when `c` lies outside every
    /// string literal. Quote characters themselves count as inside.
    pub(crate) fn is_code(&mut self, c: char) -> bool {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q || (c == '\n' && q != '`') {
                self.quote = None;
            }
            return false;
        }
        if matches!(c, '"' | '\'' | '`') {
            self.quote = Some(c);
            return false;
        }
        true
    }
}

fn is_url_shaped(word: &str) -> bool {
    let lower = word.get(..8).unwrap_or(word).to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || word.starts_with('/')
        || word.starts_with('*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_request_line() {
        use TokenKind::*;
        assert_eq!(
            kinds("GET https://api.example.com/users HTTP/1.1"),
            vec![Method, Url, HttpVersion, Eof]
        );
    }

    #[test]
    fn test_lowercase_method() {
        let tokens = tokenize("post /items").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Method);
        assert_eq!(tokens[0].text, "post");
    }

    #[test]
    fn test_header_reclassification() {
        use TokenKind::*;
        let tokens = tokenize("Authorization: Bearer {{token}}").unwrap();
        let got: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            got,
            vec![HeaderName, Colon, Text, VariableStart, VariableName, VariableEnd, Eof]
        );
        assert_eq!(tokens[0].text, "Authorization");
        assert_eq!(tokens[2].space_before, " ");
        assert_eq!(tokens[3].space_before, " ");
        assert_eq!(tokens[4].text, "token");
    }

    #[test]
    fn test_header_without_space_after_colon() {
        let tokens = tokenize("Host:example.com").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::HeaderName);
        assert_eq!(tokens[1].kind, TokenKind::Colon);
        assert_eq!(tokens[2].kind, TokenKind::Text);
        assert_eq!(tokens[2].text, "example.com");
        assert!(!tokens[2].is_spaced());
    }

    #[test]
    fn test_separator_captures_name() {
        let tokens = tokenize("### Get Users\nGET /users").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Separator);
        assert_eq!(tokens[0].text, "### Get Users");
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[2].line, 2);
    }

    #[test]
    fn test_comments() {
        use TokenKind::*;
        assert_eq!(
            kinds("# first\n// second\n"),
            vec![Comment, Newline, Comment, Newline, Eof]
        );
    }

    #[test]
    fn test_url_slashes_not_comment_mid_line() {
        use TokenKind::*;
        assert_eq!(kinds("GET http://a.example//b"), vec![Method, Url, Eof]);
    }

    #[test]
    fn test_file_reference() {
        let tokens = tokenize("< ./payloads/user.json").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::FileRef);
        assert_eq!(tokens[1].kind, TokenKind::FilePath);
        assert_eq!(tokens[1].text, "./payloads/user.json");
    }

    #[test]
    fn test_xml_is_not_file_reference() {
        let tokens = tokenize("<user id=\"1\"/>").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Text);
    }

    #[test]
    fn test_response_reference() {
        let tokens = tokenize("<> ./responses/last.json").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::ResponseRefStart);
        assert_eq!(tokens[1].kind, TokenKind::ResponseRefPath);
        assert_eq!(tokens[1].text, "./responses/last.json");
    }

    #[test]
    fn test_inline_handler_with_nested_braces() {
        let text = "> {%\n  if (x) { client.log(\"%}\") }\n  client.global.set(\"a\", 1);\n%}\n";
        let tokens = tokenize(text).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::HandlerStart);
        assert_eq!(tokens[1].kind, TokenKind::HandlerCode);
        assert!(tokens[1].text.contains("client.log(\"%}\")"));
        assert!(tokens[1].text.contains("client.global.set"));
        assert_eq!(tokens[2].kind, TokenKind::HandlerEnd);
        assert_eq!(tokens[2].line, 4);
    }

    #[test]
    fn test_inline_handler_ignores_braces_in_strings() {
        let tokens = tokenize("GET /a\n\n> {% client.log(\"{\"); %}\n").unwrap();
        let code = tokens
            .iter()
            .find(|t| t.kind == TokenKind::HandlerCode)
            .unwrap();
        assert_eq!(code.text, " client.log(\"{\"); ");

        let tokens = tokenize("> {% client.log('}%}') %}").unwrap();
        assert_eq!(tokens[1].text, " client.log('}%}') ");
        assert_eq!(tokens[2].kind, TokenKind::HandlerEnd);
        assert_eq!(tokens[2].column, 24);
    }

    #[test]
    fn test_apostrophe_in_handler_comment_ends_at_newline() {
        let tokens = tokenize("> {%\n// don't retry\nclient.log(1);\n%}\n").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::HandlerEnd);
        assert_eq!(tokens[2].line, 4);
    }

    #[test]
    fn test_quote_state_escapes() {
        let mut quotes = QuoteState::default();
        let code: String = r#"a"b\"{"}"#.chars().filter(|&c| quotes.is_code(c)).collect();
        assert_eq!(code, "a}");
    }

    #[test]
    fn test_handler_file() {
        let tokens = tokenize("> ./handlers/check.js").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::HandlerFile);
        assert_eq!(tokens[0].text, "./handlers/check.js");
    }

    #[test]
    fn test_unterminated_handler() {
        let err = tokenize("GET /a\n\n> {%\n client.log(1);\n").unwrap_err();
        assert_eq!(
            err,
            LexError::UnterminatedHandler {
                line: 3,
                column: 1,
                offset: 8
            }
        );
    }

    #[test]
    fn test_unterminated_variable() {
        let err = tokenize("GET {{host/users\n").unwrap_err();
        assert_eq!(err.line(), 1);
        assert_eq!(err.column(), 5);
        assert!(matches!(err, LexError::UnterminatedVariable { .. }));
    }

    #[test]
    fn test_multipart_boundaries() {
        use TokenKind::*;
        let tokens = tokenize("--part\n--part--").unwrap();
        assert_eq!(tokens[0].kind, Boundary);
        assert_eq!(tokens[0].text, "--part");
        assert_eq!(tokens[2].kind, BoundaryEnd);
    }

    #[test]
    fn test_template_url_tokens_are_adjacent() {
        let tokens = tokenize("GET {{base}}/users/{{id}}").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::VariableStart);
        assert!(tokens[1].is_spaced());
        assert_eq!(tokens[4].kind, TokenKind::Url);
        assert_eq!(tokens[4].text, "/users/");
        assert!(!tokens[4].is_spaced());
    }

    #[test]
    fn test_crlf_line_endings() {
        use TokenKind::*;
        assert_eq!(
            kinds("GET /a\r\nAccept: */*\r\n"),
            vec![Method, Url, Newline, HeaderName, Colon, Url, Newline, Eof]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("GET /a\n  X-Id: 1").unwrap();
        let header = &tokens[3];
        assert_eq!(header.kind, TokenKind::HeaderName);
        assert_eq!(header.line, 2);
        assert_eq!(header.column, 3);
        assert_eq!(header.offset, 9);
        assert_eq!(header.space_before, "  ");
    }
}
