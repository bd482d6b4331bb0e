//! HTTP request file parser.
//!
//! This module turns `.http` and `.rest` files into a [`RequestsFile`]. Text
//! is first split into tokens by the [`lexer`], then a single cursor walks the
//! token slice and builds one [`Request`] per request line. Requests are
//! separated by `###` lines; comments, headers, bodies, response handlers and
//! response references are recognized from their token kinds.

pub mod error;
pub mod lexer;
pub mod token;

use crate::models::{
    ContentType, Header, MultipartField, Request, RequestBody, RequestsFile, ResponseHandler,
    ResponseRef,
};
use error::ParseError;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use token::{Token, TokenKind};

/// `name="..."` parameter of a `Content-Disposition` header.
static DISPOSITION_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[;\s])name="([^"]*)""#).expect("Invalid disposition regex")
});

/// Parses the content of a request file.
///
/// # Arguments
///
/// * `name` - Name recorded on the returned file (usually its path)
/// * `text` - The full content of the request file
///
/// # Returns
///
/// The requests in file order, or the first lexing or parsing error.
///
/// # Examples
///
/// ```
/// use restflow::parser::parse_file;
///
/// let content = r#"
/// GET https://api.example.com/users
///
/// ###
///
/// POST https://api.example.com/users
/// Content-Type: application/json
///
/// {"name": "John"}
/// "#;
///
/// let file = parse_file("users.http", content).unwrap();
/// assert_eq!(file.len(), 2);
/// ```
pub fn parse_file(name: &str, text: &str) -> Result<RequestsFile, ParseError> {
    let tokens = lexer::tokenize(text)?;
    let mut file = parse(&tokens)?;
    file.name = name.to_string();
    debug!("parsed {} requests from {}", file.len(), name);
    Ok(file)
}

/// Builds requests from a token stream produced by [`lexer::tokenize`].
///
/// Lines that cannot start a request outside of a request block are skipped.
pub fn parse(tokens: &[Token]) -> Result<RequestsFile, ParseError> {
    Parser::new(tokens).run()
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn run(mut self) -> Result<RequestsFile, ParseError> {
        let mut requests = Vec::new();
        let mut separator_name: Option<String> = None;
        let mut directive_name: Option<String> = None;
        let mut comment_name: Option<String> = None;

        loop {
            match self.kind() {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    // A blank line detaches a plain comment from what follows.
                    comment_name = None;
                    self.pos += 1;
                }
                TokenKind::Separator => {
                    separator_name = separator_text(&self.tokens[self.pos].text);
                    directive_name = None;
                    comment_name = None;
                    self.skip_line();
                }
                TokenKind::Comment => {
                    let text = &self.tokens[self.pos].text;
                    if let Some(name) = name_directive(text) {
                        directive_name = Some(name);
                    } else if !is_directive(text) {
                        comment_name = comment_text(text);
                    }
                    self.skip_line();
                }
                _ if self.can_start_request(self.pos) => {
                    let name = directive_name
                        .take()
                        .or_else(|| separator_name.take())
                        .or_else(|| comment_name.take());
                    let request = self.parse_request(name)?;
                    requests.push(request);
                }
                _ => {
                    let (line_text, _) = self.line_text(self.pos, true);
                    debug!(
                        "skipping stray line {}: {}",
                        self.tokens[self.pos].line,
                        line_text.trim()
                    );
                    self.skip_line();
                }
            }
        }

        Ok(RequestsFile {
            name: String::new(),
            requests,
        })
    }

    fn kind_at(&self, index: usize) -> TokenKind {
        self.tokens
            .get(index)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn kind(&self) -> TokenKind {
        self.kind_at(self.pos)
    }

    fn text(&self) -> &'t str {
        self.tokens
            .get(self.pos)
            .map(|t| t.text.as_str())
            .unwrap_or("")
    }

    /// Line, column and offset of the token at `index`, or of the end of input.
    fn position(&self, index: usize) -> (usize, usize, usize) {
        match self.tokens.get(index).or_else(|| self.tokens.last()) {
            Some(t) => (t.line, t.column, t.offset),
            None => (1, 1, 0),
        }
    }

    /// Advances past the current line, including its newline.
    fn skip_line(&mut self) {
        while !self.kind().is_line_end() {
            self.pos += 1;
        }
        if self.kind() == TokenKind::Newline {
            self.pos += 1;
        }
    }

    /// Rebuilds the source text from `start` to the end of its line.
    ///
    /// Returns the text and the index of the terminating newline or EOF.
    fn line_text(&self, start: usize, keep_indent: bool) -> (String, usize) {
        let mut text = String::new();
        let mut index = start;
        while !self.kind_at(index).is_line_end() {
            let token = &self.tokens[index];
            if index > start || keep_indent {
                text.push_str(&token.space_before);
            }
            text.push_str(&token.text);
            index += 1;
        }
        (text, index)
    }

    /// Whether the token at `index` begins a request line.
    fn can_start_request(&self, index: usize) -> bool {
        match self.kind_at(index) {
            TokenKind::Method | TokenKind::Url | TokenKind::VariableStart => true,
            TokenKind::Text => {
                // Unrecognized verbs still start a request; the validator
                // reports them.
                let word = &self.tokens[index].text;
                let next = self.tokens.get(index + 1);
                word.chars().all(|c| c.is_ascii_alphabetic())
                    && next.is_some_and(|t| {
                        t.is_spaced() && matches!(t.kind, TokenKind::Url | TokenKind::VariableStart)
                    })
            }
            _ => false,
        }
    }

    /// Whether the comment lines starting at `index` lead directly into a
    /// request line.
    fn comment_precedes_request(&self, mut index: usize) -> bool {
        while self.kind_at(index) == TokenKind::Comment {
            index += 1;
            if self.kind_at(index) == TokenKind::Newline {
                index += 1;
            }
        }
        self.can_start_request(index)
    }

    /// Whether the line at the cursor is a new request that was written
    /// without a `###` separator.
    fn at_unseparated_request(&self) -> bool {
        match self.kind() {
            TokenKind::Method => self.can_start_request(self.pos),
            TokenKind::Comment => self.comment_precedes_request(self.pos),
            _ => false,
        }
    }

    fn parse_request(&mut self, name: Option<String>) -> Result<Request, ParseError> {
        let line_number = self.position(self.pos).0;

        let method = if matches!(self.kind(), TokenKind::Method | TokenKind::Text) {
            let method = self.text().to_ascii_uppercase();
            self.pos += 1;
            method
        } else {
            "GET".to_string()
        };

        let url = self.parse_url(&method)?;
        let mut request = Request::new(method, url);
        request.name = name;
        request.line_number = line_number;

        if self.kind() == TokenKind::HttpVersion {
            request.http_version = Some(self.text().to_string());
            self.pos += 1;
        }

        if !self.kind().is_line_end() {
            let (line, column, offset) = self.position(self.pos);
            return Err(ParseError::UnexpectedToken {
                token: self.text().to_string(),
                line,
                column,
                offset,
            });
        }
        self.skip_line();

        self.parse_headers(&mut request)?;
        self.parse_trailer(&mut request);

        Ok(request)
    }

    /// Joins adjacent tokens into the raw URL, stopping at whitespace.
    fn parse_url(&mut self, method: &str) -> Result<String, ParseError> {
        let mut url = String::new();
        let start = self.pos;
        while !self.kind().is_line_end() && self.kind() != TokenKind::HttpVersion {
            if self.pos > start && self.tokens[self.pos].is_spaced() {
                break;
            }
            url.push_str(self.text());
            self.pos += 1;
        }

        if url.is_empty() {
            let (line, column, offset) = self.position(self.pos);
            return Err(ParseError::MissingUrl {
                token: method.to_string(),
                line,
                column,
                offset,
            });
        }
        Ok(url)
    }

    fn is_header_line(&self) -> bool {
        match self.kind() {
            TokenKind::HeaderName => true,
            TokenKind::Text => self.kind_at(self.pos + 1) == TokenKind::Colon,
            _ => false,
        }
    }

    fn parse_headers(&mut self, request: &mut Request) -> Result<(), ParseError> {
        loop {
            let kind = self.kind();
            if kind == TokenKind::Newline {
                self.pos += 1;
                if let Some(body) = self.parse_body(request)? {
                    request.body = Some(body);
                }
                return Ok(());
            }
            if kind.ends_section() || self.at_unseparated_request() {
                return Ok(());
            }
            if kind == TokenKind::Comment {
                self.skip_line();
                continue;
            }
            if self.is_header_line() {
                let header = self.parse_header();
                request.headers.push(header);
                continue;
            }

            let (line_text, _) = self.line_text(self.pos, false);
            let (line, column, offset) = self.position(self.pos);
            return Err(ParseError::InvalidHeader {
                header: line_text.trim().to_string(),
                line,
                column,
                offset,
            });
        }
    }

    /// Parses `Name: value` at the cursor. The value keeps interior spacing.
    fn parse_header(&mut self) -> Header {
        let name = self.text().trim().to_string();
        self.pos += 1;
        if self.kind() == TokenKind::Colon {
            self.pos += 1;
        }
        let (value, end) = self.line_text(self.pos, false);
        self.pos = end;
        self.skip_line();
        Header::new(name, value.trim_end())
    }

    fn skip_blank_lines(&mut self) {
        while self.kind() == TokenKind::Newline {
            self.pos += 1;
        }
    }

    fn parse_body(&mut self, request: &Request) -> Result<Option<RequestBody>, ParseError> {
        self.skip_blank_lines();
        if self.kind().ends_section() || self.at_unseparated_request() {
            return Ok(None);
        }

        match self.kind() {
            TokenKind::FileRef => {
                self.pos += 1;
                let path = self.take_if(TokenKind::FilePath).unwrap_or_default();
                self.skip_line();
                Ok(Some(RequestBody::File { path }))
            }
            TokenKind::Boundary => Ok(Some(self.parse_multipart())),
            _ => {
                let content = self.collect_lines(|kind| kind.ends_section());
                if content.is_empty() {
                    return Ok(None);
                }
                let content_type = match request.content_type() {
                    Some(value) => ContentType::from_header(value),
                    None => ContentType::infer(&content),
                };
                Ok(Some(RequestBody::Inline {
                    content,
                    content_type,
                }))
            }
        }
    }

    fn take_if(&mut self, kind: TokenKind) -> Option<String> {
        if self.kind() == kind {
            let text = self.text().to_string();
            self.pos += 1;
            Some(text)
        } else {
            None
        }
    }

    /// Collects whole lines verbatim until a line starts with a token for
    /// which `stop` holds, or with a new request. Comment lines are dropped
    /// and trailing blank lines trimmed.
    fn collect_lines(&mut self, stop: impl Fn(TokenKind) -> bool) -> String {
        let mut lines: Vec<String> = Vec::new();
        loop {
            let kind = self.kind();
            if stop(kind) || self.at_unseparated_request() {
                break;
            }
            if kind == TokenKind::Comment {
                self.skip_line();
                continue;
            }
            let (text, end) = self.line_text(self.pos, true);
            lines.push(text);
            self.pos = end;
            self.skip_line();
        }

        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }

    fn parse_multipart(&mut self) -> RequestBody {
        let mut fields = Vec::new();

        while self.kind() == TokenKind::Boundary {
            let boundary = self.text().trim_start_matches("--").to_string();
            self.skip_line();

            let mut headers = Vec::new();
            while self.is_header_line() {
                headers.push(self.parse_header());
            }
            if self.kind() == TokenKind::Newline {
                self.pos += 1;
            }

            let mut content = None;
            let mut file_path = None;
            if self.kind() == TokenKind::FileRef {
                self.pos += 1;
                file_path = self.take_if(TokenKind::FilePath);
                self.skip_line();
                self.skip_blank_lines();
            } else {
                let text = self.collect_lines(|kind| {
                    kind.ends_section()
                        || matches!(kind, TokenKind::Boundary | TokenKind::BoundaryEnd)
                });
                if !text.is_empty() {
                    content = Some(text);
                }
            }

            let name = headers
                .iter()
                .find(|h| h.is("content-disposition"))
                .and_then(|h| DISPOSITION_NAME_REGEX.captures(h.value()))
                .map(|caps| caps[1].to_string());

            fields.push(MultipartField {
                name,
                headers,
                content,
                file_path,
                boundary,
            });
        }

        if self.kind() == TokenKind::BoundaryEnd {
            self.skip_line();
        }

        RequestBody::Multipart { fields }
    }

    /// Response handler and response reference lines after the body.
    fn parse_trailer(&mut self, request: &mut Request) {
        loop {
            match self.kind() {
                TokenKind::Newline => self.pos += 1,
                TokenKind::Comment if !self.comment_precedes_request(self.pos) => {
                    self.skip_line();
                }
                TokenKind::HandlerStart => {
                    self.pos += 1;
                    let script = self
                        .take_if(TokenKind::HandlerCode)
                        .map(|code| code.trim().to_string())
                        .unwrap_or_default();
                    self.take_if(TokenKind::HandlerEnd);
                    self.skip_line();
                    request.response_handler = Some(ResponseHandler::Inline { script });
                }
                TokenKind::HandlerFile => {
                    let path = self.text().to_string();
                    self.skip_line();
                    request.response_handler = Some(ResponseHandler::File { path });
                }
                TokenKind::ResponseRefStart => {
                    self.pos += 1;
                    let path = self.take_if(TokenKind::ResponseRefPath).unwrap_or_default();
                    self.skip_line();
                    request.response_ref = Some(ResponseRef { path });
                }
                _ => return,
            }
        }
    }
}

/// Strips the comment marker from a comment token.
fn strip_comment_marker(text: &str) -> &str {
    text.strip_prefix("//")
        .unwrap_or_else(|| text.trim_start_matches('#'))
        .trim()
}

fn comment_text(text: &str) -> Option<String> {
    let body = strip_comment_marker(text);
    (!body.is_empty()).then(|| body.to_string())
}

fn is_directive(text: &str) -> bool {
    strip_comment_marker(text).starts_with('@')
}

/// Value of a `# @name value` directive.
fn name_directive(text: &str) -> Option<String> {
    let rest = strip_comment_marker(text).strip_prefix("@name")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) && !rest.starts_with('=') {
        return None;
    }
    let value = rest.trim_start_matches('=').trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn separator_text(text: &str) -> Option<String> {
    let name = text.trim_start_matches('#').trim();
    (!name.is_empty()).then(|| name.to_string())
}
