//! Token types produced by the request-file lexer.

use serde::Serialize;

/// Closed set of token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    /// `###` at the start of a line, with any trailing name text.
    Separator,
    /// `#` or `//` line comment.
    Comment,
    Newline,
    Eof,

    /// One of the nine recognized verbs, followed by whitespace.
    Method,
    /// Text starting with `http://`, `https://`, `/` or `*`.
    Url,
    /// `HTTP/x.y`
    HttpVersion,

    /// First word of a line that ended with `:`.
    HeaderName,
    Colon,

    /// `<` designating a file reference.
    FileRef,
    /// Path following `<`.
    FilePath,
    /// `--boundary`
    Boundary,
    /// `--boundary--`
    BoundaryEnd,

    /// `> {%`
    HandlerStart,
    /// Script text between `{%` and `%}`.
    HandlerCode,
    /// `%}`
    HandlerEnd,
    /// Path following `> ` when no inline block is present.
    HandlerFile,

    /// `<>`
    ResponseRefStart,
    ResponseRefPath,

    /// `{{`
    VariableStart,
    /// Raw text between the braces.
    VariableName,
    /// `}}`
    VariableEnd,

    /// Anything else, one whitespace-delimited word at a time.
    Text,
}

impl TokenKind {
    /// Tokens that end a body or header section when they start a line.
    pub fn ends_section(self) -> bool {
        matches!(
            self,
            TokenKind::Eof
                | TokenKind::Separator
                | TokenKind::HandlerStart
                | TokenKind::HandlerFile
                | TokenKind::ResponseRefStart
        )
    }

    /// Whether the kind marks the end of a line.
    pub fn is_line_end(self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Eof)
    }
}

/// A lexed token with its source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source text of the token.
    pub text: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
    /// Byte offset from the start of the input.
    pub offset: usize,
    /// Horizontal whitespace skipped immediately before the token.
    pub space_before: String,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        text: impl Into<String>,
        line: usize,
        column: usize,
        offset: usize,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
            offset,
            space_before: String::new(),
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Whether whitespace separated this token from the previous one.
    pub fn is_spaced(&self) -> bool {
        !self.space_before.is_empty()
    }
}
