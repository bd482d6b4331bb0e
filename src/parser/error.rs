//! Error types for request-file lexing and parsing.
//!
//! Both kinds are fatal for the file being processed. Every variant carries
//! the 1-based line and column plus the byte offset of the offending input so
//! callers can point users at the exact spot.

use thiserror::Error;

/// Errors raised while turning text into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A `{{` without a matching `}}` on the same line.
    #[error(
        "Unterminated variable at line {line}, column {column}. Expected '}}}}' before the end of the line"
    )]
    UnterminatedVariable {
        line: usize,
        column: usize,
        offset: usize,
    },

    /// A `> {%` block without a matching `%}`.
    #[error("Unterminated response handler at line {line}, column {column}. Expected a closing '%}}'")]
    UnterminatedHandler {
        line: usize,
        column: usize,
        offset: usize,
    },
}

impl LexError {
    /// Returns the line number associated with this error.
    pub fn line(&self) -> usize {
        match self {
            LexError::UnterminatedVariable { line, .. } => *line,
            LexError::UnterminatedHandler { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            LexError::UnterminatedVariable { column, .. } => *column,
            LexError::UnterminatedHandler { column, .. } => *column,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            LexError::UnterminatedVariable { offset, .. } => *offset,
            LexError::UnterminatedHandler { offset, .. } => *offset,
        }
    }
}

/// Errors that can occur during request-file parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    /// A request line with a method but no URL.
    #[error(
        "Missing URL in request line at line {line}, column {column}. Expected format: '[METHOD ]URL[ HTTP/VERSION]'"
    )]
    MissingUrl {
        /// Token where the URL was expected
        token: String,
        line: usize,
        column: usize,
        offset: usize,
    },

    /// Trailing content on a request line after the URL and version.
    #[error(
        "Unexpected '{token}' at line {line}, column {column}. Expected format: '[METHOD ]URL[ HTTP/VERSION]'"
    )]
    UnexpectedToken {
        token: String,
        line: usize,
        column: usize,
        offset: usize,
    },

    /// A line in the header section that is not `Name: Value`.
    #[error("Invalid header format '{header}' at line {line}. Expected format: 'Header-Name: value'")]
    InvalidHeader {
        header: String,
        line: usize,
        column: usize,
        offset: usize,
    },
}

impl ParseError {
    /// Returns the line number associated with this error.
    pub fn line(&self) -> usize {
        match self {
            ParseError::Lex(err) => err.line(),
            ParseError::MissingUrl { line, .. } => *line,
            ParseError::UnexpectedToken { line, .. } => *line,
            ParseError::InvalidHeader { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            ParseError::Lex(err) => err.column(),
            ParseError::MissingUrl { column, .. } => *column,
            ParseError::UnexpectedToken { column, .. } => *column,
            ParseError::InvalidHeader { column, .. } => *column,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            ParseError::Lex(err) => err.offset(),
            ParseError::MissingUrl { offset, .. } => *offset,
            ParseError::UnexpectedToken { offset, .. } => *offset,
            ParseError::InvalidHeader { offset, .. } => *offset,
        }
    }
}
