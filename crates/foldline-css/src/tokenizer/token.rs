//! CSS Token types per [§ 4 Tokenization](https://www.w3.org/TR/css-syntax-3/#tokenization).
//!
//! "The output of the tokenization step is a stream of zero or more of the
//! following tokens: `<ident-token>`, `<function-token>`, `<at-keyword-token>`,
//! `<hash-token>`, `<string-token>`, `<bad-string-token>`, `<url-token>`,
//! `<bad-url-token>`, `<delim-token>`, `<number-token>`, `<percentage-token>`,
//! `<dimension-token>`, `<whitespace-token>`, `<CDO-token>`, `<CDC-token>`,
//! `<colon-token>`, `<semicolon-token>`, `<comma-token>`, `<[-token>`,
//! `<]-token>`, `<(-token>`, `<)-token>`, `<{-token>`, and `<}-token>`."
//!
//! Every token carries the byte range it was read from, so later stages can
//! re-emit selector text, conditions and values exactly as the author wrote
//! them.

use core::fmt;
use core::ops::Range;

/// [§ 4.2 Definitions](https://www.w3.org/TR/css-syntax-3/#token-diagrams)
///
/// "A `<hash-token>` with the type flag set to 'id'... or 'unrestricted'."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashType {
    /// "id" - the hash token's value is a valid identifier
    Id,
    /// "unrestricted" - the hash token's value is not a valid identifier
    Unrestricted,
}

/// [§ 4.2 Definitions](https://www.w3.org/TR/css-syntax-3/#token-diagrams)
#[derive(Debug, Clone, PartialEq)]
pub enum CSSToken {
    /// "`<ident-token>`"
    Ident(String),

    /// "`<function-token>`", the name without the opening parenthesis.
    Function(String),

    /// "`<at-keyword-token>`", the name without the `@`.
    AtKeyword(String),

    /// "`<hash-token>`"
    Hash {
        /// The name after `#`.
        value: String,
        /// "a type flag set to either 'id' or 'unrestricted'"
        hash_type: HashType,
    },

    /// "`<string-token>`", unescaped and without quotes.
    String(String),

    /// "`<bad-string-token>`"
    BadString,

    /// "`<url-token>`"
    Url(String),

    /// "`<bad-url-token>`"
    BadUrl,

    /// "`<delim-token>`"
    Delim(char),

    /// "`<number-token>`"
    Number {
        /// "a numeric value"
        value: f64,
        /// Whether the type flag is "integer".
        integer: bool,
    },

    /// "`<percentage-token>`"
    Percentage {
        /// "a numeric value"
        value: f64,
    },

    /// "`<dimension-token>`"
    Dimension {
        /// "a numeric value"
        value: f64,
        /// Whether the type flag is "integer".
        integer: bool,
        /// "a unit", as written.
        unit: String,
    },

    /// "`<whitespace-token>`"
    Whitespace,

    /// "`<CDO-token>`" (`<!--`)
    CDO,

    /// "`<CDC-token>`" (`-->`)
    CDC,

    /// "`<colon-token>`"
    Colon,

    /// "`<semicolon-token>`"
    Semicolon,

    /// "`<comma-token>`"
    Comma,

    /// `<[-token>`
    LeftBracket,

    /// `<]-token>`
    RightBracket,

    /// `<(-token>`
    LeftParen,

    /// `<)-token>`
    RightParen,

    /// `<{-token>`
    LeftBrace,

    /// `<}-token>`
    RightBrace,

    /// End of file - signals end of input
    EOF,
}

impl CSSToken {
    /// Returns true if this is an EOF token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::EOF)
    }

    /// Returns true if this is a whitespace token.
    #[must_use]
    pub const fn is_whitespace(&self) -> bool {
        matches!(self, Self::Whitespace)
    }

    /// Returns true for an `<ident-token>` that is an ASCII case-insensitive
    /// match for `name`.
    #[must_use]
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Self::Ident(v) if v.eq_ignore_ascii_case(name))
    }

    /// [§ 5.4.8 Consume a component value](https://www.w3.org/TR/css-syntax-3/#consume-component-value)
    ///
    /// The token that closes the block or function this token opens, if any.
    #[must_use]
    pub fn closing(&self) -> Option<Self> {
        match self {
            Self::LeftBrace => Some(Self::RightBrace),
            Self::LeftBracket => Some(Self::RightBracket),
            Self::LeftParen | Self::Function(_) => Some(Self::RightParen),
            _ => None,
        }
    }
}

impl fmt::Display for CSSToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(v) => write!(f, "<ident:{v}>"),
            Self::Function(v) => write!(f, "<function:{v}(>"),
            Self::AtKeyword(v) => write!(f, "<at-keyword:@{v}>"),
            Self::Hash { value, .. } => write!(f, "<hash:#{value}>"),
            Self::String(v) => write!(f, "<string:\"{v}\">"),
            Self::BadString => write!(f, "<bad-string>"),
            Self::Url(v) => write!(f, "<url:{v}>"),
            Self::BadUrl => write!(f, "<bad-url>"),
            Self::Delim(c) => write!(f, "<delim:{c}>"),
            Self::Number { value, .. } => write!(f, "<number:{value}>"),
            Self::Percentage { value } => write!(f, "<percentage:{value}%>"),
            Self::Dimension { value, unit, .. } => write!(f, "<dimension:{value}{unit}>"),
            Self::Whitespace => write!(f, "<whitespace>"),
            Self::CDO => write!(f, "<CDO>"),
            Self::CDC => write!(f, "<CDC>"),
            Self::Colon => write!(f, "<colon>"),
            Self::Semicolon => write!(f, "<semicolon>"),
            Self::Comma => write!(f, "<comma>"),
            Self::LeftBracket => write!(f, "<[>"),
            Self::RightBracket => write!(f, "<]>"),
            Self::LeftParen => write!(f, "<(>"),
            Self::RightParen => write!(f, "<)>"),
            Self::LeftBrace => write!(f, "<{{>"),
            Self::RightBrace => write!(f, "<}}>"),
            Self::EOF => write!(f, "<EOF>"),
        }
    }
}

/// A token together with the byte range of the source it was read from.
///
/// The range excludes any comments consumed before the token.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    /// The token.
    pub token: CSSToken,
    /// Byte offsets into the tokenized source.
    pub span: Range<usize>,
}

impl SpannedToken {
    /// The source text this token was read from.
    ///
    /// Returns an empty string if `source` is not the text that was tokenized.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.span.clone()).unwrap_or_default()
    }
}
