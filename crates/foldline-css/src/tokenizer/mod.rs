//! CSS tokenizer module.

/// CSS token types per [CSS Syntax Level 3 § 4](https://www.w3.org/TR/css-syntax-3/#tokenization).
pub mod token;
/// CSS tokenizer implementation.
pub mod tokenizer;

pub use token::{CSSToken, HashType, SpannedToken};
pub use tokenizer::CSSTokenizer;

/// Tokenize `source`. The result always ends with an EOF token.
#[must_use]
pub fn tokenize(source: &str) -> Vec<SpannedToken> {
    let mut tokenizer = CSSTokenizer::new(source);
    tokenizer.run();
    tokenizer.into_tokens()
}

/// Re-emit a run of tokens as the author wrote them.
///
/// Comments are dropped, each whitespace run becomes one space, and leading
/// and trailing whitespace is removed. A comment that separated two
/// non-whitespace tokens is kept as `/**/` so the tokens do not fuse.
#[must_use]
pub fn source_text(source: &str, tokens: &[SpannedToken]) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    let mut previous_end: Option<usize> = None;

    for spanned in tokens {
        match spanned.token {
            CSSToken::EOF => break,
            CSSToken::Whitespace => pending_space = !out.is_empty(),
            _ => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                } else if !out.is_empty() && previous_end.is_some_and(|end| end < spanned.span.start)
                {
                    out.push_str("/**/");
                }
                out.push_str(spanned.text(source));
            }
        }
        previous_end = Some(spanned.span.end);
    }
    out
}
