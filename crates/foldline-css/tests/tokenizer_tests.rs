//! Integration tests for the CSS tokenizer.

use foldline_css::tokenizer::{CSSToken, CSSTokenizer, HashType, source_text};

/// Helper to tokenize a string and return the tokens without spans
fn tokenize(input: &str) -> Vec<CSSToken> {
    let mut tokenizer = CSSTokenizer::new(input);
    tokenizer.run();
    tokenizer.into_tokens().into_iter().map(|t| t.token).collect()
}

#[test]
fn test_whitespace() {
    let tokens = tokenize("   \t\n  ");
    assert_eq!(tokens, vec![CSSToken::Whitespace, CSSToken::EOF]);
}

#[test]
fn test_ident() {
    assert_eq!(tokenize("background-color")[0], CSSToken::Ident("background-color".into()));
    assert_eq!(tokenize("_private")[0], CSSToken::Ident("_private".into()));
    assert_eq!(tokenize("--brand")[0], CSSToken::Ident("--brand".into()));
}

#[test]
fn test_function_and_at_keyword() {
    assert_eq!(tokenize("rgb(")[0], CSSToken::Function("rgb".into()));
    assert_eq!(tokenize("@media")[0], CSSToken::AtKeyword("media".into()));
    assert_eq!(
        tokenize("@-webkit-keyframes")[0],
        CSSToken::AtKeyword("-webkit-keyframes".into())
    );
}

#[test]
fn test_hash_types() {
    assert_eq!(
        tokenize("#header")[0],
        CSSToken::Hash {
            value: "header".into(),
            hash_type: HashType::Id
        }
    );
    // "#123" is not a valid identifier, so the type flag is "unrestricted".
    assert_eq!(
        tokenize("#123")[0],
        CSSToken::Hash {
            value: "123".into(),
            hash_type: HashType::Unrestricted
        }
    );
}

#[test]
fn test_strings() {
    assert_eq!(tokenize("\"hello world\"")[0], CSSToken::String("hello world".into()));
    assert_eq!(tokenize("'it\\'s'")[0], CSSToken::String("it's".into()));
    assert_eq!(tokenize("\"broken\nstring\"")[0], CSSToken::BadString);
}

#[test]
fn test_numbers() {
    assert_eq!(
        tokenize("42")[0],
        CSSToken::Number {
            value: 42.0,
            integer: true
        }
    );
    assert_eq!(
        tokenize("-10")[0],
        CSSToken::Number {
            value: -10.0,
            integer: true
        }
    );
    assert_eq!(
        tokenize("3.5")[0],
        CSSToken::Number {
            value: 3.5,
            integer: false
        }
    );
    assert_eq!(
        tokenize("1e3")[0],
        CSSToken::Number {
            value: 1000.0,
            integer: false
        }
    );
}

#[test]
fn test_percentage_and_dimension() {
    assert_eq!(tokenize("50%")[0], CSSToken::Percentage { value: 50.0 });
    assert_eq!(
        tokenize("1.5em")[0],
        CSSToken::Dimension {
            value: 1.5,
            integer: false,
            unit: "em".into()
        }
    );
    assert_eq!(
        tokenize("768px")[0],
        CSSToken::Dimension {
            value: 768.0,
            integer: true,
            unit: "px".into()
        }
    );
}

#[test]
fn test_punctuation() {
    assert_eq!(
        tokenize(":;,{}[]()"),
        vec![
            CSSToken::Colon,
            CSSToken::Semicolon,
            CSSToken::Comma,
            CSSToken::LeftBrace,
            CSSToken::RightBrace,
            CSSToken::LeftBracket,
            CSSToken::RightBracket,
            CSSToken::LeftParen,
            CSSToken::RightParen,
            CSSToken::EOF,
        ]
    );
}

#[test]
fn test_comment_is_dropped() {
    let tokens = tokenize("/* comment */ color");
    assert_eq!(
        tokens,
        vec![
            CSSToken::Whitespace,
            CSSToken::Ident("color".into()),
            CSSToken::EOF
        ]
    );
}

#[test]
fn test_cdo_cdc() {
    let tokens = tokenize("<!-- -->");
    assert_eq!(
        tokens,
        vec![CSSToken::CDO, CSSToken::Whitespace, CSSToken::CDC, CSSToken::EOF]
    );
}

#[test]
fn test_urls() {
    assert_eq!(tokenize("url(image.png)")[0], CSSToken::Url("image.png".into()));
    assert_eq!(tokenize("url( a.png )")[0], CSSToken::Url("a.png".into()));
    // A quoted URL is a function followed by a string.
    assert_eq!(tokenize("url(\"a.png\")")[0], CSSToken::Function("url".into()));
    assert_eq!(tokenize("url(a b)")[0], CSSToken::BadUrl);
}

#[test]
fn test_escaped_character() {
    // \41 is 'A'
    assert_eq!(tokenize("\\41 ")[0], CSSToken::Ident("A".into()));
    assert_eq!(tokenize(".a\\:hover")[1], CSSToken::Ident("a:hover".into()));
}

#[test]
fn test_important_delim() {
    let tokens = tokenize("red!important");
    assert_eq!(tokens[0], CSSToken::Ident("red".into()));
    assert_eq!(tokens[1], CSSToken::Delim('!'));
    assert_eq!(tokens[2], CSSToken::Ident("important".into()));
}

#[test]
fn test_spans_reproduce_source() {
    let css = "@media (min-width: 768px) { .card > h2 { color: #fff } }";
    let mut tokenizer = CSSTokenizer::new(css);
    tokenizer.run();
    let tokens = tokenizer.into_tokens();

    let rebuilt: String = tokens.iter().map(|t| t.text(css)).collect();
    assert_eq!(rebuilt, css);
    assert_eq!(source_text(css, &tokens), css);
}
