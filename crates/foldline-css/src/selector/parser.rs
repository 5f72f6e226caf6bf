//! Selector parsing per [§ 18 Grammar](https://www.w3.org/TR/selectors-4/#grammar).
//!
//! "The grammar of Selectors is defined in terms of CSS syntax." Selectors
//! are parsed from the tokens of a qualified rule's prelude, so escapes and
//! strings have already been resolved by the tokenizer.

use thiserror::Error;

use super::specificity::selector_specificity;
use super::{
    AttrOperator, AttributeSelector, Combinator, ComplexSelector, CompoundSelector, Nth,
    PseudoClass, RelativeSelector, Selector,
};
use crate::tokenizer::{CSSToken, HashType, SpannedToken, source_text, tokenize};

/// A selector that does not conform to the grammar. Rules carrying one are
/// invalid as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The selector list, or one of its members, is empty.
    #[error("empty selector")]
    Empty,
    /// A combinator without a compound selector on one side.
    #[error("dangling combinator")]
    DanglingCombinator,
    /// A token that cannot appear at this point.
    #[error("unexpected {0} in selector")]
    UnexpectedToken(String),
    /// A malformed `[attribute]` selector.
    #[error("malformed attribute selector")]
    BadAttribute,
    /// A malformed `An+B` argument.
    #[error("malformed An+B expression '{0}'")]
    BadNth(String),
    /// A bracket or parenthesis that is never closed.
    #[error("unclosed block in selector")]
    Unclosed,
}

/// [§ 5.1 Selector lists](https://www.w3.org/TR/selectors-4/#grouping)
///
/// Parse the tokens of a selector list, e.g. a style rule's prelude.
/// `source` is the text the tokens were read from.
///
/// # Errors
///
/// "If just one of these selectors were invalid, the entire selector list
/// would be invalid."
pub fn parse_selector_list(
    source: &str,
    tokens: &[SpannedToken],
) -> Result<Vec<Selector>, SelectorError> {
    split_top_level_commas(tokens)?
        .into_iter()
        .map(|part| {
            let complex = Parser::new(part).parse_complex()?;
            Ok(Selector {
                text: source_text(source, part),
                specificity: selector_specificity(&complex),
                complex,
            })
        })
        .collect()
}

/// Tokenize and parse a selector list given as text.
///
/// # Errors
///
/// Returns an error if any selector in the list is invalid.
pub fn parse_selector_list_str(text: &str) -> Result<Vec<Selector>, SelectorError> {
    let tokens = tokenize(text);
    parse_selector_list(text, &tokens)
}

/// Split at commas outside any block. Trailing EOF tokens are dropped.
fn split_top_level_commas(tokens: &[SpannedToken]) -> Result<Vec<&[SpannedToken]>, SelectorError> {
    let tokens = match tokens.iter().position(|t| t.token.is_eof()) {
        Some(end) => &tokens[..end],
        None => tokens,
    };

    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (i, spanned) in tokens.iter().enumerate() {
        match &spanned.token {
            CSSToken::Function(_) | CSSToken::LeftParen | CSSToken::LeftBracket
            | CSSToken::LeftBrace => depth += 1,
            CSSToken::RightParen | CSSToken::RightBracket | CSSToken::RightBrace => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::UnexpectedToken(spanned.token.to_string()))?;
            }
            CSSToken::Comma if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::Unclosed);
    }
    parts.push(&tokens[start..]);
    Ok(parts)
}

/// Cursor over the tokens of one complex selector.
struct Parser<'a> {
    tokens: &'a [SpannedToken],
    position: usize,
}

impl<'a> Parser<'a> {
    const fn new(tokens: &'a [SpannedToken]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn peek(&self) -> Option<&'a CSSToken> {
        self.tokens.get(self.position).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a CSSToken> {
        self.tokens.get(self.position + offset).map(|t| &t.token)
    }

    fn bump(&mut self) -> Option<&'a CSSToken> {
        let token = self.peek()?;
        self.position += 1;
        Some(token)
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.peek().is_some_and(CSSToken::is_whitespace) {
            self.position += 1;
            skipped = true;
        }
        skipped
    }

    fn at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn unexpected(&self) -> SelectorError {
        self.peek().map_or(SelectorError::DanglingCombinator, |t| {
            SelectorError::UnexpectedToken(t.to_string())
        })
    }

    /// [§ 4.3 Complex selectors](https://www.w3.org/TR/selectors-4/#complex)
    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        let (leading, complex) = self.parse_complex_inner(false)?;
        debug_assert!(leading.is_none());
        Ok(complex)
    }

    /// [§ 4.6 Relative selectors](https://www.w3.org/TR/selectors-4/#relative)
    fn parse_relative(&mut self) -> Result<RelativeSelector, SelectorError> {
        let (leading, selector) = self.parse_complex_inner(true)?;
        Ok(RelativeSelector {
            combinator: leading.unwrap_or(Combinator::Descendant),
            selector,
        })
    }

    fn parse_complex_inner(
        &mut self,
        relative: bool,
    ) -> Result<(Option<Combinator>, ComplexSelector), SelectorError> {
        let _ = self.skip_whitespace();
        if self.at_end() {
            return Err(SelectorError::Empty);
        }

        let mut leading = None;
        if let Some(combinator) = self.peek().and_then(combinator_for) {
            if !relative {
                return Err(SelectorError::DanglingCombinator);
            }
            self.position += 1;
            let _ = self.skip_whitespace();
            leading = Some(combinator);
        }

        // Left-to-right: first compound, then (combinator, compound) pairs.
        let first = self.parse_compound()?;
        let mut chain: Vec<(Combinator, CompoundSelector)> = Vec::new();

        loop {
            let had_whitespace = self.skip_whitespace();
            if self.at_end() {
                break;
            }
            let combinator = match self.peek().and_then(combinator_for) {
                Some(combinator) => {
                    self.position += 1;
                    let _ = self.skip_whitespace();
                    combinator
                }
                None if had_whitespace => Combinator::Descendant,
                None => return Err(self.unexpected()),
            };
            if self.at_end() {
                return Err(SelectorError::DanglingCombinator);
            }
            chain.push((combinator, self.parse_compound()?));
        }

        // Re-root at the subject: the combinator that joined compound i to
        // compound i+1 now points from i+1 back to i.
        let mut compounds = Vec::with_capacity(chain.len() + 1);
        let mut combinators = Vec::with_capacity(chain.len());
        compounds.push(first);
        for (combinator, compound) in chain {
            combinators.push(combinator);
            compounds.push(compound);
        }
        let subject = compounds.pop().unwrap_or_default();
        let combinators = combinators
            .into_iter()
            .rev()
            .zip(compounds.into_iter().rev())
            .collect();

        Ok((leading, ComplexSelector {
            subject,
            combinators,
        }))
    }

    /// [§ 4.2 Compound selectors](https://www.w3.org/TR/selectors-4/#compound)
    fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
        let mut compound = CompoundSelector::default();
        let start = self.position;

        self.parse_type_selector(&mut compound)?;

        loop {
            match self.peek() {
                // [§ 6.7 ID selectors](https://www.w3.org/TR/selectors-4/#id-selectors)
                Some(CSSToken::Hash { value, hash_type }) => {
                    if *hash_type != HashType::Id {
                        return Err(self.unexpected());
                    }
                    compound.ids.push(value.clone());
                    self.position += 1;
                }

                // [§ 6.6 Class selectors](https://www.w3.org/TR/selectors-4/#class-html)
                Some(CSSToken::Delim('.')) => match self.peek_at(1) {
                    Some(CSSToken::Ident(class)) => {
                        compound.classes.push(class.clone());
                        self.position += 2;
                    }
                    _ => return Err(self.unexpected()),
                },

                Some(CSSToken::LeftBracket) => {
                    let attribute = self.parse_attribute()?;
                    compound.attributes.push(attribute);
                }

                Some(CSSToken::Colon) => self.parse_pseudo(&mut compound)?,

                _ => break,
            }
        }

        if self.position == start {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    /// [§ 5.1 Type selector](https://www.w3.org/TR/selectors-4/#type-selectors)
    /// and [§ 5.2 Universal selector](https://www.w3.org/TR/selectors-4/#universal-selector),
    /// with an optional `ns|` prefix that is ignored.
    fn parse_type_selector(&mut self, compound: &mut CompoundSelector) -> Result<(), SelectorError> {
        let name_at = |token: Option<&CSSToken>| match token {
            Some(CSSToken::Ident(name)) => Some(Some(name.to_ascii_lowercase())),
            Some(CSSToken::Delim('*')) => Some(None),
            _ => None,
        };

        // `|name` (no namespace)
        if self.peek() == Some(&CSSToken::Delim('|')) {
            let Some(name) = name_at(self.peek_at(1)) else {
                return Err(self.unexpected());
            };
            compound.tag = name;
            self.position += 2;
            return Ok(());
        }

        let Some(name) = name_at(self.peek()) else {
            return Ok(());
        };
        self.position += 1;

        // `ns|name`
        if self.peek() == Some(&CSSToken::Delim('|')) {
            if let Some(local) = name_at(self.peek_at(1)) {
                compound.tag = local;
                self.position += 2;
                return Ok(());
            }
        }
        compound.tag = name;
        Ok(())
    }

    /// [§ 6 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
    fn parse_attribute(&mut self) -> Result<AttributeSelector, SelectorError> {
        let end = self.block_end()?;
        let mut inner = Parser::new(&self.tokens[self.position + 1..end]);
        self.position = end + 1;

        let _ = inner.skip_whitespace();
        if inner.peek() == Some(&CSSToken::Delim('|')) {
            inner.position += 1;
        }
        let mut name = match inner.bump() {
            Some(CSSToken::Ident(name)) => name.to_ascii_lowercase(),
            Some(CSSToken::Delim('*')) if inner.peek() == Some(&CSSToken::Delim('|')) => {
                String::new()
            }
            _ => return Err(SelectorError::BadAttribute),
        };
        // `[ns|name]`, but not `[name|=value]`
        if inner.peek() == Some(&CSSToken::Delim('|')) {
            if let Some(CSSToken::Ident(local)) = inner.peek_at(1) {
                name = local.to_ascii_lowercase();
                inner.position += 2;
            }
        }
        if name.is_empty() {
            return Err(SelectorError::BadAttribute);
        }
        let _ = inner.skip_whitespace();

        if inner.at_end() {
            return Ok(AttributeSelector {
                name,
                operator: AttrOperator::Exists,
                value: String::new(),
                case_insensitive: false,
            });
        }

        let operator = match (inner.bump(), inner.peek()) {
            (Some(CSSToken::Delim('=')), _) => AttrOperator::Equals,
            (Some(CSSToken::Delim(c)), Some(CSSToken::Delim('='))) => {
                let operator = match c {
                    '~' => AttrOperator::Includes,
                    '|' => AttrOperator::DashMatch,
                    '^' => AttrOperator::PrefixMatch,
                    '$' => AttrOperator::SuffixMatch,
                    '*' => AttrOperator::SubstringMatch,
                    _ => return Err(SelectorError::BadAttribute),
                };
                inner.position += 1;
                operator
            }
            _ => return Err(SelectorError::BadAttribute),
        };

        let _ = inner.skip_whitespace();
        let value = match inner.bump() {
            Some(CSSToken::Ident(value) | CSSToken::String(value)) => value.clone(),
            _ => return Err(SelectorError::BadAttribute),
        };
        let _ = inner.skip_whitespace();

        let case_insensitive = match inner.bump() {
            None => false,
            Some(flag) if flag.is_ident("i") => true,
            Some(flag) if flag.is_ident("s") => false,
            Some(_) => return Err(SelectorError::BadAttribute),
        };
        let _ = inner.skip_whitespace();
        if !inner.at_end() {
            return Err(SelectorError::BadAttribute);
        }

        Ok(AttributeSelector {
            name,
            operator,
            value,
            case_insensitive,
        })
    }

    /// [§ 3.5 Pseudo-classes](https://www.w3.org/TR/selectors-4/#pseudo-classes)
    /// and [§ 3.6 Pseudo-elements](https://www.w3.org/TR/selectors-4/#pseudo-elements).
    fn parse_pseudo(&mut self, compound: &mut CompoundSelector) -> Result<(), SelectorError> {
        // Current token is the first colon.
        self.position += 1;
        let is_element = self.peek() == Some(&CSSToken::Colon);
        if is_element {
            self.position += 1;
        }

        match self.peek() {
            Some(CSSToken::Ident(name)) => {
                self.position += 1;
                let name = name.to_ascii_lowercase();
                if is_element || is_legacy_pseudo_element(&name) {
                    compound.pseudo_elements.push(name);
                } else {
                    compound.pseudo_classes.push(pseudo_class_from_name(name));
                }
                Ok(())
            }
            Some(CSSToken::Function(name)) => {
                let name = name.to_ascii_lowercase();
                let end = self.block_end()?;
                let args = &self.tokens[self.position + 1..end];
                self.position = end + 1;
                if is_element {
                    let args_text: String = args
                        .iter()
                        .filter_map(|t| match &t.token {
                            CSSToken::Ident(v) | CSSToken::String(v) => Some(v.clone()),
                            CSSToken::Delim(c) => Some(c.to_string()),
                            _ => None,
                        })
                        .collect();
                    compound.pseudo_elements.push(format!("{name}({args_text})"));
                } else {
                    compound.pseudo_classes.push(functional_pseudo_class(&name, args)?);
                }
                Ok(())
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Index of the token closing the block or function at the cursor.
    fn block_end(&self) -> Result<usize, SelectorError> {
        let mut depth = 0_usize;
        for (i, spanned) in self.tokens.iter().enumerate().skip(self.position) {
            if spanned.token.closing().is_some() {
                depth += 1;
            } else if matches!(
                spanned.token,
                CSSToken::RightParen | CSSToken::RightBracket | CSSToken::RightBrace
            ) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(i);
                }
            }
        }
        Err(SelectorError::Unclosed)
    }
}

/// Combinator tokens other than whitespace.
const fn combinator_for(token: &CSSToken) -> Option<Combinator> {
    match token {
        CSSToken::Delim('>') => Some(Combinator::Child),
        CSSToken::Delim('+') => Some(Combinator::NextSibling),
        CSSToken::Delim('~') => Some(Combinator::SubsequentSibling),
        _ => None,
    }
}

/// [§ 3.6.1 Syntax](https://www.w3.org/TR/selectors-4/#pseudo-element-syntax)
///
/// "For compatibility with existing style sheets, user agents must also
/// accept the previous one-colon notation for pseudo-elements introduced in
/// CSS levels 1 and 2 (namely, :first-line, :first-letter, :before, and
/// :after)."
fn is_legacy_pseudo_element(name: &str) -> bool {
    matches!(name, "before" | "after" | "first-line" | "first-letter")
}

/// Pseudo-classes whose state depends on the user or on form validity.
const INTERACTIVE_PSEUDO_CLASSES: &[&str] = &[
    "hover",
    "active",
    "focus",
    "focus-within",
    "focus-visible",
    "visited",
    "target",
    "target-within",
    "valid",
    "invalid",
    "user-valid",
    "user-invalid",
    "in-range",
    "out-of-range",
    "placeholder-shown",
    "autofill",
    "-webkit-autofill",
    "indeterminate",
    "fullscreen",
    "popover-open",
    "modal",
    "playing",
    "paused",
    "open",
    "closed",
];

fn pseudo_class_from_name(name: String) -> PseudoClass {
    match name.as_str() {
        "root" => PseudoClass::Root,
        "scope" => PseudoClass::Scope,
        "first-child" => PseudoClass::FirstChild,
        "last-child" => PseudoClass::LastChild,
        "only-child" => PseudoClass::OnlyChild,
        "first-of-type" => PseudoClass::FirstOfType,
        "last-of-type" => PseudoClass::LastOfType,
        "only-of-type" => PseudoClass::OnlyOfType,
        "empty" => PseudoClass::Empty,
        "link" => PseudoClass::Link,
        "any-link" | "-webkit-any-link" => PseudoClass::AnyLink,
        "checked" => PseudoClass::Checked,
        "disabled" => PseudoClass::Disabled,
        "enabled" => PseudoClass::Enabled,
        "required" => PseudoClass::Required,
        "optional" => PseudoClass::Optional,
        "read-only" | "-moz-read-only" => PseudoClass::ReadOnly,
        "read-write" | "-moz-read-write" => PseudoClass::ReadWrite,
        _ if INTERACTIVE_PSEUDO_CLASSES.contains(&name.as_str()) => PseudoClass::Interactive(name),
        _ => PseudoClass::Unsupported(name),
    }
}

fn functional_pseudo_class(
    name: &str,
    args: &[SpannedToken],
) -> Result<PseudoClass, SelectorError> {
    Ok(match name {
        "not" => PseudoClass::Not(parse_complex_list(args)?),
        "is" | "matches" | "-webkit-any" | "-moz-any" => {
            PseudoClass::Is(parse_forgiving_list(args))
        }
        "where" => PseudoClass::Where(parse_forgiving_list(args)),
        "has" => PseudoClass::Has(
            split_top_level_commas(args)?
                .into_iter()
                .map(|part| Parser::new(part).parse_relative())
                .collect::<Result<_, _>>()?,
        ),
        "nth-child" | "nth-last-child" => {
            let (nth_tokens, of) = split_of_clause(args);
            let nth = parse_nth(nth_tokens)?;
            let of = of.map(parse_complex_list).transpose()?;
            if name == "nth-child" {
                PseudoClass::NthChild(nth, of)
            } else {
                PseudoClass::NthLastChild(nth, of)
            }
        }
        "nth-of-type" => PseudoClass::NthOfType(parse_nth(args)?),
        "nth-last-of-type" => PseudoClass::NthLastOfType(parse_nth(args)?),
        "lang" => PseudoClass::Lang(
            args.iter()
                .filter_map(|t| match &t.token {
                    CSSToken::Ident(v) | CSSToken::String(v) => Some(v.to_ascii_lowercase()),
                    _ => None,
                })
                .collect(),
        ),
        "dir" => match args.iter().find(|t| !t.token.is_whitespace()) {
            Some(SpannedToken {
                token: CSSToken::Ident(dir),
                ..
            }) => PseudoClass::Dir(dir.to_ascii_lowercase()),
            _ => return Err(SelectorError::UnexpectedToken("argument to :dir()".into())),
        },
        _ => PseudoClass::Unsupported(name.to_string()),
    })
}

fn parse_complex_list(tokens: &[SpannedToken]) -> Result<Vec<ComplexSelector>, SelectorError> {
    split_top_level_commas(tokens)?
        .into_iter()
        .map(|part| Parser::new(part).parse_complex())
        .collect()
}

/// [§ 3.7 Forgiving selector parsing](https://www.w3.org/TR/selectors-4/#forgiving-selector)
///
/// Invalid members are dropped instead of invalidating the list.
fn parse_forgiving_list(tokens: &[SpannedToken]) -> Vec<ComplexSelector> {
    split_top_level_commas(tokens)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| Parser::new(part).parse_complex().ok())
        .collect()
}

/// Split `An+B of S` at the top-level `of` keyword.
fn split_of_clause(tokens: &[SpannedToken]) -> (&[SpannedToken], Option<&[SpannedToken]>) {
    match tokens.iter().position(|t| t.token.is_ident("of")) {
        Some(i) => (&tokens[..i], Some(&tokens[i + 1..])),
        None => (tokens, None),
    }
}

/// [§ 6 The An+B microsyntax](https://www.w3.org/TR/css-syntax-3/#anb-microsyntax)
///
/// Parsed from the compact form of the argument (`2n+1`, `-n+3`, `odd`).
fn parse_nth(tokens: &[SpannedToken]) -> Result<Nth, SelectorError> {
    let mut compact: String = tokens
        .iter()
        .filter(|t| !t.token.is_whitespace())
        .map(|t| match &t.token {
            CSSToken::Ident(v) => v.to_ascii_lowercase(),
            CSSToken::Number { value, .. } => format_integer(*value),
            CSSToken::Dimension { value, unit, .. } => {
                format!("{}{}", format_integer(*value), unit.to_ascii_lowercase())
            }
            CSSToken::Delim(c) => c.to_string(),
            other => other.to_string(),
        })
        .collect();
    // Numbers are rendered signed, so `2n + 1` arrives as `+2n++1`.
    for (from, to) in [("++", "+"), ("+-", "-"), ("-+", "-"), ("--", "+")] {
        compact = compact.replace(from, to);
    }
    let bad = || SelectorError::BadNth(compact.clone());

    let text = compact.as_str();
    match text {
        "odd" => return Ok(Nth { a: 2, b: 1 }),
        "even" => return Ok(Nth { a: 2, b: 0 }),
        "" => return Err(bad()),
        _ => {}
    }

    match text.split_once('n') {
        Some((a, b)) => {
            let a = match a {
                "" | "+" => 1,
                "-" => -1,
                _ => a.parse().map_err(|_| bad())?,
            };
            let b = if b.is_empty() {
                0
            } else {
                if !b.starts_with(['+', '-']) {
                    return Err(bad());
                }
                b.parse().map_err(|_| bad())?
            };
            Ok(Nth { a, b })
        }
        None => Ok(Nth {
            a: 0,
            b: text.parse().map_err(|_| bad())?,
        }),
    }
}

/// Integral numbers render without a fractional part; others render as-is
/// so that parsing them as `i32` fails.
fn format_integer(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < f64::from(i32::MAX) {
        format!("{value:+}").trim_end_matches(".0").to_string()
    } else {
        value.to_string()
    }
}
