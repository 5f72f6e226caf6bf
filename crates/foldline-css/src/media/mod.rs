//! Static evaluation of `@media` and `@supports` conditions.
//!
//! Implements the subset of [Media Queries Level 4](https://www.w3.org/TR/mediaqueries-4/)
//! that can be decided from a viewport size alone: media types,
//! `width`/`height`/`aspect-ratio`/`orientation` in both `min-`/`max-` and
//! range form, combined with `and`/`or`/`not`. Everything else (user
//! preferences, pointer capabilities, container-relative units, `calc()`)
//! evaluates to [`Evaluation::Unknown`], and unknowns propagate with Kleene
//! logic so that `(min-width: 100px) or (hover: hover)` is still true on a
//! wide viewport.

use foldline_dom::Viewport;

use crate::tokenizer::{CSSToken, tokenize};

/// Three-valued truth of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Evaluation {
    /// Definitely false for this viewport.
    False,
    /// Depends on something the viewport does not determine.
    Unknown,
    /// Definitely true for this viewport.
    True,
}

impl Evaluation {
    const fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    /// Kleene conjunction.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        self.min(other)
    }

    /// Kleene disjunction.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        self.max(other)
    }

    /// Kleene negation.
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
            Self::True => Self::False,
        }
    }
}

/// Result of evaluating a media query list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaEvaluation {
    /// The list's truth value.
    pub result: Evaluation,
    /// Whether any query in the list was malformed (and so counted as
    /// `not all`).
    pub malformed: bool,
}

/// [§ 2.3 Media Types](https://www.w3.org/TR/mediaqueries-4/#media-types)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// `all`
    All,
    /// `screen`
    Screen,
    /// `print`
    Print,
    /// Deprecated or unknown types, which match nothing.
    Other,
}

impl MediaType {
    /// Parse a media type keyword, ASCII case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "all" => Self::All,
            "screen" => Self::Screen,
            "print" => Self::Print,
            _ => Self::Other,
        }
    }
}

/// The environment conditions are evaluated against: a screen of the
/// viewport's size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaContext {
    /// Viewport width in CSS pixels.
    pub width: f64,
    /// Viewport height in CSS pixels.
    pub height: f64,
    /// Initial font size, which `em` and `rem` resolve against.
    pub font_size: f64,
}

impl MediaContext {
    /// A screen context with the default 16px font size.
    #[must_use]
    pub const fn screen(viewport: Viewport) -> Self {
        Self {
            width: viewport.width,
            height: viewport.height,
            font_size: 16.0,
        }
    }

    /// [§ 3 Media Queries](https://www.w3.org/TR/mediaqueries-4/#media)
    ///
    /// Evaluate a comma-separated media query list, e.g. the prelude of an
    /// `@media` rule. "A media query list is true if any of its component
    /// media queries are true, and false only if all of its component media
    /// queries are false." An empty list is true.
    #[must_use]
    pub fn evaluate_list(&self, condition_text: &str) -> MediaEvaluation {
        let tokens = tokenize(condition_text);
        let tokens: Vec<&CSSToken> = tokens
            .iter()
            .map(|t| &t.token)
            .filter(|t| !t.is_whitespace() && !t.is_eof())
            .collect();

        if tokens.is_empty() {
            return MediaEvaluation {
                result: Evaluation::True,
                malformed: false,
            };
        }

        let mut result = Evaluation::False;
        let mut malformed = false;
        for query in split_commas(&tokens) {
            match self.evaluate_query(query) {
                Some(value) => result = result.or(value),
                // "A media query that does not match the grammar ... is
                // replaced by not all."
                None => malformed = true,
            }
        }
        MediaEvaluation { result, malformed }
    }

    /// `[not | only]? <media-type> [and <media-condition-without-or>]?`
    /// or `<media-condition>`.
    fn evaluate_query(&self, tokens: &[&CSSToken]) -> Option<Evaluation> {
        let mut cursor = Cursor { tokens, position: 0 };

        let starts_with_condition = match cursor.peek() {
            Some(CSSToken::LeftParen | CSSToken::Function(_)) => true,
            Some(token) if token.is_ident("not") => {
                matches!(cursor.peek_at(1), Some(CSSToken::LeftParen | CSSToken::Function(_)))
            }
            _ => false,
        };
        if starts_with_condition {
            let value = self.condition(&mut cursor, true)?;
            return cursor.at_end().then_some(value);
        }

        let negated = match cursor.peek() {
            Some(token) if token.is_ident("not") => {
                cursor.position += 1;
                true
            }
            Some(token) if token.is_ident("only") => {
                cursor.position += 1;
                false
            }
            _ => false,
        };

        let media_type = match cursor.bump() {
            Some(CSSToken::Ident(name))
                if !["and", "or", "not", "only", "layer"]
                    .iter()
                    .any(|k| name.eq_ignore_ascii_case(k)) =>
            {
                MediaType::parse(name)
            }
            _ => return None,
        };
        let mut value = Evaluation::from_bool(matches!(media_type, MediaType::All | MediaType::Screen));

        if !cursor.at_end() {
            if !cursor.peek().is_some_and(|t| t.is_ident("and")) {
                return None;
            }
            cursor.position += 1;
            value = value.and(self.condition(&mut cursor, false)?);
            if !cursor.at_end() {
                return None;
            }
        }

        Some(if negated { value.negate() } else { value })
    }

    /// [§ 3.1 Combining Media Features](https://www.w3.org/TR/mediaqueries-4/#media-conditions)
    ///
    /// `not <in-parens>`, or `<in-parens>` joined entirely by `and` or
    /// entirely by `or`.
    fn condition(&self, cursor: &mut Cursor<'_>, allow_or: bool) -> Option<Evaluation> {
        if cursor.peek().is_some_and(|t| t.is_ident("not")) {
            cursor.position += 1;
            return Some(self.in_parens(cursor)?.negate());
        }

        let mut value = self.in_parens(cursor)?;
        let joiner = match cursor.peek() {
            Some(t) if t.is_ident("and") => "and",
            Some(t) if t.is_ident("or") && allow_or => "or",
            _ => return Some(value),
        };
        while cursor.peek().is_some_and(|t| t.is_ident(joiner)) {
            cursor.position += 1;
            let next = self.in_parens(cursor)?;
            value = if joiner == "and" { value.and(next) } else { value.or(next) };
        }
        // "and" and "or" cannot be mixed without parentheses.
        if cursor.peek().is_some_and(|t| t.is_ident("and") || t.is_ident("or")) {
            return None;
        }
        Some(value)
    }

    /// `( <media-condition> ) | ( <media-feature> ) | <general-enclosed>`
    fn in_parens(&self, cursor: &mut Cursor<'_>) -> Option<Evaluation> {
        match cursor.peek()? {
            CSSToken::LeftParen => {
                let inner = cursor.take_block()?;
                let mut inner_cursor = Cursor {
                    tokens: inner,
                    position: 0,
                };
                let nested = match inner_cursor.peek() {
                    Some(CSSToken::LeftParen) => true,
                    Some(token) => token.is_ident("not"),
                    None => return None,
                };
                if nested {
                    let value = self.condition(&mut inner_cursor, true)?;
                    return inner_cursor.at_end().then_some(value);
                }
                self.feature(inner)
            }
            // <general-enclosed>: a function we cannot evaluate.
            CSSToken::Function(_) => {
                let _ = cursor.take_block()?;
                Some(Evaluation::Unknown)
            }
            _ => None,
        }
    }

    /// [§ 2.4 Media Features](https://www.w3.org/TR/mediaqueries-4/#media-feature)
    fn feature(&self, tokens: &[&CSSToken]) -> Option<Evaluation> {
        match tokens {
            // Boolean context: "(width)" is true unless the value would be zero.
            [CSSToken::Ident(name)] => Some(self.boolean_feature(&name.to_ascii_lowercase())),

            [CSSToken::Ident(name), CSSToken::Colon, value @ ..] => {
                let name = name.to_ascii_lowercase();
                let value = MediaValue::parse(value);
                if let Some(feature) = name.strip_prefix("min-") {
                    self.range_feature(feature, Comparison::GreaterOrEqual, value?)
                } else if let Some(feature) = name.strip_prefix("max-") {
                    self.range_feature(feature, Comparison::LessOrEqual, value?)
                } else if name == "orientation" {
                    self.orientation(value?)
                } else if is_range_feature(&name) {
                    self.range_feature(&name, Comparison::Equal, value?)
                } else {
                    if !is_known_feature(&name) {
                        log::trace!(target: "foldline::media", "unknown media feature {name}");
                    }
                    Some(Evaluation::Unknown)
                }
            }

            [_, ..] => self.range_syntax(tokens),

            [] => None,
        }
    }

    fn boolean_feature(&self, name: &str) -> Evaluation {
        match name {
            "width" => Evaluation::from_bool(self.width > 0.0),
            "height" => Evaluation::from_bool(self.height > 0.0),
            "aspect-ratio" | "orientation" => Evaluation::True,
            _ => Evaluation::Unknown,
        }
    }

    fn orientation(&self, value: MediaValue) -> Option<Evaluation> {
        // "portrait: The orientation media feature is portrait when the
        // value of the height media feature is greater than or equal to the
        // value of the width media feature."
        let portrait = self.height >= self.width;
        match value {
            MediaValue::Ident(keyword) if keyword == "portrait" => Some(Evaluation::from_bool(portrait)),
            MediaValue::Ident(keyword) if keyword == "landscape" => {
                Some(Evaluation::from_bool(!portrait))
            }
            _ => None,
        }
    }

    /// [§ 2.4.3 Range Context](https://www.w3.org/TR/mediaqueries-4/#range-context)
    ///
    /// `(name op value)`, `(value op name)` or `(value op name op value)`.
    fn range_syntax(&self, tokens: &[&CSSToken]) -> Option<Evaluation> {
        let mut operands: Vec<&[&CSSToken]> = Vec::new();
        let mut operators = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i < tokens.len() {
            let operator = match tokens[i] {
                CSSToken::Delim('<') => Some(Comparison::Less),
                CSSToken::Delim('>') => Some(Comparison::Greater),
                CSSToken::Delim('=') => Some(Comparison::Equal),
                _ => None,
            };
            let Some(mut operator) = operator else {
                i += 1;
                continue;
            };
            operands.push(&tokens[start..i]);
            if operator != Comparison::Equal && tokens.get(i + 1) == Some(&&CSSToken::Delim('=')) {
                operator = operator.or_equal();
                i += 1;
            }
            operators.push(operator);
            i += 1;
            start = i;
        }
        operands.push(&tokens[start..]);

        let feature_name = |operand: &[&CSSToken]| match operand {
            [CSSToken::Ident(name)] if is_range_feature(&name.to_ascii_lowercase()) => {
                Some(name.to_ascii_lowercase())
            }
            _ => None,
        };
        let is_unknown_feature = |operand: &[&CSSToken]| {
            matches!(operand, [CSSToken::Ident(name)] if !is_range_feature(&name.to_ascii_lowercase()))
        };

        match (operands.as_slice(), operators.as_slice()) {
            ([left, right], [operator]) => {
                if let Some(name) = feature_name(*left) {
                    self.range_feature(&name, *operator, MediaValue::parse(*right)?)
                } else if let Some(name) = feature_name(*right) {
                    self.range_feature(&name, operator.flip(), MediaValue::parse(*left)?)
                } else if is_unknown_feature(*left) || is_unknown_feature(*right) {
                    Some(Evaluation::Unknown)
                } else {
                    None
                }
            }
            ([low, middle, high], [first, second]) => {
                // Both comparisons must point the same way.
                if first.is_less() != second.is_less()
                    || *first == Comparison::Equal
                    || *second == Comparison::Equal
                {
                    return None;
                }
                if is_unknown_feature(*middle) {
                    return Some(Evaluation::Unknown);
                }
                let name = feature_name(*middle)?;
                let lower = self.range_feature(&name, first.flip(), MediaValue::parse(*low)?)?;
                let upper = self.range_feature(&name, *second, MediaValue::parse(*high)?)?;
                Some(lower.and(upper))
            }
            // Not a range: an unknown `<general-enclosed>` such as `(foo bar)`.
            (_, []) => Some(Evaluation::Unknown),
            _ => None,
        }
    }

    /// Compare the viewport's value of a range feature against `value`:
    /// `feature <operator> value`.
    fn range_feature(&self, name: &str, operator: Comparison, value: MediaValue) -> Option<Evaluation> {
        let actual = match name {
            "width" => self.width,
            "height" => self.height,
            "aspect-ratio" => {
                if self.height <= 0.0 {
                    return Some(Evaluation::Unknown);
                }
                let ratio = match value {
                    MediaValue::Number(n) => n,
                    MediaValue::Ratio(n, d) if d.abs() > f64::EPSILON => n / d,
                    MediaValue::Unknown => return Some(Evaluation::Unknown),
                    _ => return None,
                };
                return Some(Evaluation::from_bool(
                    operator.compare(self.width / self.height, ratio),
                ));
            }
            // Known features the viewport does not determine, and `min-`/`max-`
            // on features nobody defines.
            _ => return Some(Evaluation::Unknown),
        };

        let expected = match value {
            MediaValue::Length(px) => px,
            MediaValue::Number(n) if n.abs() < f64::EPSILON => 0.0,
            MediaValue::Dimension(n, unit) => match self.to_px(n, &unit) {
                Some(px) => px,
                None => return Some(Evaluation::Unknown),
            },
            MediaValue::Unknown => return Some(Evaluation::Unknown),
            _ => return None,
        };
        Some(Evaluation::from_bool(operator.compare(actual, expected)))
    }

    /// [§ 6 Distance Units](https://www.w3.org/TR/css-values-4/#lengths)
    fn to_px(&self, value: f64, unit: &str) -> Option<f64> {
        let factor = match unit {
            "px" => 1.0,
            // "Relative length units in media queries are based on the initial value."
            "em" | "rem" => self.font_size,
            "vw" => self.width / 100.0,
            "vh" => self.height / 100.0,
            "vmin" => self.width.min(self.height) / 100.0,
            "vmax" => self.width.max(self.height) / 100.0,
            "cm" => 96.0 / 2.54,
            "mm" => 96.0 / 25.4,
            "q" => 96.0 / 101.6,
            "in" => 96.0,
            "pt" => 96.0 / 72.0,
            "pc" => 16.0,
            _ => return None,
        };
        Some(value * factor)
    }
}

/// The media type each query of the list requires, in list order.
///
/// `None` for a query that names no type, negates its type (`not
/// print` holds on screen) or is malformed.
#[must_use]
pub fn required_media_types(condition_text: &str) -> Vec<Option<String>> {
    let tokens = tokenize(condition_text);
    let tokens: Vec<&CSSToken> = tokens
        .iter()
        .map(|t| &t.token)
        .filter(|t| !t.is_whitespace() && !t.is_eof())
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    split_commas(&tokens)
        .into_iter()
        .map(|query| {
            let query = match query.first() {
                Some(token) if token.is_ident("only") => &query[1..],
                _ => query,
            };
            match query.first() {
                Some(CSSToken::Ident(name))
                    if !["and", "or", "not", "only", "layer"]
                        .iter()
                        .any(|k| name.eq_ignore_ascii_case(k)) =>
                {
                    Some(name.to_ascii_lowercase())
                }
                _ => None,
            }
        })
        .collect()
}

/// [CSS Conditional Rules § 2](https://www.w3.org/TR/css-conditional-3/#at-supports)
///
/// Support for a feature depends on the browser that loads the page, so a
/// `@supports` condition is only decided statically when it is empty or the
/// literal `true`.
#[must_use]
pub fn evaluate_supports(condition_text: &str) -> Evaluation {
    let trimmed = condition_text.trim().trim_start_matches('(').trim_end_matches(')').trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("true") {
        Evaluation::True
    } else {
        Evaluation::Unknown
    }
}

/// A parsed `<mf-value>`.
#[derive(Debug, Clone, PartialEq)]
enum MediaValue {
    Length(f64),
    Dimension(f64, String),
    Number(f64),
    Ratio(f64, f64),
    Ident(String),
    /// `calc()` and other functions.
    Unknown,
}

impl MediaValue {
    fn parse(tokens: &[&CSSToken]) -> Option<Self> {
        Some(match tokens {
            [CSSToken::Dimension { value, unit, .. }] => {
                let unit = unit.to_ascii_lowercase();
                if unit == "px" {
                    Self::Length(*value)
                } else {
                    Self::Dimension(*value, unit)
                }
            }
            [CSSToken::Number { value, .. }] => Self::Number(*value),
            [
                CSSToken::Number { value: n, .. },
                CSSToken::Delim('/'),
                CSSToken::Number { value: d, .. },
            ] => Self::Ratio(*n, *d),
            [CSSToken::Ident(keyword)] => Self::Ident(keyword.to_ascii_lowercase()),
            [CSSToken::Function(_), ..] => Self::Unknown,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Less,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    Greater,
}

impl Comparison {
    const fn or_equal(self) -> Self {
        match self {
            Self::Less => Self::LessOrEqual,
            Self::Greater => Self::GreaterOrEqual,
            other => other,
        }
    }

    /// The operator seen from the other side: `a < b` is `b > a`.
    const fn flip(self) -> Self {
        match self {
            Self::Less => Self::Greater,
            Self::LessOrEqual => Self::GreaterOrEqual,
            Self::Equal => Self::Equal,
            Self::GreaterOrEqual => Self::LessOrEqual,
            Self::Greater => Self::Less,
        }
    }

    const fn is_less(self) -> bool {
        matches!(self, Self::Less | Self::LessOrEqual)
    }

    fn compare(self, actual: f64, expected: f64) -> bool {
        match self {
            Self::Less => actual < expected,
            Self::LessOrEqual => actual <= expected,
            Self::Equal => (actual - expected).abs() < f64::EPSILON,
            Self::GreaterOrEqual => actual >= expected,
            Self::Greater => actual > expected,
        }
    }
}

fn is_range_feature(name: &str) -> bool {
    matches!(name, "width" | "height" | "aspect-ratio")
}

/// Media features defined by Media Queries 4/5 that a viewport size does
/// not determine.
fn is_known_feature(name: &str) -> bool {
    matches!(
        name,
        "device-width"
            | "device-height"
            | "device-aspect-ratio"
            | "resolution"
            | "color"
            | "color-index"
            | "monochrome"
            | "color-gamut"
            | "dynamic-range"
            | "grid"
            | "scan"
            | "update"
            | "hover"
            | "any-hover"
            | "pointer"
            | "any-pointer"
            | "overflow-block"
            | "overflow-inline"
            | "display-mode"
            | "forced-colors"
            | "inverted-colors"
            | "scripting"
            | "prefers-color-scheme"
            | "prefers-contrast"
            | "prefers-reduced-motion"
            | "prefers-reduced-transparency"
            | "prefers-reduced-data"
    )
}

struct Cursor<'a> {
    tokens: &'a [&'a CSSToken],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a CSSToken> {
        self.tokens.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<&'a CSSToken> {
        self.tokens.get(self.position + offset).copied()
    }

    fn bump(&mut self) -> Option<&'a CSSToken> {
        let token = self.peek()?;
        self.position += 1;
        Some(token)
    }

    const fn at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Consume a parenthesised block or function and return its contents.
    fn take_block(&mut self) -> Option<&'a [&'a CSSToken]> {
        let start = self.position + 1;
        let mut depth = 0_usize;
        while let Some(token) = self.bump() {
            if token.closing().is_some() {
                depth += 1;
            } else if matches!(
                token,
                CSSToken::RightParen | CSSToken::RightBracket | CSSToken::RightBrace
            ) {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&self.tokens[start..self.position - 1]);
                }
            }
        }
        None
    }
}

fn split_commas<'a>(tokens: &'a [&'a CSSToken]) -> Vec<&'a [&'a CSSToken]> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.closing().is_some() {
            depth += 1;
        } else if matches!(
            token,
            CSSToken::RightParen | CSSToken::RightBracket | CSSToken::RightBrace
        ) {
            depth = depth.saturating_sub(1);
        } else if **token == CSSToken::Comma && depth == 0 {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kleene_or_keeps_true() {
        assert_eq!(Evaluation::Unknown.or(Evaluation::True), Evaluation::True);
        assert_eq!(Evaluation::Unknown.and(Evaluation::False), Evaluation::False);
        assert_eq!(Evaluation::Unknown.negate(), Evaluation::Unknown);
    }

    #[test]
    fn test_required_media_types_skip_negated_queries() {
        assert_eq!(
            required_media_types("only Print and (color), not print, (min-width: 10px), screen"),
            [Some("print".to_string()), None, None, Some("screen".to_string())]
        );
        assert!(required_media_types("").is_empty());
    }

    #[test]
    fn test_supports_is_decided_only_for_trivial_conditions() {
        assert_eq!(evaluate_supports(""), Evaluation::True);
        assert_eq!(evaluate_supports("true"), Evaluation::True);
        assert_eq!(evaluate_supports("(display: grid)"), Evaluation::Unknown);
    }
}
