//! CSS rule parser per [§ 5 Parsing](https://www.w3.org/TR/css-syntax-3/#parsing).
//!
//! "The input to the parsing stage is a stream of tokens from the tokenization stage."
//!
//! Parsing never fails as a whole. Following the CSS Syntax error recovery rules, a
//! malformed declaration is skipped up to the next `;`, a rule whose
//! selector is invalid is dropped with its block, and each of these leaves a
//! [`ParseWarning`] behind.

use core::ops::Range;

use foldline_common::{Warning, WarningKind};
use serde::{Deserialize, Serialize};

use super::ast::{
    AtRuleFrame, AtRuleKind, Declaration, FrameId, Keyframe, Rule, RuleKind, Stylesheet,
};
use crate::selector::parse_selector_list;
use crate::tokenizer::{CSSToken, SpannedToken, source_text, tokenize};

static EOF: CSSToken = CSSToken::EOF;

/// One stylesheet handed to the engine, `@import`s already flattened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylesheetInput {
    /// Caller-chosen name of the file, echoed in the report.
    pub file_id: String,
    /// The stylesheet source.
    pub css_text: String,
}

impl StylesheetInput {
    /// Create an input.
    #[must_use]
    pub fn new(file_id: impl Into<String>, css_text: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            css_text: css_text.into(),
        }
    }
}

/// Something the parser skipped or dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// [`WarningKind::Parse`], or [`WarningKind::UnresolvedImport`] for a
    /// leftover `@import`.
    pub kind: WarningKind,
    /// The stylesheet the problem is in.
    pub file_id: String,
    /// The rule the problem is in, if that rule survived.
    pub source_index: Option<usize>,
    /// The offending source text.
    pub raw_text: String,
    /// The prelude of the rule the problem is in (its selector list or
    /// at-rule header), when the problem is inside a surviving rule.
    pub rule_text: Option<String>,
    /// What was wrong.
    pub message: String,
}

impl From<ParseWarning> for Warning {
    fn from(warning: ParseWarning) -> Self {
        let message = if warning.raw_text.is_empty() {
            format!("{}: {}", warning.file_id, warning.message)
        } else {
            format!(
                "{}: {} in '{}'",
                warning.file_id, warning.message, warning.raw_text
            )
        };
        let message = match &warning.rule_text {
            Some(rule_text) => format!("{message} of rule '{rule_text}'"),
            None => message,
        };
        Self {
            kind: warning.kind,
            rule_source_index: warning.source_index,
            message,
        }
    }
}

/// [§ 5.3.3 Parse a stylesheet](https://www.w3.org/TR/css-syntax-3/#parse-stylesheet)
///
/// Parse one stylesheet. Source indices start at 0.
#[must_use]
pub fn parse(css_text: &str, file_id: &str) -> (Stylesheet, Vec<ParseWarning>) {
    let mut counters = Counters::default();
    let mut warnings = Vec::new();
    let rules = CSSParser::new(css_text, file_id, &mut counters, &mut warnings).parse_stylesheet();
    (Stylesheet { rules }, warnings)
}

/// Parse stylesheets as if they were concatenated in the given order: one
/// source-index counter runs across all of them.
#[must_use]
pub fn parse_stylesheets(inputs: &[StylesheetInput]) -> (Stylesheet, Vec<ParseWarning>) {
    let mut counters = Counters::default();
    let mut warnings = Vec::new();
    let mut rules = Vec::new();
    for input in inputs {
        log::debug!(
            target: "foldline::parser",
            "parsing {} ({} bytes)",
            input.file_id,
            input.css_text.len()
        );
        rules.extend(
            CSSParser::new(&input.css_text, &input.file_id, &mut counters, &mut warnings)
                .parse_stylesheet(),
        );
    }
    (Stylesheet { rules }, warnings)
}

#[derive(Debug, Default)]
struct Counters {
    source_index: usize,
    frame: usize,
}

impl Counters {
    fn next_source_index(&mut self) -> usize {
        let index = self.source_index;
        self.source_index += 1;
        index
    }

    fn next_frame(&mut self) -> FrameId {
        let id = FrameId(self.frame);
        self.frame += 1;
        id
    }
}

/// Where a prelude stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    /// At a `{`, not consumed.
    Block,
    /// At a `;`, not consumed.
    Semicolon,
    /// At the `}` of the enclosing block, not consumed.
    CloseBrace,
    /// At the end of input.
    Eof,
}

struct CSSParser<'a> {
    source: &'a str,
    file_id: &'a str,
    tokens: Vec<SpannedToken>,
    position: usize,
    counters: &'a mut Counters,
    warnings: &'a mut Vec<ParseWarning>,
    /// Prelude of the rule whose block is being consumed.
    rule_text: Option<String>,
}

impl<'a> CSSParser<'a> {
    fn new(
        source: &'a str,
        file_id: &'a str,
        counters: &'a mut Counters,
        warnings: &'a mut Vec<ParseWarning>,
    ) -> Self {
        Self {
            source,
            file_id,
            tokens: tokenize(source),
            position: 0,
            counters,
            warnings,
            rule_text: None,
        }
    }

    fn parse_stylesheet(mut self) -> Vec<Rule> {
        // "Consume a list of rules from input, with the top-level flag set."
        self.consume_list_of_rules(true, &[])
    }

    /// [§ 5.4.1 Consume a list of rules](https://www.w3.org/TR/css-syntax-3/#consume-list-of-rules)
    ///
    /// Below the top level, stops in front of the `}` closing the block.
    fn consume_list_of_rules(&mut self, top_level: bool, chain: &[AtRuleFrame]) -> Vec<Rule> {
        // "Create an initially empty list of rules."
        let mut rules = Vec::new();

        loop {
            match self.peek() {
                // "<whitespace-token>"
                // "Do nothing."
                CSSToken::Whitespace => self.advance(),

                // "<EOF-token>"
                // "Return the list of rules."
                CSSToken::EOF => return rules,

                // "<CDO-token>" or "<CDC-token>"
                // "If the top-level flag is set, do nothing."
                CSSToken::CDO | CSSToken::CDC if top_level => self.advance(),

                CSSToken::RightBrace if !top_level => return rules,

                // "<at-keyword-token>"
                // "Reconsume the current input token. Consume an at-rule, and append
                // the returned value to the list of rules."
                CSSToken::AtKeyword(_) => self.consume_at_rule(top_level, chain, &mut rules),

                // "anything else"
                // "Reconsume the current input token. Consume a qualified rule. If
                // anything is returned, append it to the list of rules."
                _ => {
                    if let Some(rule) = self.consume_qualified_rule(top_level, chain) {
                        rules.push(rule);
                    }
                }
            }
        }
    }

    /// [§ 5.4.3 Consume a qualified rule](https://www.w3.org/TR/css-syntax-3/#consume-qualified-rule)
    fn consume_qualified_rule(&mut self, top_level: bool, chain: &[AtRuleFrame]) -> Option<Rule> {
        let start = self.position;
        let terminator = self.consume_prelude(false, top_level);
        let prelude = start..self.position;

        match terminator {
            Terminator::Block => {}
            // "<EOF-token>"
            // "This is a parse error. Return nothing."
            Terminator::Eof => {
                self.warn(None, prelude, "unexpected end of input in rule prelude");
                return None;
            }
            Terminator::CloseBrace | Terminator::Semicolon => {
                self.warn(None, prelude, "rule without a declaration block");
                return None;
            }
        }

        // "If just one of these selectors were invalid, the entire selector
        // list would be invalid." The rule is dropped, block and all.
        let selectors = match parse_selector_list(self.source, &self.tokens[prelude.clone()]) {
            Ok(selectors) => selectors,
            Err(error) => {
                self.warn(None, prelude, format!("invalid selector ({error}), rule dropped"));
                self.consume_component_value();
                return None;
            }
        };

        let source_index = self.counters.next_source_index();
        self.advance(); // {
        self.rule_text = Some(source_text(self.source, &self.tokens[prelude]));
        let declarations = self.consume_declaration_block(source_index);
        self.rule_text = None;

        Some(Rule {
            source_index,
            file_id: self.file_id.to_owned(),
            kind: RuleKind::Style,
            selectors,
            declarations,
            keyframes: Vec::new(),
            at_rule_chain: chain.to_vec(),
            body: None,
        })
    }

    /// [§ 5.4.2 Consume an at-rule](https://www.w3.org/TR/css-syntax-3/#consume-at-rule)
    fn consume_at_rule(&mut self, top_level: bool, chain: &[AtRuleFrame], rules: &mut Vec<Rule>) {
        let start = self.position;
        let name = match self.peek() {
            CSSToken::AtKeyword(name) => name.to_ascii_lowercase(),
            _ => return,
        };
        self.advance();

        let prelude_start = self.position;
        let terminator = self.consume_prelude(true, top_level);
        let condition_text = source_text(self.source, &self.tokens[prelude_start..self.position]);
        let kind = AtRuleKind::from_name(&name);

        match kind {
            // The encoding was settled before the text reached us.
            AtRuleKind::Charset => {
                self.finish_at_rule(terminator);
                return;
            }
            AtRuleKind::Import => {
                let prelude_end = self.position;
                self.finish_at_rule(terminator);
                self.warn_kind(
                    WarningKind::UnresolvedImport,
                    None,
                    start..prelude_end,
                    "@import must be flattened before extraction, rule dropped",
                );
                return;
            }
            _ => {}
        }

        match terminator {
            Terminator::Eof => {
                self.warn(
                    None,
                    start..self.position,
                    format!("unexpected end of input in @{name} prelude"),
                );
            }
            Terminator::CloseBrace => {
                self.warn(None, start..self.position, format!("@{name} without a block"));
            }
            Terminator::Semicolon => {
                self.advance();
                match kind {
                    AtRuleKind::Layer | AtRuleKind::Namespace | AtRuleKind::Other => {
                        let frame = self.frame(kind, name, condition_text);
                        let source_index = self.counters.next_source_index();
                        rules.push(self.at_rule(source_index, RuleKind::AtStatement, chain, frame));
                    }
                    _ => self.warn(
                        None,
                        start..self.position,
                        format!("@{name} requires a block, rule dropped"),
                    ),
                }
            }
            Terminator::Block => {
                let frame = self.frame(kind, name, condition_text);
                if kind.is_conditional_group() {
                    self.consume_group_rule(chain, frame, rules);
                } else {
                    rules.push(self.consume_at_rule_block(chain, frame));
                }
            }
        }
    }

    /// `@media`, `@supports` and friends: the block is a list of rules that
    /// inherit the frame.
    fn consume_group_rule(&mut self, chain: &[AtRuleFrame], frame: AtRuleFrame, rules: &mut Vec<Rule>) {
        let name = frame.name.clone();
        let mut inner_chain = chain.to_vec();
        inner_chain.push(frame);

        self.advance(); // {
        rules.extend(self.consume_list_of_rules(false, &inner_chain));
        if matches!(self.peek(), CSSToken::RightBrace) {
            self.advance();
        } else {
            let at = self.position;
            self.warn(None, at..at, format!("unclosed @{name} block"));
        }
    }

    /// Every at-rule with a block that is not a group rule becomes one rule.
    fn consume_at_rule_block(&mut self, chain: &[AtRuleFrame], frame: AtRuleFrame) -> Rule {
        let source_index = self.counters.next_source_index();
        let kind = frame.kind;
        self.rule_text = Some(frame.header());

        let rule = match kind {
            AtRuleKind::FontFace
            | AtRuleKind::Property
            | AtRuleKind::CounterStyle
            | AtRuleKind::FontPaletteValues => {
                self.advance(); // {
                let declarations = self.consume_declaration_block(source_index);
                let mut rule = self.at_rule(source_index, RuleKind::Descriptors, chain, frame);
                rule.declarations = declarations;
                rule
            }
            AtRuleKind::Keyframes => {
                self.advance(); // {
                let keyframes = self.consume_keyframe_list(source_index);
                let mut rule = self.at_rule(source_index, RuleKind::Keyframes, chain, frame);
                rule.keyframes = keyframes;
                rule
            }
            _ => {
                let body_start = self.position + 1;
                self.consume_component_value();
                let closed = self.position > body_start
                    && matches!(self.tokens[self.position - 1].token, CSSToken::RightBrace);
                let body_end = if closed { self.position - 1 } else { self.position };
                if !closed {
                    let at = self.position;
                    self.warn(Some(source_index), at..at, format!("unclosed @{} block", frame.name));
                }
                let body = source_text(
                    self.source,
                    self.tokens.get(body_start..body_end).unwrap_or_default(),
                );
                let mut rule = self.at_rule(source_index, RuleKind::AtBlock, chain, frame);
                rule.body = Some(body);
                rule
            }
        };
        self.rule_text = None;
        rule
    }

    /// [CSS Animations § 3](https://www.w3.org/TR/css-animations-1/#keyframes)
    ///
    /// `<keyframe-selector># { <declaration-list> }` blocks up to the `}`
    /// closing the `@keyframes`.
    fn consume_keyframe_list(&mut self, source_index: usize) -> Vec<Keyframe> {
        let mut keyframes = Vec::new();
        loop {
            match self.peek() {
                CSSToken::Whitespace | CSSToken::Semicolon => self.advance(),
                CSSToken::RightBrace => {
                    self.advance();
                    return keyframes;
                }
                CSSToken::EOF => {
                    let at = self.position;
                    self.warn(Some(source_index), at..at, "unclosed @keyframes block");
                    return keyframes;
                }
                _ => {
                    let start = self.position;
                    let terminator = self.consume_prelude(false, false);
                    let selector = source_text(self.source, &self.tokens[start..self.position]);
                    if terminator != Terminator::Block {
                        self.warn(Some(source_index), start..self.position, "keyframe without a block");
                        continue;
                    }
                    self.advance(); // {
                    let declarations = self.consume_declaration_block(source_index);
                    keyframes.push(Keyframe {
                        selector,
                        declarations,
                    });
                }
            }
        }
    }

    /// [§ 5.4.5 Consume a list of declarations](https://www.w3.org/TR/css-syntax-3/#consume-list-of-declarations)
    ///
    /// Called after the `{`; consumes the closing `}`.
    fn consume_declaration_block(&mut self, source_index: usize) -> Vec<Declaration> {
        let mut declarations = Vec::new();

        loop {
            match self.peek() {
                // "<whitespace-token>" or "<semicolon-token>"
                // "Do nothing."
                CSSToken::Whitespace | CSSToken::Semicolon => self.advance(),

                CSSToken::RightBrace => {
                    self.advance();
                    return declarations;
                }

                // "<EOF-token>"
                // "Return the list of declarations."
                CSSToken::EOF => {
                    let at = self.position;
                    self.warn(Some(source_index), at..at, "unclosed declaration block");
                    return declarations;
                }

                // "<at-keyword-token>"
                // Nested at-rules (CSS nesting) are not supported.
                CSSToken::AtKeyword(_) => {
                    let start = self.position;
                    self.advance();
                    let terminator = self.consume_prelude(true, false);
                    self.finish_at_rule(terminator);
                    self.warn(Some(source_index), start..self.position, "nested at-rule skipped");
                }

                // "<ident-token>"
                // "Consume a declaration. If anything was returned, append it to
                // the list of declarations."
                CSSToken::Ident(_) => {
                    if let Some(declaration) = self.consume_declaration(source_index) {
                        declarations.push(declaration);
                    }
                }

                // "anything else"
                // "This is a parse error. Reconsume the current input token. As long as
                // the next input token is anything other than a <semicolon-token> or
                // <EOF-token>, consume a component value and throw away the returned value."
                _ => {
                    let start = self.position;
                    let nested = self.skip_declaration();
                    let message = if nested {
                        "nested rule skipped"
                    } else {
                        "unexpected token in declaration list"
                    };
                    self.warn(Some(source_index), start..self.position, message);
                }
            }
        }
    }

    /// [§ 5.4.6 Consume a declaration](https://www.w3.org/TR/css-syntax-3/#consume-declaration)
    fn consume_declaration(&mut self, source_index: usize) -> Option<Declaration> {
        let start = self.position;

        // "Consume the next input token."
        let name = match self.peek() {
            CSSToken::Ident(name) => name.clone(),
            _ => return None,
        };
        self.advance();

        // "While the next input token is a <whitespace-token>, consume the next input token."
        self.skip_whitespace();

        // "If the next input token is anything other than a <colon-token>, this is a parse error.
        // Return nothing."
        if !matches!(self.peek(), CSSToken::Colon) {
            let nested = self.skip_declaration();
            let message = if nested {
                "nested rule skipped".to_owned()
            } else {
                format!("expected ':' after '{name}'")
            };
            self.warn(Some(source_index), start..self.position, message);
            return None;
        }
        self.advance(); // :

        // "As long as the next input token is anything other than an <EOF-token>, consume a
        // component value and append it to the declaration's value."
        let custom = name.starts_with("--");
        let value_start = self.position;
        loop {
            match self.peek() {
                CSSToken::Semicolon | CSSToken::RightBrace | CSSToken::EOF => break,
                // `a:hover { ... }` nested in a style block.
                CSSToken::LeftBrace if !custom => {
                    self.consume_component_value();
                    self.warn(Some(source_index), start..self.position, "nested rule skipped");
                    return None;
                }
                _ => self.consume_component_value(),
            }
        }

        let (value_end, important) = self.strip_important(value_start, self.position);
        let value = source_text(self.source, &self.tokens[value_start..value_end]);

        if value.is_empty() && !custom {
            self.warn(
                Some(source_index),
                start..self.position,
                format!("empty value for '{name}'"),
            );
            return None;
        }

        // Custom property names are case-sensitive.
        let property = if custom { name } else { name.to_ascii_lowercase() };

        Some(Declaration {
            property,
            value,
            important,
        })
    }

    /// [§ 6.4.2 Important declarations](https://www.w3.org/TR/css-cascade-4/#importance)
    ///
    /// "A declaration is important if it has a !important annotation, i.e.
    /// if the last two (non-whitespace, non-comment) tokens in its value are
    /// a <delim-token> with the value "!" followed by an <ident-token> with
    /// a value that is an ASCII case-insensitive match for "important"."
    ///
    /// Returns the end of the value without the annotation, and whether it
    /// was there.
    fn strip_important(&self, start: usize, end: usize) -> (usize, bool) {
        let significant = |i: &usize| !self.tokens[*i].token.is_whitespace();

        // STEP 1: Find the last token, skipping trailing whitespace.
        let mut indices = (start..end).rev().filter(significant);

        // STEP 2: Check for <ident-token> "important".
        if !indices
            .next()
            .is_some_and(|i| self.tokens[i].token.is_ident("important"))
        {
            return (end, false);
        }

        // STEP 3: Check for <delim-token> "!" before it.
        match indices.next() {
            Some(i) if self.tokens[i].token == CSSToken::Delim('!') => (i, true),
            _ => (end, false),
        }
    }

    /// Consume component values up to a `{`, the end of the input, the `}`
    /// closing an enclosing block (below the top level) or, for at-rules, a
    /// `;`. The terminating token is left in place.
    fn consume_prelude(&mut self, stop_at_semicolon: bool, top_level: bool) -> Terminator {
        loop {
            match self.peek() {
                CSSToken::LeftBrace => return Terminator::Block,
                CSSToken::EOF => return Terminator::Eof,
                CSSToken::Semicolon if stop_at_semicolon => return Terminator::Semicolon,
                CSSToken::RightBrace if !top_level => return Terminator::CloseBrace,
                _ => self.consume_component_value(),
            }
        }
    }

    /// Consume what is left of an at-rule after its prelude.
    fn finish_at_rule(&mut self, terminator: Terminator) {
        match terminator {
            Terminator::Block => self.consume_component_value(),
            Terminator::Semicolon => self.advance(),
            Terminator::CloseBrace | Terminator::Eof => {}
        }
    }

    /// Skip the rest of a declaration. Stops in front of `;` or `}`, or right
    /// after a `{}` block, in which case it returns `true`.
    fn skip_declaration(&mut self) -> bool {
        loop {
            match self.peek() {
                CSSToken::Semicolon | CSSToken::RightBrace | CSSToken::EOF => return false,
                CSSToken::LeftBrace => {
                    self.consume_component_value();
                    return true;
                }
                _ => self.consume_component_value(),
            }
        }
    }

    /// [§ 5.4.8 Consume a component value](https://www.w3.org/TR/css-syntax-3/#consume-component-value)
    ///
    /// A block or function is consumed up to its matching closing token.
    fn consume_component_value(&mut self) {
        let Some(closing) = self.peek().closing() else {
            self.advance();
            return;
        };
        self.advance();

        loop {
            let token = self.peek();
            if *token == closing {
                self.advance();
                return;
            }
            if token.is_eof() {
                return;
            }
            self.consume_component_value();
        }
    }

    fn frame(&mut self, kind: AtRuleKind, name: String, condition_text: String) -> AtRuleFrame {
        AtRuleFrame {
            id: self.counters.next_frame(),
            kind,
            name,
            condition_text,
        }
    }

    fn at_rule(
        &self,
        source_index: usize,
        kind: RuleKind,
        chain: &[AtRuleFrame],
        frame: AtRuleFrame,
    ) -> Rule {
        let mut at_rule_chain = chain.to_vec();
        at_rule_chain.push(frame);
        Rule {
            source_index,
            file_id: self.file_id.to_owned(),
            kind,
            selectors: Vec::new(),
            declarations: Vec::new(),
            keyframes: Vec::new(),
            at_rule_chain,
            body: None,
        }
    }

    fn warn(&mut self, source_index: Option<usize>, range: Range<usize>, message: impl Into<String>) {
        self.warn_kind(WarningKind::Parse, source_index, range, message);
    }

    fn warn_kind(
        &mut self,
        kind: WarningKind,
        source_index: Option<usize>,
        range: Range<usize>,
        message: impl Into<String>,
    ) {
        let raw_text = source_text(self.source, self.tokens.get(range).unwrap_or_default());
        let message = message.into();
        log::debug!(target: "foldline::parser", "{}: {message}", self.file_id);
        self.warnings.push(ParseWarning {
            kind,
            file_id: self.file_id.to_owned(),
            source_index,
            raw_text,
            rule_text: source_index.and(self.rule_text.clone()),
            message,
        });
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn peek(&self) -> &CSSToken {
        self.tokens.get(self.position).map_or(&EOF, |t| &t.token)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_important_is_stripped_from_value() {
        let (sheet, warnings) = parse(".a { color: red ! IMPORTANT; margin: 0 }", "a.css");
        assert!(warnings.is_empty());
        let declarations = &sheet.rules[0].declarations;
        assert_eq!(declarations[0], Declaration::new("color", "red", true));
        assert_eq!(declarations[1], Declaration::new("margin", "0", false));
    }

    #[test]
    fn test_nested_rule_does_not_swallow_following_declaration() {
        let (sheet, warnings) = parse(".a { a:hover { color: red } color: blue }", "a.css");
        assert_eq!(sheet.rules[0].declarations, vec![Declaration::new("color", "blue", false)]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source_index, Some(0));
    }

    #[test]
    fn test_eof_inside_block_keeps_rule() {
        let (sheet, warnings) = parse(".a { color: red", "a.css");
        assert_eq!(sheet.len(), 1);
        assert_eq!(warnings.len(), 1);
    }
}
