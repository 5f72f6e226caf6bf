//! CSS tokenizer, rule parser, selector matching, media evaluation and
//! serialization for the foldline engine.
//!
//! # Scope
//!
//! This crate implements:
//! - **CSS Tokenizer** ([§ 4 Tokenization](https://www.w3.org/TR/css-syntax-3/#tokenization))
//!   - All token types, with byte spans into the source
//!   - Comment handling
//!   - Escape sequences
//!
//! - **CSS Parser** ([§ 5 Parsing](https://www.w3.org/TR/css-syntax-3/#parsing))
//!   - Style rules, flattened with their chain of wrapping at-rules
//!   - Descriptor at-rules (`@font-face`, `@property`, ...), `@keyframes`,
//!     block-less statements and raw at-rule blocks
//!   - Error recovery that skips bad declarations and drops bad rules
//!
//! - **CSS Selectors** ([Selectors Level 4](https://www.w3.org/TR/selectors-4/))
//!   - Type, class, ID, universal and attribute selectors
//!   - All four combinators
//!   - Structural, logical and attribute-derived pseudo-classes
//!   - Three-valued matching against a [`foldline_dom::DomSnapshot`]
//!   - Specificity calculation
//!
//! - **Media Queries** ([Media Queries Level 4](https://www.w3.org/TR/mediaqueries-4/))
//!   - Static evaluation against a viewport, with unknowns
//!
//! - **Serialization** of rule lists back to compact CSS text
//!
//! # Not Implemented
//!
//! - CSS nesting: nested rules inside style blocks are skipped
//! - `@import` resolution: imports must be flattened by the caller

/// Static `@media` / `@supports` evaluation per [Media Queries Level 4](https://www.w3.org/TR/mediaqueries-4/).
pub mod media;
/// CSS parser per [§ 5 Parsing](https://www.w3.org/TR/css-syntax-3/#parsing).
pub mod parser;
/// CSS selector parsing and matching per [Selectors Level 4](https://www.w3.org/TR/selectors-4/).
pub mod selector;
/// Rendering rules back to CSS text.
pub mod serialize;
/// CSS tokenizer per [§ 4 Tokenization](https://www.w3.org/TR/css-syntax-3/#tokenization).
pub mod tokenizer;

pub use media::{Evaluation, MediaContext, MediaEvaluation, evaluate_supports, required_media_types};
pub use parser::{
    AtRuleFrame, AtRuleKind, Declaration, FrameId, Keyframe, ParseWarning, Rule, RuleKind,
    Stylesheet, StylesheetInput, parse, parse_stylesheets,
};
pub use selector::{MatchResult, Selector, Specificity, match_selector, matches};
pub use serialize::{serialize, serialize_rule, serialize_rules};
pub use tokenizer::{CSSToken, CSSTokenizer};
