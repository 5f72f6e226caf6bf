//! CSS Selector parsing and matching
//!
//! This module implements selector parsing and matching per
//! [Selectors Level 4](https://www.w3.org/TR/selectors-4/) against a
//! [`DomSnapshot`](foldline_dom::DomSnapshot).
//!
//! Matching is three-valued: anything that depends on user interaction or
//! on a pseudo-class we do not understand evaluates to
//! [`MatchResult::Maybe`], which callers treat as a match.

/// Right-to-left matching against the snapshot.
pub mod matcher;
/// Token-based selector parser.
pub mod parser;
/// [§ 17 Calculating Specificity](https://www.w3.org/TR/selectors-4/#specificity-rules)
pub mod specificity;

pub use matcher::{MatchResult, match_selector, matches};
pub use parser::{SelectorError, parse_selector_list, parse_selector_list_str};
pub use specificity::Specificity;

/// One selector of a selector list, e.g. `nav > a.active` in
/// `nav > a.active, footer a`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    /// The selector as written, comments dropped and whitespace collapsed.
    pub text: String,
    /// The parsed selector.
    pub complex: ComplexSelector,
    /// Specificity, reported for diagnostics only.
    pub specificity: Specificity,
}

impl Selector {
    /// Pseudo-elements on the subject, e.g. `before` for `p::before`.
    #[must_use]
    pub fn pseudo_elements(&self) -> &[String] {
        &self.complex.subject.pseudo_elements
    }

    /// Names of pseudo-classes anywhere in the selector that could not be
    /// evaluated, in order of appearance.
    #[must_use]
    pub fn unsupported_pseudo_classes(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.complex.collect_unsupported(&mut names);
        names
    }
}

/// [§ 4.2 Compound selectors](https://www.w3.org/TR/selectors-4/#compound)
///
/// "A compound selector is a sequence of simple selectors that are not
/// separated by a combinator, and represents a set of simultaneous
/// conditions on a single element."
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompoundSelector {
    /// [§ 5.1 Type selector](https://www.w3.org/TR/selectors-4/#type-selectors),
    /// lowercased. `None` for the universal selector or when omitted.
    pub tag: Option<String>,
    /// [§ 6.7 ID selectors](https://www.w3.org/TR/selectors-4/#id-selectors)
    pub ids: Vec<String>,
    /// [§ 6.6 Class selectors](https://www.w3.org/TR/selectors-4/#class-html)
    pub classes: Vec<String>,
    /// [§ 6 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
    pub attributes: Vec<AttributeSelector>,
    /// Pseudo-classes, in source order.
    pub pseudo_classes: Vec<PseudoClass>,
    /// Pseudo-elements, lowercased, without colons. Functional ones keep
    /// their argument text, e.g. `part(label)`.
    pub pseudo_elements: Vec<String>,
}

/// [§ 6.1 Attribute presence and value selectors](https://www.w3.org/TR/selectors-4/#attribute-representation)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// Attribute name, lowercased. Namespace prefixes are dropped.
    pub name: String,
    /// How the value is compared.
    pub operator: AttrOperator,
    /// The value to compare against; empty for [`AttrOperator::Exists`].
    pub value: String,
    /// [§ 6.3 Case-sensitivity](https://www.w3.org/TR/selectors-4/#attribute-case)
    /// Set by the `i` flag.
    pub case_insensitive: bool,
}

/// Attribute selector operators per [§ 6.1](https://www.w3.org/TR/selectors-4/#attribute-representation)
/// and [§ 6.2](https://www.w3.org/TR/selectors-4/#attribute-substrings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    /// `[att]`: "Represents an element with the att attribute, whatever the
    /// value of the attribute."
    Exists,
    /// `[att=val]`: "whose value is exactly 'val'."
    Equals,
    /// `[att~=val]`: "whose value is a whitespace-separated list of words,
    /// one of which is exactly 'val'."
    Includes,
    /// `[att|=val]`: "its value either being exactly 'val' or beginning with
    /// 'val' immediately followed by '-'."
    DashMatch,
    /// `[att^=val]`: "whose value begins with the prefix 'val'."
    PrefixMatch,
    /// `[att$=val]`: "whose value ends with the suffix 'val'."
    SuffixMatch,
    /// `[att*=val]`: "whose value contains at least one instance of the
    /// substring 'val'."
    SubstringMatch,
}

/// `An+B` from [§ 6 The An+B microsyntax](https://www.w3.org/TR/css-syntax-3/#anb-microsyntax).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nth {
    /// Step.
    pub a: i32,
    /// Offset.
    pub b: i32,
}

impl Nth {
    /// Whether the 1-based `position` is selected by `An+B` for some
    /// non-negative integer n.
    #[must_use]
    pub fn matches(self, position: usize) -> bool {
        let Ok(position) = i64::try_from(position) else {
            return false;
        };
        let (a, b) = (i64::from(self.a), i64::from(self.b));
        if a == 0 {
            return position == b;
        }
        let diff = position - b;
        diff % a == 0 && diff / a >= 0
    }
}

/// Pseudo-classes per [§ 4 Pseudo-classes](https://www.w3.org/TR/selectors-4/#pseudo-classes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    /// [§ 14.1 :root](https://www.w3.org/TR/selectors-4/#the-root-pseudo)
    Root,
    /// [§ 9.2 :scope](https://www.w3.org/TR/selectors-4/#the-scope-pseudo).
    /// Outside a scoped context this is the same as `:root`.
    Scope,
    /// [§ 14.3.1 :first-child](https://www.w3.org/TR/selectors-4/#the-first-child-pseudo)
    FirstChild,
    /// [§ 14.3.2 :last-child](https://www.w3.org/TR/selectors-4/#the-last-child-pseudo)
    LastChild,
    /// [§ 14.3.3 :only-child](https://www.w3.org/TR/selectors-4/#the-only-child-pseudo)
    OnlyChild,
    /// [§ 14.4.1 :first-of-type](https://www.w3.org/TR/selectors-4/#the-first-of-type-pseudo)
    FirstOfType,
    /// [§ 14.4.2 :last-of-type](https://www.w3.org/TR/selectors-4/#the-last-of-type-pseudo)
    LastOfType,
    /// [§ 14.4.3 :only-of-type](https://www.w3.org/TR/selectors-4/#the-only-of-type-pseudo)
    OnlyOfType,
    /// [§ 14.3.5 :nth-child()](https://www.w3.org/TR/selectors-4/#the-nth-child-pseudo),
    /// with the optional `of S` filter.
    NthChild(Nth, Option<Vec<ComplexSelector>>),
    /// [§ 14.3.6 :nth-last-child()](https://www.w3.org/TR/selectors-4/#the-nth-last-child-pseudo)
    NthLastChild(Nth, Option<Vec<ComplexSelector>>),
    /// [§ 14.4.4 :nth-of-type()](https://www.w3.org/TR/selectors-4/#the-nth-of-type-pseudo)
    NthOfType(Nth),
    /// [§ 14.4.5 :nth-last-of-type()](https://www.w3.org/TR/selectors-4/#the-nth-last-of-type-pseudo)
    NthLastOfType(Nth),
    /// [§ 14.2 :empty](https://www.w3.org/TR/selectors-4/#the-empty-pseudo)
    Empty,
    /// [§ 8.2 :link](https://www.w3.org/TR/selectors-4/#the-link-pseudo).
    /// A static snapshot has no history, so every link is unvisited.
    Link,
    /// [§ 8.1 :any-link](https://www.w3.org/TR/selectors-4/#the-any-link-pseudo)
    AnyLink,
    /// [§ 13.3.2 :checked](https://www.w3.org/TR/selectors-4/#checked)
    Checked,
    /// [§ 13.1.2 :disabled](https://www.w3.org/TR/selectors-4/#disabled-pseudo)
    Disabled,
    /// [§ 13.1.1 :enabled](https://www.w3.org/TR/selectors-4/#enabled-pseudo)
    Enabled,
    /// [§ 13.4.4 :required](https://www.w3.org/TR/selectors-4/#required-pseudo)
    Required,
    /// [§ 13.4.4 :optional](https://www.w3.org/TR/selectors-4/#optional-pseudo)
    Optional,
    /// [§ 13.2 :read-only](https://www.w3.org/TR/selectors-4/#read-only-pseudo)
    ReadOnly,
    /// [§ 13.2 :read-write](https://www.w3.org/TR/selectors-4/#read-write-pseudo)
    ReadWrite,
    /// [§ 7.2 :lang()](https://www.w3.org/TR/selectors-4/#the-lang-pseudo), lowercased ranges.
    Lang(Vec<String>),
    /// [§ 7.1 :dir()](https://www.w3.org/TR/selectors-4/#the-dir-pseudo), lowercased.
    Dir(String),
    /// [§ 4.3 :not()](https://www.w3.org/TR/selectors-4/#negation)
    Not(Vec<ComplexSelector>),
    /// [§ 4.2 :is()](https://www.w3.org/TR/selectors-4/#matches), also
    /// `:matches()`, `:-webkit-any()` and `:-moz-any()`.
    Is(Vec<ComplexSelector>),
    /// [§ 4.4 :where()](https://www.w3.org/TR/selectors-4/#zero-matches)
    Where(Vec<ComplexSelector>),
    /// [§ 4.5 :has()](https://www.w3.org/TR/selectors-4/#relational)
    Has(Vec<RelativeSelector>),
    /// A user-action or validity state (`:hover`, `:focus`, `:invalid`, ...)
    /// that a static snapshot cannot decide.
    Interactive(String),
    /// A pseudo-class this engine does not recognise.
    Unsupported(String),
}

/// [§ 16 Combinators](https://www.w3.org/TR/selectors-4/#combinators)
///
/// "A combinator is punctuation that represents a particular kind of
/// relationship between the selectors on either side."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// [§ 16.1 Descendant combinator](https://www.w3.org/TR/selectors-4/#descendant-combinators)
    /// "A selector of the form 'A B' represents an element B that is an
    /// arbitrary descendant of some ancestor element A."
    Descendant,

    /// [§ 16.2 Child combinator](https://www.w3.org/TR/selectors-4/#child-combinators)
    /// "A selector of the form 'A > B' represents an element B that is a
    /// direct child of element A."
    Child,

    /// [§ 16.3 Next-sibling combinator](https://www.w3.org/TR/selectors-4/#adjacent-sibling-combinators)
    /// "A selector of the form 'A + B' represents an element B that
    /// immediately follows element A, where A and B share the same parent."
    NextSibling,

    /// [§ 16.4 Subsequent-sibling combinator](https://www.w3.org/TR/selectors-4/#general-sibling-combinators)
    /// "A selector of the form 'A ~ B' represents an element B that
    /// follows element A (not necessarily immediately), where A and B share the
    /// same parent."
    SubsequentSibling,
}

/// [§ 4.3 Complex selectors](https://www.w3.org/TR/selectors-4/#complex)
///
/// "A complex selector is a chain of one or more compound selectors separated
/// by combinators."
///
/// Example: `div.container > ul.nav li a.active` is stored as
/// ```text
/// subject: [a.active]
/// combinators: [(Descendant, li), (Descendant, ul.nav), (Child, div.container)]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComplexSelector {
    /// The rightmost compound selector (the subject of the selector).
    pub subject: CompoundSelector,

    /// Chain of (combinator, compound) pairs going left from the subject.
    /// Empty if the selector is a single compound.
    pub combinators: Vec<(Combinator, CompoundSelector)>,
}

impl ComplexSelector {
    /// Compound selectors from the subject outward.
    pub fn compounds(&self) -> impl Iterator<Item = &CompoundSelector> {
        std::iter::once(&self.subject).chain(self.combinators.iter().map(|(_, c)| c))
    }

    fn collect_unsupported<'a>(&'a self, names: &mut Vec<&'a str>) {
        for compound in self.compounds() {
            for pseudo in &compound.pseudo_classes {
                match pseudo {
                    PseudoClass::Unsupported(name) => names.push(name),
                    PseudoClass::Not(list) | PseudoClass::Is(list) | PseudoClass::Where(list) => {
                        list.iter().for_each(|c| c.collect_unsupported(names));
                    }
                    PseudoClass::NthChild(_, Some(list))
                    | PseudoClass::NthLastChild(_, Some(list)) => {
                        list.iter().for_each(|c| c.collect_unsupported(names));
                    }
                    PseudoClass::Has(list) => {
                        list.iter().for_each(|r| r.selector.collect_unsupported(names));
                    }
                    _ => {}
                }
            }
        }
    }
}

/// [§ 4.6 Relative selectors](https://www.w3.org/TR/selectors-4/#relative)
///
/// "Certain contexts may accept relative selectors, which are a shorthand
/// for selectors that represent elements relative to one or more anchor
/// elements." Used by `:has()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeSelector {
    /// How the leftmost compound relates to the anchor; descendant when the
    /// selector starts without a combinator.
    pub combinator: Combinator,
    /// The selector, matched as usual from its subject.
    pub selector: ComplexSelector,
}
