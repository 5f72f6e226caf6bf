//! [§ 4.1 Selector Matching](https://www.w3.org/TR/selectors-4/#match-a-selector-against-an-element)
//!
//! Matching proceeds right to left: the subject compound is tested against
//! the candidate element first, then each combinator walks to the related
//! elements (ancestors, parent, preceding siblings). Descendant and
//! subsequent-sibling steps backtrack over every candidate, so a selector
//! like `.a > .b .c` is not fooled by the nearest `.b` ancestor lacking a
//! `.a` parent.

use std::borrow::Cow;

use foldline_dom::{DomSnapshot, ElementSnapshot, NodeIndex};

use super::{
    AttrOperator, AttributeSelector, Combinator, ComplexSelector, CompoundSelector, Nth,
    PseudoClass, RelativeSelector, Selector,
};

/// Outcome of matching against a static snapshot.
///
/// Ordered `No < Maybe < Yes`, so conjunction is `min` and disjunction is
/// `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchResult {
    /// The selector cannot match.
    No,
    /// The selector may match depending on state the snapshot cannot show.
    Maybe,
    /// The selector matches.
    Yes,
}

impl MatchResult {
    /// `Yes` for `true`, `No` for `false`.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::Yes } else { Self::No }
    }

    /// Both hold.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        self.min(other)
    }

    /// Either holds.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        self.max(other)
    }

    /// Negation. `Maybe` stays `Maybe`.
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Self::No => Self::Yes,
            Self::Maybe => Self::Maybe,
            Self::Yes => Self::No,
        }
    }

    /// Whether the selector could apply: `Yes` or `Maybe`.
    #[must_use]
    pub const fn is_match(self) -> bool {
        !matches!(self, Self::No)
    }
}

/// Whether `selector` could apply to the element at `element`.
///
/// Interactive and unrecognised pseudo-classes count as matching, so the
/// answer errs toward inclusion.
#[must_use]
pub fn matches(selector: &Selector, element: NodeIndex, snapshot: &DomSnapshot) -> bool {
    match_selector(selector, element, snapshot).is_match()
}

/// Three-valued match of `selector` against the element at `element`.
#[must_use]
pub fn match_selector(selector: &Selector, element: NodeIndex, snapshot: &DomSnapshot) -> MatchResult {
    match_complex(&selector.complex, element, snapshot)
}

fn match_complex(complex: &ComplexSelector, element: NodeIndex, snapshot: &DomSnapshot) -> MatchResult {
    let subject = match_compound(&complex.subject, element, snapshot);
    if subject == MatchResult::No {
        return MatchResult::No;
    }
    subject.and(match_chain(&complex.combinators, element, snapshot, None))
}

/// [§ 16 Combinators](https://www.w3.org/TR/selectors-4/#combinators)
///
/// Match the remaining (combinator, compound) pairs starting from
/// `current`, which has already matched the compound to its right.
/// `anchor` constrains the leftmost element of a `:has()` argument.
fn match_chain(
    chain: &[(Combinator, CompoundSelector)],
    current: NodeIndex,
    snapshot: &DomSnapshot,
    anchor: Option<(Combinator, NodeIndex)>,
) -> MatchResult {
    let Some(((combinator, compound), rest)) = chain.split_first() else {
        return match anchor {
            None => MatchResult::Yes,
            Some((combinator, anchor)) => {
                MatchResult::from_bool(is_related(combinator, anchor, current, snapshot))
            }
        };
    };

    let mut best = MatchResult::No;
    for candidate in related_elements(*combinator, current, snapshot) {
        let here = match_compound(compound, candidate, snapshot);
        if here == MatchResult::No {
            continue;
        }
        best = best.or(here.and(match_chain(rest, candidate, snapshot, anchor)));
        if best == MatchResult::Yes {
            break;
        }
    }
    best
}

/// Elements standing in `combinator` relation to the left of `element`.
fn related_elements(
    combinator: Combinator,
    element: NodeIndex,
    snapshot: &DomSnapshot,
) -> Vec<NodeIndex> {
    match combinator {
        // "an arbitrary descendant of some ancestor element A"
        Combinator::Descendant => snapshot.ancestors(element).collect(),
        // "a direct child of element A"
        Combinator::Child => snapshot.parent(element).into_iter().collect(),
        // "immediately follows element A"
        Combinator::NextSibling => snapshot.preceding_siblings(element).take(1).collect(),
        // "follows element A (not necessarily immediately)"
        Combinator::SubsequentSibling => snapshot.preceding_siblings(element).collect(),
    }
}

/// Whether `element` stands in `combinator` relation to `anchor`, i.e.
/// whether `anchor <combinator> element` holds.
fn is_related(
    combinator: Combinator,
    anchor: NodeIndex,
    element: NodeIndex,
    snapshot: &DomSnapshot,
) -> bool {
    related_elements(combinator, element, snapshot).contains(&anchor)
}

fn match_compound(compound: &CompoundSelector, index: NodeIndex, snapshot: &DomSnapshot) -> MatchResult {
    let element = snapshot.element(index);

    // [§ 5.1 Type selector](https://www.w3.org/TR/selectors-4/#type-selectors)
    if compound.tag.as_deref().is_some_and(|tag| !element.is(tag)) {
        return MatchResult::No;
    }

    // [§ 6.7 ID selectors](https://www.w3.org/TR/selectors-4/#id-selectors)
    if !compound.ids.iter().all(|id| element.html_id() == Some(id.as_str())) {
        return MatchResult::No;
    }

    // [§ 6.6 Class selectors](https://www.w3.org/TR/selectors-4/#class-html)
    if !compound.classes.iter().all(|class| element.has_class(class)) {
        return MatchResult::No;
    }

    if !compound
        .attributes
        .iter()
        .all(|attribute| attribute_matches(attribute, element))
    {
        return MatchResult::No;
    }

    // Pseudo-elements never change whether the host element matches.
    let mut result = MatchResult::Yes;
    for pseudo in &compound.pseudo_classes {
        result = result.and(match_pseudo_class(pseudo, index, element, snapshot));
        if result == MatchResult::No {
            break;
        }
    }
    result
}

/// The value `[name]` selectors see. `class` falls back to the class list
/// when the snapshot carries classes but no `class` attribute.
fn attribute_value<'a>(element: &'a ElementSnapshot, name: &str) -> Option<Cow<'a, str>> {
    match element.attribute(name) {
        Some(value) => Some(Cow::Borrowed(value)),
        None if name == "class" && !element.classes.is_empty() => {
            Some(Cow::Owned(element.classes.join(" ")))
        }
        None => None,
    }
}

/// [§ 6 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
fn attribute_matches(selector: &AttributeSelector, element: &ElementSnapshot) -> bool {
    let Some(actual) = attribute_value(element, &selector.name) else {
        return false;
    };
    if selector.operator == AttrOperator::Exists {
        return true;
    }

    let (actual, expected) = if selector.case_insensitive {
        (
            Cow::Owned(actual.to_lowercase()),
            Cow::Owned(selector.value.to_lowercase()),
        )
    } else {
        (actual, Cow::Borrowed(selector.value.as_str()))
    };
    let (actual, expected) = (actual.as_ref(), expected.as_ref());

    match selector.operator {
        AttrOperator::Exists => true,
        AttrOperator::Equals => actual == expected,
        // "If 'val' contains whitespace, it will never represent anything
        // (since the words are separated by spaces). Also if 'val' is the
        // empty string, it will never represent anything."
        AttrOperator::Includes => {
            !expected.is_empty()
                && !expected.contains(char::is_whitespace)
                && actual.split_ascii_whitespace().any(|word| word == expected)
        }
        AttrOperator::DashMatch => {
            actual == expected
                || actual
                    .strip_prefix(expected)
                    .is_some_and(|rest| rest.starts_with('-'))
        }
        // "If 'val' is the empty string then the selector does not represent
        // anything."
        AttrOperator::PrefixMatch => !expected.is_empty() && actual.starts_with(expected),
        AttrOperator::SuffixMatch => !expected.is_empty() && actual.ends_with(expected),
        AttrOperator::SubstringMatch => !expected.is_empty() && actual.contains(expected),
    }
}

const FORM_CONTROLS: &[&str] = &[
    "button", "input", "select", "textarea", "optgroup", "option", "fieldset",
];

fn is_any_of(element: &ElementSnapshot, tags: &[&str]) -> bool {
    tags.iter().any(|tag| element.is(tag))
}

/// [§ 4 Pseudo-classes](https://www.w3.org/TR/selectors-4/#pseudo-classes)
fn match_pseudo_class(
    pseudo: &PseudoClass,
    index: NodeIndex,
    element: &ElementSnapshot,
    snapshot: &DomSnapshot,
) -> MatchResult {
    use MatchResult::{Maybe, No, Yes};

    let siblings = snapshot.siblings(index);
    let position = snapshot.sibling_position(index);
    let same_type = |other: &NodeIndex| snapshot.element(*other).tag == element.tag;

    match pseudo {
        // "The :root pseudo-class represents an element that is the root of
        // the document."
        PseudoClass::Root | PseudoClass::Scope => {
            MatchResult::from_bool(snapshot.document_element() == Some(index))
        }

        PseudoClass::FirstChild => MatchResult::from_bool(position == 0),
        PseudoClass::LastChild => MatchResult::from_bool(position + 1 == siblings.len()),
        PseudoClass::OnlyChild => MatchResult::from_bool(siblings.len() == 1),

        PseudoClass::FirstOfType => {
            MatchResult::from_bool(!siblings[..position].iter().any(same_type))
        }
        PseudoClass::LastOfType => {
            MatchResult::from_bool(!siblings[position + 1..].iter().any(same_type))
        }
        PseudoClass::OnlyOfType => MatchResult::from_bool(
            !siblings[..position].iter().any(same_type)
                && !siblings[position + 1..].iter().any(same_type),
        ),

        PseudoClass::NthChild(nth, of) => {
            nth_among(*nth, index, &siblings[..position], of.as_deref(), snapshot)
        }
        PseudoClass::NthLastChild(nth, of) => {
            nth_among(*nth, index, &siblings[position + 1..], of.as_deref(), snapshot)
        }
        PseudoClass::NthOfType(nth) => MatchResult::from_bool(
            nth.matches(siblings[..position].iter().filter(|s| same_type(*s)).count() + 1),
        ),
        PseudoClass::NthLastOfType(nth) => MatchResult::from_bool(
            nth.matches(siblings[position + 1..].iter().filter(|s| same_type(*s)).count() + 1),
        ),

        // "The :empty pseudo-class represents an element that has no children
        // except, optionally, document white space characters."
        PseudoClass::Empty => {
            MatchResult::from_bool(snapshot.children(index).is_empty() && !element.has_text)
        }

        // "The :any-link pseudo-class represents an element that acts as the
        // source anchor of a hyperlink."
        PseudoClass::Link | PseudoClass::AnyLink => MatchResult::from_bool(
            is_any_of(element, &["a", "area", "link"]) && element.has_attribute("href"),
        ),

        PseudoClass::Checked => MatchResult::from_bool(
            (is_any_of(element, &["input"]) && element.has_attribute("checked"))
                || (element.is("option") && element.has_attribute("selected")),
        ),

        PseudoClass::Disabled => MatchResult::from_bool(
            is_any_of(element, FORM_CONTROLS) && element.has_attribute("disabled"),
        ),
        PseudoClass::Enabled => MatchResult::from_bool(
            is_any_of(element, FORM_CONTROLS) && !element.has_attribute("disabled"),
        ),

        PseudoClass::Required | PseudoClass::Optional => {
            if !is_any_of(element, &["input", "select", "textarea"]) {
                return No;
            }
            let required = element.has_attribute("required");
            MatchResult::from_bool(required == matches!(pseudo, PseudoClass::Required))
        }

        PseudoClass::ReadWrite => MatchResult::from_bool(is_read_write(element)),
        PseudoClass::ReadOnly => MatchResult::from_bool(!is_read_write(element)),

        // [§ 7.2](https://www.w3.org/TR/selectors-4/#the-lang-pseudo)
        // "The :lang() pseudo-class represents an element that is in one of
        // the languages listed in its argument."
        PseudoClass::Lang(ranges) => {
            let Some(lang) = inherited_attribute(index, snapshot, "lang") else {
                return No;
            };
            let lang = lang.to_ascii_lowercase();
            MatchResult::from_bool(ranges.iter().any(|range| {
                (range == "*" && !lang.is_empty())
                    || lang == *range
                    || lang
                        .strip_prefix(range.as_str())
                        .is_some_and(|rest| rest.starts_with('-'))
            }))
        }

        // [§ 7.1](https://www.w3.org/TR/selectors-4/#the-dir-pseudo)
        PseudoClass::Dir(direction) => {
            match inherited_attribute(index, snapshot, "dir").map(str::to_ascii_lowercase) {
                Some(dir) if dir == "auto" => Maybe,
                Some(dir) if dir == "ltr" || dir == "rtl" => MatchResult::from_bool(dir == *direction),
                _ => MatchResult::from_bool(direction == "ltr"),
            }
        }

        PseudoClass::Not(list) => any_matches(list, index, snapshot).negate(),
        PseudoClass::Is(list) | PseudoClass::Where(list) => any_matches(list, index, snapshot),
        PseudoClass::Has(list) => {
            let mut best = No;
            for relative in list {
                best = best.or(match_relative(relative, index, snapshot));
                if best == Yes {
                    break;
                }
            }
            best
        }

        PseudoClass::Interactive(_) | PseudoClass::Unsupported(_) => Maybe,
    }
}

fn any_matches(list: &[ComplexSelector], index: NodeIndex, snapshot: &DomSnapshot) -> MatchResult {
    let mut best = MatchResult::No;
    for complex in list {
        best = best.or(match_complex(complex, index, snapshot));
        if best == MatchResult::Yes {
            break;
        }
    }
    best
}

/// `:nth-child(An+B [of S])` over the siblings on one side of the element.
fn nth_among(
    nth: Nth,
    index: NodeIndex,
    before: &[NodeIndex],
    of: Option<&[ComplexSelector]>,
    snapshot: &DomSnapshot,
) -> MatchResult {
    let Some(filter) = of else {
        return MatchResult::from_bool(nth.matches(before.len() + 1));
    };

    let own = any_matches(filter, index, snapshot);
    if own == MatchResult::No {
        return MatchResult::No;
    }
    let mut uncertain = own == MatchResult::Maybe;
    let mut count = 0;
    for &sibling in before {
        match any_matches(filter, sibling, snapshot) {
            MatchResult::Yes => count += 1,
            MatchResult::Maybe => uncertain = true,
            MatchResult::No => {}
        }
    }
    if uncertain {
        MatchResult::Maybe
    } else {
        MatchResult::from_bool(nth.matches(count + 1))
    }
}

/// [§ 4.5 :has()](https://www.w3.org/TR/selectors-4/#relational)
///
/// "The relational pseudo-class, :has(), ... represents an element if any of
/// the relative selectors, when absolutized and evaluated with the element
/// as the :scope elements, would match at least one element."
fn match_relative(relative: &RelativeSelector, anchor: NodeIndex, snapshot: &DomSnapshot) -> MatchResult {
    let constraint = Some((relative.combinator, anchor));
    let mut best = MatchResult::No;
    for candidate in snapshot.indices() {
        if candidate == anchor {
            continue;
        }
        // Every match lies in the anchor's subtree or in a following
        // sibling's subtree.
        let in_scope = match relative.combinator {
            Combinator::Descendant | Combinator::Child => {
                snapshot.is_descendant_of(candidate, anchor)
            }
            Combinator::NextSibling | Combinator::SubsequentSibling => snapshot
                .following_siblings(anchor)
                .any(|s| s == candidate || snapshot.is_descendant_of(candidate, s)),
        };
        if !in_scope {
            continue;
        }
        let subject = match_compound(&relative.selector.subject, candidate, snapshot);
        if subject == MatchResult::No {
            continue;
        }
        best = best.or(subject.and(match_chain(
            &relative.selector.combinators,
            candidate,
            snapshot,
            constraint,
        )));
        if best == MatchResult::Yes {
            break;
        }
    }
    best
}

/// The value of `name` on the element or its nearest ancestor carrying it.
fn inherited_attribute<'a>(index: NodeIndex, snapshot: &'a DomSnapshot, name: &str) -> Option<&'a str> {
    std::iter::once(index)
        .chain(snapshot.ancestors(index))
        .find_map(|i| snapshot.element(i).attribute(name))
}

/// [§ 13.2 The Mutability Pseudo-classes](https://www.w3.org/TR/selectors-4/#rw-pseudos)
fn is_read_write(element: &ElementSnapshot) -> bool {
    if is_any_of(element, &["input", "textarea"]) {
        return !element.has_attribute("readonly") && !element.has_attribute("disabled");
    }
    element
        .attribute("contenteditable")
        .is_some_and(|value| !value.eq_ignore_ascii_case("false"))
}
