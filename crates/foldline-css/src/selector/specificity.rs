use core::fmt;

use serde::Serialize;

use super::{ComplexSelector, CompoundSelector, PseudoClass};

/// [§ 17 Calculating Specificity](https://www.w3.org/TR/selectors-4/#specificity-rules)
///
/// "A selector's specificity is calculated for a given element as follows:
///  - count the number of ID selectors in the selector (= A)
///  - count the number of class selectors, attributes selectors, and pseudo-classes in the selector (= B)
///  - count the number of type selectors and pseudo-elements in the selector (= C)
///
/// Specificities are compared by comparing the three components in order."
///
/// Serializes as `[a, b, c]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Specificity(pub u32, pub u32, pub u32);

impl Specificity {
    /// Create a new specificity with (A, B, C) components.
    #[must_use]
    pub const fn new(a: u32, b: u32, c: u32) -> Self {
        Self(a, b, c)
    }

    /// Component-wise sum, saturating.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(
            self.0.saturating_add(other.0),
            self.1.saturating_add(other.1),
            self.2.saturating_add(other.2),
        )
    }

    /// The components as an array.
    #[must_use]
    pub const fn to_array(self) -> [u32; 3] {
        [self.0, self.1, self.2]
    }
}

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.0, self.1, self.2)
    }
}

/// Sum of the specificities of every compound in the chain.
#[must_use]
pub fn selector_specificity(complex: &ComplexSelector) -> Specificity {
    complex
        .compounds()
        .map(compound_specificity)
        .fold(Specificity::default(), Specificity::saturating_add)
}

fn compound_specificity(compound: &CompoundSelector) -> Specificity {
    let mut spec = Specificity::default();

    // "count the number of ID selectors in the selector (= A)"
    spec.0 = count(compound.ids.len());

    // "count the number of class selectors, attributes selectors, and
    // pseudo-classes in the selector (= B)"
    spec.1 = count(compound.classes.len() + compound.attributes.len());

    // "count the number of type selectors and pseudo-elements in the
    // selector (= C)". The universal selector is ignored.
    spec.2 = count(usize::from(compound.tag.is_some()) + compound.pseudo_elements.len());

    for pseudo in &compound.pseudo_classes {
        spec = spec.saturating_add(pseudo_class_specificity(pseudo));
    }
    spec
}

/// "The specificity of an :is(), :not(), or :has() pseudo-class is replaced
/// by the specificity of the most specific complex selector in its selector
/// list argument."
///
/// "The specificity of an :nth-child() or :nth-last-child() selector is the
/// specificity of the pseudo class itself (counting as one pseudo-class
/// selector) plus the specificity of the most specific complex selector in
/// its selector list argument (if any)."
///
/// "The specificity of a :where() pseudo-class is replaced by zero."
fn pseudo_class_specificity(pseudo: &PseudoClass) -> Specificity {
    match pseudo {
        PseudoClass::Is(list) | PseudoClass::Not(list) => most_specific(list.iter()),
        PseudoClass::Has(list) => most_specific(list.iter().map(|r| &r.selector)),
        PseudoClass::Where(_) => Specificity::default(),
        PseudoClass::NthChild(_, Some(list)) | PseudoClass::NthLastChild(_, Some(list)) => {
            Specificity(0, 1, 0).saturating_add(most_specific(list.iter()))
        }
        _ => Specificity(0, 1, 0),
    }
}

fn most_specific<'a>(list: impl Iterator<Item = &'a ComplexSelector>) -> Specificity {
    list.map(selector_specificity).max().unwrap_or_default()
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::parse_selector_list_str;

    fn spec(text: &str) -> [u32; 3] {
        parse_selector_list_str(text).unwrap()[0].specificity.to_array()
    }

    #[test]
    fn test_basic_specificity() {
        assert_eq!(spec("*"), [0, 0, 0]);
        assert_eq!(spec("li"), [0, 0, 1]);
        assert_eq!(spec("ul li"), [0, 0, 2]);
        assert_eq!(spec("ul ol+li"), [0, 0, 3]);
        assert_eq!(spec("h1 + *[rel=up]"), [0, 1, 1]);
        assert_eq!(spec("ul ol li.red"), [0, 1, 3]);
        assert_eq!(spec("li.red.level"), [0, 2, 1]);
        assert_eq!(spec("#x34y"), [1, 0, 0]);
    }

    #[test]
    fn test_pseudo_elements_count_as_types() {
        assert_eq!(spec("p::before"), [0, 0, 2]);
        assert_eq!(spec("p:first-line"), [0, 0, 2]);
        assert_eq!(spec("a:hover"), [0, 1, 1]);
    }

    #[test]
    fn test_logical_pseudo_classes_take_most_specific_argument() {
        assert_eq!(spec("#s12:not(FOO)"), [1, 0, 1]);
        assert_eq!(spec(":is(em, #foo)"), [1, 0, 0]);
        assert_eq!(spec(":where(em, #foo)"), [0, 0, 0]);
        assert_eq!(spec("div:has(> img.hero)"), [0, 1, 2]);
        assert_eq!(spec("li:nth-child(2n+1 of .item)"), [0, 2, 1]);
    }
}
