//! Read-only DOM geometry snapshot for the foldline engine.
//!
//! The caller renders the page elsewhere and hands the engine one
//! [`ElementSnapshot`] per element, in document order. This crate turns that
//! flat list into an arena-based tree ([`DomSnapshot`]) that answers the
//! structural questions selector matching needs.
//!
//! # Design
//!
//! Elements live in a contiguous vector and are addressed by [`NodeIndex`].
//! Relationships are one-directional `parent_id` references in the input;
//! children and sibling order are derived once, at construction, by grouping
//! on the parent. There are no back-pointers and nothing is ever mutated
//! after [`DomSnapshot::new`] returns.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A caller-assigned element identifier.
///
/// Snapshots produced by different tools use either strings or integers, so
/// both are accepted on input and normalised to text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl ElementId {
    /// Borrow the id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for ElementId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Unsigned(n) => Self(n.to_string()),
            RawId::Signed(n) => Self(n.to_string()),
        })
    }
}

/// A type-safe index into the snapshot arena.
///
/// Indices follow document order: a smaller index is earlier in the
/// caller-supplied element list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

/// An axis-aligned box in CSS pixels, relative to the top-left of the page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    #[serde(rename = "w", alias = "width")]
    pub width: f64,
    /// Height.
    #[serde(rename = "h", alias = "height")]
    pub height: f64,
}

impl Rect {
    /// Create a rect from its origin and size.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area of the overlap between `self` and `other`, zero when disjoint.
    ///
    /// Edges that merely touch overlap with zero area.
    #[must_use]
    pub fn intersection_area(&self, other: &Self) -> f64 {
        let overlap_w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let overlap_h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if overlap_w > 0.0 && overlap_h > 0.0 {
            overlap_w * overlap_h
        } else {
            0.0
        }
    }

    /// Whether `self` and `other` overlap with positive area.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection_area(other) > 0.0
    }
}

/// The initial containing block the page was rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels.
    pub width: f64,
    /// Height in CSS pixels.
    pub height: f64,
}

impl Viewport {
    /// Create a viewport.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The above-the-fold rectangle `[0, 0, width, height]`.
    #[must_use]
    pub const fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// One rendered element as captured by the caller.
///
/// Owned by the caller and read-only to the engine. Tag and attribute names
/// are normalised to ASCII lowercase when the snapshot is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    /// Caller-assigned identifier, unique within the snapshot.
    pub id: ElementId,
    /// Local name, e.g. `div`.
    pub tag: String,
    /// Class names. Tokens of a `class` attribute are merged in.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Attribute name to value.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Border box geometry; `None` when the renderer produced none.
    #[serde(default)]
    pub rect: Option<Rect>,
    /// Whether the element computed to `display: none`.
    #[serde(default)]
    pub display_none: bool,
    /// The parent element, `None` for roots.
    #[serde(default)]
    pub parent_id: Option<ElementId>,
    /// Whether the element has non-whitespace text children.
    #[serde(default)]
    pub has_text: bool,
}

impl ElementSnapshot {
    /// Create a parentless element with no geometry.
    #[must_use]
    pub fn new(id: impl Into<ElementId>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            rect: None,
            display_none: false,
            parent_id: None,
            has_text: false,
        }
    }

    /// Set the parent element.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<ElementId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Add class names.
    #[must_use]
    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.classes.extend(classes.iter().map(|c| (*c).to_string()));
        self
    }

    /// Set an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        let _ = self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Set the geometry.
    #[must_use]
    pub const fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    /// Mark as `display: none`.
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.display_none = true;
        self
    }

    /// Mark as having text content.
    #[must_use]
    pub const fn with_text(mut self) -> Self {
        self.has_text = true;
        self
    }

    /// Look up an attribute by (lowercase) name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whether the attribute is present, whatever its value.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// The HTML `id` attribute, which `#id` selectors match against.
    #[must_use]
    pub fn html_id(&self) -> Option<&str> {
        self.attribute("id")
    }

    /// Whether the element carries the given class (case-sensitive).
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Whether the tag name equals `name`, ASCII case-insensitively.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.tag.eq_ignore_ascii_case(name)
    }

    fn normalize(&mut self) {
        self.tag.make_ascii_lowercase();
        if self.attributes.keys().any(|k| k.bytes().any(|b| b.is_ascii_uppercase())) {
            self.attributes = std::mem::take(&mut self.attributes)
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect();
        }
        if let Some(class_attr) = self.attributes.get("class") {
            for token in class_attr.split_ascii_whitespace() {
                if !self.classes.iter().any(|c| c == token) {
                    self.classes.push(token.to_string());
                }
            }
        }
    }
}

/// A snapshot that could not be turned into a tree.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The JSON document does not match the snapshot schema.
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Two elements share an id.
    #[error("duplicate element id '{0}'")]
    DuplicateId(ElementId),
    /// An element names a parent that is not in the snapshot.
    #[error("element '{element}' references unknown parent '{parent}'")]
    UnknownParent {
        /// The element carrying the dangling reference.
        element: ElementId,
        /// The missing parent id.
        parent: ElementId,
    },
    /// Following parent links from this element never reaches a root.
    #[error("parent chain of element '{0}' contains a cycle")]
    ParentCycle(ElementId),
}

/// Arena-based, immutable element tree.
///
/// Constructed once per extraction run; every accessor is `&self`.
#[derive(Debug, Clone, Default)]
pub struct DomSnapshot {
    elements: Vec<ElementSnapshot>,
    by_id: HashMap<ElementId, NodeIndex>,
    parents: Vec<Option<NodeIndex>>,
    children: Vec<Vec<NodeIndex>>,
    roots: Vec<NodeIndex>,
    sibling_positions: Vec<usize>,
}

impl DomSnapshot {
    /// Build the tree from elements listed in document order.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate ids, dangling parent references, or
    /// parent cycles.
    pub fn new(mut elements: Vec<ElementSnapshot>) -> Result<Self, SnapshotError> {
        let mut by_id = HashMap::with_capacity(elements.len());
        for (i, element) in elements.iter_mut().enumerate() {
            element.normalize();
            if by_id.insert(element.id.clone(), NodeIndex(i)).is_some() {
                return Err(SnapshotError::DuplicateId(element.id.clone()));
            }
        }

        let mut parents = Vec::with_capacity(elements.len());
        for element in &elements {
            let parent = match &element.parent_id {
                Some(parent_id) => Some(*by_id.get(parent_id).ok_or_else(|| {
                    SnapshotError::UnknownParent {
                        element: element.id.clone(),
                        parent: parent_id.clone(),
                    }
                })?),
                None => None,
            };
            parents.push(parent);
        }

        check_acyclic(&elements, &parents)?;

        let mut children = vec![Vec::new(); elements.len()];
        let mut roots = Vec::new();
        let mut sibling_positions = vec![0; elements.len()];
        for (i, parent) in parents.iter().enumerate() {
            let group = match parent {
                Some(p) => &mut children[p.0],
                None => &mut roots,
            };
            sibling_positions[i] = group.len();
            group.push(NodeIndex(i));
        }

        Ok(Self {
            elements,
            by_id,
            parents,
            children,
            roots,
            sibling_positions,
        })
    }

    /// Parse a snapshot from JSON: either an array of elements or an object
    /// with an `elements` array.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the tree is invalid.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Document {
            List(Vec<ElementSnapshot>),
            Wrapped { elements: Vec<ElementSnapshot> },
        }

        let elements = match serde_json::from_str(json)? {
            Document::List(elements) | Document::Wrapped { elements } => elements,
        };
        Self::new(elements)
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the snapshot holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Get an element by index.
    #[must_use]
    pub fn get(&self, index: NodeIndex) -> Option<&ElementSnapshot> {
        self.elements.get(index.0)
    }

    /// Get an element by index.
    ///
    /// # Panics
    ///
    /// Panics if `index` did not come from this snapshot.
    #[must_use]
    pub fn element(&self, index: NodeIndex) -> &ElementSnapshot {
        &self.elements[index.0]
    }

    /// Find an element's index by its caller-assigned id.
    #[must_use]
    pub fn lookup(&self, id: &ElementId) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    /// All indices, in document order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + use<> {
        (0..self.elements.len()).map(NodeIndex)
    }

    /// Get the parent of an element.
    #[must_use]
    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.parents.get(index.0).copied().flatten()
    }

    /// Get the children of an element, in document order.
    #[must_use]
    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        self.children.get(index.0).map_or(&[], Vec::as_slice)
    }

    /// Parentless elements, in document order.
    #[must_use]
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// [§ 3.1.1 The document element](https://html.spec.whatwg.org/multipage/dom.html#the-html-element-2)
    ///
    /// The first root element, which `:root` matches.
    #[must_use]
    pub fn document_element(&self) -> Option<NodeIndex> {
        self.roots.first().copied()
    }

    /// The sibling group an element belongs to (itself included): its
    /// parent's children, or the root list for parentless elements.
    #[must_use]
    pub fn siblings(&self, index: NodeIndex) -> &[NodeIndex] {
        match self.parent(index) {
            Some(parent) => self.children(parent),
            None => &self.roots,
        }
    }

    /// Zero-based position of an element within [`Self::siblings`].
    #[must_use]
    pub fn sibling_position(&self, index: NodeIndex) -> usize {
        self.sibling_positions.get(index.0).copied().unwrap_or(0)
    }

    /// Iterate over all ancestors of an element, from parent to root.
    #[must_use]
    pub fn ancestors(&self, index: NodeIndex) -> AncestorIterator<'_> {
        AncestorIterator {
            snapshot: self,
            current: self.parent(index),
        }
    }

    /// Iterate over preceding siblings, nearest first.
    #[must_use]
    pub fn preceding_siblings(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        let position = self.sibling_position(index);
        self.siblings(index)[..position].iter().rev().copied()
    }

    /// Iterate over following siblings, nearest first.
    #[must_use]
    pub fn following_siblings(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        let position = self.sibling_position(index);
        self.siblings(index)[position + 1..].iter().copied()
    }

    /// Whether `ancestor` is a proper ancestor of `index`.
    #[must_use]
    pub fn is_descendant_of(&self, index: NodeIndex, ancestor: NodeIndex) -> bool {
        self.ancestors(index).any(|a| a == ancestor)
    }
}

/// Iterator over ancestors of an element.
pub struct AncestorIterator<'a> {
    snapshot: &'a DomSnapshot,
    current: Option<NodeIndex>,
}

impl Iterator for AncestorIterator<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        self.current = self.snapshot.parent(index);
        Some(index)
    }
}

/// Reject parent chains that loop. Each element is visited once.
fn check_acyclic(
    elements: &[ElementSnapshot],
    parents: &[Option<NodeIndex>],
) -> Result<(), SnapshotError> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        InProgress,
        Done,
    }

    let mut state = vec![State::Unvisited; elements.len()];
    let mut chain = Vec::new();
    for start in 0..elements.len() {
        let mut current = Some(start);
        while let Some(i) = current {
            match state[i] {
                State::Done => break,
                State::InProgress => return Err(SnapshotError::ParentCycle(elements[i].id.clone())),
                State::Unvisited => {
                    state[i] = State::InProgress;
                    chain.push(i);
                    current = parents[i].map(|p| p.0);
                }
            }
        }
        for i in chain.drain(..) {
            state[i] = State::Done;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touching_rects_do_not_intersect() {
        let viewport = Viewport::new(100.0, 100.0).rect();
        let below = Rect::new(0.0, 100.0, 100.0, 50.0);
        assert!(!below.intersects(&viewport));
        assert!(Rect::new(0.0, 99.0, 100.0, 50.0).intersects(&viewport));
    }

    #[test]
    fn test_zero_sized_rect_never_intersects() {
        let viewport = Viewport::new(100.0, 100.0).rect();
        assert!(!Rect::new(10.0, 10.0, 0.0, 20.0).intersects(&viewport));
    }

    #[test]
    fn test_normalize_merges_class_attribute() {
        let mut element = ElementSnapshot::new("1", "DIV")
            .with_classes(&["a"])
            .with_attribute("CLASS", "a b");
        element.normalize();
        assert_eq!(element.tag, "div");
        assert_eq!(element.classes, ["a", "b"]);
        assert_eq!(element.attribute("class"), Some("a b"));
    }
}
