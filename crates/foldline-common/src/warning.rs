//! Engine warnings with per-run deduplicated logging.
//!
//! No issue is ever swallowed: every warning is recorded in order and handed
//! back to the caller alongside the extraction output. Logging is a side
//! channel only, and prints each distinct message once per run to avoid
//! spamming the same complaint for every rule of a large stylesheet.

use std::collections::HashSet;

use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// The category of a non-fatal issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WarningKind {
    /// A malformed rule or declaration was skipped.
    Parse,
    /// A selector uses a pseudo-class the matcher cannot evaluate.
    UnsupportedSelector,
    /// An at-rule the engine does not understand was kept verbatim.
    UnsupportedAtRule,
    /// A `@media`/`@supports` condition cannot be decided statically.
    AmbiguousCondition,
    /// The snapshot has no rect for an element.
    GeometryMissing,
    /// A `forceInclude`/`forceExclude` entry is not a valid selector.
    InvalidOverride,
    /// An `@import` survived flattening.
    UnresolvedImport,
}

/// A single non-fatal issue found during an extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// What went wrong.
    pub kind: WarningKind,
    /// The rule the warning is attached to, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_source_index: Option<usize>,
    /// Human readable description.
    pub message: String,
}

impl Warning {
    /// Create a warning that is not attached to a rule.
    #[must_use]
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            rule_source_index: None,
            message: message.into(),
        }
    }

    /// Create a warning attached to the rule with the given source index.
    #[must_use]
    pub fn for_rule(kind: WarningKind, source_index: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            rule_source_index: Some(source_index),
            message: message.into(),
        }
    }
}

/// Ordered warning sink for one extraction run.
///
/// # Example
/// ```
/// use foldline_common::{Diagnostics, WarningKind};
///
/// let mut diagnostics = Diagnostics::new();
/// diagnostics.warn(WarningKind::GeometryMissing, None, "element 7 has no rect");
/// assert_eq!(diagnostics.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
    logged: HashSet<String>,
}

impl Diagnostics {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn push(&mut self, warning: Warning) {
        let key = format!("[{}] {}", warning.kind, warning.message);
        if self.logged.insert(key) {
            log::warn!(target: "foldline", "[{}] {}", warning.kind, warning.message);
        }
        self.warnings.push(warning);
    }

    /// Record a warning built from its parts.
    pub fn warn(
        &mut self,
        kind: WarningKind,
        rule_source_index: Option<usize>,
        message: impl Into<String>,
    ) {
        self.push(Warning {
            kind,
            rule_source_index,
            message: message.into(),
        });
    }

    /// Record every warning of an iterator, in order.
    pub fn extend(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        for warning in warnings {
            self.push(warning);
        }
    }

    /// Number of recorded warnings (duplicates included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// The recorded warnings, in recording order.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Consume the sink and return the recorded warnings.
    #[must_use]
    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_are_recorded_but_logged_once() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(WarningKind::Parse, Some(3), "bad declaration");
        diagnostics.warn(WarningKind::Parse, Some(3), "bad declaration");

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.logged.len(), 1);
    }

    #[test]
    fn test_kind_renders_kebab_case() {
        assert_eq!(WarningKind::UnsupportedSelector.to_string(), "unsupported-selector");
        assert_eq!(WarningKind::GeometryMissing.as_ref(), "geometry-missing");
    }

    #[test]
    fn test_for_rule_attaches_source_index() {
        let warning = Warning::for_rule(WarningKind::AmbiguousCondition, 4, "(hover: hover)");
        assert_eq!(warning.rule_source_index, Some(4));
        assert_eq!(Warning::new(WarningKind::Parse, "x").rule_source_index, None);
    }

    #[test]
    fn test_into_warnings_preserves_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.extend([
            Warning::new(WarningKind::Parse, "first"),
            Warning::new(WarningKind::UnresolvedImport, "second"),
        ]);
        let messages: Vec<_> = diagnostics
            .into_warnings()
            .into_iter()
            .map(|w| w.message)
            .collect();
        assert_eq!(messages, ["first", "second"]);
    }
}
