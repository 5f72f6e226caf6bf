//! Caller-tunable extraction settings.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How the caller should deliver the two bundles.
///
/// The engine only describes the strategy; emitting `<style>`/`<link>`
/// markup is the caller's job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, AsRefStr,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LoadingStrategy {
    /// Inline the critical CSS, `<link rel=preload>` the deferred bundle.
    #[default]
    Preload,
    /// Load the deferred bundle with `media="print"` and swap on load.
    MediaSwap,
    /// Load the deferred bundle from script after first paint.
    Defer,
}

/// Options for one extraction run.
///
/// Deserializes from camelCase JSON; every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractOptions {
    /// Selectors whose elements are critical regardless of geometry. A rule
    /// whose selector text equals an entry is critical too.
    pub force_include: Vec<String>,
    /// Selectors whose elements are never critical unless force-included.
    pub force_exclude: Vec<String>,
    /// At-rule names (`media`, `font-face`) or condition keywords (`print`)
    /// whose rules never go to the critical bundle.
    pub ignore_at_rules: Vec<String>,
    /// Put rules under an undecidable condition that match no critical
    /// element in the deferred bundle only, instead of in both.
    pub prune_unmatched_ambiguous: bool,
    /// Delivery strategy echoed in the loading descriptor.
    pub loading_strategy: LoadingStrategy,
}

impl ExtractOptions {
    /// Add a `forceInclude` selector.
    #[must_use]
    pub fn force_include(mut self, selector: impl Into<String>) -> Self {
        self.force_include.push(selector.into());
        self
    }

    /// Add a `forceExclude` selector.
    #[must_use]
    pub fn force_exclude(mut self, selector: impl Into<String>) -> Self {
        self.force_exclude.push(selector.into());
        self
    }

    /// Add an `ignoreAtRules` keyword.
    #[must_use]
    pub fn ignore_at_rule(mut self, keyword: impl Into<String>) -> Self {
        self.ignore_at_rules.push(keyword.into());
        self
    }

    /// Whether `frame_word` (an at-rule name or a media type) is
    /// listed in `ignoreAtRules`, ignoring ASCII case.
    #[must_use]
    pub fn ignores(&self, frame_word: &str) -> bool {
        self.ignore_at_rules
            .iter()
            .any(|keyword| keyword.trim_start_matches('@').eq_ignore_ascii_case(frame_word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let options: ExtractOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ExtractOptions::default());
        assert_eq!(options.loading_strategy, LoadingStrategy::Preload);
        assert!(!options.prune_unmatched_ambiguous);
    }

    #[test]
    fn test_camel_case_fields() {
        let options: ExtractOptions = serde_json::from_str(
            r#"{"forceInclude": [".hero"], "ignoreAtRules": ["print"], "loadingStrategy": "media-swap"}"#,
        )
        .unwrap();
        assert_eq!(options.force_include, [".hero"]);
        assert_eq!(options.loading_strategy, LoadingStrategy::MediaSwap);
        assert_eq!(LoadingStrategy::MediaSwap.to_string(), "media-swap");
    }

    #[test]
    fn test_loading_strategy_from_str() {
        for strategy in [LoadingStrategy::Preload, LoadingStrategy::MediaSwap, LoadingStrategy::Defer] {
            assert_eq!(strategy.to_string().parse::<LoadingStrategy>(), Ok(strategy));
        }
        assert!("lazy".parse::<LoadingStrategy>().is_err());
    }

    #[test]
    fn test_ignores_is_case_insensitive() {
        let options = ExtractOptions::default().ignore_at_rule("PRINT").ignore_at_rule("@font-face");
        assert!(options.ignores("print"));
        assert!(options.ignores("font-face"));
        assert!(!options.ignores("screen"));
    }
}
