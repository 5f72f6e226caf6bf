//! Fatal extraction errors.

use foldline_dom::SnapshotError;
use thiserror::Error;

/// An extraction run that produced no output at all.
///
/// Everything recoverable is reported as a
/// [`Warning`](foldline_common::Warning) instead.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No stylesheets were supplied, or the snapshot has no elements.
    #[error("nothing to extract: {0}")]
    EmptyInput(&'static str),
    /// The DOM snapshot could not be turned into a tree.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// The request document is not valid JSON for the request schema.
    #[error("invalid extraction request: {0}")]
    Request(#[source] serde_json::Error),
}
