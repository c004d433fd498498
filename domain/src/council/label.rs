//! Anonymized response labels
//!
//! Jurors see `Response A`, `Response B`, … and never learn which model
//! produced which answer; the mapping back to display names is held only by
//! the pipeline and the run record.

use std::collections::BTreeMap;

/// Mapping from response label to producing model display name.
pub type LabelMap = BTreeMap<String, String>;

/// Label for the stage-1 response at `index`: `"Response A"`, `"Response B"`, …
pub fn response_label(index: usize) -> String {
    debug_assert!(index < 26, "more than 26 stage-1 responses");
    format!("Response {}", (b'A' + index as u8) as char)
}
