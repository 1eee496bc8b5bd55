//! Removal of repeated links within one retrieval batch

use std::collections::HashSet;

/// Drop repeated links, keeping the first occurrence of each.
///
/// Links compare by exact text. `verbose` only raises the log level of the
/// removed-count message.
pub fn dedupe(links: Vec<String>, verbose: bool) -> Vec<String> {
    let before = links.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<String> = links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect();

    let removed = before - unique.len();
    if verbose {
        tracing::info!(removed, "removed duplicate configs");
    } else if removed > 0 {
        tracing::debug!(removed, "removed duplicate configs");
    }

    unique
}
