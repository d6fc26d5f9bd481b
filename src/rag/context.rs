//! Context building for grounded answers.

use crate::search::SearchHit;
use tracing::warn;

/// Separator line written after each document's fragments.
pub const DOCUMENT_SEPARATOR: &str = "---";

/// Concatenate the highlighted fragments of every hit into one context block.
///
/// Each document contributes its fragments joined by newlines followed by a
/// separator line. Documents without highlights for `field` are skipped.
pub fn format_context(hits: &[SearchHit], field: &str) -> String {
    let mut context = String::new();

    for (i, hit) in hits.iter().enumerate() {
        let Some(fragments) = hit.highlights_for(field) else {
            warn!("Search result {} has no '{}' highlights, skipping", i, field);
            continue;
        };

        context.push_str(&fragments.join("\n"));
        context.push('\n');
        context.push_str(DOCUMENT_SEPARATOR);
        context.push('\n');
    }

    context
}
