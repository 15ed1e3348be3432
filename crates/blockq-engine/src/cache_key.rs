//! Namespaced cache keys.
//!
//! Keys hash the complete input so distinct inputs never share an entry,
//! however long their common prefix.

use sha2::{Digest, Sha256};

pub const QUERY_RESULT_PREFIX: &str = "query-result:";
pub const AI_ANALYSIS_PREFIX: &str = "ai-analysis:";

/// Key for a query result. `normalized` must come from
/// [`blockq_parser::normalize`].
pub fn query_result_key(normalized: &str) -> String {
    format!("{}{}", QUERY_RESULT_PREFIX, digest(normalized))
}

pub fn ai_analysis_key(input: &str) -> String {
    format!("{}{}", AI_ANALYSIS_PREFIX, digest(input))
}

fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
