/// Single-model extraction into a standalone archive pair
pub mod extract;
/// Concatenation of two archive pairs
pub mod merge;

pub use extract::{ExtractSummary, LocalTextureTable, extract_by_name, extract_model};
pub use merge::{MergeSummary, merge_archives};
