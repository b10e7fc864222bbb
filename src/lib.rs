/// Low-level byte access and archive sources
pub mod data;
/// Error definitions
pub mod error;
/// Producing new archive pairs: extraction and merging
pub mod export;
/// Readers for the `.gma` model and `.tpl` texture archive formats
pub mod models;
/// Generic wrapper for values that may or may not match a known variant.
pub mod recognized;
/// Choosing models by naming convention (goals, switches)
pub mod select;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::ArchiveError;
pub use models::ArchivePair;
