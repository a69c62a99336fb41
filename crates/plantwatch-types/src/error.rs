//! Error types for plantwatch-types.

use crate::reading::Field;

/// A reading that cannot be stored because one of its values is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Missing value for {field}")]
pub struct IncompleteReading {
    /// The first field found to be missing or null.
    pub field: Field,
}
