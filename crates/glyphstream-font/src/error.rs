//! Error types for the font-side crate.
//!
//! Uses [`thiserror`] for ergonomic error derivation. Table-construction
//! failures are structural (a malformed font cannot be partially used);
//! everything else on the glyph-resolution path degrades to `.notdef`
//! instead of erroring.

use thiserror::Error;

/// Error type for font table construction and access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FontError {
    /// A font table violates a structural invariant and cannot be built.
    #[error("malformed table: {0}")]
    MalformedTable(String),

    /// A bounds-checked table accessor was called with an out-of-range index.
    #[error("index {index} out of range for table of size {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The table size.
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_table_message() {
        let err = FontError::MalformedTable("coverage/substitute length mismatch".to_string());
        assert_eq!(
            err.to_string(),
            "malformed table: coverage/substitute length mismatch"
        );
    }

    #[test]
    fn index_out_of_range_message() {
        let err = FontError::IndexOutOfRange { index: 7, len: 3 };
        assert_eq!(err.to_string(), "index 7 out of range for table of size 3");
    }
}
