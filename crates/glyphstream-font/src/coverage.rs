//! Coverage tables and GSUB lookup subtables.
//!
//! These are immutable data containers built once per font parse. A
//! coverage table is an ordered set of glyph IDs whose index order is the
//! rank used for parallel substitute-array lookups; the subtable variants
//! mirror the OpenType single-substitution formats 1/2 and ligature
//! substitution format 1.

use crate::error::FontError;

/// An ordered sequence of glyph IDs covered by a lookup rule.
///
/// The position of a glyph in the coverage table is its coverage index,
/// which parallel arrays (e.g. Format 2 substitute lists) are indexed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageTable {
    glyph_ids: Vec<u16>,
}

impl CoverageTable {
    /// Create a coverage table from an ordered glyph ID list.
    pub fn new(glyph_ids: Vec<u16>) -> Self {
        Self { glyph_ids }
    }

    /// Number of glyphs covered.
    pub fn len(&self) -> usize {
        self.glyph_ids.len()
    }

    /// Whether the coverage table is empty.
    pub fn is_empty(&self) -> bool {
        self.glyph_ids.is_empty()
    }

    /// Bounds-checked access to the glyph ID at a coverage index.
    pub fn glyph_id(&self, index: usize) -> Result<u16, FontError> {
        self.glyph_ids
            .get(index)
            .copied()
            .ok_or(FontError::IndexOutOfRange {
                index,
                len: self.glyph_ids.len(),
            })
    }

    /// Iterate the covered glyph IDs in coverage order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.glyph_ids.iter().copied()
    }
}

/// A ligature rule: the component sequence (excluding the implicit first
/// glyph, which is the coverage glyph) and the resulting ligature glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigatureTable {
    /// The glyph produced when all components match.
    pub ligature_glyph: u16,
    /// Component glyph IDs after the first (coverage) glyph, in order.
    pub component_glyph_ids: Vec<u16>,
}

/// The set of ligature rules starting with one coverage glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigatureSetTable {
    /// First glyph of every ligature in this set.
    pub first_glyph: u16,
    /// Ligature rules, in table order.
    pub ligatures: Vec<LigatureTable>,
}

/// A GSUB lookup subtable.
///
/// Only the kinds the extraction pipeline understands are modeled;
/// everything else is carried as [`LookupSubTable::Unsupported`] so the
/// extractor can skip it without losing track of what the font declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupSubTable {
    /// Single substitution, format 1: substitute = coverage glyph + delta.
    SingleSubstFormat1 {
        /// Glyphs the rule applies to.
        coverage: CoverageTable,
        /// Constant added to each coverage glyph (wrapping 16-bit).
        delta_glyph_id: i16,
    },
    /// Single substitution, format 2: substitute at the same coverage rank.
    SingleSubstFormat2 {
        /// Glyphs the rule applies to.
        coverage: CoverageTable,
        /// One substitute per coverage entry, in coverage order.
        substitute_glyph_ids: Vec<u16>,
    },
    /// Ligature substitution, format 1.
    LigatureSubstFormat1 {
        /// One set per coverage glyph, in coverage order.
        ligature_sets: Vec<LigatureSetTable>,
    },
    /// A lookup type the engine does not extract (contextual, chained, …).
    Unsupported {
        /// The OpenType lookup type as declared by the font.
        lookup_type: u16,
    },
}

impl LookupSubTable {
    /// Build a format 2 single-substitution subtable, validating that the
    /// substitute array parallels the coverage table exactly.
    pub fn single_subst_format2(
        coverage: CoverageTable,
        substitute_glyph_ids: Vec<u16>,
    ) -> Result<Self, FontError> {
        if coverage.len() != substitute_glyph_ids.len() {
            return Err(FontError::MalformedTable(format!(
                "coverage table has {} entries but {} substitute glyph IDs were supplied",
                coverage.len(),
                substitute_glyph_ids.len()
            )));
        }
        Ok(Self::SingleSubstFormat2 {
            coverage,
            substitute_glyph_ids,
        })
    }
}

/// A GSUB lookup: a typed list of subtables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    /// OpenType lookup type (1 = single, 4 = ligature, …).
    pub lookup_type: u16,
    /// Subtables in table order.
    pub subtables: Vec<LookupSubTable>,
}

/// The font's lookup list; lookup indices from feature tables index into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupListTable {
    /// Lookups in declaration order.
    pub lookups: Vec<LookupTable>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_in_order_access() {
        let cov = CoverageTable::new(vec![5, 6, 7]);
        assert_eq!(cov.len(), 3);
        assert_eq!(cov.glyph_id(0), Ok(5));
        assert_eq!(cov.glyph_id(2), Ok(7));
    }

    #[test]
    fn coverage_out_of_range_is_error() {
        let cov = CoverageTable::new(vec![5, 6, 7]);
        assert_eq!(
            cov.glyph_id(3),
            Err(FontError::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn coverage_empty() {
        let cov = CoverageTable::new(Vec::new());
        assert!(cov.is_empty());
        assert!(cov.glyph_id(0).is_err());
    }

    #[test]
    fn format2_length_mismatch_is_malformed() {
        let cov = CoverageTable::new(vec![1, 2, 3]);
        let result = LookupSubTable::single_subst_format2(cov, vec![10, 11]);
        assert!(matches!(result, Err(FontError::MalformedTable(_))));
    }

    #[test]
    fn format2_matching_lengths_construct() {
        let cov = CoverageTable::new(vec![1, 2, 3]);
        let table = LookupSubTable::single_subst_format2(cov, vec![10, 11, 12]).unwrap();
        match table {
            LookupSubTable::SingleSubstFormat2 {
                coverage,
                substitute_glyph_ids,
            } => {
                assert_eq!(coverage.len(), substitute_glyph_ids.len());
            }
            _ => panic!("expected SingleSubstFormat2"),
        }
    }

    #[test]
    fn format2_empty_is_valid() {
        let table =
            LookupSubTable::single_subst_format2(CoverageTable::new(Vec::new()), Vec::new());
        assert!(table.is_ok());
    }
}
