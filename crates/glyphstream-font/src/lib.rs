//! glyphstream-font: OpenType table model and glyph resolution.
//!
//! Provides the font-side half of glyphstream-rs: immutable GSUB layout
//! tables and their extraction into substitution maps, cmap subtable
//! selection with the symbolic/non-symbolic code → GID policy, and the
//! glyph-name/encoding tables those policies rely on. Everything here is
//! read-only after construction and safe to share across page workers.

pub mod cmap;
pub mod coverage;
pub mod descriptor;
pub mod encoding;
pub mod error;
pub mod gsub;
pub mod layout;

pub use cmap::{CmapSelection, CmapSubtable, GidResolver, GlyphTable};
pub use coverage::{
    CoverageTable, LigatureSetTable, LigatureTable, LookupListTable, LookupSubTable, LookupTable,
};
pub use descriptor::FontFlags;
pub use encoding::{Encoding, glyph_name_to_unicode, mac_os_roman_code};
pub use error::FontError;
pub use gsub::{GlyphSubstitutionMap, GsubData, Language, extract_gsub_data};
pub use layout::{
    FeatureListTable, FeatureRecord, FeatureTable, LangSysTable, ScriptListTable, ScriptTable,
};
