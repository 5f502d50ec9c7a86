//! Script, language-system, and feature tables.
//!
//! Mirrors the OpenType layout hierarchy: a script list maps script tags
//! to [`ScriptTable`]s; each script has a default and named
//! [`LangSysTable`]s; language systems reference features by index into
//! the [`FeatureListTable`]; features reference lookups by index into the
//! lookup list. All of it is read-only once the font is parsed.

/// A language-system table: the feature indices active for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LangSysTable {
    /// Index of a feature required for this language system, if any.
    pub required_feature_index: Option<u16>,
    /// Indices into the feature list, in table order.
    pub feature_indices: Vec<u16>,
}

/// A script table: the default language system plus named ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptTable {
    /// The default language system, used when no language tag matches.
    pub default_lang_sys: Option<LangSysTable>,
    /// Named language systems as `(lang tag, table)`, in table order.
    pub lang_sys_tables: Vec<(String, LangSysTable)>,
}

/// The script list: script tags to script tables, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptListTable {
    /// `(script tag, table)` records in declaration order.
    pub records: Vec<(String, ScriptTable)>,
}

impl ScriptListTable {
    /// Look up a script table by its tag.
    pub fn get(&self, tag: &str) -> Option<&ScriptTable> {
        self.records
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, table)| table)
    }
}

/// The lookups a feature activates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureTable {
    /// Indices into the lookup list, in table order.
    pub lookup_indices: Vec<u16>,
}

/// A feature record: tag plus the feature table it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord {
    /// Four-character feature tag, e.g. `"liga"`.
    pub feature_tag: String,
    /// The feature's lookup references.
    pub feature_table: FeatureTable,
}

/// The feature list; feature indices from language systems index into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureListTable {
    /// Feature records in declaration order.
    pub feature_records: Vec<FeatureRecord>,
}
