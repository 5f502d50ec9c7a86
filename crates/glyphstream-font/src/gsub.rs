//! GSUB data extraction.
//!
//! Walks the script → language-system → feature → lookup chain and
//! flattens the supported lookup subtables into per-feature substitution
//! maps: an ordered input glyph sequence (one element for single
//! substitutions, the full component sequence for ligatures) maps to one
//! output glyph.

use std::collections::HashMap;

use log::{debug, warn};

use crate::coverage::{LookupListTable, LookupSubTable, LookupTable};
use crate::layout::{FeatureListTable, FeatureRecord, LangSysTable, ScriptListTable, ScriptTable};

/// Languages the extractor knows how to select a script for, in probe
/// priority order. Each language lists its script-tag aliases, newest
/// tag revision first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Bengali,
    Devanagari,
    Gujarati,
    Latin,
}

impl Language {
    /// All languages in fixed probe order.
    pub const ALL: [Language; 4] = [
        Language::Bengali,
        Language::Devanagari,
        Language::Gujarati,
        Language::Latin,
    ];

    /// Script tags that select this language, tried in order.
    pub fn script_tags(&self) -> &'static [&'static str] {
        match self {
            Language::Bengali => &["bng2", "beng"],
            Language::Devanagari => &["dev2", "deva"],
            Language::Gujarati => &["gjr2", "gujr"],
            Language::Latin => &["latn"],
        }
    }
}

/// An insertion-ordered map from input glyph sequences to output glyphs.
///
/// Iteration reproduces insertion order so repeated extractions of the
/// same font are byte-for-byte comparable in diagnostics. Duplicate keys
/// overwrite (newest wins) and are counted as conflicts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphSubstitutionMap {
    entries: Vec<(Vec<u16>, u16)>,
    index: HashMap<Vec<u16>, usize>,
    conflicts: usize,
}

impl GlyphSubstitutionMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a substitution entry. An existing key is overwritten with
    /// the new glyph and the collision is logged and counted.
    pub fn insert(&mut self, input: Vec<u16>, output: u16) {
        if let Some(&pos) = self.index.get(&input) {
            let old = self.entries[pos].1;
            warn!(
                "substitution for {input:?} already maps to glyph {old}, overwriting with {output}"
            );
            self.entries[pos].1 = output;
            self.conflicts += 1;
        } else {
            self.index.insert(input.clone(), self.entries.len());
            self.entries.push((input, output));
        }
    }

    /// Look up the output glyph for an input sequence.
    pub fn get(&self, input: &[u16]) -> Option<u16> {
        self.index.get(input).map(|&pos| self.entries[pos].1)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of key collisions seen while building the map.
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u16], u16)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_slice(), *v))
    }
}

/// The result of GSUB extraction for one font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GsubData {
    /// No supported script was found in the font; not an error.
    NoDataFound,
    /// Substitution data for the selected script.
    Extracted {
        /// The language whose script probe matched.
        language: Language,
        /// The script tag that matched, for diagnostics.
        script_tag: String,
        /// Per-feature substitution maps, in feature-iteration order.
        features: Vec<(String, GlyphSubstitutionMap)>,
    },
}

impl GsubData {
    /// Look up the substitution map for a feature tag.
    pub fn feature(&self, tag: &str) -> Option<&GlyphSubstitutionMap> {
        match self {
            GsubData::NoDataFound => None,
            GsubData::Extracted { features, .. } => features
                .iter()
                .find(|(t, _)| t == tag)
                .map(|(_, map)| map),
        }
    }

    /// Whether extraction found any data.
    pub fn is_empty(&self) -> bool {
        match self {
            GsubData::NoDataFound => true,
            GsubData::Extracted { features, .. } => features.is_empty(),
        }
    }
}

/// Extract substitution data from a font's GSUB tables.
///
/// Probes the fixed language priority list against the script list; the
/// first matching script tag wins. Returns [`GsubData::NoDataFound`] when
/// no supported script is present.
pub fn extract_gsub_data(
    scripts: &ScriptListTable,
    feature_list: &FeatureListTable,
    lookup_list: &LookupListTable,
) -> GsubData {
    let Some((language, script_tag, script_table)) = select_supported_script(scripts) else {
        return GsubData::NoDataFound;
    };

    let mut features: Vec<(String, GlyphSubstitutionMap)> = Vec::new();
    if let Some(default_lang_sys) = &script_table.default_lang_sys {
        populate_lang_sys(&mut features, default_lang_sys, feature_list, lookup_list);
    }
    for (_, lang_sys) in &script_table.lang_sys_tables {
        populate_lang_sys(&mut features, lang_sys, feature_list, lookup_list);
    }

    GsubData::Extracted {
        language,
        script_tag: script_tag.to_string(),
        features,
    }
}

fn select_supported_script<'a>(
    scripts: &'a ScriptListTable,
) -> Option<(Language, &'a str, &'a ScriptTable)> {
    for language in Language::ALL {
        for tag in language.script_tags() {
            if let Some(table) = scripts.get(tag) {
                return Some((language, tag, table));
            }
        }
    }
    None
}

fn populate_lang_sys(
    features: &mut Vec<(String, GlyphSubstitutionMap)>,
    lang_sys: &LangSysTable,
    feature_list: &FeatureListTable,
    lookup_list: &LookupListTable,
) {
    for &feature_index in &lang_sys.feature_indices {
        // Fonts may reference feature indices past the end of the list;
        // those are skipped, not errors.
        let Some(record) = feature_list.feature_records.get(feature_index as usize) else {
            continue;
        };
        populate_feature(features, record, lookup_list);
    }
}

fn populate_feature(
    features: &mut Vec<(String, GlyphSubstitutionMap)>,
    record: &FeatureRecord,
    lookup_list: &LookupListTable,
) {
    let mut map = GlyphSubstitutionMap::new();
    for &lookup_index in &record.feature_table.lookup_indices {
        let Some(lookup) = lookup_list.lookups.get(lookup_index as usize) else {
            continue;
        };
        extract_lookup(&mut map, lookup);
    }

    debug!(
        "extracted {} substitutions for feature {}",
        map.len(),
        record.feature_tag
    );
    features.push((record.feature_tag.clone(), map));
}

fn extract_lookup(map: &mut GlyphSubstitutionMap, lookup: &LookupTable) {
    for subtable in &lookup.subtables {
        match subtable {
            LookupSubTable::SingleSubstFormat1 {
                coverage,
                delta_glyph_id,
            } => {
                for glyph in coverage.iter() {
                    let substitute = glyph.wrapping_add(*delta_glyph_id as u16);
                    map.insert(vec![glyph], substitute);
                }
            }
            LookupSubTable::SingleSubstFormat2 {
                coverage,
                substitute_glyph_ids,
            } => {
                // Lengths are equal by construction; the per-rank value is
                // added to the coverage glyph, matching the extraction
                // behavior this engine is compatible with.
                for (glyph, delta) in coverage.iter().zip(substitute_glyph_ids.iter()) {
                    map.insert(vec![glyph], glyph.wrapping_add(*delta));
                }
            }
            LookupSubTable::LigatureSubstFormat1 { ligature_sets } => {
                for set in ligature_sets {
                    for ligature in &set.ligatures {
                        let mut input = Vec::with_capacity(1 + ligature.component_glyph_ids.len());
                        input.push(set.first_glyph);
                        input.extend_from_slice(&ligature.component_glyph_ids);
                        map.insert(input, ligature.ligature_glyph);
                    }
                }
            }
            LookupSubTable::Unsupported { lookup_type } => {
                debug!("lookup type {lookup_type} is not supported, ignoring subtable");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{CoverageTable, LigatureSetTable, LigatureTable};
    use crate::layout::FeatureTable;

    fn liga_feature_font(
        lookups: Vec<LookupTable>,
    ) -> (ScriptListTable, FeatureListTable, LookupListTable) {
        let scripts = ScriptListTable {
            records: vec![(
                "latn".to_string(),
                ScriptTable {
                    default_lang_sys: Some(LangSysTable {
                        required_feature_index: None,
                        feature_indices: vec![0],
                    }),
                    lang_sys_tables: Vec::new(),
                },
            )],
        };
        let features = FeatureListTable {
            feature_records: vec![FeatureRecord {
                feature_tag: "liga".to_string(),
                feature_table: FeatureTable {
                    lookup_indices: (0..lookups.len() as u16).collect(),
                },
            }],
        };
        (scripts, features, LookupListTable { lookups })
    }

    #[test]
    fn no_supported_script_yields_no_data() {
        let scripts = ScriptListTable {
            records: vec![("arab".to_string(), ScriptTable::default())],
        };
        let data = extract_gsub_data(
            &scripts,
            &FeatureListTable::default(),
            &LookupListTable::default(),
        );
        assert_eq!(data, GsubData::NoDataFound);
    }

    #[test]
    fn single_subst_format1_applies_delta() {
        let (scripts, features, lookups) = liga_feature_font(vec![LookupTable {
            lookup_type: 1,
            subtables: vec![LookupSubTable::SingleSubstFormat1 {
                coverage: CoverageTable::new(vec![5, 6, 7]),
                delta_glyph_id: 3,
            }],
        }]);
        let data = extract_gsub_data(&scripts, &features, &lookups);
        let map = data.feature("liga").unwrap();
        assert_eq!(map.get(&[5]), Some(8));
        assert_eq!(map.get(&[6]), Some(9));
        assert_eq!(map.get(&[7]), Some(10));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn single_subst_format1_delta_wraps() {
        let (scripts, features, lookups) = liga_feature_font(vec![LookupTable {
            lookup_type: 1,
            subtables: vec![LookupSubTable::SingleSubstFormat1 {
                coverage: CoverageTable::new(vec![0xFFFF]),
                delta_glyph_id: 2,
            }],
        }]);
        let data = extract_gsub_data(&scripts, &features, &lookups);
        assert_eq!(data.feature("liga").unwrap().get(&[0xFFFF]), Some(1));
    }

    #[test]
    fn ligature_key_is_component_sequence() {
        let (scripts, features, lookups) = liga_feature_font(vec![LookupTable {
            lookup_type: 4,
            subtables: vec![LookupSubTable::LigatureSubstFormat1 {
                ligature_sets: vec![LigatureSetTable {
                    first_glyph: 10,
                    ligatures: vec![LigatureTable {
                        ligature_glyph: 99,
                        component_glyph_ids: vec![11],
                    }],
                }],
            }],
        }]);
        let data = extract_gsub_data(&scripts, &features, &lookups);
        let map = data.feature("liga").unwrap();
        assert_eq!(map.get(&[10, 11]), Some(99));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn overlapping_ligatures_last_write_wins_with_conflict() {
        let (scripts, features, lookups) = liga_feature_font(vec![LookupTable {
            lookup_type: 4,
            subtables: vec![LookupSubTable::LigatureSubstFormat1 {
                ligature_sets: vec![LigatureSetTable {
                    first_glyph: 10,
                    ligatures: vec![
                        LigatureTable {
                            ligature_glyph: 99,
                            component_glyph_ids: vec![11],
                        },
                        LigatureTable {
                            ligature_glyph: 100,
                            component_glyph_ids: vec![11],
                        },
                    ],
                }],
            }],
        }]);
        let data = extract_gsub_data(&scripts, &features, &lookups);
        let map = data.feature("liga").unwrap();
        assert_eq!(map.get(&[10, 11]), Some(100));
        assert_eq!(map.len(), 1);
        assert_eq!(map.conflicts(), 1);
    }

    #[test]
    fn out_of_range_feature_and_lookup_indices_are_skipped() {
        let scripts = ScriptListTable {
            records: vec![(
                "latn".to_string(),
                ScriptTable {
                    default_lang_sys: Some(LangSysTable {
                        required_feature_index: None,
                        feature_indices: vec![0, 7],
                    }),
                    lang_sys_tables: Vec::new(),
                },
            )],
        };
        let features = FeatureListTable {
            feature_records: vec![FeatureRecord {
                feature_tag: "liga".to_string(),
                feature_table: FeatureTable {
                    lookup_indices: vec![0, 42],
                },
            }],
        };
        let lookups = LookupListTable {
            lookups: vec![LookupTable {
                lookup_type: 1,
                subtables: vec![LookupSubTable::SingleSubstFormat1 {
                    coverage: CoverageTable::new(vec![1]),
                    delta_glyph_id: 1,
                }],
            }],
        };
        let data = extract_gsub_data(&scripts, &features, &lookups);
        let map = data.feature("liga").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&[1]), Some(2));
    }

    #[test]
    fn unsupported_subtable_kind_is_skipped() {
        let (scripts, features, lookups) = liga_feature_font(vec![LookupTable {
            lookup_type: 6,
            subtables: vec![LookupSubTable::Unsupported { lookup_type: 6 }],
        }]);
        let data = extract_gsub_data(&scripts, &features, &lookups);
        assert_eq!(data.feature("liga").unwrap().len(), 0);
    }

    #[test]
    fn script_probe_prefers_earlier_language() {
        // Both Bengali and Latin scripts present: Bengali probes first.
        let scripts = ScriptListTable {
            records: vec![
                ("latn".to_string(), ScriptTable::default()),
                ("beng".to_string(), ScriptTable::default()),
            ],
        };
        let data = extract_gsub_data(
            &scripts,
            &FeatureListTable::default(),
            &LookupListTable::default(),
        );
        match data {
            GsubData::Extracted {
                language,
                script_tag,
                ..
            } => {
                assert_eq!(language, Language::Bengali);
                assert_eq!(script_tag, "beng");
            }
            GsubData::NoDataFound => panic!("expected extracted data"),
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let (scripts, features, lookups) = liga_feature_font(vec![LookupTable {
            lookup_type: 1,
            subtables: vec![LookupSubTable::SingleSubstFormat1 {
                coverage: CoverageTable::new(vec![3, 1, 2]),
                delta_glyph_id: 10,
            }],
        }]);
        let first = extract_gsub_data(&scripts, &features, &lookups);
        let second = extract_gsub_data(&scripts, &features, &lookups);
        assert_eq!(first, second);

        // Insertion order is the coverage order, not sorted.
        let keys: Vec<Vec<u16>> = first
            .feature("liga")
            .unwrap()
            .iter()
            .map(|(k, _)| k.to_vec())
            .collect();
        assert_eq!(keys, vec![vec![3], vec![1], vec![2]]);
    }

    #[test]
    fn named_lang_sys_tables_processed_after_default() {
        let scripts = ScriptListTable {
            records: vec![(
                "latn".to_string(),
                ScriptTable {
                    default_lang_sys: Some(LangSysTable {
                        required_feature_index: None,
                        feature_indices: vec![0],
                    }),
                    lang_sys_tables: vec![(
                        "TRK ".to_string(),
                        LangSysTable {
                            required_feature_index: None,
                            feature_indices: vec![1],
                        },
                    )],
                },
            )],
        };
        let features = FeatureListTable {
            feature_records: vec![
                FeatureRecord {
                    feature_tag: "liga".to_string(),
                    feature_table: FeatureTable {
                        lookup_indices: vec![0],
                    },
                },
                FeatureRecord {
                    feature_tag: "ccmp".to_string(),
                    feature_table: FeatureTable {
                        lookup_indices: vec![0],
                    },
                },
            ],
        };
        let lookups = LookupListTable {
            lookups: vec![LookupTable {
                lookup_type: 1,
                subtables: vec![LookupSubTable::SingleSubstFormat1 {
                    coverage: CoverageTable::new(vec![1]),
                    delta_glyph_id: 1,
                }],
            }],
        };
        let data = extract_gsub_data(&scripts, &features, &lookups);
        match &data {
            GsubData::Extracted { features, .. } => {
                let tags: Vec<&str> = features.iter().map(|(t, _)| t.as_str()).collect();
                assert_eq!(tags, vec!["liga", "ccmp"]);
            }
            GsubData::NoDataFound => panic!("expected extracted data"),
        }
    }
}
