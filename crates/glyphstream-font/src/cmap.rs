//! Cmap subtable selection and code → GID resolution.
//!
//! A TrueType font carries several cmap subtables tagged by platform and
//! encoding ID. The resolver scans them exactly once, picks at most one
//! subtable per role (Windows-Unicode, Windows-Symbol, Mac-Roman), and
//! answers `code_to_gid` queries under the symbolic/non-symbolic policy.
//! Unresolved codes map to GID 0 (`.notdef`) — a missing glyph is an
//! expected condition, handled by drawing nothing.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::debug;

use crate::encoding::{Encoding, glyph_name_to_unicode, mac_os_roman_code};

/// Unicode platform ID.
pub const PLATFORM_UNICODE: u16 = 0;
/// Macintosh platform ID.
pub const PLATFORM_MACINTOSH: u16 = 1;
/// Windows platform ID.
pub const PLATFORM_WINDOWS: u16 = 3;

/// Windows Symbol encoding (platform 3).
pub const ENCODING_WIN_SYMBOL: u16 = 0;
/// Windows Unicode BMP encoding (platform 3).
pub const ENCODING_WIN_UNICODE_BMP: u16 = 1;
/// Mac Roman encoding (platform 1).
pub const ENCODING_MAC_ROMAN: u16 = 0;
/// Unicode 1.0 encoding (platform 0).
pub const ENCODING_UNICODE_1_0: u16 = 0;
/// Unicode 2.0 BMP encoding (platform 0).
pub const ENCODING_UNICODE_2_0_BMP: u16 = 3;

const START_RANGE_F000: u32 = 0xF000;
const START_RANGE_F100: u32 = 0xF100;
const START_RANGE_F200: u32 = 0xF200;

/// A parsed cmap subtable: a character-code → GID view tagged with its
/// platform and encoding IDs. Supplied by the font collaborator.
#[derive(Debug, Clone)]
pub struct CmapSubtable {
    /// Platform ID from the cmap encoding record.
    pub platform_id: u16,
    /// Platform-specific encoding ID.
    pub encoding_id: u16,
    map: HashMap<u32, u16>,
}

impl CmapSubtable {
    /// Build a subtable view from `(code, gid)` pairs.
    pub fn new(
        platform_id: u16,
        encoding_id: u16,
        entries: impl IntoIterator<Item = (u32, u16)>,
    ) -> Self {
        Self {
            platform_id,
            encoding_id,
            map: entries.into_iter().collect(),
        }
    }

    /// The GID for a character code, 0 when unmapped.
    pub fn glyph_id(&self, code: u32) -> u16 {
        self.map.get(&code).copied().unwrap_or(0)
    }
}

/// The raw TrueType surface the resolver consults: cmap subtable
/// enumeration plus the 'post' name table and metrics. Implemented by the
/// host's font loader; this crate never parses font binaries itself.
pub trait GlyphTable {
    /// All cmap subtables, in font order.
    fn cmap_subtables(&self) -> &[CmapSubtable];

    /// GID for a PostScript glyph name ('post' table), 0 when absent.
    fn name_to_gid(&self, name: &str) -> u16;

    /// Design units per em.
    fn units_per_em(&self) -> u16;

    /// Advance width for a glyph, in design units.
    fn advance_width(&self, gid: u16) -> f64;
}

impl<G: GlyphTable + ?Sized> GlyphTable for &G {
    fn cmap_subtables(&self) -> &[CmapSubtable] {
        (**self).cmap_subtables()
    }

    fn name_to_gid(&self, name: &str) -> u16 {
        (**self).name_to_gid(name)
    }

    fn units_per_em(&self) -> u16 {
        (**self).units_per_em()
    }

    fn advance_width(&self, gid: u16) -> f64 {
        (**self).advance_width(gid)
    }
}

/// The roles a cmap subtable can be selected for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CmapSelection {
    /// (3,1), (0,0) or (0,3) subtable index.
    pub win_unicode: Option<usize>,
    /// (3,0) subtable index.
    pub win_symbol: Option<usize>,
    /// (1,0) subtable index.
    pub mac_roman: Option<usize>,
}

impl CmapSelection {
    /// Scan the subtables and assign roles. The scan never short-circuits,
    /// so when several subtables suit a role the last one wins.
    pub fn select(subtables: &[CmapSubtable]) -> Self {
        let mut selection = CmapSelection::default();
        for (i, cmap) in subtables.iter().enumerate() {
            match (cmap.platform_id, cmap.encoding_id) {
                (PLATFORM_WINDOWS, ENCODING_WIN_UNICODE_BMP) => selection.win_unicode = Some(i),
                (PLATFORM_WINDOWS, ENCODING_WIN_SYMBOL) => selection.win_symbol = Some(i),
                (PLATFORM_MACINTOSH, ENCODING_MAC_ROMAN) => selection.mac_roman = Some(i),
                // Unicode-platform subtables serve the same role as (3,1);
                // some symbol-flagged fonts carry only these.
                (PLATFORM_UNICODE, ENCODING_UNICODE_1_0) => selection.win_unicode = Some(i),
                (PLATFORM_UNICODE, ENCODING_UNICODE_2_0_BMP) => selection.win_unicode = Some(i),
                _ => {}
            }
        }
        selection
    }
}

/// Resolves character codes to glyph IDs for one font instance.
///
/// The subtable selection is computed on first use and cached; it never
/// changes afterwards, so a resolver can be consulted repeatedly (or
/// shared read-only) without rescanning the cmap.
pub struct GidResolver<T: GlyphTable> {
    glyphs: T,
    selection: OnceLock<CmapSelection>,
}

impl<T: GlyphTable> GidResolver<T> {
    /// Create a resolver over a font's glyph tables.
    pub fn new(glyphs: T) -> Self {
        Self {
            glyphs,
            selection: OnceLock::new(),
        }
    }

    /// The underlying glyph tables.
    pub fn glyphs(&self) -> &T {
        &self.glyphs
    }

    fn selection(&self) -> &CmapSelection {
        self.selection
            .get_or_init(|| CmapSelection::select(self.glyphs.cmap_subtables()))
    }

    fn win_unicode(&self) -> Option<&CmapSubtable> {
        self.selection()
            .win_unicode
            .map(|i| &self.glyphs.cmap_subtables()[i])
    }

    fn win_symbol(&self) -> Option<&CmapSubtable> {
        self.selection()
            .win_symbol
            .map(|i| &self.glyphs.cmap_subtables()[i])
    }

    fn mac_roman(&self) -> Option<&CmapSubtable> {
        self.selection()
            .mac_roman
            .map(|i| &self.glyphs.cmap_subtables()[i])
    }

    /// Resolve a character code to a GID under the given encoding and
    /// symbolic policy. Returns 0 (`.notdef`) when nothing matches.
    pub fn code_to_gid(&self, code: u32, encoding: &Encoding, symbolic: bool) -> u16 {
        if symbolic {
            self.symbolic_code_to_gid(code, encoding)
        } else {
            self.nonsymbolic_code_to_gid(code, encoding)
        }
    }

    fn nonsymbolic_code_to_gid(&self, code: u32, encoding: &Encoding) -> u16 {
        let name = match u8::try_from(code) {
            Ok(byte) => encoding.name(byte).to_string(),
            Err(_) => return 0,
        };
        if name == ".notdef" {
            return 0;
        }

        let mut gid = 0;

        // (3, 1) - (Windows, Unicode)
        if let Some(cmap) = self.win_unicode() {
            if let Some(unicode) = glyph_name_to_unicode(&name) {
                gid = cmap.glyph_id(unicode as u32);
            }
        }

        // (1, 0) - (Macintosh, Roman)
        if gid == 0 {
            if let (Some(cmap), Some(mac_code)) = (self.mac_roman(), mac_os_roman_code(&name)) {
                gid = cmap.glyph_id(u32::from(mac_code));
            }
        }

        // 'post' table
        if gid == 0 {
            gid = self.glyphs.name_to_gid(&name);
        }

        gid
    }

    fn symbolic_code_to_gid(&self, code: u32, encoding: &Encoding) -> u16 {
        let mut gid = 0;

        if let Some(cmap) = self.win_unicode() {
            if encoding.is_standard_windows_or_mac() {
                // Fallback for fonts that carry the symbol flag but aren't
                // really symbolic: resolve through the declared encoding.
                let name = match u8::try_from(code) {
                    Ok(byte) => encoding.name(byte),
                    Err(_) => ".notdef",
                };
                if name == ".notdef" {
                    return 0;
                }
                if let Some(unicode) = glyph_name_to_unicode(name) {
                    gid = cmap.glyph_id(unicode as u32);
                }
            } else {
                gid = cmap.glyph_id(code);
            }
        }

        // (3, 0) - (Windows, Symbol)
        if gid == 0 {
            if let Some(cmap) = self.win_symbol() {
                gid = cmap.glyph_id(code);
                if code <= 0xFF {
                    // The subtable may map the code into one of the
                    // F000/F100/F200 ranges; retry with the high byte added.
                    if gid == 0 {
                        gid = cmap.glyph_id(code + START_RANGE_F000);
                    }
                    if gid == 0 {
                        gid = cmap.glyph_id(code + START_RANGE_F100);
                    }
                    if gid == 0 {
                        gid = cmap.glyph_id(code + START_RANGE_F200);
                    }
                }
            }
        }

        // (1, 0) - (Mac, Roman)
        if gid == 0 {
            if let Some(cmap) = self.mac_roman() {
                gid = cmap.glyph_id(code);
            }
        }

        if gid == 0 {
            debug!("no glyph for code {code} in any selected cmap subtable");
        }
        gid
    }
}
