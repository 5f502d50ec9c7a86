//! Font descriptor flag word.

use bitflags::bitflags;

bitflags! {
    /// The /Flags word of a font descriptor (PDF 32000-1, table 123).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FontFlags: u32 {
        /// All glyphs have the same width.
        const FIXED_PITCH = 1 << 0;
        /// Glyphs have serifs.
        const SERIF = 1 << 1;
        /// Font contains glyphs outside the Adobe standard Latin set.
        const SYMBOLIC = 1 << 2;
        /// Glyphs resemble cursive handwriting.
        const SCRIPT = 1 << 3;
        /// Font uses the Adobe standard Latin character set.
        const NONSYMBOLIC = 1 << 5;
        /// Glyphs are slanted.
        const ITALIC = 1 << 6;
        /// No lowercase letters; lowercase maps to uppercase glyphs.
        const ALL_CAP = 1 << 16;
        /// Lowercase glyphs are small capitals.
        const SMALL_CAP = 1 << 17;
        /// Bold rendering forced at small sizes.
        const FORCE_BOLD = 1 << 18;
    }
}

impl FontFlags {
    /// The symbolic/non-symbolic policy: symbolic wins when both bits are
    /// set (fonts in the wild do declare contradictory flags), `None` when
    /// neither is set so the caller can apply its own default.
    pub fn symbolic(&self) -> Option<bool> {
        if self.contains(FontFlags::SYMBOLIC) {
            Some(true)
        } else if self.contains(FontFlags::NONSYMBOLIC) {
            Some(false)
        } else {
            None
        }
    }
}
