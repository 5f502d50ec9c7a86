//! The font surface the engine consumes.
//!
//! [`PageFont`] is the abstraction text operators talk to: code decoding,
//! advance widths and displacement vectors, descriptor metrics, and
//! Unicode mapping. [`TrueTypeSimpleFont`] is the concrete simple-font
//! implementation, wiring a TrueType glyph table through the cmap
//! resolution policy of `glyphstream-font`.

use glyphstream_font::cmap::{GidResolver, GlyphTable};
use glyphstream_font::descriptor::FontFlags;
use glyphstream_font::encoding::Encoding;

use crate::matrix::{Matrix, Point};

/// A font bounding box in glyph space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub lower_left_x: f64,
    pub lower_left_y: f64,
    pub upper_right_x: f64,
    pub upper_right_y: f64,
}

impl BoundingBox {
    /// Create a bounding box from its corners.
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self {
            lower_left_x: llx,
            lower_left_y: lly,
            upper_right_x: urx,
            upper_right_y: ury,
        }
    }

    /// Height of the box.
    pub fn height(&self) -> f64 {
        self.upper_right_y - self.lower_left_y
    }
}

/// One character code decoded from a shown string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeToken {
    /// The character code.
    pub code: u32,
    /// How many string bytes produced it (1 for simple fonts).
    pub byte_count: usize,
}

/// Descriptor metrics a font reports to the positioning heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DescriptorMetrics {
    /// Font bounding box in glyph space.
    pub bounding_box: BoundingBox,
    /// Cap height, 0 when not declared.
    pub cap_height: f64,
    /// Ascent, 0 when not declared.
    pub ascent: f64,
    /// Descent (negative below the baseline), 0 when not declared.
    pub descent: f64,
    /// Width substituted for codes outside the /Widths array.
    pub missing_width: f64,
}

/// The font object abstraction consumed by text-showing operators.
///
/// Widths and displacements are in glyph space normalized to 1000 units
/// per em; `displacement` is pre-divided by 1000 into text space the way
/// the showing loop expects.
pub trait PageFont {
    /// The resource or base font name.
    fn name(&self) -> &str;

    /// Decode a shown string into character codes. Simple fonts consume
    /// one byte per code; composite fonts two.
    fn codes(&self, bytes: &[u8]) -> Vec<CodeToken> {
        if self.is_composite() {
            let mut tokens = Vec::with_capacity(bytes.len().div_ceil(2));
            let mut iter = bytes.chunks_exact(2);
            for pair in &mut iter {
                tokens.push(CodeToken {
                    code: u32::from(pair[0]) << 8 | u32::from(pair[1]),
                    byte_count: 2,
                });
            }
            if let [last] = iter.remainder() {
                tokens.push(CodeToken {
                    code: u32::from(*last),
                    byte_count: 1,
                });
            }
            tokens
        } else {
            bytes
                .iter()
                .map(|&b| CodeToken {
                    code: u32::from(b),
                    byte_count: 1,
                })
                .collect()
        }
    }

    /// Advance width of a code in glyph space (1000/em units).
    fn advance_width(&self, code: u32) -> f64;

    /// Displacement vector of a code in text space (already ÷1000).
    fn displacement(&self, code: u32) -> Point {
        Point::new(self.advance_width(code) / 1000.0, 0.0)
    }

    /// Width of the space glyph in glyph space, 0 when unknown.
    fn space_width(&self) -> f64 {
        self.advance_width(32)
    }

    /// Average glyph width in glyph space, 0 when unknown.
    fn average_width(&self) -> f64 {
        0.0
    }

    /// Descriptor metrics.
    fn metrics(&self) -> DescriptorMetrics;

    /// The font matrix mapping glyph space to text space. Only Type 3
    /// fonts carry a non-standard one.
    fn font_matrix(&self) -> Matrix {
        Matrix::new(0.001, 0.0, 0.0, 0.001, 0.0, 0.0)
    }

    /// Design units per em of the underlying font program.
    fn units_per_em(&self) -> f64 {
        1000.0
    }

    /// Whether the font uses vertical writing mode.
    fn is_vertical(&self) -> bool {
        false
    }

    /// Whether this is a composite (Type 0) font.
    fn is_composite(&self) -> bool {
        false
    }

    /// Whether this is a Type 3 font.
    fn is_type3(&self) -> bool {
        false
    }

    /// Unicode text for a code, `None` when no mapping exists.
    fn to_unicode(&self, code: u32) -> Option<String>;
}

/// A simple (single-byte) font backed by a TrueType glyph table.
pub struct TrueTypeSimpleFont<T: GlyphTable> {
    name: String,
    resolver: GidResolver<T>,
    encoding: Encoding,
    flags: FontFlags,
    first_char: u32,
    widths: Vec<f64>,
    metrics: DescriptorMetrics,
}

impl<T: GlyphTable> TrueTypeSimpleFont<T> {
    /// Create a simple font over a glyph table.
    pub fn new(
        name: impl Into<String>,
        glyphs: T,
        encoding: Encoding,
        flags: FontFlags,
        first_char: u32,
        widths: Vec<f64>,
        metrics: DescriptorMetrics,
    ) -> Self {
        Self {
            name: name.into(),
            resolver: GidResolver::new(glyphs),
            encoding,
            flags,
            first_char,
            widths,
            metrics,
        }
    }

    /// Whether glyph lookups use the symbolic policy. Fonts that declare
    /// neither flag are treated as symbolic, matching TrueType practice.
    pub fn is_symbolic(&self) -> bool {
        self.flags.symbolic().unwrap_or(true)
    }

    /// Resolve a character code to a glyph index.
    pub fn code_to_gid(&self, code: u32) -> u16 {
        self.resolver
            .code_to_gid(code, &self.encoding, self.is_symbolic())
    }

    /// Width declared in the /Widths array, when present.
    fn declared_width(&self, code: u32) -> Option<f64> {
        let index = code.checked_sub(self.first_char)? as usize;
        self.widths.get(index).copied()
    }
}

impl<T: GlyphTable> PageFont for TrueTypeSimpleFont<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn advance_width(&self, code: u32) -> f64 {
        if let Some(width) = self.declared_width(code) {
            return width;
        }
        if self.metrics.missing_width > 0.0 {
            return self.metrics.missing_width;
        }
        // Fall back to the font program, normalized to 1000 units per em.
        let gid = self.code_to_gid(code);
        let glyphs = self.resolver.glyphs();
        let upem = f64::from(glyphs.units_per_em());
        let mut width = glyphs.advance_width(gid);
        if upem != 1000.0 {
            width *= 1000.0 / upem;
        }
        width
    }

    fn average_width(&self) -> f64 {
        let declared: Vec<f64> = self.widths.iter().copied().filter(|w| *w > 0.0).collect();
        if declared.is_empty() {
            0.0
        } else {
            declared.iter().sum::<f64>() / declared.len() as f64
        }
    }

    fn metrics(&self) -> DescriptorMetrics {
        self.metrics
    }

    fn units_per_em(&self) -> f64 {
        f64::from(self.resolver.glyphs().units_per_em())
    }

    fn to_unicode(&self, code: u32) -> Option<String> {
        let byte = u8::try_from(code).ok()?;
        self.encoding.unicode(byte).map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyphstream_font::cmap::{
        CmapSubtable, ENCODING_WIN_UNICODE_BMP, PLATFORM_WINDOWS,
    };
    use std::collections::HashMap;

    struct TestGlyphs {
        cmaps: Vec<CmapSubtable>,
        widths: HashMap<u16, f64>,
        upem: u16,
    }

    impl GlyphTable for TestGlyphs {
        fn cmap_subtables(&self) -> &[CmapSubtable] {
            &self.cmaps
        }

        fn name_to_gid(&self, _name: &str) -> u16 {
            0
        }

        fn units_per_em(&self) -> u16 {
            self.upem
        }

        fn advance_width(&self, gid: u16) -> f64 {
            self.widths.get(&gid).copied().unwrap_or(0.0)
        }
    }

    fn test_font(upem: u16) -> TrueTypeSimpleFont<TestGlyphs> {
        let glyphs = TestGlyphs {
            cmaps: vec![CmapSubtable::new(
                PLATFORM_WINDOWS,
                ENCODING_WIN_UNICODE_BMP,
                [('A' as u32, 3u16)],
            )],
            widths: HashMap::from([(3u16, 1200.0)]),
            upem,
        };
        TrueTypeSimpleFont::new(
            "TestFont",
            glyphs,
            Encoding::WinAnsi,
            FontFlags::NONSYMBOLIC,
            65,
            vec![500.0],
            DescriptorMetrics::default(),
        )
    }

    #[test]
    fn declared_width_takes_priority() {
        let font = test_font(1000);
        assert_eq!(font.advance_width(65), 500.0);
    }

    #[test]
    fn missing_width_falls_back_to_font_program() {
        let font = test_font(1000);
        // Code 66 is past the widths array; GID 0 has no width either.
        assert_eq!(font.advance_width(66), 0.0);
    }

    #[test]
    fn font_program_width_rescaled_by_upem() {
        let mut font = test_font(2048);
        font.widths.clear();
        // 'A' → GID 3 → 1200 design units → ×1000/2048.
        let width = font.advance_width(65);
        assert!((width - 1200.0 * 1000.0 / 2048.0).abs() < 1e-9);
    }

    #[test]
    fn displacement_is_width_over_1000() {
        let font = test_font(1000);
        let d = font.displacement(65);
        assert_eq!(d, Point::new(0.5, 0.0));
    }

    #[test]
    fn simple_codes_are_single_bytes() {
        let font = test_font(1000);
        let tokens = font.codes(b"AB");
        assert_eq!(
            tokens,
            vec![
                CodeToken {
                    code: 65,
                    byte_count: 1
                },
                CodeToken {
                    code: 66,
                    byte_count: 1
                },
            ]
        );
    }

    #[test]
    fn to_unicode_through_encoding() {
        let font = test_font(1000);
        assert_eq!(font.to_unicode(65).as_deref(), Some("A"));
        assert_eq!(font.to_unicode(0), None);
    }

    #[test]
    fn symbolic_default_when_flags_silent() {
        let glyphs = TestGlyphs {
            cmaps: Vec::new(),
            widths: HashMap::new(),
            upem: 1000,
        };
        let font = TrueTypeSimpleFont::new(
            "NoFlags",
            glyphs,
            Encoding::WinAnsi,
            FontFlags::empty(),
            0,
            Vec::new(),
            DescriptorMetrics::default(),
        );
        assert!(font.is_symbolic());
    }

    #[test]
    fn average_width_ignores_zero_entries() {
        let mut font = test_font(1000);
        font.widths = vec![400.0, 0.0, 600.0];
        assert_eq!(font.average_width(), 500.0);
    }

    struct CompositeStub;

    impl PageFont for CompositeStub {
        fn name(&self) -> &str {
            "Composite"
        }

        fn advance_width(&self, _code: u32) -> f64 {
            1000.0
        }

        fn metrics(&self) -> DescriptorMetrics {
            DescriptorMetrics::default()
        }

        fn is_composite(&self) -> bool {
            true
        }

        fn to_unicode(&self, _code: u32) -> Option<String> {
            None
        }
    }

    #[test]
    fn composite_codes_are_two_bytes_big_endian() {
        let font = CompositeStub;
        let tokens = font.codes(&[0x01, 0x41, 0x00, 0x20, 0x7F]);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].code, 0x0141);
        assert_eq!(tokens[1].code, 0x0020);
        assert_eq!(tokens[1].byte_count, 2);
        // Odd trailing byte decodes as a single-byte code.
        assert_eq!(tokens[2].code, 0x7F);
        assert_eq!(tokens[2].byte_count, 1);
    }
}
