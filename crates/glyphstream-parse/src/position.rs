//! Legacy glyph positioning.
//!
//! Reproduces the text-extraction positioning heuristic exactly as
//! downstream consumers depend on it, numeric quirks included: the glyph
//! displacement excludes character and word spacing, vertical fonts
//! re-derive their displacement from the advance width, and the cached
//! per-font height prefers half the bounding box with cap-height and
//! ascent/descent overrides. Do not "fix" these calculations — sorting
//! and word-grouping downstream are calibrated against them.

use std::collections::HashMap;

use crate::fonts::PageFont;
use crate::matrix::{Matrix, Point};
use crate::sink::TextPosition;
use crate::state::TextState;

/// Page geometry the positioner needs: rotation, crop-box size and origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageMetrics {
    /// Page rotation in degrees.
    pub rotation: i32,
    /// Crop-box width.
    pub width: f64,
    /// Crop-box height.
    pub height: f64,
    /// Crop-box lower-left x.
    pub lower_left_x: f64,
    /// Crop-box lower-left y.
    pub lower_left_y: f64,
}

/// Computes [`TextPosition`]s for shown glyphs, caching per-font heights.
pub struct GlyphPositioner {
    page: PageMetrics,
    translate: Option<Matrix>,
    font_heights: HashMap<String, f64>,
}

impl GlyphPositioner {
    /// Create a positioner for one page.
    pub fn new(page: PageMetrics) -> Self {
        let translate = if page.lower_left_x == 0.0 && page.lower_left_y == 0.0 {
            None
        } else {
            Some(Matrix::translation(-page.lower_left_x, -page.lower_left_y))
        };
        Self {
            page,
            translate,
            font_heights: HashMap::new(),
        }
    }

    /// Compute the text position for one shown glyph.
    ///
    /// Returns `None` when the glyph produces no output: composite-font
    /// codes with no Unicode mapping are skipped rather than guessed.
    #[allow(clippy::too_many_arguments)]
    pub fn show_glyph(
        &mut self,
        text_rendering_matrix: &Matrix,
        text_matrix: &Matrix,
        ctm: &Matrix,
        text: &TextState,
        font: &dyn PageFont,
        code: u32,
        displacement: Point,
    ) -> Option<TextPosition> {
        let font_size = text.font_size;
        let horizontal_scaling = text.horizontal_scaling_fraction();

        // The sorting downstream keys off glyph width; vertical fonts
        // don't carry a usable x displacement, so derive one from the
        // advance width, rescaled when the em square is not 1000.
        let mut displacement_x = displacement.x;
        if font.is_vertical() {
            displacement_x = font.advance_width(code) / 1000.0;
            let upem = font.units_per_em();
            if upem != 1000.0 {
                displacement_x *= 1000.0 / upem;
            }
        }

        // Combined displacement without character/word spacing.
        let tx = displacement_x * font_size * horizontal_scaling;
        let ty = displacement.y * font_size;

        let td = Matrix::translation(tx, ty);
        let next = td.concat(text_matrix).concat(ctm);
        let mut next_x = next.translate_x();
        let mut next_y = next.translate_y();

        let dx_display = next_x - text_rendering_matrix.translate_x();
        let font_height = self.font_height(font);
        let dy_display = font_height * text_rendering_matrix.scaling_factor_y();

        // Character sizes are in glyph units, positions in text units;
        // the output is in display units.
        let glyph_space_to_text = if font.is_type3() {
            font.font_matrix().a
        } else {
            1.0 / 1000.0
        };

        let mut space_width_text = font.space_width() * glyph_space_to_text;
        if space_width_text == 0.0 {
            // The average width runs high for this purpose.
            space_width_text = font.average_width() * glyph_space_to_text * 0.80;
        }
        if space_width_text == 0.0 {
            space_width_text = 1.0;
        }
        let space_width_display = space_width_text * text_rendering_matrix.scaling_factor_x();

        let unicode = match font.to_unicode(code) {
            Some(text) => text,
            None if font.is_composite() => {
                // Composite codes without a mapping are skipped entirely.
                return None;
            }
            None => {
                // Coerce the raw code, the way viewers render unmapped
                // simple-font codes.
                char::from_u32(code).unwrap_or('\u{FFFD}').to_string()
            }
        };

        let translated_matrix = match &self.translate {
            None => *text_rendering_matrix,
            Some(translate) => {
                next_x -= self.page.lower_left_x;
                next_y -= self.page.lower_left_y;
                text_rendering_matrix.concat(translate)
            }
        };

        Some(TextPosition {
            page_rotation: self.page.rotation,
            page_width: self.page.width,
            page_height: self.page.height,
            text_matrix: translated_matrix,
            end_x: next_x,
            end_y: next_y,
            height: dy_display.abs(),
            width: dx_display,
            width_of_space: space_width_display.abs(),
            unicode,
            char_codes: vec![code],
            font_name: font.name().to_string(),
            font_size,
            font_size_in_pt: (font_size * text_matrix.scaling_factor_x()) as i32,
        })
    }

    /// The cached font height, computing it on first use.
    fn font_height(&mut self, font: &dyn PageFont) -> f64 {
        if let Some(&height) = self.font_heights.get(font.name()) {
            return height;
        }
        let height = compute_font_height(font);
        self.font_heights.insert(font.name().to_string(), height);
        height
    }
}

/// The per-font height used for glyph bounding boxes.
fn compute_font_height(font: &dyn PageFont) -> f64 {
    let metrics = font.metrics();
    let mut lower_left_y = metrics.bounding_box.lower_left_y;
    // Some generators write the lower-left y as a large negative value
    // one 65536 period off; fold it back.
    if lower_left_y < f64::from(i16::MIN) {
        lower_left_y = -(lower_left_y + 65536.0);
    }

    let mut glyph_height = (metrics.bounding_box.upper_right_y - lower_left_y) / 2.0;

    // The bbox can be wild while CapHeight is fine.
    let cap_height = metrics.cap_height;
    if cap_height != 0.0 && (cap_height < glyph_height || glyph_height == 0.0) {
        glyph_height = cap_height;
    }

    // And CapHeight itself can be wild while Ascent/Descent are fine.
    let ascent = metrics.ascent;
    let descent = metrics.descent;
    if cap_height > ascent
        && ascent > 0.0
        && descent < 0.0
        && ((ascent - descent) / 2.0 < glyph_height || glyph_height == 0.0)
    {
        glyph_height = (ascent - descent) / 2.0;
    }

    if font.is_type3() {
        font.font_matrix()
            .transform(Point::new(0.0, glyph_height))
            .y
    } else {
        glyph_height / 1000.0
    }
}
