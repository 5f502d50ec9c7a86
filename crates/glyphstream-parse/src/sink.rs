//! Content sink callback trait.
//!
//! The engine calls these methods as it consumes a content stream:
//! path geometry in device space, paint and clip operations, image
//! placements, marked-content boundaries, glyph text positions, and
//! non-fatal warnings. All methods default to no-ops so a sink can
//! subscribe to just the events it cares about.

use crate::error::EngineWarning;
use crate::matrix::{Matrix, Point};
use crate::tokenizer::InlineImage;

/// Winding rule for fill and clip operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    /// Nonzero winding number rule.
    NonZero,
    /// Even-odd rule.
    EvenOdd,
}

/// One positioned glyph, as computed by the legacy positioning heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPosition {
    /// Page rotation in degrees.
    pub page_rotation: i32,
    /// Page width in default user space units.
    pub page_width: f64,
    /// Page height in default user space units.
    pub page_height: f64,
    /// The text rendering matrix at the moment of showing, adjusted for
    /// the crop-box origin.
    pub text_matrix: Matrix,
    /// Device x of the position after this glyph.
    pub end_x: f64,
    /// Device y of the position after this glyph.
    pub end_y: f64,
    /// Glyph height in display units (always non-negative).
    pub height: f64,
    /// Glyph advance in display units.
    pub width: f64,
    /// The width of a space in display units (always non-negative).
    pub width_of_space: f64,
    /// Decoded Unicode text for this glyph.
    pub unicode: String,
    /// The raw character codes that produced this glyph.
    pub char_codes: Vec<u32>,
    /// Resource name of the font.
    pub font_name: String,
    /// Font size in text space units.
    pub font_size: f64,
    /// Font size in points, rounded (size × text-matrix x-scale).
    pub font_size_in_pt: i32,
}

/// A placed XObject image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    /// Resource name, e.g. `Im0`.
    pub name: String,
    /// CTM at placement time; determines position and extent.
    pub ctm: Matrix,
    /// Pixel width, when known.
    pub width: Option<i64>,
    /// Pixel height, when known.
    pub height: Option<i64>,
}

/// Callback handler for content stream interpretation.
pub trait ContentSink {
    /// Begin a new subpath at a device-space point.
    fn move_to(&mut self, _p: Point) {}

    /// Straight segment to a device-space point.
    fn line_to(&mut self, _p: Point) {}

    /// Cubic Bézier segment with two device-space control points.
    fn curve_to(&mut self, _c1: Point, _c2: Point, _p: Point) {}

    /// Close the current subpath.
    fn close_path(&mut self) {}

    /// Append a rectangle given its four device-space corners.
    fn append_rectangle(&mut self, _p0: Point, _p1: Point, _p2: Point, _p3: Point) {}

    /// Fill the current path.
    fn fill_path(&mut self, _rule: FillRule) {}

    /// Stroke the current path.
    fn stroke_path(&mut self) {}

    /// Fill then stroke the current path.
    fn fill_and_stroke_path(&mut self, _rule: FillRule) {}

    /// End the path without painting (`n`).
    fn end_path(&mut self) {}

    /// Intersect the clipping path with the current path.
    fn clip(&mut self, _rule: FillRule) {}

    /// A shading fill (`sh`).
    fn shading_fill(&mut self, _name: &str) {}

    /// An inline image (`BI`/`ID`/`EI`).
    fn inline_image(&mut self, _image: &InlineImage) {}

    /// An image XObject placed by `Do`.
    fn draw_image(&mut self, _placement: ImagePlacement) {}

    /// A glyph shown by a text operator.
    fn show_text_position(&mut self, _position: TextPosition) {}

    /// A marked-content point (`MP`/`DP`).
    fn marked_content_point(&mut self, _tag: &str, _mcid: Option<i64>) {}

    /// Start of a marked-content sequence (`BMC`/`BDC`).
    fn begin_marked_content(&mut self, _tag: &str, _mcid: Option<i64>) {}

    /// End of a marked-content sequence (`EMC`).
    fn end_marked_content(&mut self) {}

    /// A non-fatal diagnostic; the engine continues with degraded output.
    fn on_warning(&mut self, _warning: EngineWarning) {}
}

/// A sink that ignores every event.
pub struct NoopSink;

impl ContentSink for NoopSink {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;

    #[derive(Default)]
    struct CollectingSink {
        moves: Vec<Point>,
        fills: Vec<FillRule>,
        warnings: Vec<EngineWarning>,
    }

    impl ContentSink for CollectingSink {
        fn move_to(&mut self, p: Point) {
            self.moves.push(p);
        }

        fn fill_path(&mut self, rule: FillRule) {
            self.fills.push(rule);
        }

        fn on_warning(&mut self, warning: EngineWarning) {
            self.warnings.push(warning);
        }
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let mut sink = NoopSink;
        sink.move_to(Point::new(1.0, 2.0));
        sink.fill_path(FillRule::EvenOdd);
        sink.end_marked_content();
        sink.on_warning(EngineWarning::new(WarningKind::OperatorSkipped, "x"));
    }

    #[test]
    fn collecting_sink_receives_events() {
        let mut sink = CollectingSink::default();
        sink.move_to(Point::new(5.0, 6.0));
        sink.fill_path(FillRule::NonZero);
        sink.on_warning(EngineWarning::new(WarningKind::MissingResource, "no font"));

        assert_eq!(sink.moves, vec![Point::new(5.0, 6.0)]);
        assert_eq!(sink.fills, vec![FillRule::NonZero]);
        assert_eq!(sink.warnings.len(), 1);
    }

    #[test]
    fn sink_is_object_safe() {
        let mut sink = CollectingSink::default();
        let dyn_sink: &mut dyn ContentSink = &mut sink;
        dyn_sink.move_to(Point::new(0.0, 0.0));
        assert_eq!(sink.moves.len(), 1);
    }
}
