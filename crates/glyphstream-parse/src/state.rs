//! Graphics and text state.
//!
//! One [`GraphicsState`] is active per content stream; the `q` operator
//! pushes a copy onto the engine's stack and `Q` pops it back. The text
//! matrices and the text-object flag live on the engine itself — they are
//! scoped by `BT`/`ET`, not by `q`/`Q`.

use crate::matrix::Matrix;

/// Text rendering mode set by the `Tr` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRenderingMode {
    /// Fill glyph outlines (default).
    #[default]
    Fill = 0,
    /// Stroke glyph outlines.
    Stroke = 1,
    /// Fill then stroke.
    FillStroke = 2,
    /// Neither fill nor stroke: invisible text.
    Neither = 3,
    /// Fill and add to the clipping path.
    FillClip = 4,
    /// Stroke and add to the clipping path.
    StrokeClip = 5,
    /// Fill, stroke, and add to the clipping path.
    FillStrokeClip = 6,
    /// Add to the clipping path only.
    Clip = 7,
}

impl TextRenderingMode {
    /// Mode for an integer operand value; `None` outside 0–7.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Fill),
            1 => Some(Self::Stroke),
            2 => Some(Self::FillStroke),
            3 => Some(Self::Neither),
            4 => Some(Self::FillClip),
            5 => Some(Self::StrokeClip),
            6 => Some(Self::FillStrokeClip),
            7 => Some(Self::Clip),
            _ => None,
        }
    }
}

/// Text state parameters (PDF 32000-1 table 103). Part of the graphics
/// state, so saved and restored by `q`/`Q`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    /// Character spacing (`Tc`), unscaled text space units.
    pub character_spacing: f64,
    /// Word spacing (`Tw`), applied to single-byte code 32.
    pub word_spacing: f64,
    /// Horizontal scaling (`Tz`) as a percentage; 100 is unscaled.
    pub horizontal_scaling: f64,
    /// Leading (`TL`), the baseline-to-baseline distance for `T*`.
    pub leading: f64,
    /// Resource name of the font selected by `Tf`.
    pub font_name: Option<String>,
    /// Font size from `Tf`.
    pub font_size: f64,
    /// Rendering mode (`Tr`).
    pub rendering_mode: TextRenderingMode,
    /// Text rise (`Ts`) for super/subscripting.
    pub rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            character_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            font_name: None,
            font_size: 0.0,
            rendering_mode: TextRenderingMode::default(),
            rise: 0.0,
        }
    }
}

impl TextState {
    /// Horizontal scaling as a fraction (`Tz 100` → 1.0).
    pub fn horizontal_scaling_fraction(&self) -> f64 {
        self.horizontal_scaling / 100.0
    }
}

/// A dash pattern set by the `d` operator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashPattern {
    /// On/off lengths; empty means a solid line.
    pub array: Vec<f64>,
    /// Offset into the pattern.
    pub phase: f64,
}

/// The graphics state saved and restored by `q`/`Q`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    /// Current transformation matrix (user space → device space).
    pub ctm: Matrix,
    /// Text state parameters.
    pub text: TextState,
    /// Line width (`w`).
    pub line_width: f64,
    /// Line cap style (`J`).
    pub line_cap: i64,
    /// Line join style (`j`).
    pub line_join: i64,
    /// Miter limit (`M`).
    pub miter_limit: f64,
    /// Dash pattern (`d`).
    pub dash: DashPattern,
    /// Rendering intent name (`ri`).
    pub rendering_intent: Option<String>,
    /// Flatness tolerance (`i`).
    pub flatness: f64,
    /// Stroking color components (`G`/`RG`/`K`/`SC`/`SCN`).
    pub stroking_color: Vec<f64>,
    /// Non-stroking color components (`g`/`rg`/`k`/`sc`/`scn`).
    pub non_stroking_color: Vec<f64>,
    /// Stroking color space name (`CS`).
    pub stroking_color_space: Option<String>,
    /// Non-stroking color space name (`cs`).
    pub non_stroking_color_space: Option<String>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            text: TextState::default(),
            line_width: 1.0,
            line_cap: 0,
            line_join: 0,
            miter_limit: 10.0,
            dash: DashPattern::default(),
            rendering_intent: None,
            flatness: 0.0,
            stroking_color: vec![0.0],
            non_stroking_color: vec![0.0],
            stroking_color_space: None,
            non_stroking_color_space: None,
        }
    }
}
