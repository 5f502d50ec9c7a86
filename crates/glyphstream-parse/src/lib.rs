//! glyphstream-parse: PDF content stream interpretation.
//!
//! Tokenizes content-stream bytes into operators, dispatches them through
//! a graphics/text state machine, and emits drawing and text-positioning
//! events to a [`ContentSink`]. Text showing runs through the legacy
//! glyph positioning heuristic; fonts, XObjects, and extended graphics
//! states resolve through a [`resources::ResourceProvider`] backed by the
//! lopdf object layer.

pub mod engine;
pub mod error;
pub mod flate;
pub mod fonts;
pub mod matrix;
pub mod position;
pub mod resources;
pub mod sink;
pub mod state;
pub mod tokenizer;
pub mod writer;

pub use engine::{ContentStreamEngine, EngineOptions};
pub use error::{EngineError, EngineWarning, WarningKind};
pub use fonts::{BoundingBox, CodeToken, DescriptorMetrics, PageFont, TrueTypeSimpleFont};
pub use matrix::{Matrix, Point};
pub use position::{GlyphPositioner, PageMetrics};
pub use resources::{ExtGStateParams, NoResources, ResourceProvider, Resources, XObjectContent};
pub use sink::{ContentSink, FillRule, ImagePlacement, NoopSink, TextPosition};
pub use state::{DashPattern, GraphicsState, TextRenderingMode, TextState};
pub use tokenizer::{InlineImage, Operand, Operator, tokenize};
pub use writer::ContentStreamWriter;
