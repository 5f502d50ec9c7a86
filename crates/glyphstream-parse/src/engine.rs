//! Content stream operator dispatch.
//!
//! [`ContentStreamEngine`] consumes tokenized operators, maintains the
//! graphics/text state machine, and emits events to a [`ContentSink`].
//! Composite operators re-enter [`ContentStreamEngine::process_operator`]
//! with synthesized sub-operators instead of duplicating their logic, and
//! form XObjects recurse through the same dispatch loop under an explicit
//! depth counter.
//!
//! Errors are operator-local unless structural: a failed operator is
//! skipped with a warning and the stream continues.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::error::{EngineError, EngineWarning, WarningKind};
use crate::fonts::PageFont;
use crate::matrix::{Matrix, Point};
use crate::position::{GlyphPositioner, PageMetrics};
use crate::resources::{ResourceProvider, XObjectContent};
use crate::sink::{ContentSink, FillRule, ImagePlacement};
use crate::state::{DashPattern, GraphicsState, TextRenderingMode};
use crate::tokenizer::{InlineImage, Operand, Operator, tokenize};

/// Engine limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Maximum form XObject nesting before a branch is abandoned.
    pub max_xobject_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_xobject_depth: 50,
        }
    }
}

/// The content stream interpreter.
pub struct ContentStreamEngine<'a> {
    sink: &'a mut dyn ContentSink,
    resources: &'a mut dyn ResourceProvider,
    options: EngineOptions,
    state: GraphicsState,
    state_stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    text_line_matrix: Matrix,
    in_text_object: bool,
    current_point: Option<Point>,
    subpath_start: Option<Point>,
    xobject_depth: usize,
    compatibility_depth: u32,
    positioner: GlyphPositioner,
    font_cache: HashMap<String, Arc<dyn PageFont>>,
}

impl<'a> ContentStreamEngine<'a> {
    /// Create an engine for one content stream.
    pub fn new(
        sink: &'a mut dyn ContentSink,
        resources: &'a mut dyn ResourceProvider,
        page: PageMetrics,
    ) -> Self {
        Self::with_options(sink, resources, page, EngineOptions::default())
    }

    /// Create an engine with explicit limits.
    pub fn with_options(
        sink: &'a mut dyn ContentSink,
        resources: &'a mut dyn ResourceProvider,
        page: PageMetrics,
        options: EngineOptions,
    ) -> Self {
        Self {
            sink,
            resources,
            options,
            state: GraphicsState::default(),
            state_stack: Vec::new(),
            text_matrix: Matrix::identity(),
            text_line_matrix: Matrix::identity(),
            in_text_object: false,
            current_point: None,
            subpath_start: None,
            xobject_depth: 0,
            compatibility_depth: 0,
            positioner: GlyphPositioner::new(page),
            font_cache: HashMap::new(),
        }
    }

    /// The active graphics state.
    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    /// Depth of the saved-state stack.
    pub fn stack_depth(&self) -> usize {
        self.state_stack.len()
    }

    /// Whether a text object is open.
    pub fn in_text_object(&self) -> bool {
        self.in_text_object
    }

    /// The current text matrix.
    pub fn text_matrix(&self) -> &Matrix {
        &self.text_matrix
    }

    /// The current path point in device space, when a subpath is open.
    pub fn current_point(&self) -> Option<Point> {
        self.current_point
    }

    /// Interpret a full content stream.
    ///
    /// Operator-local failures are reported to the sink and skipped;
    /// structural failures abort and propagate.
    pub fn process_stream(&mut self, stream: &[u8]) -> Result<(), EngineError> {
        let operators = tokenize(stream)?;
        for operator in &operators {
            self.execute(operator)?;
        }
        Ok(())
    }

    fn execute(&mut self, operator: &Operator) -> Result<(), EngineError> {
        match self.process_operator(
            &operator.name,
            &operator.operands,
            operator.inline_image.as_ref(),
        ) {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!("skipping operator {}: {err}", operator.name);
                self.sink.on_warning(EngineWarning::with_operator(
                    WarningKind::OperatorSkipped,
                    err.to_string(),
                    operator.name.clone(),
                ));
                Ok(())
            }
        }
    }

    /// Dispatch a single operator.
    ///
    /// Public so composite handlers and the stream writer's callers can
    /// re-enter dispatch with synthesized operators.
    pub fn process_operator(
        &mut self,
        name: &str,
        operands: &[Operand],
        inline_image: Option<&InlineImage>,
    ) -> Result<(), EngineError> {
        match name {
            // --- Graphics state ---
            "q" => {
                self.state_stack.push(self.state.clone());
            }
            "Q" => {
                match self.state_stack.pop() {
                    Some(saved) => self.state = saved,
                    None => {
                        warn!("restore (Q) with an empty graphics state stack");
                        self.sink.on_warning(EngineWarning::with_operator(
                            WarningKind::RestoreOnEmptyStack,
                            "graphics state stack is empty",
                            "Q",
                        ));
                    }
                }
            }
            "cm" => {
                self.require(name, operands, 6)?;
                let Some(values) = numbers::<6>(operands) else {
                    return Ok(());
                };
                let m = Matrix::new(
                    values[0], values[1], values[2], values[3], values[4], values[5],
                );
                self.state.ctm = m.concat(&self.state.ctm);
            }
            "w" => {
                self.require(name, operands, 1)?;
                if let Some(width) = operands[0].as_f64() {
                    self.state.line_width = width;
                }
            }
            "J" => {
                self.require(name, operands, 1)?;
                if let Some(cap) = operands[0].as_i64() {
                    self.state.line_cap = cap;
                }
            }
            "j" => {
                self.require(name, operands, 1)?;
                if let Some(join) = operands[0].as_i64() {
                    self.state.line_join = join;
                }
            }
            "M" => {
                self.require(name, operands, 1)?;
                if let Some(limit) = operands[0].as_f64() {
                    self.state.miter_limit = limit;
                }
            }
            "d" => {
                self.require(name, operands, 2)?;
                let (Operand::Array(elements), Some(phase)) = (&operands[0], operands[1].as_f64())
                else {
                    return Ok(());
                };
                let mut array = Vec::with_capacity(elements.len());
                for element in elements {
                    match element.as_f64() {
                        Some(value) => array.push(value),
                        None => {
                            warn!("dash array has a non-number element, ignored");
                            array.clear();
                            break;
                        }
                    }
                }
                self.state.dash = DashPattern { array, phase };
            }
            "ri" => {
                self.require(name, operands, 1)?;
                if let Some(intent) = operands[0].as_name() {
                    self.state.rendering_intent = Some(intent.to_string());
                }
            }
            "i" => {
                self.require(name, operands, 1)?;
                if let Some(flatness) = operands[0].as_f64() {
                    self.state.flatness = flatness;
                }
            }
            "gs" => {
                self.require(name, operands, 1)?;
                let Some(gs_name) = operands[0].as_name() else {
                    return Ok(());
                };
                match self.resources.ext_g_state(gs_name) {
                    Some(params) => {
                        if let Some(width) = params.line_width {
                            self.state.line_width = width;
                        }
                        if let Some(cap) = params.line_cap {
                            self.state.line_cap = cap;
                        }
                        if let Some(join) = params.line_join {
                            self.state.line_join = join;
                        }
                        if let Some(limit) = params.miter_limit {
                            self.state.miter_limit = limit;
                        }
                        if let Some(dash) = params.dash {
                            self.state.dash = dash;
                        }
                        if let Some((font_name, size)) = params.font {
                            self.state.text.font_name = Some(font_name);
                            self.state.text.font_size = size;
                        }
                    }
                    None => {
                        self.sink.on_warning(EngineWarning::with_operator(
                            WarningKind::MissingResource,
                            format!("extended graphics state {gs_name} not found"),
                            "gs",
                        ));
                    }
                }
            }

            // --- Color ---
            "G" | "g" => {
                self.require(name, operands, 1)?;
                let Some(gray) = operands[0].as_f64() else {
                    return Ok(());
                };
                self.set_color(name == "G", vec![gray], Some("DeviceGray"));
            }
            "RG" | "rg" => {
                self.require(name, operands, 3)?;
                let Some(values) = numbers::<3>(operands) else {
                    return Ok(());
                };
                self.set_color(name == "RG", values.to_vec(), Some("DeviceRGB"));
            }
            "K" | "k" => {
                self.require(name, operands, 4)?;
                let Some(values) = numbers::<4>(operands) else {
                    return Ok(());
                };
                self.set_color(name == "K", values.to_vec(), Some("DeviceCMYK"));
            }
            "CS" | "cs" => {
                self.require(name, operands, 1)?;
                let Some(space) = operands[0].as_name() else {
                    return Ok(());
                };
                let resolved = match space {
                    "DeviceGray" | "DeviceRGB" | "DeviceCMYK" | "Pattern" => space.to_string(),
                    other => self
                        .resources
                        .color_space(other)
                        .unwrap_or_else(|| other.to_string()),
                };
                if name == "CS" {
                    self.state.stroking_color_space = Some(resolved);
                } else {
                    self.state.non_stroking_color_space = Some(resolved);
                }
            }
            "SC" | "SCN" | "sc" | "scn" => {
                // SCN/scn may carry a trailing pattern name after the
                // numeric components.
                if let Some(Operand::Name(pattern_name)) = operands.last() {
                    if self.resources.pattern(pattern_name).is_none() {
                        self.sink.on_warning(EngineWarning::with_operator(
                            WarningKind::MissingResource,
                            format!("pattern {pattern_name} not found in resources"),
                            name,
                        ));
                    }
                }
                let components: Vec<f64> = operands.iter().filter_map(Operand::as_f64).collect();
                let stroking = name.starts_with("S");
                if stroking {
                    self.state.stroking_color = components;
                } else {
                    self.state.non_stroking_color = components;
                }
            }

            // --- Path construction ---
            "m" => {
                self.guard_outside_text(name)?;
                self.require(name, operands, 2)?;
                let Some([x, y]) = numbers::<2>(operands) else {
                    return Ok(());
                };
                let p = self.transformed(x, y);
                self.sink.move_to(p);
                self.current_point = Some(p);
                self.subpath_start = Some(p);
            }
            "l" => {
                self.guard_outside_text(name)?;
                self.require(name, operands, 2)?;
                let Some([x, y]) = numbers::<2>(operands) else {
                    return Ok(());
                };
                let p = self.transformed(x, y);
                if self.current_point.is_none() {
                    self.implicit_move_to(name, p);
                } else {
                    self.sink.line_to(p);
                    self.current_point = Some(p);
                }
            }
            "c" => {
                self.guard_outside_text(name)?;
                self.require(name, operands, 6)?;
                let Some([x1, y1, x2, y2, x3, y3]) = numbers::<6>(operands) else {
                    return Ok(());
                };
                let c1 = self.transformed(x1, y1);
                let c2 = self.transformed(x2, y2);
                let p3 = self.transformed(x3, y3);
                if self.current_point.is_none() {
                    self.implicit_move_to(name, p3);
                } else {
                    self.sink.curve_to(c1, c2, p3);
                    self.current_point = Some(p3);
                }
            }
            "v" => {
                self.guard_outside_text(name)?;
                self.require(name, operands, 4)?;
                let Some([x2, y2, x3, y3]) = numbers::<4>(operands) else {
                    return Ok(());
                };
                let c2 = self.transformed(x2, y2);
                let p3 = self.transformed(x3, y3);
                match self.current_point {
                    None => self.implicit_move_to(name, p3),
                    Some(current) => {
                        // First control point coincides with the current point.
                        self.sink.curve_to(current, c2, p3);
                        self.current_point = Some(p3);
                    }
                }
            }
            "y" => {
                self.guard_outside_text(name)?;
                self.require(name, operands, 4)?;
                let Some([x1, y1, x3, y3]) = numbers::<4>(operands) else {
                    return Ok(());
                };
                let c1 = self.transformed(x1, y1);
                let p3 = self.transformed(x3, y3);
                if self.current_point.is_none() {
                    self.implicit_move_to(name, p3);
                } else {
                    // Second control point replicates the final point.
                    self.sink.curve_to(c1, p3, p3);
                    self.current_point = Some(p3);
                }
            }
            "h" => {
                self.guard_outside_text(name)?;
                if self.current_point.is_none() {
                    warn!("closePath (h) without a current point, ignored");
                    self.sink.on_warning(EngineWarning::with_operator(
                        WarningKind::ImplicitMoveTo,
                        "closePath without a current point",
                        "h",
                    ));
                } else {
                    self.sink.close_path();
                    self.current_point = self.subpath_start;
                }
            }
            "re" => {
                self.guard_outside_text(name)?;
                self.require(name, operands, 4)?;
                let Some([x, y, width, height]) = numbers::<4>(operands) else {
                    return Ok(());
                };
                let p0 = self.transformed(x, y);
                let p1 = self.transformed(x + width, y);
                let p2 = self.transformed(x + width, y + height);
                let p3 = self.transformed(x, y + height);
                self.sink.append_rectangle(p0, p1, p2, p3);
                self.current_point = Some(p0);
                self.subpath_start = Some(p0);
            }

            // --- Path painting ---
            "S" => {
                self.guard_outside_text(name)?;
                self.sink.stroke_path();
                self.end_path_state();
            }
            "s" => {
                // Close and stroke.
                self.process_operator("h", operands, None)?;
                self.process_operator("S", operands, None)?;
            }
            "f" | "F" => {
                self.guard_outside_text(name)?;
                self.sink.fill_path(FillRule::NonZero);
                self.end_path_state();
            }
            "f*" => {
                self.guard_outside_text(name)?;
                self.sink.fill_path(FillRule::EvenOdd);
                self.end_path_state();
            }
            "B" => {
                self.guard_outside_text(name)?;
                self.sink.fill_and_stroke_path(FillRule::NonZero);
                self.end_path_state();
            }
            "B*" => {
                self.guard_outside_text(name)?;
                self.sink.fill_and_stroke_path(FillRule::EvenOdd);
                self.end_path_state();
            }
            "b" => {
                // Close, fill non-zero, and stroke.
                self.process_operator("h", operands, None)?;
                self.process_operator("B", operands, None)?;
            }
            "b*" => {
                // Close, fill even-odd, and stroke.
                self.process_operator("h", operands, None)?;
                self.process_operator("B*", operands, None)?;
            }
            "n" => {
                self.guard_outside_text(name)?;
                self.sink.end_path();
                self.end_path_state();
            }

            // --- Clipping ---
            "W" => {
                self.guard_outside_text(name)?;
                self.sink.clip(FillRule::NonZero);
            }
            "W*" => {
                self.guard_outside_text(name)?;
                self.sink.clip(FillRule::EvenOdd);
            }

            // --- Shading ---
            "sh" => {
                self.guard_outside_text(name)?;
                self.require(name, operands, 1)?;
                if let Some(shading_name) = operands[0].as_name() {
                    if self.resources.shading(shading_name).is_some() {
                        self.sink.shading_fill(shading_name);
                    } else {
                        self.sink.on_warning(EngineWarning::with_operator(
                            WarningKind::MissingResource,
                            format!("shading {shading_name} not found in resources"),
                            "sh",
                        ));
                    }
                }
            }

            // --- Text object ---
            "BT" => {
                if self.in_text_object {
                    return Err(EngineError::NestedTextObject);
                }
                self.text_matrix = Matrix::identity();
                self.text_line_matrix = Matrix::identity();
                self.in_text_object = true;
            }
            "ET" => {
                if !self.in_text_object {
                    return Err(EngineError::TextObjectNotOpen {
                        operator: name.to_string(),
                    });
                }
                self.in_text_object = false;
            }

            // --- Text state ---
            "Tc" => {
                self.require(name, operands, 1)?;
                if let Some(spacing) = operands[0].as_f64() {
                    self.state.text.character_spacing = spacing;
                }
            }
            "Tw" => {
                self.require(name, operands, 1)?;
                if let Some(spacing) = operands[0].as_f64() {
                    self.state.text.word_spacing = spacing;
                }
            }
            "Tz" => {
                self.require(name, operands, 1)?;
                if let Some(scale) = operands[0].as_f64() {
                    self.state.text.horizontal_scaling = scale;
                }
            }
            "TL" => {
                self.require(name, operands, 1)?;
                if let Some(leading) = operands[0].as_f64() {
                    self.state.text.leading = leading;
                }
            }
            "Tf" => {
                self.require(name, operands, 2)?;
                let (Some(font_name), Some(size)) = (operands[0].as_name(), operands[1].as_f64())
                else {
                    return Ok(());
                };
                self.state.text.font_name = Some(font_name.to_string());
                self.state.text.font_size = size;
                if !self.font_cache.contains_key(font_name) {
                    match self.resources.font(font_name) {
                        Some(font) => {
                            self.font_cache.insert(font_name.to_string(), font);
                        }
                        None => {
                            self.sink.on_warning(EngineWarning::with_operator(
                                WarningKind::MissingResource,
                                format!("font {font_name} not found in resources"),
                                "Tf",
                            ));
                        }
                    }
                }
            }
            "Tr" => {
                self.require(name, operands, 1)?;
                if let Some(mode) = operands[0].as_i64().and_then(TextRenderingMode::from_i64) {
                    self.state.text.rendering_mode = mode;
                }
            }
            "Ts" => {
                self.require(name, operands, 1)?;
                if let Some(rise) = operands[0].as_f64() {
                    self.state.text.rise = rise;
                }
            }

            // --- Text positioning ---
            "Td" => {
                self.guard_inside_text(name)?;
                self.require(name, operands, 2)?;
                let Some([tx, ty]) = numbers::<2>(operands) else {
                    return Ok(());
                };
                self.text_line_matrix = Matrix::translation(tx, ty).concat(&self.text_line_matrix);
                self.text_matrix = self.text_line_matrix;
            }
            "TD" => {
                // Set leading to -ty, then move.
                self.require(name, operands, 2)?;
                let Some([_, ty]) = numbers::<2>(operands) else {
                    return Ok(());
                };
                self.process_operator("TL", &[Operand::Real(-ty)], None)?;
                self.process_operator("Td", operands, None)?;
            }
            "Tm" => {
                self.guard_inside_text(name)?;
                self.require(name, operands, 6)?;
                let Some(values) = numbers::<6>(operands) else {
                    return Ok(());
                };
                let m = Matrix::new(
                    values[0], values[1], values[2], values[3], values[4], values[5],
                );
                self.text_matrix = m;
                self.text_line_matrix = m;
            }
            "T*" => {
                // Move to the next line using the current leading.
                let leading = self.state.text.leading;
                self.process_operator(
                    "Td",
                    &[Operand::Real(0.0), Operand::Real(-leading)],
                    None,
                )?;
            }

            // --- Text showing ---
            "Tj" => {
                self.guard_inside_text(name)?;
                self.require(name, operands, 1)?;
                let Some(bytes) = operands[0].string_bytes() else {
                    return Ok(());
                };
                let bytes = bytes.to_vec();
                self.show_text(&bytes);
            }
            "TJ" => {
                self.guard_inside_text(name)?;
                self.require(name, operands, 1)?;
                let Operand::Array(elements) = &operands[0] else {
                    return Ok(());
                };
                for element in elements.clone() {
                    match element {
                        Operand::LiteralString(bytes) | Operand::HexString(bytes) => {
                            self.show_text(&bytes);
                        }
                        Operand::Integer(_) | Operand::Real(_) => {
                            let adjustment = element.as_f64().unwrap_or(0.0);
                            self.adjust_text_position(adjustment);
                        }
                        _ => {}
                    }
                }
            }
            "'" => {
                // Next line, then show.
                self.process_operator("T*", &[], None)?;
                self.process_operator("Tj", operands, None)?;
            }
            "\"" => {
                // Word spacing, character spacing, then show on the next line.
                self.require(name, operands, 3)?;
                self.process_operator("Tw", &operands[0..1], None)?;
                self.process_operator("Tc", &operands[1..2], None)?;
                self.process_operator("'", &operands[2..3], None)?;
            }

            // --- Type 3 glyph metrics ---
            "d0" | "d1" => {
                // Only meaningful inside Type 3 charprocs; nothing to track.
            }

            // --- XObjects ---
            "Do" => {
                self.require(name, operands, 1)?;
                let Some(xobject_name) = operands[0].as_name() else {
                    return Ok(());
                };
                self.draw_xobject(xobject_name)?;
            }

            // --- Inline images ---
            "BI" => {
                if let Some(image) = inline_image {
                    self.sink.inline_image(image);
                }
            }

            // --- Marked content ---
            "MP" => {
                self.require(name, operands, 1)?;
                if let Some(tag) = operands[0].as_name() {
                    self.sink.marked_content_point(tag, None);
                }
            }
            "DP" => {
                self.require(name, operands, 2)?;
                let Some(tag) = operands[0].as_name().map(String::from) else {
                    return Ok(());
                };
                let mcid = self.properties_mcid(&operands[1]);
                self.sink.marked_content_point(&tag, mcid);
            }
            "BMC" => {
                self.require(name, operands, 1)?;
                if let Some(tag) = operands[0].as_name() {
                    self.sink.begin_marked_content(tag, None);
                }
            }
            "BDC" => {
                self.require(name, operands, 2)?;
                let Some(tag) = operands[0].as_name().map(String::from) else {
                    return Ok(());
                };
                let mcid = self.properties_mcid(&operands[1]);
                self.sink.begin_marked_content(&tag, mcid);
            }
            "EMC" => {
                self.sink.end_marked_content();
            }

            // --- Compatibility ---
            "BX" => {
                self.compatibility_depth += 1;
            }
            "EX" => {
                self.compatibility_depth = self.compatibility_depth.saturating_sub(1);
            }

            // --- Everything else ---
            other => {
                if self.compatibility_depth == 0 {
                    warn!("unsupported operator {other}");
                    self.sink.on_warning(EngineWarning::with_operator(
                        WarningKind::UnsupportedOperator,
                        format!("operator {other} is not supported"),
                        other,
                    ));
                }
            }
        }
        Ok(())
    }

    fn require(&self, name: &str, operands: &[Operand], count: usize) -> Result<(), EngineError> {
        if operands.len() < count {
            Err(EngineError::MissingOperand {
                operator: name.to_string(),
                given: operands.len(),
            })
        } else {
            Ok(())
        }
    }

    fn guard_outside_text(&self, name: &str) -> Result<(), EngineError> {
        if self.in_text_object {
            Err(EngineError::NotAllowedInTextObject {
                operator: name.to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn guard_inside_text(&self, name: &str) -> Result<(), EngineError> {
        if !self.in_text_object {
            Err(EngineError::TextObjectNotOpen {
                operator: name.to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn transformed(&self, x: f64, y: f64) -> Point {
        self.state.ctm.transform(Point::new(x, y))
    }

    /// The MCID of a BDC/DP properties operand: inline dictionaries carry
    /// it directly, names resolve through the /Properties resources.
    fn properties_mcid(&mut self, operand: &Operand) -> Option<i64> {
        match operand {
            Operand::Dictionary(_) => property_mcid(operand),
            Operand::Name(name) => self.resources.property_list_mcid(name),
            _ => None,
        }
    }

    fn implicit_move_to(&mut self, operator: &str, p: Point) {
        warn!(
            "{operator} ({}, {}) without initial moveTo",
            p.x, p.y
        );
        self.sink.on_warning(EngineWarning::with_operator(
            WarningKind::ImplicitMoveTo,
            "path operator without initial moveTo",
            operator,
        ));
        self.sink.move_to(p);
        self.current_point = Some(p);
        self.subpath_start = Some(p);
    }

    fn end_path_state(&mut self) {
        self.current_point = None;
        self.subpath_start = None;
    }

    fn set_color(&mut self, stroking: bool, components: Vec<f64>, space: Option<&str>) {
        if stroking {
            self.state.stroking_color = components;
            self.state.stroking_color_space = space.map(String::from);
        } else {
            self.state.non_stroking_color = components;
            self.state.non_stroking_color_space = space.map(String::from);
        }
    }

    fn current_font(&mut self) -> Option<Arc<dyn PageFont>> {
        let font_name = self.state.text.font_name.clone()?;
        if let Some(font) = self.font_cache.get(&font_name) {
            return Some(font.clone());
        }
        let font = self.resources.font(&font_name)?;
        self.font_cache.insert(font_name, font.clone());
        Some(font)
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let Some(font) = self.current_font() else {
            self.sink.on_warning(EngineWarning::new(
                WarningKind::MissingResource,
                "text shown with no font selected",
            ));
            return;
        };

        for token in font.codes(bytes) {
            let text = &self.state.text;
            let font_size = text.font_size;
            let horizontal_scaling = text.horizontal_scaling_fraction();
            let word_spacing = if token.byte_count == 1 && token.code == 32 {
                text.word_spacing
            } else {
                0.0
            };

            let parameters = Matrix::new(
                font_size * horizontal_scaling,
                0.0,
                0.0,
                font_size,
                0.0,
                text.rise,
            );
            let text_rendering_matrix = parameters
                .concat(&self.text_matrix)
                .concat(&self.state.ctm);

            let displacement = font.displacement(token.code);
            if let Some(position) = self.positioner.show_glyph(
                &text_rendering_matrix,
                &self.text_matrix,
                &self.state.ctm,
                &self.state.text,
                font.as_ref(),
                token.code,
                displacement,
            ) {
                self.sink.show_text_position(position);
            }

            let text = &self.state.text;
            let (tx, ty) = if font.is_vertical() {
                (
                    0.0,
                    displacement.y * font_size + text.character_spacing + word_spacing,
                )
            } else {
                (
                    (displacement.x * font_size + text.character_spacing + word_spacing)
                        * horizontal_scaling,
                    0.0,
                )
            };
            self.text_matrix = Matrix::translation(tx, ty).concat(&self.text_matrix);
        }
    }

    /// A TJ numeric adjustment, in thousandths of text space.
    fn adjust_text_position(&mut self, adjustment: f64) {
        let text = &self.state.text;
        let font_size = text.font_size;
        let vertical = self
            .font_cache
            .get(text.font_name.as_deref().unwrap_or(""))
            .map(|font| font.is_vertical())
            .unwrap_or(false);
        let shift = -adjustment / 1000.0 * font_size;
        let (tx, ty) = if vertical {
            (0.0, shift)
        } else {
            (shift * text.horizontal_scaling_fraction(), 0.0)
        };
        self.text_matrix = Matrix::translation(tx, ty).concat(&self.text_matrix);
    }

    fn draw_xobject(&mut self, name: &str) -> Result<(), EngineError> {
        match self.resources.xobject(name) {
            None => {
                self.sink.on_warning(EngineWarning::with_operator(
                    WarningKind::MissingResource,
                    format!("XObject {name} not found in resources"),
                    "Do",
                ));
                Ok(())
            }
            Some(XObjectContent::Image { width, height }) => {
                self.sink.draw_image(ImagePlacement {
                    name: name.to_string(),
                    ctm: self.state.ctm,
                    width,
                    height,
                });
                Ok(())
            }
            Some(XObjectContent::Form { content }) => {
                if self.xobject_depth >= self.options.max_xobject_depth {
                    warn!(
                        "form XObject nesting depth {} exceeds limit {}, branch abandoned",
                        self.xobject_depth + 1,
                        self.options.max_xobject_depth
                    );
                    self.sink.on_warning(EngineWarning::with_operator(
                        WarningKind::RecursionLimit,
                        format!(
                            "form XObject nesting exceeds {} levels",
                            self.options.max_xobject_depth
                        ),
                        "Do",
                    ));
                    return Ok(());
                }

                // The form body runs against a saved copy of the state;
                // an unbalanced stream inside cannot leak state out.
                let saved_state = self.state.clone();
                let saved_stack_len = self.state_stack.len();
                self.xobject_depth += 1;
                let result = self.process_stream(&content);
                self.xobject_depth -= 1;
                self.state_stack.truncate(saved_stack_len);
                self.state = saved_state;
                result
            }
        }
    }
}

/// The MCID from a BDC/DP properties operand, when inline.
fn property_mcid(operand: &Operand) -> Option<i64> {
    match operand {
        Operand::Dictionary(entries) => entries
            .iter()
            .find(|(key, _)| key == "MCID")
            .and_then(|(_, value)| value.as_i64()),
        _ => None,
    }
}

/// The first `N` operands as numbers; `None` if any is non-numeric.
fn numbers<const N: usize>(operands: &[Operand]) -> Option<[f64; N]> {
    let mut values = [0.0; N];
    for (slot, operand) in values.iter_mut().zip(operands.iter()) {
        *slot = operand.as_f64()?;
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;
    use crate::fonts::{BoundingBox, DescriptorMetrics};
    use crate::resources::{ExtGStateParams, NoResources};
    use crate::sink::TextPosition;

    // --- Test doubles ---

    struct TestFont {
        name: String,
        vertical: bool,
    }

    impl PageFont for TestFont {
        fn name(&self) -> &str {
            &self.name
        }

        fn advance_width(&self, _code: u32) -> f64 {
            500.0
        }

        fn metrics(&self) -> DescriptorMetrics {
            DescriptorMetrics {
                bounding_box: BoundingBox::new(0.0, 0.0, 1000.0, 1000.0),
                ..DescriptorMetrics::default()
            }
        }

        fn is_vertical(&self) -> bool {
            self.vertical
        }

        fn to_unicode(&self, code: u32) -> Option<String> {
            char::from_u32(code).map(String::from)
        }
    }

    #[derive(Default)]
    struct TestResources {
        forms: HashMap<String, Vec<u8>>,
        images: HashMap<String, (i64, i64)>,
        gstates: HashMap<String, ExtGStateParams>,
        shadings: HashMap<String, i64>,
        color_spaces: HashMap<String, String>,
        properties: HashMap<String, i64>,
    }

    impl ResourceProvider for TestResources {
        fn font(&mut self, name: &str) -> Option<Arc<dyn PageFont>> {
            if name.starts_with("F") {
                Some(Arc::new(TestFont {
                    name: name.to_string(),
                    vertical: false,
                }))
            } else {
                None
            }
        }

        fn xobject(&mut self, name: &str) -> Option<XObjectContent> {
            if let Some(content) = self.forms.get(name) {
                return Some(XObjectContent::Form {
                    content: content.clone(),
                });
            }
            self.images.get(name).map(|&(width, height)| {
                XObjectContent::Image {
                    width: Some(width),
                    height: Some(height),
                }
            })
        }

        fn ext_g_state(&mut self, name: &str) -> Option<ExtGStateParams> {
            self.gstates.get(name).cloned()
        }

        fn color_space(&mut self, name: &str) -> Option<String> {
            self.color_spaces.get(name).cloned()
        }

        fn shading(&mut self, name: &str) -> Option<i64> {
            self.shadings.get(name).copied()
        }

        fn property_list_mcid(&mut self, name: &str) -> Option<i64> {
            self.properties.get(name).copied()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        MoveTo(Point),
        LineTo(Point),
        CurveTo(Point, Point, Point),
        Close,
        Rect(Point, Point, Point, Point),
        Fill(FillRule),
        Stroke,
        FillStroke(FillRule),
        EndPath,
        Clip(FillRule),
        Shading(String),
        Image(String),
        InlineImage(usize),
        BeginMarked(String, Option<i64>),
        EndMarked,
        Text(String),
    }

    #[derive(Default)]
    struct EventSink {
        events: Vec<Event>,
        positions: Vec<TextPosition>,
        warnings: Vec<EngineWarning>,
    }

    impl ContentSink for EventSink {
        fn move_to(&mut self, p: Point) {
            self.events.push(Event::MoveTo(p));
        }

        fn line_to(&mut self, p: Point) {
            self.events.push(Event::LineTo(p));
        }

        fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
            self.events.push(Event::CurveTo(c1, c2, p));
        }

        fn close_path(&mut self) {
            self.events.push(Event::Close);
        }

        fn append_rectangle(&mut self, p0: Point, p1: Point, p2: Point, p3: Point) {
            self.events.push(Event::Rect(p0, p1, p2, p3));
        }

        fn fill_path(&mut self, rule: FillRule) {
            self.events.push(Event::Fill(rule));
        }

        fn stroke_path(&mut self) {
            self.events.push(Event::Stroke);
        }

        fn fill_and_stroke_path(&mut self, rule: FillRule) {
            self.events.push(Event::FillStroke(rule));
        }

        fn end_path(&mut self) {
            self.events.push(Event::EndPath);
        }

        fn clip(&mut self, rule: FillRule) {
            self.events.push(Event::Clip(rule));
        }

        fn shading_fill(&mut self, name: &str) {
            self.events.push(Event::Shading(name.to_string()));
        }

        fn inline_image(&mut self, image: &InlineImage) {
            self.events.push(Event::InlineImage(image.data.len()));
        }

        fn draw_image(&mut self, placement: ImagePlacement) {
            self.events.push(Event::Image(placement.name));
        }

        fn show_text_position(&mut self, position: TextPosition) {
            self.events.push(Event::Text(position.unicode.clone()));
            self.positions.push(position);
        }

        fn begin_marked_content(&mut self, tag: &str, mcid: Option<i64>) {
            self.events.push(Event::BeginMarked(tag.to_string(), mcid));
        }

        fn end_marked_content(&mut self) {
            self.events.push(Event::EndMarked);
        }

        fn on_warning(&mut self, warning: EngineWarning) {
            self.warnings.push(warning);
        }
    }

    fn run(stream: &[u8]) -> (EventSink, usize, bool) {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(stream).unwrap();
        let depth = engine.stack_depth();
        let in_text = engine.in_text_object();
        (sink, depth, in_text)
    }

    // --- End-to-end ---

    #[test]
    fn translated_rectangle_fill() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine
            .process_stream(b"1 0 0 1 100 100 cm 0 0 100 50 re f")
            .unwrap();

        assert_eq!(engine.state().ctm.translate_x(), 100.0);
        assert_eq!(engine.state().ctm.translate_y(), 100.0);
        assert_eq!(engine.stack_depth(), 0);
        assert!(!engine.in_text_object());

        assert_eq!(
            sink.events,
            vec![
                Event::Rect(
                    Point::new(100.0, 100.0),
                    Point::new(200.0, 100.0),
                    Point::new(200.0, 150.0),
                    Point::new(100.0, 150.0),
                ),
                Event::Fill(FillRule::NonZero),
            ]
        );
        assert!(sink.warnings.is_empty());
    }

    // --- Save/restore ---

    #[test]
    fn save_restore_round_trips_every_field() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());

        engine.process_stream(b"q").unwrap();
        let saved = engine.state().clone();
        engine
            .process_stream(
                b"2 0 0 2 5 5 cm 3 w 1 J 2 j 4 M [1 2] 3 d 0.5 G 1 0 0 rg \
                  /Perceptual ri 7 i BT /F1 9 Tf 1 Tc 2 Tw 110 Tz 14 TL 3 Ts 2 Tr ET",
            )
            .unwrap();
        assert_ne!(*engine.state(), saved);

        engine.process_stream(b"Q").unwrap();
        assert_eq!(*engine.state(), saved);
        assert_eq!(engine.stack_depth(), 0);
    }

    #[test]
    fn restore_on_empty_stack_warns_and_continues() {
        let (sink, depth, _) = run(b"Q 5 w");
        assert_eq!(depth, 0);
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::RestoreOnEmptyStack);
    }

    // --- Text object state machine ---

    #[test]
    fn nested_begin_text_is_operator_local() {
        let (sink, _, in_text) = run(b"BT BT 0 0 Td ET");
        assert!(!in_text);
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::OperatorSkipped);
        assert!(sink.warnings[0].description.contains("nested text object"));
    }

    #[test]
    fn end_text_without_begin_is_operator_local() {
        let (sink, _, in_text) = run(b"ET 5 w");
        assert!(!in_text);
        assert_eq!(sink.warnings.len(), 1);
        assert!(sink.warnings[0].description.contains("text object not open"));
    }

    #[test]
    fn path_operators_rejected_inside_text_object() {
        let (sink, _, _) = run(b"BT 0 0 m 10 10 l 0 0 5 5 re f ET");
        assert!(sink.events.is_empty());
        assert_eq!(sink.warnings.len(), 4);
        for warning in &sink.warnings {
            assert!(
                warning
                    .description
                    .contains("not allowed inside a text object")
            );
        }
    }

    #[test]
    fn text_showing_outside_text_object_is_skipped() {
        let (sink, _, _) = run(b"(abc) Tj");
        assert!(sink.positions.is_empty());
        assert_eq!(sink.warnings.len(), 1);
    }

    // --- Operand discipline ---

    #[test]
    fn missing_operands_skip_the_operator() {
        let (sink, _, _) = run(b"10 l 5 w");
        assert!(sink.events.is_empty());
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::OperatorSkipped);
        assert_eq!(sink.warnings[0].operator.as_deref(), Some("l"));
    }

    #[test]
    fn type_mismatched_operands_are_silently_ignored() {
        let (sink, _, _) = run(b"(a) (b) m /X 2 3 4 5 6 cm");
        assert!(sink.events.is_empty());
        assert!(sink.warnings.is_empty());
    }

    // --- Path leniency ---

    #[test]
    fn line_to_without_move_to_synthesizes_move() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"10 10 l").unwrap();

        assert_eq!(engine.current_point(), Some(Point::new(10.0, 10.0)));
        assert_eq!(sink.events, vec![Event::MoveTo(Point::new(10.0, 10.0))]);
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::ImplicitMoveTo);
    }

    #[test]
    fn close_path_without_move_to_is_warned_noop() {
        let (sink, _, _) = run(b"h");
        assert!(sink.events.is_empty());
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::ImplicitMoveTo);
    }

    #[test]
    fn curve_variants_emit_expected_control_points() {
        let (sink, _, _) = run(b"0 0 m 1 1 2 2 3 3 c 4 4 5 5 v 6 6 7 7 y");
        assert_eq!(
            sink.events,
            vec![
                Event::MoveTo(Point::new(0.0, 0.0)),
                Event::CurveTo(Point::new(1.0, 1.0), Point::new(2.0, 2.0), Point::new(3.0, 3.0)),
                // v: current point is the first control point.
                Event::CurveTo(Point::new(3.0, 3.0), Point::new(4.0, 4.0), Point::new(5.0, 5.0)),
                // y: final point replicated as the second control point.
                Event::CurveTo(Point::new(6.0, 6.0), Point::new(7.0, 7.0), Point::new(7.0, 7.0)),
            ]
        );
    }

    #[test]
    fn close_path_restores_subpath_start() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"5 5 m 20 5 l h").unwrap();
        assert_eq!(engine.current_point(), Some(Point::new(5.0, 5.0)));
    }

    // --- Composite operators ---

    #[test]
    fn close_fill_stroke_re_enters_dispatch() {
        let (sink, _, _) = run(b"0 0 m 10 0 l 10 10 l b");
        assert_eq!(
            sink.events[3..],
            [Event::Close, Event::FillStroke(FillRule::NonZero)]
        );
    }

    #[test]
    fn close_fill_stroke_even_odd() {
        let (sink, _, _) = run(b"0 0 m 10 0 l 10 10 l b*");
        assert_eq!(
            sink.events[3..],
            [Event::Close, Event::FillStroke(FillRule::EvenOdd)]
        );
    }

    #[test]
    fn close_and_stroke_re_enters_dispatch() {
        let (sink, _, _) = run(b"0 0 m 10 0 l s");
        assert_eq!(sink.events[2..], [Event::Close, Event::Stroke]);
    }

    // --- Text positioning and showing ---

    #[test]
    fn move_text_updates_line_matrix() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"BT 10 20 Td 5 5 Td").unwrap();
        assert_eq!(engine.text_matrix().translate_x(), 15.0);
        assert_eq!(engine.text_matrix().translate_y(), 25.0);
    }

    #[test]
    fn move_text_with_leading_sets_leading() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"BT 10 -14 TD").unwrap();
        assert_eq!(engine.state().text.leading, 14.0);
        assert_eq!(engine.text_matrix().translate_y(), -14.0);
    }

    #[test]
    fn next_line_uses_leading() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"BT 12 TL 100 700 Td T*").unwrap();
        assert_eq!(engine.text_matrix().translate_x(), 100.0);
        assert_eq!(engine.text_matrix().translate_y(), 688.0);
    }

    #[test]
    fn show_text_emits_positions_and_advances() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine
            .process_stream(b"BT /F1 10 Tf 100 700 Td (AB) Tj ET")
            .unwrap();

        assert_eq!(engine.text_matrix().translate_x(), 110.0);
        assert_eq!(sink.positions.len(), 2);
        assert_eq!(sink.positions[0].unicode, "A");
        assert_eq!(sink.positions[1].unicode, "B");
        // Each glyph advances 500/1000 × 10 = 5.
        assert_eq!(sink.positions[0].end_x, 105.0);
        assert_eq!(sink.positions[1].end_x, 110.0);
    }

    #[test]
    fn word_spacing_applies_to_space_codes() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine
            .process_stream(b"BT /F1 10 Tf 4 Tw ( A) Tj ET")
            .unwrap();
        // Space: 5 + 4 word spacing = 9; then A: +5.
        assert_eq!(engine.text_matrix().translate_x(), 14.0);
        // The glyph's own displacement excludes the word spacing.
        assert_eq!(sink.positions[0].width, 5.0);
    }

    #[test]
    fn tj_adjustments_shift_text_space() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine
            .process_stream(b"BT /F1 10 Tf [(A) -200 (B)] TJ ET")
            .unwrap();
        // A: +5, adjustment: -(-200)/1000×10 = +2, B: +5.
        assert_eq!(engine.text_matrix().translate_x(), 12.0);
        assert_eq!(sink.positions.len(), 2);
    }

    #[test]
    fn quote_operator_moves_line_then_shows() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine
            .process_stream(b"BT /F1 10 Tf 12 TL 0 100 Td (A) ' ET")
            .unwrap();
        assert_eq!(sink.positions.len(), 1);
        // ' moved one line down before showing.
        assert_eq!(sink.positions[0].end_y, 88.0);
    }

    #[test]
    fn double_quote_sets_spacing_then_shows() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine
            .process_stream(b"BT /F1 10 Tf 3 1.5 (A) \" ET")
            .unwrap();
        assert_eq!(engine.state().text.word_spacing, 3.0);
        assert_eq!(engine.state().text.character_spacing, 1.5);
        assert_eq!(sink.positions.len(), 1);
    }

    #[test]
    fn show_text_without_font_warns() {
        let (sink, _, _) = run(b"BT (A) Tj ET");
        assert!(sink.positions.is_empty());
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::MissingResource);
    }

    #[test]
    fn missing_font_resource_warns_at_tf() {
        let (sink, _, _) = run(b"BT /NoSuchFont 10 Tf ET");
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::MissingResource);
        assert_eq!(sink.warnings[0].operator.as_deref(), Some("Tf"));
    }

    // --- XObjects ---

    #[test]
    fn form_xobject_processes_nested_stream() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        resources
            .forms
            .insert("Fm0".to_string(), b"0 0 m 10 0 l S".to_vec());
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"q 2 0 0 2 0 0 cm /Fm0 Do Q").unwrap();

        assert_eq!(
            sink.events,
            vec![
                Event::MoveTo(Point::new(0.0, 0.0)),
                Event::LineTo(Point::new(20.0, 0.0)),
                Event::Stroke,
            ]
        );
    }

    #[test]
    fn form_state_is_restored_after_do() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        // The form leaves an unbalanced q and a mutated line width.
        resources
            .forms
            .insert("Fm0".to_string(), b"q 9 w".to_vec());
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"/Fm0 Do").unwrap();
        assert_eq!(engine.state().line_width, 1.0);
        assert_eq!(engine.stack_depth(), 0);
    }

    #[test]
    fn self_referential_form_stops_at_depth_cap() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        resources
            .forms
            .insert("Fm0".to_string(), b"/Fm0 Do".to_vec());
        let mut engine = ContentStreamEngine::with_options(
            &mut sink,
            &mut resources,
            PageMetrics::default(),
            EngineOptions {
                max_xobject_depth: 5,
            },
        );
        engine.process_stream(b"/Fm0 Do").unwrap();

        let limit_warnings: Vec<_> = sink
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::RecursionLimit)
            .collect();
        assert_eq!(limit_warnings.len(), 1);
    }

    #[test]
    fn image_xobject_is_reported_with_ctm() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        resources.images.insert("Im0".to_string(), (640, 480));
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"/Im0 Do").unwrap();
        assert_eq!(sink.events, vec![Event::Image("Im0".to_string())]);
    }

    #[test]
    fn missing_xobject_warns() {
        let (sink, _, _) = run(b"/Nope Do");
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::MissingResource);
    }

    // --- Inline images, marked content, compatibility ---

    #[test]
    fn inline_image_reaches_sink() {
        let (sink, _, _) = run(b"BI /W 2 /H 2 ID \x01\x02\x03\x04\nEI");
        assert_eq!(sink.events, vec![Event::InlineImage(4)]);
    }

    #[test]
    fn marked_content_nesting() {
        let (sink, _, _) = run(b"/P << /MCID 3 >> BDC /Artifact BMC EMC EMC");
        assert_eq!(
            sink.events,
            vec![
                Event::BeginMarked("P".to_string(), Some(3)),
                Event::BeginMarked("Artifact".to_string(), None),
                Event::EndMarked,
                Event::EndMarked,
            ]
        );
    }

    #[test]
    fn unknown_operator_warns_outside_compatibility_section() {
        let (sink, _, _) = run(b"xyzzy");
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::UnsupportedOperator);
    }

    #[test]
    fn unknown_operator_silent_inside_compatibility_section() {
        let (sink, _, _) = run(b"BX xyzzy EX xyzzy");
        assert_eq!(sink.warnings.len(), 1);
    }

    // --- Extended graphics state ---

    #[test]
    fn gs_applies_parameters() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        resources.gstates.insert(
            "GS1".to_string(),
            ExtGStateParams {
                line_width: Some(4.0),
                dash: Some(DashPattern {
                    array: vec![2.0, 1.0],
                    phase: 0.0,
                }),
                ..ExtGStateParams::default()
            },
        );
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"/GS1 gs").unwrap();
        assert_eq!(engine.state().line_width, 4.0);
        assert_eq!(engine.state().dash.array, vec![2.0, 1.0]);
    }

    #[test]
    fn missing_gs_resource_warns() {
        let (sink, _, _) = run(b"/GS9 gs");
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::MissingResource);
    }

    // --- Colors, clipping, shading ---

    #[test]
    fn color_operators_update_state() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine
            .process_stream(b"0.5 G 1 0 0 rg 0.1 0.2 0.3 0.4 K /Pattern cs 0.9 scn")
            .unwrap();
        let state = engine.state();
        assert_eq!(state.stroking_color, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(state.non_stroking_color, vec![0.9]);
        assert_eq!(state.non_stroking_color_space.as_deref(), Some("Pattern"));
        assert_eq!(
            state.stroking_color_space.as_deref(),
            Some("DeviceCMYK")
        );
    }

    #[test]
    fn clip_and_shading_events() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        resources.shadings.insert("Sh0".to_string(), 2);
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"0 0 10 10 re W n /Sh0 sh").unwrap();
        assert_eq!(sink.events.len(), 4);
        assert_eq!(sink.events[1], Event::Clip(FillRule::NonZero));
        assert_eq!(sink.events[2], Event::EndPath);
        assert_eq!(sink.events[3], Event::Shading("Sh0".to_string()));
    }

    #[test]
    fn missing_shading_warns() {
        let (sink, _, _) = run(b"/Sh9 sh");
        assert!(sink.events.is_empty());
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].kind, WarningKind::MissingResource);
    }

    #[test]
    fn named_color_space_resolves_through_resources() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        resources
            .color_spaces
            .insert("CS0".to_string(), "ICCBased".to_string());
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"/CS0 CS /Unknown cs").unwrap();
        assert_eq!(
            engine.state().stroking_color_space.as_deref(),
            Some("ICCBased")
        );
        // Unresolvable names are kept as-is.
        assert_eq!(
            engine.state().non_stroking_color_space.as_deref(),
            Some("Unknown")
        );
    }

    #[test]
    fn named_property_list_supplies_mcid() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        resources.properties.insert("MC0".to_string(), 7);
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"/P /MC0 BDC EMC").unwrap();
        assert_eq!(
            sink.events,
            vec![
                Event::BeginMarked("P".to_string(), Some(7)),
                Event::EndMarked,
            ]
        );
    }

    #[test]
    fn painting_clears_the_current_point() {
        let mut sink = EventSink::default();
        let mut resources = TestResources::default();
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"0 0 m 5 5 l S").unwrap();
        assert_eq!(engine.current_point(), None);
    }

    #[test]
    fn engine_runs_without_resources() {
        let mut sink = EventSink::default();
        let mut resources = NoResources;
        let mut engine =
            ContentStreamEngine::new(&mut sink, &mut resources, PageMetrics::default());
        engine.process_stream(b"q 1 0 0 1 10 10 cm Q").unwrap();
        assert_eq!(engine.stack_depth(), 0);
    }
}
