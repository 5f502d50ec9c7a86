//! Resource dictionary lookups and caching.
//!
//! Bridges the engine to the COS layer (lopdf): named lookups for fonts,
//! XObjects, and extended graphics states, memoized by indirect-object
//! identity. Values for a given object id are referentially stable, so
//! overwriting an existing cache entry is harmless.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use lopdf::{Dictionary, Document, Object, ObjectId};

use glyphstream_font::descriptor::FontFlags;
use glyphstream_font::encoding::Encoding;

use crate::flate;
use crate::fonts::{BoundingBox, DescriptorMetrics, PageFont};
use crate::matrix::Matrix;
use crate::state::DashPattern;

/// What a `Do` operand resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum XObjectContent {
    /// A form XObject: a nested content stream.
    Form {
        /// Decoded content stream bytes.
        content: Vec<u8>,
    },
    /// An image XObject.
    Image {
        /// Pixel width, when declared.
        width: Option<i64>,
        /// Pixel height, when declared.
        height: Option<i64>,
    },
}

/// Parameters read from an extended graphics state dictionary (`gs`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtGStateParams {
    /// /LW line width.
    pub line_width: Option<f64>,
    /// /LC line cap.
    pub line_cap: Option<i64>,
    /// /LJ line join.
    pub line_join: Option<i64>,
    /// /ML miter limit.
    pub miter_limit: Option<f64>,
    /// /D dash pattern.
    pub dash: Option<DashPattern>,
    /// /Font entry: font name (or base font) and size.
    pub font: Option<(String, f64)>,
}

/// Named resource lookups the engine performs while interpreting.
///
/// All methods default to "not present" so tests can implement just the
/// pieces they exercise.
pub trait ResourceProvider {
    /// The font for a /Font resource name.
    fn font(&mut self, _name: &str) -> Option<Arc<dyn PageFont>> {
        None
    }

    /// The XObject for a /XObject resource name.
    fn xobject(&mut self, _name: &str) -> Option<XObjectContent> {
        None
    }

    /// The parameters of an /ExtGState resource name.
    fn ext_g_state(&mut self, _name: &str) -> Option<ExtGStateParams> {
        None
    }

    /// The color space family for a /ColorSpace resource name.
    fn color_space(&mut self, _name: &str) -> Option<String> {
        None
    }

    /// The shading type for a /Shading resource name.
    fn shading(&mut self, _name: &str) -> Option<i64> {
        None
    }

    /// The pattern type for a /Pattern resource name.
    fn pattern(&mut self, _name: &str) -> Option<i64> {
        None
    }

    /// The MCID carried by a named /Properties property list.
    fn property_list_mcid(&mut self, _name: &str) -> Option<i64> {
        None
    }
}

/// A provider with no resources at all.
pub struct NoResources;

impl ResourceProvider for NoResources {}

/// Lopdf-backed resource dictionary with identity-keyed memoization.
pub struct Resources<'a> {
    doc: &'a Document,
    dict: &'a Dictionary,
    font_cache: HashMap<ObjectId, Arc<dyn PageFont>>,
    gstate_cache: HashMap<ObjectId, ExtGStateParams>,
    xobject_cache: HashMap<ObjectId, XObjectContent>,
}

impl<'a> Resources<'a> {
    /// Create a resource view over a document and its resources dictionary.
    pub fn new(doc: &'a Document, dict: &'a Dictionary) -> Self {
        Self {
            doc,
            dict,
            font_cache: HashMap::new(),
            gstate_cache: HashMap::new(),
            xobject_cache: HashMap::new(),
        }
    }

    /// Follow an indirect reference, returning the object itself when it
    /// is direct or the reference dangles.
    fn resolve(&self, object: &'a Object) -> &'a Object {
        if let Object::Reference(id) = object {
            if let Ok(target) = self.doc.get_object(*id) {
                return target;
            }
        }
        object
    }

    /// Look up `category → name`, returning the resolved object and the
    /// indirect id it was reached through, when any.
    fn lookup(&self, category: &[u8], name: &str) -> Option<(Option<ObjectId>, &'a Object)> {
        let category_obj = self.dict.get(category).ok()?;
        let category_dict = self.resolve(category_obj).as_dict().ok()?;
        let entry = category_dict.get(name.as_bytes()).ok()?;
        match entry {
            Object::Reference(id) => Some((Some(*id), self.resolve(entry))),
            _ => Some((None, entry)),
        }
    }
}

impl ResourceProvider for Resources<'_> {
    fn font(&mut self, name: &str) -> Option<Arc<dyn PageFont>> {
        let (id, object) = self.lookup(b"Font", name)?;
        if let Some(id) = id {
            if let Some(font) = self.font_cache.get(&id) {
                return Some(font.clone());
            }
        }
        let dict = object.as_dict().ok()?;
        let font: Arc<dyn PageFont> = Arc::new(load_font(self.doc, name, dict));
        if let Some(id) = id {
            self.font_cache.insert(id, font.clone());
        }
        Some(font)
    }

    fn xobject(&mut self, name: &str) -> Option<XObjectContent> {
        let (id, object) = self.lookup(b"XObject", name)?;
        if let Some(id) = id {
            if let Some(content) = self.xobject_cache.get(&id) {
                return Some(content.clone());
            }
        }
        let stream = match object {
            Object::Stream(stream) => stream,
            _ => return None,
        };
        let subtype = name_value(self.doc, &stream.dict, b"Subtype").unwrap_or_default();
        let content = match subtype.as_str() {
            "Form" => {
                let filter = name_value(self.doc, &stream.dict, b"Filter");
                let content = match filter.as_deref() {
                    Some("FlateDecode") => match flate::flate_decode(&stream.content) {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            warn!("failed to decode form XObject {name}: {err}");
                            return None;
                        }
                    },
                    _ => stream.content.clone(),
                };
                XObjectContent::Form { content }
            }
            "Image" => XObjectContent::Image {
                width: integer_value(self.doc, &stream.dict, b"Width"),
                height: integer_value(self.doc, &stream.dict, b"Height"),
            },
            _ => return None,
        };
        if let Some(id) = id {
            self.xobject_cache.insert(id, content.clone());
        }
        Some(content)
    }

    fn ext_g_state(&mut self, name: &str) -> Option<ExtGStateParams> {
        let (id, object) = self.lookup(b"ExtGState", name)?;
        if let Some(id) = id {
            if let Some(params) = self.gstate_cache.get(&id) {
                return Some(params.clone());
            }
        }
        let dict = object.as_dict().ok()?;
        let params = parse_ext_g_state(self.doc, dict);
        if let Some(id) = id {
            self.gstate_cache.insert(id, params.clone());
        }
        Some(params)
    }

    fn color_space(&mut self, name: &str) -> Option<String> {
        let (_, object) = self.lookup(b"ColorSpace", name)?;
        match object {
            Object::Name(family) => Some(String::from_utf8_lossy(family).into_owned()),
            // Parameterized spaces: the family is the first array element.
            Object::Array(elements) => match self.resolve(elements.first()?) {
                Object::Name(family) => Some(String::from_utf8_lossy(family).into_owned()),
                _ => None,
            },
            _ => None,
        }
    }

    fn shading(&mut self, name: &str) -> Option<i64> {
        let (_, object) = self.lookup(b"Shading", name)?;
        let dict = match object {
            Object::Dictionary(dict) => dict,
            Object::Stream(stream) => &stream.dict,
            _ => return None,
        };
        integer_value(self.doc, dict, b"ShadingType")
    }

    fn pattern(&mut self, name: &str) -> Option<i64> {
        let (_, object) = self.lookup(b"Pattern", name)?;
        let dict = match object {
            Object::Dictionary(dict) => dict,
            Object::Stream(stream) => &stream.dict,
            _ => return None,
        };
        integer_value(self.doc, dict, b"PatternType")
    }

    fn property_list_mcid(&mut self, name: &str) -> Option<i64> {
        let (_, object) = self.lookup(b"Properties", name)?;
        integer_value(self.doc, object.as_dict().ok()?, b"MCID")
    }
}

fn parse_ext_g_state(doc: &Document, dict: &Dictionary) -> ExtGStateParams {
    let mut params = ExtGStateParams {
        line_width: number_value(doc, dict, b"LW"),
        line_cap: integer_value(doc, dict, b"LC"),
        line_join: integer_value(doc, dict, b"LJ"),
        miter_limit: number_value(doc, dict, b"ML"),
        dash: None,
        font: None,
    };

    if let Ok(object) = dict.get(b"D") {
        if let Ok(outer) = deref(doc, object).as_array() {
            // /D is [[dash array] phase].
            if outer.len() >= 2 {
                let array = deref(doc, &outer[0])
                    .as_array()
                    .map(|values| values.iter().filter_map(object_to_f64).collect())
                    .unwrap_or_default();
                let phase = object_to_f64(deref(doc, &outer[1])).unwrap_or(0.0);
                params.dash = Some(DashPattern { array, phase });
            }
        }
    }

    if let Ok(object) = dict.get(b"Font") {
        if let Ok(entry) = deref(doc, object).as_array() {
            if entry.len() >= 2 {
                let font_name = deref(doc, &entry[0])
                    .as_dict()
                    .ok()
                    .and_then(|font_dict| name_value(doc, font_dict, b"BaseFont"));
                let size = object_to_f64(deref(doc, &entry[1]));
                if let (Some(font_name), Some(size)) = (font_name, size) {
                    params.font = Some((font_name, size));
                }
            }
        }
    }

    params
}

/// A font materialized from a /Font dictionary.
///
/// Carries everything the positioning heuristic consumes; glyph outlines
/// and embedded font programs stay with the host's font loader.
struct LoadedFont {
    name: String,
    composite: bool,
    type3: bool,
    vertical: bool,
    first_char: u32,
    widths: Vec<f64>,
    encoding: Option<Encoding>,
    metrics: DescriptorMetrics,
    font_matrix: Matrix,
}

impl PageFont for LoadedFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn advance_width(&self, code: u32) -> f64 {
        if let Some(index) = code.checked_sub(self.first_char) {
            if let Some(&width) = self.widths.get(index as usize) {
                return width;
            }
        }
        self.metrics.missing_width
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

    fn font_matrix(&self) -> Matrix {
        self.font_matrix
    }

    fn is_vertical(&self) -> bool {
        self.vertical
    }

    fn is_composite(&self) -> bool {
        self.composite
    }

    fn is_type3(&self) -> bool {
        self.type3
    }

    fn to_unicode(&self, code: u32) -> Option<String> {
        let encoding = self.encoding.as_ref()?;
        let byte = u8::try_from(code).ok()?;
        encoding.unicode(byte).map(String::from)
    }
}

fn load_font(doc: &Document, resource_name: &str, dict: &Dictionary) -> LoadedFont {
    let subtype = name_value(doc, dict, b"Subtype").unwrap_or_default();
    let base_font = name_value(doc, dict, b"BaseFont");
    let composite = subtype == "Type0";
    let type3 = subtype == "Type3";

    let first_char = integer_value(doc, dict, b"FirstChar").unwrap_or(0).max(0) as u32;
    let widths = dict
        .get(b"Widths")
        .ok()
        .map(|object| deref(doc, object))
        .and_then(|object| object.as_array().ok())
        .map(|values| values.iter().filter_map(object_to_f64).collect())
        .unwrap_or_default();

    let descriptor = dict
        .get(b"FontDescriptor")
        .ok()
        .map(|object| deref(doc, object))
        .and_then(|object| object.as_dict().ok());

    let mut metrics = DescriptorMetrics::default();
    let mut flags = FontFlags::empty();
    if let Some(descriptor) = descriptor {
        flags = FontFlags::from_bits_truncate(
            integer_value(doc, descriptor, b"Flags").unwrap_or(0) as u32,
        );
        metrics.cap_height = number_value(doc, descriptor, b"CapHeight").unwrap_or(0.0);
        metrics.ascent = number_value(doc, descriptor, b"Ascent").unwrap_or(0.0);
        metrics.descent = number_value(doc, descriptor, b"Descent").unwrap_or(0.0);
        metrics.missing_width = number_value(doc, descriptor, b"MissingWidth").unwrap_or(0.0);
        if let Ok(object) = descriptor.get(b"FontBBox") {
            if let Ok(values) = deref(doc, object).as_array() {
                let corners: Vec<f64> = values.iter().filter_map(object_to_f64).collect();
                if corners.len() == 4 {
                    metrics.bounding_box =
                        BoundingBox::new(corners[0], corners[1], corners[2], corners[3]);
                }
            }
        }
    }

    // Vertical writing is signalled by a -V predefined CMap on Type0 fonts.
    let vertical = composite
        && name_value(doc, dict, b"Encoding")
            .map(|encoding| encoding.ends_with("-V"))
            .unwrap_or(false);

    let font_matrix = dict
        .get(b"FontMatrix")
        .ok()
        .map(|object| deref(doc, object))
        .and_then(|object| object.as_array().ok())
        .map(|values| values.iter().filter_map(object_to_f64).collect::<Vec<f64>>())
        .filter(|values| values.len() == 6)
        .map(|v| Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
        .unwrap_or_else(|| Matrix::new(0.001, 0.0, 0.0, 0.001, 0.0, 0.0));

    let encoding = if composite {
        None
    } else if dict.has(b"Encoding") {
        Some(read_encoding(doc, dict))
    } else if flags.symbolic() == Some(true) {
        // A symbolic font without a declared encoding maps codes through
        // the font program, not a name table.
        None
    } else {
        Some(Encoding::Standard)
    };

    LoadedFont {
        name: base_font.unwrap_or_else(|| resource_name.to_string()),
        composite,
        type3,
        vertical,
        first_char,
        widths,
        encoding,
        metrics,
        font_matrix,
    }
}

fn read_encoding(doc: &Document, dict: &Dictionary) -> Encoding {
    let Ok(object) = dict.get(b"Encoding") else {
        return Encoding::Standard;
    };
    match deref(doc, object) {
        Object::Name(name) => encoding_by_name(&String::from_utf8_lossy(name)),
        Object::Dictionary(encoding_dict) => {
            let base = name_value(doc, encoding_dict, b"BaseEncoding")
                .map(|name| Box::new(encoding_by_name(&name)));
            let mut differences = HashMap::new();
            if let Ok(entry) = encoding_dict.get(b"Differences") {
                if let Ok(values) = deref(doc, entry).as_array() {
                    // [code /name /name ... code /name ...]
                    let mut code: i64 = 0;
                    for value in values {
                        match deref(doc, value) {
                            Object::Integer(i) => code = *i,
                            Object::Name(name) => {
                                if let Ok(byte) = u8::try_from(code) {
                                    differences
                                        .insert(byte, String::from_utf8_lossy(name).into_owned());
                                }
                                code += 1;
                            }
                            _ => {}
                        }
                    }
                }
            }
            Encoding::Dictionary { base, differences }
        }
        _ => Encoding::Standard,
    }
}

fn encoding_by_name(name: &str) -> Encoding {
    match name {
        "WinAnsiEncoding" => Encoding::WinAnsi,
        "MacRomanEncoding" => Encoding::MacRoman,
        _ => Encoding::Standard,
    }
}

fn deref<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    if let Object::Reference(id) = object {
        if let Ok(target) = doc.get_object(*id) {
            return target;
        }
    }
    object
}

fn object_to_f64(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

fn number_value(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    dict.get(key).ok().and_then(|o| object_to_f64(deref(doc, o)))
}

fn integer_value(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key).ok().map(|o| deref(doc, o))? {
        Object::Integer(i) => Some(*i),
        Object::Real(f) => Some(*f as i64),
        _ => None,
    }
}

fn name_value(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok().map(|o| deref(doc, o))? {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}
