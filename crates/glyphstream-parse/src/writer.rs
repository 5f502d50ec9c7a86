//! Content stream serialization.
//!
//! Writes operand tokens and operators back out in PDF content stream
//! syntax, byte-exact for round-tripping: numbers through a fixed-precision
//! fast formatter with a slow fallback, names and strings with the
//! required escapes, operators as bare ASCII tokens terminated by a
//! newline, and inline images as `BI … ID … EI` blocks.

use std::io::Write;

use lopdf::{Object, ObjectId};

use crate::error::EngineError;
use crate::tokenizer::{Operand, Operator};

const MAX_FRACTION_DIGITS: usize = 5;

/// Serializes content stream tokens to an output stream.
pub struct ContentStreamWriter<W: Write> {
    output: W,
}

impl<W: Write> ContentStreamWriter<W> {
    /// Create a writer over an output stream.
    pub fn new(output: W) -> Self {
        Self { output }
    }

    /// Consume the writer, returning the output stream.
    pub fn into_inner(self) -> W {
        self.output
    }

    /// Write one operand token followed by a separating space.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownToken`] for object kinds that cannot appear
    /// in a content stream (streams, references).
    pub fn write_object(&mut self, object: &Object) -> Result<(), EngineError> {
        match object {
            Object::Null => self.output.write_all(b"null ")?,
            Object::Boolean(true) => self.output.write_all(b"true ")?,
            Object::Boolean(false) => self.output.write_all(b"false ")?,
            Object::Integer(value) => {
                self.output.write_all(value.to_string().as_bytes())?;
                self.output.write_all(b" ")?;
            }
            Object::Real(value) => {
                self.output
                    .write_all(format_real(f64::from(*value)).as_bytes())?;
                self.output.write_all(b" ")?;
            }
            Object::Name(name) => {
                self.write_name(name)?;
                self.output.write_all(b" ")?;
            }
            Object::String(bytes, _) => {
                self.write_string(bytes)?;
                self.output.write_all(b" ")?;
            }
            Object::Array(elements) => {
                self.output.write_all(b"[")?;
                for element in elements {
                    self.write_object(element)?;
                }
                self.output.write_all(b"] ")?;
            }
            Object::Dictionary(dict) => {
                self.output.write_all(b"<<")?;
                for (key, value) in dict.iter() {
                    self.write_name(key)?;
                    self.output.write_all(b" ")?;
                    self.write_object(value)?;
                }
                self.output.write_all(b">> ")?;
            }
            other => {
                return Err(EngineError::UnknownToken(format!("{other:?}")));
            }
        }
        Ok(())
    }

    /// Write an operator token terminated by a newline. Inline-image
    /// operators expand to their full `BI`/`ID`/`EI` block.
    pub fn write_operator(&mut self, operator: &Operator) -> Result<(), EngineError> {
        if let Some(image) = &operator.inline_image {
            self.output.write_all(b"BI\n")?;
            for (key, value) in &image.parameters {
                self.write_name(key.as_bytes())?;
                self.output.write_all(b" ")?;
                self.write_object(&operand_to_object(value))?;
                self.output.write_all(b"\n")?;
            }
            self.output.write_all(b"ID\n")?;
            self.output.write_all(&image.data)?;
            self.output.write_all(b"\nEI\n")?;
            return Ok(());
        }
        self.output.write_all(operator.name.as_bytes())?;
        self.output.write_all(b"\n")?;
        Ok(())
    }

    /// Write a full operator with its operands.
    pub fn write_tokens(&mut self, operator: &Operator) -> Result<(), EngineError> {
        for operand in &operator.operands {
            self.write_object(&operand_to_object(operand))?;
        }
        self.write_operator(operator)
    }

    fn write_name(&mut self, name: &[u8]) -> Result<(), EngineError> {
        self.output.write_all(b"/")?;
        for &b in name {
            let escape = !b.is_ascii_graphic() || b == b'#' || is_delimiter(b);
            if escape {
                self.output.write_all(format!("#{b:02X}").as_bytes())?;
            } else {
                self.output.write_all(&[b])?;
            }
        }
        Ok(())
    }

    fn write_string(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        self.output.write_all(b"(")?;
        for &b in bytes {
            match b {
                b'(' => self.output.write_all(b"\\(")?,
                b')' => self.output.write_all(b"\\)")?,
                b'\\' => self.output.write_all(b"\\\\")?,
                b'\n' => self.output.write_all(b"\\n")?,
                b'\r' => self.output.write_all(b"\\r")?,
                b'\t' => self.output.write_all(b"\\t")?,
                0x08 => self.output.write_all(b"\\b")?,
                0x0C => self.output.write_all(b"\\f")?,
                b if b < 0x20 => self.output.write_all(format!("\\{b:03o}").as_bytes())?,
                b => self.output.write_all(&[b])?,
            }
        }
        self.output.write_all(b")")?;
        Ok(())
    }
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Convert a tokenizer operand to the COS object it denotes.
pub fn operand_to_object(operand: &Operand) -> Object {
    match operand {
        Operand::Integer(i) => Object::Integer(*i),
        Operand::Real(f) => Object::Real(*f as f32),
        Operand::Name(name) => Object::Name(name.as_bytes().to_vec()),
        Operand::LiteralString(bytes) => {
            Object::String(bytes.clone(), lopdf::StringFormat::Literal)
        }
        Operand::HexString(bytes) => {
            Object::String(bytes.clone(), lopdf::StringFormat::Hexadecimal)
        }
        Operand::Array(elements) => {
            Object::Array(elements.iter().map(operand_to_object).collect())
        }
        Operand::Dictionary(entries) => {
            let mut dict = lopdf::Dictionary::new();
            for (key, value) in entries {
                dict.set(key.as_bytes().to_vec(), operand_to_object(value));
            }
            Object::Dictionary(dict)
        }
        Operand::Boolean(value) => Object::Boolean(*value),
        Operand::Null => Object::Null,
    }
}

/// Format a real number for a content stream.
///
/// Fixed precision of five fractional digits with trailing zeros trimmed;
/// values the fast path cannot represent fall back to the default float
/// formatting.
fn format_real(value: f64) -> String {
    fast_format(value).unwrap_or_else(|| value.to_string())
}

fn fast_format(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let scale = 10i64.pow(MAX_FRACTION_DIGITS as u32);
    let scaled = (value * scale as f64).round();
    if scaled.abs() >= i64::MAX as f64 {
        return None;
    }
    let mut scaled = scaled as i64;

    let mut out = String::new();
    if scaled < 0 {
        out.push('-');
        scaled = -scaled;
    }
    let integer = scaled / scale;
    let fraction = scaled % scale;
    out.push_str(&integer.to_string());
    if fraction != 0 {
        out.push('.');
        let digits = format!("{fraction:0width$}", width = MAX_FRACTION_DIGITS);
        out.push_str(digits.trim_end_matches('0'));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{InlineImage, tokenize};

    fn write_objects(objects: &[Object]) -> String {
        let mut writer = ContentStreamWriter::new(Vec::new());
        for object in objects {
            writer.write_object(object).unwrap();
        }
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn numbers_and_booleans() {
        let out = write_objects(&[
            Object::Integer(42),
            Object::Integer(-7),
            Object::Real(3.5),
            Object::Boolean(true),
            Object::Null,
        ]);
        assert_eq!(out, "42 -7 3.5 true null ");
    }

    #[test]
    fn real_formatting_trims_trailing_zeros() {
        assert_eq!(format_real(1.0), "1");
        assert_eq!(format_real(0.5), "0.5");
        assert_eq!(format_real(-0.25), "-0.25");
        assert_eq!(format_real(100.10000), "100.1");
        assert_eq!(format_real(0.0), "0");
    }

    #[test]
    fn real_formatting_rounds_to_five_digits() {
        assert_eq!(format_real(0.123456789), "0.12346");
        assert_eq!(format_real(1.000001), "1");
    }

    #[test]
    fn real_formatting_falls_back_for_huge_values() {
        let formatted = format_real(1.0e30);
        assert!(formatted.contains("e30") || formatted.contains("00000"));
    }

    #[test]
    fn names_are_escaped() {
        let out = write_objects(&[Object::Name(b"F 1#x".to_vec())]);
        assert_eq!(out, "/F#201#23x ");
    }

    #[test]
    fn strings_are_escaped() {
        let out = write_objects(&[Object::String(
            b"a(b)\\c\nd".to_vec(),
            lopdf::StringFormat::Literal,
        )]);
        assert_eq!(out, "(a\\(b\\)\\\\c\\nd) ");
    }

    #[test]
    fn arrays_and_dictionaries() {
        let mut dict = lopdf::Dictionary::new();
        dict.set("MCID", Object::Integer(3));
        let out = write_objects(&[
            Object::Array(vec![Object::Integer(1), Object::Real(2.5)]),
            Object::Dictionary(dict),
        ]);
        assert_eq!(out, "[1 2.5 ] <</MCID 3 >> ");
    }

    #[test]
    fn stream_and_reference_tokens_are_rejected() {
        let mut writer = ContentStreamWriter::new(Vec::new());
        let id: ObjectId = (1, 0);
        let result = writer.write_object(&Object::Reference(id));
        assert!(matches!(result, Err(EngineError::UnknownToken(_))));
        assert!(result.unwrap_err().is_fatal());
    }

    #[test]
    fn operator_terminated_by_newline() {
        let mut writer = ContentStreamWriter::new(Vec::new());
        writer
            .write_tokens(&Operator::named(
                "re",
                vec![
                    Operand::Integer(0),
                    Operand::Integer(0),
                    Operand::Integer(100),
                    Operand::Integer(50),
                ],
            ))
            .unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out, "0 0 100 50 re\n");
    }

    #[test]
    fn inline_image_block() {
        let mut writer = ContentStreamWriter::new(Vec::new());
        writer
            .write_operator(&Operator {
                name: "BI".to_string(),
                operands: Vec::new(),
                inline_image: Some(InlineImage {
                    parameters: vec![
                        ("W".to_string(), Operand::Integer(2)),
                        ("H".to_string(), Operand::Integer(1)),
                    ],
                    data: vec![0xAA, 0xBB],
                }),
            })
            .unwrap();
        let out = writer.into_inner();
        assert_eq!(out, b"BI\n/W 2 \n/H 1 \nID\n\xAA\xBB\nEI\n".to_vec());
    }

    #[test]
    fn round_trip_through_tokenizer() {
        let source = b"q\n1 0 0 1 72.5 720 cm\nBT\n/F1 12 Tf\n(Hi \\(there\\)) Tj\nET\nQ";
        let operators = tokenize(source).unwrap();

        let mut writer = ContentStreamWriter::new(Vec::new());
        for operator in &operators {
            writer.write_tokens(operator).unwrap();
        }
        let written = writer.into_inner();

        let reparsed = tokenize(&written).unwrap();
        assert_eq!(operators, reparsed);
    }

    #[test]
    fn round_trip_preserves_tj_arrays() {
        let source = b"[(A) -120 (B)] TJ";
        let operators = tokenize(source).unwrap();
        let mut writer = ContentStreamWriter::new(Vec::new());
        for operator in &operators {
            writer.write_tokens(operator).unwrap();
        }
        let reparsed = tokenize(&writer.into_inner()).unwrap();
        assert_eq!(operators, reparsed);
    }
}
