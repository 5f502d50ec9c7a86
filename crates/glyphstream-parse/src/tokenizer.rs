//! Content stream tokenizer.
//!
//! Turns raw content-stream bytes into a sequence of [`Operator`]s, each
//! carrying the operands that preceded it on the operand stack. Inline
//! images (`BI … ID … EI`) are the one special case: their parameter
//! dictionary and raw payload ride on the operator itself.

use crate::error::EngineError;

/// A content stream operand value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Integer number, e.g. `42`, `-7`.
    Integer(i64),
    /// Real number, e.g. `3.14`, `.5`.
    Real(f64),
    /// Name object without the leading `/`, e.g. `F1`.
    Name(String),
    /// Literal string `(…)`, stored as decoded raw bytes.
    LiteralString(Vec<u8>),
    /// Hex string `<…>`, stored as decoded bytes.
    HexString(Vec<u8>),
    /// Array of operands.
    Array(Vec<Operand>),
    /// Inline dictionary `<< … >>` as ordered key/value pairs.
    Dictionary(Vec<(String, Operand)>),
    /// `true` or `false`.
    Boolean(bool),
    /// The null object.
    Null,
}

impl Operand {
    /// Numeric value of an integer or real operand.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Integer(i) => Some(*i as f64),
            Operand::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer value, truncating reals.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Operand::Integer(i) => Some(*i),
            Operand::Real(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Name value.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(name) => Some(name),
            _ => None,
        }
    }

    /// String bytes of a literal or hex string.
    pub fn string_bytes(&self) -> Option<&[u8]> {
        match self {
            Operand::LiteralString(bytes) | Operand::HexString(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Parameter dictionary and payload of an inline image.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// Key/value pairs between `BI` and `ID`, in stream order.
    pub parameters: Vec<(String, Operand)>,
    /// Raw bytes between `ID` and `EI`.
    pub data: Vec<u8>,
}

/// An operator with the operands that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    /// Operator token, e.g. `"BT"`, `"Tf"`, `"re"`.
    pub name: String,
    /// Operands in stack order.
    pub operands: Vec<Operand>,
    /// Present only for the inline-image operator.
    pub inline_image: Option<InlineImage>,
}

impl Operator {
    /// An operator with operands and no inline image.
    pub fn named(name: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self {
            name: name.into(),
            operands,
            inline_image: None,
        }
    }
}

/// Tokenize a content stream into operators.
///
/// # Errors
///
/// Returns [`EngineError::Syntax`] for stream corruption the scanner
/// cannot step over: unterminated strings, arrays, dictionaries, or
/// inline images.
pub fn tokenize(input: &[u8]) -> Result<Vec<Operator>, EngineError> {
    Scanner::new(input).run()
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn run(mut self) -> Result<Vec<Operator>, EngineError> {
        let mut operators = Vec::new();
        let mut stack: Vec<Operand> = Vec::new();

        loop {
            self.skip_whitespace();
            let Some(b) = self.peek() else { break };

            match b {
                b'(' => {
                    let bytes = self.literal_string()?;
                    stack.push(Operand::LiteralString(bytes));
                }
                b'<' => {
                    if self.peek_at(1) == Some(b'<') {
                        stack.push(Operand::Dictionary(self.dictionary()?));
                    } else {
                        stack.push(Operand::HexString(self.hex_string()?));
                    }
                }
                b'[' => {
                    self.pos += 1;
                    stack.push(Operand::Array(self.array()?));
                }
                b'/' => {
                    let name = self.name();
                    stack.push(Operand::Name(name));
                }
                b'0'..=b'9' | b'+' | b'-' | b'.' => {
                    stack.push(self.number()?);
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'*' | b'\'' | b'"' => {
                    let keyword = self.keyword();
                    match keyword.as_str() {
                        "true" => stack.push(Operand::Boolean(true)),
                        "false" => stack.push(Operand::Boolean(false)),
                        "null" => stack.push(Operand::Null),
                        "BI" => {
                            let image = self.inline_image()?;
                            operators.push(Operator {
                                name: keyword,
                                operands: std::mem::take(&mut stack),
                                inline_image: Some(image),
                            });
                        }
                        _ => {
                            operators.push(Operator::named(keyword, std::mem::take(&mut stack)));
                        }
                    }
                }
                b']' => {
                    return Err(EngineError::Syntax(
                        "unexpected ']' outside array".to_string(),
                    ));
                }
                _ => {
                    // Unknown byte at top level: step over it.
                    self.pos += 1;
                }
            }
        }

        Ok(operators)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// One object in array/dictionary/inline-image context, where bare
    /// keywords other than true/false/null degrade to names.
    fn object(&mut self) -> Result<Operand, EngineError> {
        let Some(b) = self.peek() else {
            return Err(EngineError::Syntax("unexpected end of stream".to_string()));
        };
        match b {
            b'(' => Ok(Operand::LiteralString(self.literal_string()?)),
            b'<' => {
                if self.peek_at(1) == Some(b'<') {
                    Ok(Operand::Dictionary(self.dictionary()?))
                } else {
                    Ok(Operand::HexString(self.hex_string()?))
                }
            }
            b'[' => {
                self.pos += 1;
                Ok(Operand::Array(self.array()?))
            }
            b'/' => Ok(Operand::Name(self.name())),
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' => {
                let keyword = self.keyword();
                match keyword.as_str() {
                    "true" => Ok(Operand::Boolean(true)),
                    "false" => Ok(Operand::Boolean(false)),
                    "null" => Ok(Operand::Null),
                    _ => Ok(Operand::Name(keyword)),
                }
            }
            _ => Err(EngineError::Syntax(format!(
                "unexpected byte 0x{b:02X} in object position"
            ))),
        }
    }

    fn literal_string(&mut self) -> Result<Vec<u8>, EngineError> {
        debug_assert_eq!(self.peek(), Some(b'('));
        self.pos += 1;

        let mut bytes = Vec::new();
        let mut depth = 1u32;

        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    bytes.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(bytes);
                    }
                    bytes.push(b);
                }
                b'\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err(EngineError::Syntax(
                            "unterminated escape in literal string".to_string(),
                        ));
                    };
                    self.pos += 1;
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0C),
                        b'(' | b')' | b'\\' => bytes.push(escaped),
                        b'\r' => {
                            // Line continuation: swallow an optional LF.
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = escaped - b'0';
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value.wrapping_mul(8).wrapping_add(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            bytes.push(value);
                        }
                        other => bytes.push(other),
                    }
                }
                _ => bytes.push(b),
            }
        }

        Err(EngineError::Syntax(
            "unterminated literal string".to_string(),
        ))
    }

    fn hex_string(&mut self) -> Result<Vec<u8>, EngineError> {
        debug_assert_eq!(self.peek(), Some(b'<'));
        self.pos += 1;

        let mut digits = Vec::new();
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'>' {
                // Odd digit count: the final digit is padded with 0.
                if digits.len() % 2 != 0 {
                    digits.push(b'0');
                }
                let mut bytes = Vec::with_capacity(digits.len() / 2);
                for pair in digits.chunks(2) {
                    bytes.push((hex_value(pair[0])? << 4) | hex_value(pair[1])?);
                }
                return Ok(bytes);
            }
            if !is_whitespace(b) {
                digits.push(b);
            }
        }

        Err(EngineError::Syntax("unterminated hex string".to_string()))
    }

    fn array(&mut self) -> Result<Vec<Operand>, EngineError> {
        let mut elements = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(EngineError::Syntax("unterminated array".to_string())),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(elements);
                }
                Some(_) => elements.push(self.object()?),
            }
        }
    }

    fn dictionary(&mut self) -> Result<Vec<(String, Operand)>, EngineError> {
        debug_assert_eq!(self.peek(), Some(b'<'));
        self.pos += 2;

        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(EngineError::Syntax("unterminated dictionary".to_string())),
                Some(b'>') if self.peek_at(1) == Some(b'>') => {
                    self.pos += 2;
                    return Ok(entries);
                }
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace();
                    entries.push((key, self.object()?));
                }
                Some(b) => {
                    return Err(EngineError::Syntax(format!(
                        "expected name key in dictionary, got 0x{b:02X}"
                    )));
                }
            }
        }
    }

    fn name(&mut self) -> String {
        debug_assert_eq!(self.peek(), Some(b'/'));
        self.pos += 1;

        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }

        // Expand #XX hex escapes.
        let raw = &self.input[start..self.pos];
        let mut bytes = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Ok(hi), Ok(lo)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    bytes.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            bytes.push(raw[i]);
            i += 1;
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn number(&mut self) -> Result<Operand, EngineError> {
        let start = self.pos;
        let mut real = false;

        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        while let Some(b) = self.peek() {
            if b == b'.' {
                if real {
                    break;
                }
                real = true;
                self.pos += 1;
            } else if b.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }

        let token = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| EngineError::Syntax("invalid bytes in number token".to_string()))?;
        if real {
            token
                .parse::<f64>()
                .map(Operand::Real)
                .map_err(|_| EngineError::Syntax(format!("invalid real number: {token}")))
        } else {
            token
                .parse::<i64>()
                .map(Operand::Integer)
                .map_err(|_| EngineError::Syntax(format!("invalid integer: {token}")))
        }
    }

    fn keyword(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphabetic() || matches!(b, b'*' | b'\'' | b'"' | b'0' | b'1') {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// `BI` has been consumed: read parameters up to `ID`, then raw data
    /// up to a whitespace-framed `EI`.
    fn inline_image(&mut self) -> Result<InlineImage, EngineError> {
        let mut parameters = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(EngineError::Syntax(
                        "unterminated inline image: missing ID".to_string(),
                    ));
                }
                Some(b'I')
                    if self.peek_at(1) == Some(b'D')
                        && self.peek_at(2).is_none_or(is_whitespace) =>
                {
                    self.pos += 2;
                    // Exactly one whitespace byte separates ID from the data.
                    if self.peek().is_some_and(is_whitespace) {
                        self.pos += 1;
                    }
                    break;
                }
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace();
                    parameters.push((key, self.object()?));
                }
                Some(b) => {
                    return Err(EngineError::Syntax(format!(
                        "expected name key in inline image dictionary, got 0x{b:02X}"
                    )));
                }
            }
        }

        let data_start = self.pos;
        while self.pos < self.input.len() {
            let at_start = self.pos == data_start;
            let after_whitespace = self.pos > 0 && is_whitespace(self.input[self.pos - 1]);
            if (at_start || after_whitespace)
                && self.peek() == Some(b'E')
                && self.peek_at(1) == Some(b'I')
                && self
                    .peek_at(2)
                    .is_none_or(|b| is_whitespace(b) || is_delimiter(b))
            {
                let mut data = self.input[data_start..self.pos].to_vec();
                if data.last().copied().is_some_and(is_whitespace) {
                    data.pop();
                }
                self.pos += 2;
                return Ok(InlineImage { parameters, data });
            }
            self.pos += 1;
        }

        Err(EngineError::Syntax(
            "unterminated inline image: missing EI".to_string(),
        ))
    }
}

fn hex_value(b: u8) -> Result<u8, EngineError> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(EngineError::Syntax(format!(
            "invalid hex digit: {:?}",
            b as char
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_and_operator() {
        let ops = tokenize(b"100 200 m").unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name, "m");
        assert_eq!(
            ops[0].operands,
            vec![Operand::Integer(100), Operand::Integer(200)]
        );
    }

    #[test]
    fn reals_with_leading_dot_and_sign() {
        let ops = tokenize(b".5 -.002 +3 w").unwrap();
        assert_eq!(
            ops[0].operands,
            vec![
                Operand::Real(0.5),
                Operand::Real(-0.002),
                Operand::Integer(3)
            ]
        );
    }

    #[test]
    fn name_with_hex_escape() {
        let ops = tokenize(b"/F#231 12 Tf").unwrap();
        assert_eq!(ops[0].operands[0], Operand::Name("F#1".to_string()));
    }

    #[test]
    fn literal_string_escapes() {
        let ops = tokenize(b"(a\\(b\\)c\\n\\101) Tj").unwrap();
        assert_eq!(
            ops[0].operands,
            vec![Operand::LiteralString(b"a(b)c\nA".to_vec())]
        );
    }

    #[test]
    fn literal_string_balanced_parens() {
        let ops = tokenize(b"(a(b)c) Tj").unwrap();
        assert_eq!(
            ops[0].operands,
            vec![Operand::LiteralString(b"a(b)c".to_vec())]
        );
    }

    #[test]
    fn literal_string_line_continuation() {
        let ops = tokenize(b"(ab\\\ncd) Tj").unwrap();
        assert_eq!(ops[0].operands, vec![Operand::LiteralString(b"abcd".to_vec())]);
    }

    #[test]
    fn hex_string_odd_digits_padded() {
        let ops = tokenize(b"<48 65 6C> Tj <ABC> Tj").unwrap();
        assert_eq!(ops[0].operands, vec![Operand::HexString(b"Hel".to_vec())]);
        assert_eq!(ops[1].operands, vec![Operand::HexString(vec![0xAB, 0xC0])]);
    }

    #[test]
    fn nested_arrays() {
        let ops = tokenize(b"[1 [2 3] /N (s)] x").unwrap();
        assert_eq!(
            ops[0].operands,
            vec![Operand::Array(vec![
                Operand::Integer(1),
                Operand::Array(vec![Operand::Integer(2), Operand::Integer(3)]),
                Operand::Name("N".to_string()),
                Operand::LiteralString(b"s".to_vec()),
            ])]
        );
    }

    #[test]
    fn tj_array_with_kerning() {
        let ops = tokenize(b"[(H) -20 (ello)] TJ").unwrap();
        assert_eq!(ops[0].name, "TJ");
        assert_eq!(
            ops[0].operands,
            vec![Operand::Array(vec![
                Operand::LiteralString(b"H".to_vec()),
                Operand::Integer(-20),
                Operand::LiteralString(b"ello".to_vec()),
            ])]
        );
    }

    #[test]
    fn booleans_and_null() {
        let ops = tokenize(b"true false null x").unwrap();
        assert_eq!(
            ops[0].operands,
            vec![
                Operand::Boolean(true),
                Operand::Boolean(false),
                Operand::Null
            ]
        );
    }

    #[test]
    fn dictionary_operand_for_bdc() {
        let ops = tokenize(b"/P << /MCID 0 >> BDC").unwrap();
        assert_eq!(ops[0].name, "BDC");
        assert_eq!(
            ops[0].operands,
            vec![
                Operand::Name("P".to_string()),
                Operand::Dictionary(vec![("MCID".to_string(), Operand::Integer(0))]),
            ]
        );
    }

    #[test]
    fn nested_dictionary() {
        let ops = tokenize(b"<< /A << /B 1 >> >> x").unwrap();
        assert_eq!(
            ops[0].operands,
            vec![Operand::Dictionary(vec![(
                "A".to_string(),
                Operand::Dictionary(vec![("B".to_string(), Operand::Integer(1))]),
            )])]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let ops = tokenize(b"% header\nBT % begin\nET").unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name, "BT");
        assert_eq!(ops[1].name, "ET");
    }

    #[test]
    fn star_and_quote_operators() {
        let ops = tokenize(b"f* T* (x) ' 1 2 (y) \"").unwrap();
        assert_eq!(ops[0].name, "f*");
        assert_eq!(ops[1].name, "T*");
        assert_eq!(ops[2].name, "'");
        assert_eq!(ops[3].name, "\"");
        assert_eq!(ops[3].operands.len(), 3);
    }

    #[test]
    fn type3_metric_operators() {
        let ops = tokenize(b"10 0 d0 10 0 0 0 20 30 d1").unwrap();
        assert_eq!(ops[0].name, "d0");
        assert_eq!(ops[1].name, "d1");
        assert_eq!(ops[1].operands.len(), 6);
    }

    #[test]
    fn inline_image_carries_parameters_and_data() {
        let stream = b"BI\n/W 2 /H 2 /CS /G /BPC 8\nID \x00\xFF\x00\xFF\nEI Q";
        let ops = tokenize(stream).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name, "BI");
        let image = ops[0].inline_image.as_ref().unwrap();
        assert_eq!(image.parameters.len(), 4);
        assert_eq!(
            image.parameters[0],
            ("W".to_string(), Operand::Integer(2))
        );
        assert_eq!(image.data, vec![0x00, 0xFF, 0x00, 0xFF]);
        assert_eq!(ops[1].name, "Q");
    }

    #[test]
    fn inline_image_data_containing_unframed_ei() {
        // "EI" not preceded by whitespace is payload, not the terminator.
        let stream = b"BI /W 1 ID xEI\nEI";
        let ops = tokenize(stream).unwrap();
        let image = ops[0].inline_image.as_ref().unwrap();
        assert_eq!(image.data, b"xEI".to_vec());
    }

    #[test]
    fn unterminated_structures_error() {
        assert!(tokenize(b"(unclosed").is_err());
        assert!(tokenize(b"[1 2").is_err());
        assert!(tokenize(b"<< /A 1").is_err());
        assert!(tokenize(b"<4142").is_err());
        assert!(tokenize(b"BI /W 1 ID data-without-ei").is_err());
        assert!(tokenize(b"]").is_err());
    }

    #[test]
    fn empty_and_whitespace_streams() {
        assert!(tokenize(b"").unwrap().is_empty());
        assert!(tokenize(b" \t\r\n").unwrap().is_empty());
    }

    #[test]
    fn operand_accessors() {
        assert_eq!(Operand::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Operand::Real(2.5).as_f64(), Some(2.5));
        assert_eq!(Operand::Real(2.9).as_i64(), Some(2));
        assert_eq!(Operand::Name("F1".to_string()).as_name(), Some("F1"));
        assert_eq!(Operand::Null.as_f64(), None);
        assert_eq!(
            Operand::LiteralString(b"ab".to_vec()).string_bytes(),
            Some(b"ab".as_slice())
        );
    }

    #[test]
    fn typical_page_stream() {
        let stream = b"q\n1 0 0 1 72 720 cm\nBT\n/F1 12 Tf\n(Test) Tj\nET\n0 0 100 50 re f\nQ";
        let ops = tokenize(stream).unwrap();
        let names: Vec<&str> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["q", "cm", "BT", "Tf", "Tj", "ET", "re", "f", "Q"]
        );
    }
}
