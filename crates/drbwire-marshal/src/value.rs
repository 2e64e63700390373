use std::fmt;

/// The closed universe of values the codec understands.
///
/// Symbols and strings carry explicit byte sequences; nothing is assumed to
/// be valid UTF-8 or NUL-terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `nil`
    Nil,
    /// `true` / `false`
    Bool(bool),
    /// Fixed-width integer; only [-2^30, 2^30) is encodable.
    Integer(i32),
    /// Interned name, e.g. `:instance_eval`.
    Symbol(Vec<u8>),
    /// String with its declared encoding flag (`true` = UTF-8, `false` = US-ASCII).
    String { bytes: Vec<u8>, is_utf8: bool },
    /// Ordered heterogeneous sequence.
    Array(Vec<Value>),
    /// Custom-serialized (`_dump`) object.
    ///
    /// `raw_payload` is kept verbatim so the value can be forwarded bit-for-bit
    /// even when `decoded` is `None`.
    UserDefined {
        tag: Vec<u8>,
        decoded: Option<Box<Value>>,
        raw_payload: Vec<u8>,
    },
}

impl Value {
    /// A UTF-8 string.
    pub fn string(text: impl Into<String>) -> Self {
        Value::String {
            bytes: text.into().into_bytes(),
            is_utf8: true,
        }
    }

    /// A string declared as US-ASCII.
    pub fn ascii(bytes: impl Into<Vec<u8>>) -> Self {
        Value::String {
            bytes: bytes.into(),
            is_utf8: false,
        }
    }

    /// A symbol.
    pub fn symbol(name: impl Into<Vec<u8>>) -> Self {
        Value::Symbol(name.into())
    }

    /// A user-defined value carrying an opaque payload.
    pub fn user_defined(
        tag: impl Into<Vec<u8>>,
        decoded: Option<Value>,
        raw_payload: impl Into<Vec<u8>>,
    ) -> Self {
        Value::UserDefined {
            tag: tag.into(),
            decoded: decoded.map(Box::new),
            raw_payload: raw_payload.into(),
        }
    }

    /// Name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Symbol(_) => "symbol",
            Value::String { .. } => "string",
            Value::Array(_) => "array",
            Value::UserDefined { .. } => "user-defined",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Bytes of a string or symbol.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Symbol(bytes) | Value::String { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    /// Text of a string or symbol, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Nil, Into::into)
    }
}

/// Renders values the way the peer's `inspect` would, with non-printable
/// bytes escaped.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Symbol(name) => {
                f.write_str(":")?;
                write_escaped(f, name)
            }
            Value::String { bytes, is_utf8 } => {
                f.write_str("\"")?;
                write_escaped(f, bytes)?;
                f.write_str("\"")?;
                if !is_utf8 {
                    f.write_str(" (ascii)")?;
                }
                Ok(())
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::UserDefined {
                tag,
                decoded,
                raw_payload,
            } => {
                f.write_str("#<user-defined :")?;
                write_escaped(f, tag)?;
                match decoded {
                    Some(inner) => write!(f, " {inner}>"),
                    None => write!(f, " <{} raw bytes>>", raw_payload.len()),
                }
            }
        }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                c if c.is_control() => write!(f, "{}", c.escape_default())?,
                c => write!(f, "{c}")?,
            }
        }
        for b in chunk.invalid() {
            write!(f, "\\x{b:02X}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_inspect_style() {
        let value = Value::Array(vec![
            Value::Nil,
            Value::Bool(true),
            Value::Integer(-7),
            Value::symbol("instance_eval"),
            Value::string("a \"quoted\" line\n"),
        ]);
        assert_eq!(
            value.to_string(),
            r#"[nil, true, -7, :instance_eval, "a \"quoted\" line\n"]"#
        );
    }

    #[test]
    fn display_escapes_invalid_utf8() {
        let value = Value::ascii(vec![b'o', b'k', 0xFF]);
        assert_eq!(value.to_string(), "\"ok\\xFF\" (ascii)");
    }

    #[test]
    fn display_user_defined() {
        let opaque = Value::user_defined("DRb::DRbObject", None, vec![1, 2, 3]);
        assert_eq!(
            opaque.to_string(),
            "#<user-defined :DRb::DRbObject <3 raw bytes>>"
        );

        let decoded = Value::user_defined("Tag", Some(Value::Integer(5)), vec![0x04, 0x08]);
        assert_eq!(decoded.to_string(), "#<user-defined :Tag 5>");
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(12).as_integer(), Some(12));
        assert_eq!(Value::symbol("E").as_str(), Some("E"));
        assert_eq!(Value::from("hi").as_bytes(), Some(&b"hi"[..]));
        assert!(Value::from(()).is_nil());
        assert!(Value::from(None::<i32>).is_nil());
        assert_eq!(Value::from(vec![Value::Nil]).as_array().map(<[_]>::len), Some(1));
        assert_eq!(Value::Integer(1).as_bool(), None);
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::Nil.kind(), "nil");
        assert_eq!(Value::string("x").kind(), "string");
        assert_eq!(Value::user_defined("T", None, Vec::new()).kind(), "user-defined");
    }
}
