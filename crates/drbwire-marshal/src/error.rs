use std::fmt;

/// A construct of the value format that is recognized but deliberately not
/// implemented.
///
/// Each variant corresponds to exactly one tag byte so diagnostics can name
/// the offending construct instead of reporting a generic parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    /// `;` back-reference into the symbol table.
    SymbolLink,
    /// `@` back-reference into the object table.
    ObjectLink,
    /// `e` object extended with a module.
    Extended,
    /// `l` arbitrary-precision integer.
    Bignum,
    /// `c` class reference.
    Class,
    /// `m` module reference.
    Module,
    /// `M` legacy class-or-module reference.
    ClassOrModule,
    /// `d` wrapped data object.
    Data,
    /// `f` floating point number.
    Float,
    /// `{` hash.
    Hash,
    /// `}` hash with a default value.
    HashWithDefault,
    /// `o` generic object with instance variables.
    Object,
    /// `/` regular expression.
    Regexp,
    /// `S` struct.
    Struct,
    /// `C` instance of a user subclass of a core type.
    UserClass,
    /// `U` object serialized through a user `marshal_dump` callback.
    UserMarshal,
}

impl Construct {
    /// Every unsupported construct, in tag order of the format documentation.
    pub const ALL: [Construct; 16] = [
        Construct::SymbolLink,
        Construct::ObjectLink,
        Construct::Extended,
        Construct::Bignum,
        Construct::Class,
        Construct::Module,
        Construct::ClassOrModule,
        Construct::Data,
        Construct::Float,
        Construct::Hash,
        Construct::HashWithDefault,
        Construct::Object,
        Construct::Regexp,
        Construct::Struct,
        Construct::UserClass,
        Construct::UserMarshal,
    ];

    /// Map a tag byte to the unsupported construct it introduces.
    pub fn from_tag(tag: u8) -> Option<Self> {
        let construct = match tag {
            b';' => Construct::SymbolLink,
            b'@' => Construct::ObjectLink,
            b'e' => Construct::Extended,
            b'l' => Construct::Bignum,
            b'c' => Construct::Class,
            b'm' => Construct::Module,
            b'M' => Construct::ClassOrModule,
            b'd' => Construct::Data,
            b'f' => Construct::Float,
            b'{' => Construct::Hash,
            b'}' => Construct::HashWithDefault,
            b'o' => Construct::Object,
            b'/' => Construct::Regexp,
            b'S' => Construct::Struct,
            b'C' => Construct::UserClass,
            b'U' => Construct::UserMarshal,
            _ => return None,
        };
        Some(construct)
    }

    /// The tag byte that introduces this construct on the wire.
    pub fn tag(self) -> u8 {
        match self {
            Construct::SymbolLink => b';',
            Construct::ObjectLink => b'@',
            Construct::Extended => b'e',
            Construct::Bignum => b'l',
            Construct::Class => b'c',
            Construct::Module => b'm',
            Construct::ClassOrModule => b'M',
            Construct::Data => b'd',
            Construct::Float => b'f',
            Construct::Hash => b'{',
            Construct::HashWithDefault => b'}',
            Construct::Object => b'o',
            Construct::Regexp => b'/',
            Construct::Struct => b'S',
            Construct::UserClass => b'C',
            Construct::UserMarshal => b'U',
        }
    }

    fn name(self) -> &'static str {
        match self {
            Construct::SymbolLink => "symbol back-reference",
            Construct::ObjectLink => "object back-reference",
            Construct::Extended => "extended object",
            Construct::Bignum => "big integer",
            Construct::Class => "class",
            Construct::Module => "module",
            Construct::ClassOrModule => "class/module",
            Construct::Data => "data object",
            Construct::Float => "float",
            Construct::Hash => "hash",
            Construct::HashWithDefault => "hash with default",
            Construct::Object => "object",
            Construct::Regexp => "regular expression",
            Construct::Struct => "struct",
            Construct::UserClass => "user-defined subclass",
            Construct::UserMarshal => "user marshal_dump serialization",
        }
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (tag {:?})", self.name(), self.tag() as char)
    }
}

/// Errors that can occur while encoding or decoding the value format.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MarshalError {
    /// The input ended before the named element was complete.
    #[error("unexpected end of input while decoding {0}")]
    UnexpectedEof(&'static str),

    /// A declared length exceeds the bytes actually available.
    #[error("malformed payload: {what} declares {declared} bytes but only {available} remain")]
    MalformedPayload {
        what: &'static str,
        declared: usize,
        available: usize,
    },

    /// Bytes were left over where the whole input had to be consumed.
    #[error("{count} unconsumed bytes after {what}")]
    TrailingBytes { what: &'static str, count: usize },

    /// A length or count field decoded to a negative number.
    #[error("negative length {len} for {what}")]
    NegativeLength { what: &'static str, len: i64 },

    /// Integer tag bytes 5 and -5 have no defined meaning.
    #[error("integer tag byte {0} is undefined")]
    UndefinedIntegerTag(i8),

    /// A specific element was required but a different tag byte was found.
    #[error("expected {expected} but found tag byte {found:#04x}")]
    UnexpectedTag { expected: &'static str, found: u8 },

    /// A recognized construct that is intentionally unsupported.
    #[error("{0} not supported")]
    Unsupported(Construct),

    /// A tag byte that is not part of the format at all.
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),

    /// An instance-variable wrapper other than the single `:E` encoding flag.
    #[error("unsupported instance variable wrapper: {0}")]
    UnsupportedIvar(String),

    /// Nesting exceeded the decoder's depth limit.
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    /// An integer (value, length or count) outside [-2^30, 2^30).
    #[error("integer {0} outside the encodable range -2**30...2**30")]
    IntegerOutOfRange(i64),
}

impl MarshalError {
    /// Whether the error describes bytes that contradict their own length fields.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            MarshalError::UnexpectedEof(_)
                | MarshalError::MalformedPayload { .. }
                | MarshalError::TrailingBytes { .. }
                | MarshalError::NegativeLength { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MarshalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_tags_roundtrip() {
        for construct in Construct::ALL {
            assert_eq!(Construct::from_tag(construct.tag()), Some(construct));
        }
    }

    #[test]
    fn supported_tags_are_not_constructs() {
        for tag in [b'0', b'T', b'F', b'i', b':', b'"', b'I', b'[', b'u'] {
            assert_eq!(Construct::from_tag(tag), None);
        }
    }

    #[test]
    fn unsupported_message_names_construct() {
        let err = MarshalError::Unsupported(Construct::Float);
        assert_eq!(err.to_string(), "float (tag 'f') not supported");
    }

    #[test]
    fn malformed_classification() {
        assert!(MarshalError::MalformedPayload {
            what: "string",
            declared: 10,
            available: 5
        }
        .is_malformed());
        assert!(!MarshalError::Unsupported(Construct::Hash).is_malformed());
    }
}
