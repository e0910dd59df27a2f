//! Signature grammar and ABI type descriptors
//!
//! A declared signature is a list of type tokens. Each token maps to an
//! [`AbiType`] (the native value class libffi needs for layout) plus an
//! optional [`CodecHint`] telling the value codec how to render slots whose
//! ABI class alone is ambiguous (a `char *` and a `void *` are both
//! pointers on the wire).

use libffi::middle::Type;

/// Native value class of one argument or return slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AbiType {
    Void,
    SInt8,
    UInt8,
    SInt16,
    UInt16,
    SInt32,
    UInt32,
    SInt64,
    UInt64,
    Float,
    Double,
    Pointer,
}

impl AbiType {
    /// Get size of type in bytes
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::SInt8 | Self::UInt8 => 1,
            Self::SInt16 | Self::UInt16 => 2,
            Self::SInt32 | Self::UInt32 | Self::Float => 4,
            Self::SInt64 | Self::UInt64 | Self::Double | Self::Pointer => 8,
        }
    }

    /// Get alignment requirement
    #[inline]
    pub const fn align(self) -> usize {
        self.size()
    }

    /// Check if type is integral
    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::SInt8
                | Self::UInt8
                | Self::SInt16
                | Self::UInt16
                | Self::SInt32
                | Self::UInt32
                | Self::SInt64
                | Self::UInt64
        )
    }

    /// Check if type is floating point
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Canonical codec tag for this value class
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::SInt8 => "char",
            Self::UInt8 => "uchar",
            Self::SInt16 => "short",
            Self::UInt16 => "ushort",
            Self::SInt32 => "int",
            Self::UInt32 => "uint",
            Self::SInt64 => "long",
            Self::UInt64 => "ulong",
            Self::Float => "float",
            Self::Double => "double",
            Self::Pointer => "pointer",
        }
    }

    /// The libffi type descriptor for this value class
    pub(crate) fn ffi_type(self) -> Type {
        match self {
            Self::Void => Type::void(),
            Self::SInt8 => Type::i8(),
            Self::UInt8 => Type::u8(),
            Self::SInt16 => Type::i16(),
            Self::UInt16 => Type::u16(),
            Self::SInt32 => Type::i32(),
            Self::UInt32 => Type::u32(),
            Self::SInt64 => Type::i64(),
            Self::UInt64 => Type::u64(),
            Self::Float => Type::f32(),
            Self::Double => Type::f64(),
            Self::Pointer => Type::pointer(),
        }
    }
}

/// Pointer sub-kind the raw ABI class cannot express
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecHint {
    /// Render the pointer itself as an address
    Raw,
    /// Render the referenced NUL-terminated bytes as text
    CString,
}

/// One declared slot: ABI class plus codec hint, always carried together
///
/// The argument-type array handed to libffi is derived from the same
/// ordered `Vec<TypeSpec>` the dispatcher decodes from, so slot `i` of the
/// call interface and slot `i` of the decoding metadata can never diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    pub abi: AbiType,
    pub hint: Option<CodecHint>,
}

impl TypeSpec {
    /// Parse one signature token.
    ///
    /// Parsing is pure; a failed token must abort the whole generation
    /// request rather than leave a partially built signature behind.
    pub fn parse(token: &str) -> Result<Self, ParseError> {
        let (abi, hint) = match token {
            "void" => (AbiType::Void, None),
            "char" | "int8" => (AbiType::SInt8, None),
            "uchar" | "uint8" => (AbiType::UInt8, None),
            "short" | "int16" => (AbiType::SInt16, None),
            "ushort" | "uint16" => (AbiType::UInt16, None),
            "int" | "int32" => (AbiType::SInt32, None),
            "uint" | "uint32" => (AbiType::UInt32, None),
            "long" | "int64" => (AbiType::SInt64, None),
            "ulong" | "uint64" => (AbiType::UInt64, None),
            "float" => (AbiType::Float, None),
            "double" => (AbiType::Double, None),
            "pointer" => (AbiType::Pointer, Some(CodecHint::Raw)),
            "string" => (AbiType::Pointer, Some(CodecHint::CString)),
            _ => return Err(ParseError::UnknownToken(token.to_owned())),
        };
        Ok(Self { abi, hint })
    }

    /// Parse a token in return position
    #[inline]
    pub fn parse_return(token: &str) -> Result<Self, ParseError> {
        Self::parse(token)
    }

    /// Parse a token in argument position; `void` is not a value an
    /// argument slot can carry.
    pub fn parse_arg(token: &str) -> Result<Self, ParseError> {
        let spec = Self::parse(token)?;
        if spec.abi == AbiType::Void {
            return Err(ParseError::VoidArgument);
        }
        Ok(spec)
    }
}

/// Signature token errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnknownToken(String),
    VoidArgument,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownToken(token) => {
                write!(f, "unknown type token `{}`", token)
            }
            Self::VoidArgument => write!(f, "`void` is only valid as a return type"),
        }
    }
}

impl std::error::Error for ParseError {}
