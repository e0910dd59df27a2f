//! Value codec - tagged textual encoding of native values
//!
//! Interpreted code cannot hold native binary values, so every value that
//! crosses the boundary travels as a `tag:literal` token (`"int:3"`,
//! `"pointer:0x7f90"`). [`decode`] renders a raw argument slot as a token;
//! [`encode`] parses a token back into a native value. The contract is that
//! `encode` accepts anything `decode` produced for the same ABI type.

use std::ffi::{c_char, c_void, CStr};

use crate::callback::{AbiType, CodecHint, TypeSpec};

/// Native value container (untagged union)
#[repr(C)]
pub union AbiValue {
    pub sint8: i8,
    pub uint8: u8,
    pub sint16: i16,
    pub uint16: u16,
    pub sint32: i32,
    pub uint32: u32,
    pub sint64: i64,
    pub uint64: u64,
    pub float: f32,
    pub double: f64,
    pub ptr: *const c_void,
}

impl AbiValue {
    /// Create null pointer
    #[inline]
    pub const fn null() -> Self {
        Self {
            ptr: core::ptr::null(),
        }
    }

    /// Deposit this value through a raw slot pointer.
    ///
    /// This is how an interpreted function fills the return slot whose
    /// address the dispatcher advertised to it.
    ///
    /// # Safety
    ///
    /// `slot` must be valid for writes of `abi.size()` bytes.
    pub unsafe fn write(self, abi: AbiType, slot: *mut c_void) {
        match abi {
            AbiType::Void => {}
            AbiType::SInt8 => (slot as *mut i8).write_unaligned(self.sint8),
            AbiType::UInt8 => (slot as *mut u8).write_unaligned(self.uint8),
            AbiType::SInt16 => (slot as *mut i16).write_unaligned(self.sint16),
            AbiType::UInt16 => (slot as *mut u16).write_unaligned(self.uint16),
            AbiType::SInt32 => (slot as *mut i32).write_unaligned(self.sint32),
            AbiType::UInt32 => (slot as *mut u32).write_unaligned(self.uint32),
            AbiType::SInt64 => (slot as *mut i64).write_unaligned(self.sint64),
            AbiType::UInt64 => (slot as *mut u64).write_unaligned(self.uint64),
            AbiType::Float => (slot as *mut f32).write_unaligned(self.float),
            AbiType::Double => (slot as *mut f64).write_unaligned(self.double),
            AbiType::Pointer => (slot as *mut *const c_void).write_unaligned(self.ptr),
        }
    }
}

// Manual implementations since a union doesn't auto-derive
impl Copy for AbiValue {}
impl Clone for AbiValue {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl core::fmt::Debug for AbiValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "AbiValue {{ ... }}")
    }
}

/// Render one native argument slot as a tagged token.
///
/// Pointer slots use the codec hint: `Raw` renders the address itself,
/// `CString` renders the referenced NUL-terminated bytes. A null `char *`
/// renders as `pointer:0x0` so the null stays visible to interpreted code.
///
/// # Safety
///
/// `slot` must point to a live value of the ABI type described by `spec`,
/// as arranged by the native caller for the duration of one dispatch. For
/// hint `CString`, a non-null stored pointer must reference a
/// NUL-terminated buffer.
pub unsafe fn decode(spec: &TypeSpec, slot: *const c_void) -> Result<String, CodecError> {
    let token = match spec.abi {
        AbiType::Void => return Err(CodecError::Unsupported("void")),
        AbiType::SInt8 => format!("char:{}", (slot as *const i8).read_unaligned()),
        AbiType::UInt8 => format!("uchar:{}", (slot as *const u8).read_unaligned()),
        AbiType::SInt16 => format!("short:{}", (slot as *const i16).read_unaligned()),
        AbiType::UInt16 => format!("ushort:{}", (slot as *const u16).read_unaligned()),
        AbiType::SInt32 => format!("int:{}", (slot as *const i32).read_unaligned()),
        AbiType::UInt32 => format!("uint:{}", (slot as *const u32).read_unaligned()),
        AbiType::SInt64 => format!("long:{}", (slot as *const i64).read_unaligned()),
        AbiType::UInt64 => format!("ulong:{}", (slot as *const u64).read_unaligned()),
        AbiType::Float => format!("float:{}", (slot as *const f32).read_unaligned()),
        AbiType::Double => format!("double:{}", (slot as *const f64).read_unaligned()),
        AbiType::Pointer => match spec.hint {
            Some(CodecHint::CString) => {
                let ptr = (slot as *const *const c_char).read_unaligned();
                if ptr.is_null() {
                    String::from("pointer:0x0")
                } else {
                    format!("string:{}", CStr::from_ptr(ptr).to_string_lossy())
                }
            }
            _ => {
                format!("pointer:{:#x}", (slot as *const usize).read_unaligned())
            }
        },
    };
    Ok(token)
}

/// Parse a tagged token back into a native value.
///
/// `string:` tokens are rejected: the codec has nowhere to keep the
/// referenced bytes alive, so interpreted code deposits pointers as
/// `pointer:` tokens instead.
pub fn encode(text: &str) -> Result<(AbiType, AbiValue), CodecError> {
    let (tag, literal) = text.split_once(':').ok_or(CodecError::MissingTag)?;
    let spec = TypeSpec::parse(tag).map_err(|_| CodecError::UnknownTag(tag.to_owned()))?;

    let bad = || CodecError::BadLiteral {
        tag: tag.to_owned(),
        literal: literal.to_owned(),
    };

    let value = match spec.abi {
        AbiType::Void => return Err(CodecError::Unsupported("void")),
        AbiType::SInt8 => AbiValue {
            sint8: literal.parse().map_err(|_| bad())?,
        },
        AbiType::UInt8 => AbiValue {
            uint8: literal.parse().map_err(|_| bad())?,
        },
        AbiType::SInt16 => AbiValue {
            sint16: literal.parse().map_err(|_| bad())?,
        },
        AbiType::UInt16 => AbiValue {
            uint16: literal.parse().map_err(|_| bad())?,
        },
        AbiType::SInt32 => AbiValue {
            sint32: literal.parse().map_err(|_| bad())?,
        },
        AbiType::UInt32 => AbiValue {
            uint32: literal.parse().map_err(|_| bad())?,
        },
        AbiType::SInt64 => AbiValue {
            sint64: literal.parse().map_err(|_| bad())?,
        },
        AbiType::UInt64 => AbiValue {
            uint64: literal.parse().map_err(|_| bad())?,
        },
        AbiType::Float => AbiValue {
            float: literal.parse().map_err(|_| bad())?,
        },
        AbiType::Double => AbiValue {
            double: literal.parse().map_err(|_| bad())?,
        },
        AbiType::Pointer => {
            if spec.hint == Some(CodecHint::CString) {
                return Err(CodecError::Unsupported("string"));
            }
            let bits = match literal.strip_prefix("0x") {
                Some(hex) => usize::from_str_radix(hex, 16),
                None => literal.parse::<usize>(),
            }
            .map_err(|_| bad())?;
            AbiValue {
                ptr: bits as *const c_void,
            }
        }
    };

    Ok((spec.abi, value))
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    MissingTag,
    UnknownTag(String),
    BadLiteral { tag: String, literal: String },
    Unsupported(&'static str),
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingTag => write!(f, "token carries no type tag"),
            Self::UnknownTag(tag) => write!(f, "unknown type tag `{}`", tag),
            Self::BadLiteral { tag, literal } => {
                write!(f, "cannot parse `{}` as a `{}` literal", literal, tag)
            }
            Self::Unsupported(tag) => {
                write!(f, "`{}` values cannot be represented here", tag)
            }
        }
    }
}

impl std::error::Error for CodecError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(token: &str) -> TypeSpec {
        TypeSpec::parse(token).unwrap()
    }

    fn roundtrip(token: &str, value: AbiValue, abi: AbiType) -> String {
        let mut slot = [0u8; 8];
        unsafe { value.write(abi, slot.as_mut_ptr() as *mut c_void) };
        let text = unsafe { decode(&spec(token), slot.as_ptr() as *const c_void) }.unwrap();
        let (back_abi, back) = encode(&text).unwrap();
        assert_eq!(back_abi, abi);
        let mut out = [0u8; 8];
        unsafe { back.write(abi, out.as_mut_ptr() as *mut c_void) };
        assert_eq!(slot, out);
        text
    }

    #[test]
    fn test_integer_roundtrips() {
        assert_eq!(
            roundtrip("char", AbiValue { sint8: -5 }, AbiType::SInt8),
            "char:-5"
        );
        assert_eq!(
            roundtrip("uchar", AbiValue { uint8: 200 }, AbiType::UInt8),
            "uchar:200"
        );
        assert_eq!(
            roundtrip("short", AbiValue { sint16: -300 }, AbiType::SInt16),
            "short:-300"
        );
        assert_eq!(
            roundtrip("int", AbiValue { sint32: 42 }, AbiType::SInt32),
            "int:42"
        );
        assert_eq!(
            roundtrip(
                "ulong",
                AbiValue {
                    uint64: u64::MAX - 1
                },
                AbiType::UInt64
            ),
            format!("ulong:{}", u64::MAX - 1)
        );
    }

    #[test]
    fn test_float_roundtrips() {
        assert_eq!(
            roundtrip("float", AbiValue { float: 1.5 }, AbiType::Float),
            "float:1.5"
        );
        assert_eq!(
            roundtrip("double", AbiValue { double: -2.25 }, AbiType::Double),
            "double:-2.25"
        );
    }

    #[test]
    fn test_pointer_forms() {
        let (abi, value) = encode("pointer:0x1f40").unwrap();
        assert_eq!(abi, AbiType::Pointer);
        assert_eq!(unsafe { value.ptr } as usize, 0x1f40);

        // strtoul-style: no 0x prefix means decimal
        let (_, value) = encode("pointer:8000").unwrap();
        assert_eq!(unsafe { value.ptr } as usize, 8000);
    }

    #[test]
    fn test_string_decode() {
        let text = b"hello\0";
        let ptr = text.as_ptr() as *const c_char;
        let slot = &ptr as *const *const c_char as *const c_void;
        let token = unsafe { decode(&spec("string"), slot) }.unwrap();
        assert_eq!(token, "string:hello");
    }

    #[test]
    fn test_null_string_decodes_as_pointer() {
        let ptr: *const c_char = core::ptr::null();
        let slot = &ptr as *const *const c_char as *const c_void;
        let token = unsafe { decode(&spec("string"), slot) }.unwrap();
        assert_eq!(token, "pointer:0x0");
    }

    #[test]
    fn test_encode_errors() {
        assert!(matches!(encode("no-separator"), Err(CodecError::MissingTag)));
        assert!(matches!(
            encode("quaternion:1"),
            Err(CodecError::UnknownTag(_))
        ));
        assert!(matches!(
            encode("int:not-a-number"),
            Err(CodecError::BadLiteral { .. })
        ));
        assert!(matches!(
            encode("string:hi"),
            Err(CodecError::Unsupported("string"))
        ));
    }
}
