//! Closure generation - executable entry points bound to a signature
//!
//! `create` turns a declared signature into a call-interface descriptor
//! plus a block of executable closure memory, both handed to libffi, and
//! binds them to the interpreted function's name. The resulting entry
//! address is indistinguishable to native callers from a compiled function
//! pointer. Everything allocated for one callback is owned by a global
//! registry keyed by that address, and `destroy` is the only release path.

use std::thread::{self, ThreadId};

use dashmap::DashMap;
use libffi::low::{self, ffi_cif, ffi_closure};
use once_cell::sync::Lazy;

use super::trampoline;
use super::types::{ParseError, TypeSpec};
use crate::logging::{debug, info};

/// Live callbacks keyed by entry address.
static REGISTRY: Lazy<DashMap<usize, CallbackData>> = Lazy::new(DashMap::new);

/// Permanent state bound to one generated entry address.
///
/// Created once at generation time, read-only afterwards, released only by
/// [`destroy`]. The dispatcher receives it as the libffi userdata on every
/// call.
pub(crate) struct ClosureContext {
    /// Name of the interpreted function backing the callback.
    pub(crate) function: String,
    /// Declared argument slots, in order. The call interface was built from
    /// this same vector, so index `i` here describes native slot `i`.
    pub(crate) args: Vec<TypeSpec>,
    /// Thread the callback was generated on; dispatch from any other
    /// thread is rejected.
    pub(crate) origin: ThreadId,
}

/// One generated callback: closure memory, call interface, bound context.
///
/// The cif and argument-type array are boxed so their addresses stay
/// stable for the lifetime of the closure that references them.
struct CallbackData {
    closure: *mut ffi_closure,
    cif: Box<ffi_cif>,
    arg_types: Box<[*mut low::ffi_type]>,
    context: Box<ClosureContext>,
}

// The registry may be touched from any host thread. The raw closure
// pointer is dereferenced only by libffi during dispatch and freed exactly
// once, in drop; the boxes it references live in the same entry.
unsafe impl Send for CallbackData {}
unsafe impl Sync for CallbackData {}

impl Drop for CallbackData {
    fn drop(&mut self) {
        // Free the executable block before the cif and context it points at.
        unsafe { low::closure_free(self.closure) };
    }
}

/// Generate a native callback for an interpreted function.
///
/// Parses the return token and each argument token in declared order,
/// builds the libffi call interface from the parsed signature, allocates
/// closure memory, and binds the trampoline to the signature metadata.
/// Returns the executable entry address. Any failure releases every
/// partial allocation and leaves no callback reachable.
pub fn create(
    function: &str,
    return_token: &str,
    arg_tokens: &[&str],
) -> Result<usize, CallbackError> {
    let ret = TypeSpec::parse_return(return_token)?;
    let mut args = Vec::with_capacity(arg_tokens.len());
    for token in arg_tokens {
        args.push(TypeSpec::parse_arg(token)?);
    }

    // The libffi argument array is derived from the same vector the
    // dispatcher will decode from. Primitive ffi_type pointers are libffi
    // statics, stable for the program lifetime.
    let mut arg_types: Box<[*mut low::ffi_type]> =
        args.iter().map(|spec| spec.abi.ffi_type().as_raw_ptr()).collect();

    let mut cif = Box::new(ffi_cif::default());
    unsafe {
        low::prep_cif(
            cif.as_mut(),
            low::ffi_abi_FFI_DEFAULT_ABI,
            args.len(),
            ret.abi.ffi_type().as_raw_ptr(),
            arg_types.as_mut_ptr(),
        )
    }
    .map_err(|_| CallbackError::Abi)?;

    let (closure, code) = low::closure_alloc();
    if closure.is_null() {
        return Err(CallbackError::Allocation);
    }

    let context = Box::new(ClosureContext {
        function: function.to_owned(),
        args,
        origin: thread::current().id(),
    });

    if unsafe { low::prep_closure(closure, cif.as_mut(), trampoline::dispatch, &*context, code) }
        .is_err()
    {
        unsafe { low::closure_free(closure) };
        return Err(CallbackError::Abi);
    }

    let addr = code.0 as usize;
    REGISTRY.insert(
        addr,
        CallbackData {
            closure,
            cif,
            arg_types,
            context,
        },
    );

    info!(
        function = function,
        address = %format_args!("{:#x}", addr),
        args = arg_tokens.len(),
        "generated native callback"
    );
    Ok(addr)
}

/// Release a previously generated callback.
///
/// Frees the closure memory, the call-interface descriptor, and the bound
/// context. Addresses not produced by [`create`], including ones already
/// destroyed, are rejected rather than released.
pub fn destroy(addr: usize) -> Result<(), CallbackError> {
    match REGISTRY.remove(&addr) {
        Some(_) => {
            debug!(address = %format_args!("{:#x}", addr), "destroyed callback");
            Ok(())
        }
        None => Err(CallbackError::NotFound(addr)),
    }
}

/// Number of live callbacks.
#[inline]
pub fn count() -> usize {
    REGISTRY.len()
}

/// Callback generation errors
#[derive(Debug)]
pub enum CallbackError {
    /// A signature token did not parse.
    Parse(ParseError),
    /// The ABI layer rejected the assembled signature.
    Abi,
    /// Closure memory could not be allocated.
    Allocation,
    /// Destroy was asked for an address no live callback owns.
    NotFound(usize),
}

impl From<ParseError> for CallbackError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl core::fmt::Display for CallbackError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{}", err),
            Self::Abi => write!(f, "call interface rejected by the ABI layer"),
            Self::Allocation => write!(f, "failed to allocate closure memory"),
            Self::NotFound(addr) => {
                write!(f, "no callback registered at {:#x}", addr)
            }
        }
    }
}

impl std::error::Error for CallbackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}
