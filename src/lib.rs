//! ShellFFI Runtime - native callbacks backed by interpreted functions
//!
//! This crate lets an embedded scripting host hand native code a real,
//! callable function pointer whose implementation is an interpreted
//! function. Native libraries invoke the pointer exactly as they would any
//! compiled function; the call is intercepted by a fixed trampoline, the
//! arguments are decoded into tagged textual tokens per the declared
//! signature, and the interpreted function is invoked with those tokens.
//! Return values travel through an explicit return-slot pointer, because
//! interpreted functions have no native return channel.

#![allow(dead_code)]

pub mod builtins;
pub mod callback;
pub mod codec;
pub mod interp;
pub mod logging;

// Re-export core types
pub use callback::{create, destroy, AbiType, CallbackError, CodecHint, ParseError, TypeSpec};
pub use codec::{AbiValue, CodecError};
pub use interp::{install, FunctionRef, Interpreter, InvokeError};

/// Runtime initialization
#[no_mangle]
pub extern "C" fn shellffi_runtime_init() {
    logging::init();
}
