//! Callback generation - function pointers backed by interpreted functions
//!
//! Design: A fixed dispatch routine generic over a per-callback context,
//! behind executable closures whose call interface is built at runtime:
//! - `types.rs` - signature token grammar and ABI type descriptors
//! - `closure.rs` - closure allocation and the live-callback registry
//! - `trampoline.rs` - the dispatch routine entered on every native call
//!
//! ABI layout itself is delegated to libffi; this module only assembles
//! call-interface descriptors from declared signatures and never implements
//! calling-convention logic of its own.

mod closure;
mod trampoline;
mod types;


pub use closure::{count, create, destroy, CallbackError};
pub use types::{AbiType, CodecHint, ParseError, TypeSpec};
