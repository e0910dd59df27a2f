//! Trampoline dispatch - the routine entered when native code calls a
//! generated pointer
//!
//! libffi hands us the call interface, the raw argument slots, the return
//! slot, and the bound [`ClosureContext`]. The dispatcher decodes the
//! arguments into tagged tokens and invokes the interpreted function with
//! `[name, return-slot address, arguments...]`. It never writes the return
//! slot itself; depositing a result through the advertised address is the
//! interpreted function's job, and on any failure the slot is left exactly
//! as the native caller set it up.

use std::ffi::c_void;

use libffi::low::ffi_cif;

use super::closure::ClosureContext;
use crate::codec::{self, CodecError};
use crate::interp::{self, Interpreter, InvokeError};
use crate::logging::{error, trace};

/// Entry point bound into every generated closure.
pub(crate) extern "C" fn dispatch(
    _cif: &ffi_cif,
    result: &mut c_void,
    args: *const *const c_void,
    context: &ClosureContext,
) {
    // Dispatch is only defined on the thread that generated the callback;
    // the interpreted environment is not reentrancy-safe across threads.
    if std::thread::current().id() != context.origin {
        error!(
            function = %context.function,
            "callback invoked from a foreign thread; dispatch rejected"
        );
        return;
    }

    let outcome = interp::with_current(|host| run(host, result, args, context));
    match outcome {
        None => error!(
            function = %context.function,
            "no interpreter installed on this thread during callback"
        ),
        Some(Err(err)) => error!(
            function = %context.function,
            error = %err,
            "callback dispatch aborted"
        ),
        Some(Ok(())) => {}
    }
}

fn run(
    host: &mut dyn Interpreter,
    result: &mut c_void,
    args: *const *const c_void,
    context: &ClosureContext,
) -> Result<(), DispatchError> {
    let function = host
        .resolve(&context.function)
        .ok_or(DispatchError::Unresolved)?;

    // Decode the native argument slots, last to first; one bad slot aborts
    // the whole call rather than proceeding with corrupted data.
    let mut decoded = Vec::with_capacity(context.args.len());
    for (index, spec) in context.args.iter().enumerate().rev() {
        let slot = unsafe { *args.add(index) };
        decoded.push(unsafe { codec::decode(spec, slot) }?);
    }

    // The interpreted function sees its own name, then the address of the
    // native return slot it can deposit a result through, then the
    // arguments in declared order.
    let mut words = Vec::with_capacity(context.args.len() + 2);
    words.push(context.function.clone());
    words.push(format!("pointer:{:#x}", result as *mut c_void as usize));
    words.extend(decoded.into_iter().rev());

    trace!(
        function = %context.function,
        args = context.args.len(),
        "dispatching native callback"
    );
    host.invoke(function, &words).map_err(DispatchError::Invoke)
}

/// Why one dispatch was abandoned
#[derive(Debug)]
enum DispatchError {
    Unresolved,
    Decode(CodecError),
    Invoke(InvokeError),
}

impl From<CodecError> for DispatchError {
    fn from(err: CodecError) -> Self {
        Self::Decode(err)
    }
}

impl core::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unresolved => {
                write!(f, "unable to resolve interpreted function")
            }
            Self::Decode(err) => write!(f, "argument decode failed: {}", err),
            Self::Invoke(err) => write!(f, "{}", err),
        }
    }
}
