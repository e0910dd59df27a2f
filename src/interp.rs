//! Interpreter boundary - how the runtime reaches back into the host
//!
//! The scripting environment that owns the interpreted functions is an
//! external collaborator. It implements [`Interpreter`] and makes itself
//! reachable from the dispatch path with [`install`] for the duration of
//! any code that may invoke a generated callback.

use std::cell::RefCell;

/// Opaque token identifying a resolved interpreted function.
///
/// The meaning of the payload belongs entirely to the host; the runtime
/// only passes it back to [`Interpreter::invoke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionRef(pub usize);

/// The interpreted environment consumed by the dispatcher and the builtin
pub trait Interpreter {
    /// Look up an interpreted function by name.
    fn resolve(&mut self, name: &str) -> Option<FunctionRef>;

    /// Invoke a previously resolved function with argv-style words, blocking
    /// until it completes.
    fn invoke(&mut self, func: FunctionRef, words: &[String]) -> Result<(), InvokeError>;

    /// Bind a shell variable in the host environment.
    fn bind_variable(&mut self, name: &str, value: &str);

    /// Whether the session is interactive (controls the address echo).
    fn interactive(&self) -> bool {
        false
    }
}

/// Interpreted invocation failure reported by the host
#[derive(Debug)]
pub struct InvokeError {
    pub message: String,
}

impl InvokeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl core::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "interpreted function failed: {}", self.message)
    }
}

impl std::error::Error for InvokeError {}

thread_local! {
    /// Interpreters installed on this thread, innermost last.
    static CURRENT: RefCell<Vec<*mut dyn Interpreter>> = const { RefCell::new(Vec::new()) };
}

/// Run `f` with `interp` reachable from this thread's dispatch path.
///
/// Installation nests: an interpreted function that re-enters the host may
/// install again, and the previous interpreter is restored when the inner
/// scope ends, including on unwind.
pub fn install<R>(interp: &mut dyn Interpreter, f: impl FnOnce() -> R) -> R {
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            CURRENT.with(|c| {
                c.borrow_mut().pop();
            });
        }
    }

    // The raw pointer never outlives `interp`: the guard pops it before
    // this borrow ends, and dispatch only reads the stack top.
    let ptr: *mut (dyn Interpreter + '_) = interp;
    let ptr: *mut (dyn Interpreter + 'static) = unsafe { core::mem::transmute(ptr) };

    CURRENT.with(|c| c.borrow_mut().push(ptr));
    let _guard = Guard;
    f()
}

/// Hand the innermost installed interpreter to `f`.
///
/// The interpreter is taken off the stack for the duration of the call, so
/// a nested dispatch arriving while one is already in progress finds no
/// interpreter and fails cleanly instead of aliasing the host.
pub(crate) fn with_current<R>(f: impl FnOnce(&mut dyn Interpreter) -> R) -> Option<R> {
    struct Restore(*mut dyn Interpreter);
    impl Drop for Restore {
        fn drop(&mut self) {
            let ptr = self.0;
            CURRENT.with(|c| c.borrow_mut().push(ptr));
        }
    }

    let ptr = CURRENT.with(|c| c.borrow_mut().pop())?;
    let _restore = Restore(ptr);
    Some(f(unsafe { &mut *ptr }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHost;
    impl Interpreter for NullHost {
        fn resolve(&mut self, _name: &str) -> Option<FunctionRef> {
            None
        }
        fn invoke(&mut self, _func: FunctionRef, _words: &[String]) -> Result<(), InvokeError> {
            Ok(())
        }
        fn bind_variable(&mut self, _name: &str, _value: &str) {}
    }

    #[test]
    fn test_no_interpreter_by_default() {
        assert!(with_current(|_| ()).is_none());
    }

    #[test]
    fn test_install_scoped() {
        let mut host = NullHost;
        install(&mut host, || {
            assert!(with_current(|_| ()).is_some());
        });
        assert!(with_current(|_| ()).is_none());
    }

    #[test]
    fn test_dispatch_in_progress_hides_interpreter() {
        let mut host = NullHost;
        install(&mut host, || {
            with_current(|_| {
                // A nested dispatch must not see the busy interpreter.
                assert!(with_current(|_| ()).is_none());
            });
            // Restored once the outer dispatch completed.
            assert!(with_current(|_| ()).is_some());
        });
    }
}
