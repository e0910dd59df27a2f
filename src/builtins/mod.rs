//! Builtin command surface - the `callback` registry command
//!
//! Thin argv-style glue between the host's command syntax and the closure
//! generator. The host hands over an already-split word list, exactly as a
//! shell passes a builtin its arguments; option parsing here mirrors that
//! convention rather than any process command line.

use crate::callback;
use crate::codec;
use crate::interp::Interpreter;
use crate::logging::error;

/// Default variable that receives the generated pointer token.
pub const RESULT_VARIABLE: &str = "DLRETVAL";

/// Synopsis line.
pub const SHORT_DOC: &str =
    "callback [-n name] [-d callback] function returntype [parametertype] [...]";

/// Help text.
pub const LONG_DOC: &str = "\
callback function returntype [parametertype...]
Generate a native callable function pointer

It is sometimes necessary to provide a callback function to library
routines, for example bsearch and qsort. Given an interpreted function
name and a list of type tokens, this command returns a function pointer
that can be called from native code.

Interpreted functions cannot return arbitrary machine values, so the
first parameter passed to your callback is a pointer to the location to
write your return value through (if required).

Options:
    -n name      Store the callback generated in name, not DLRETVAL.
    -d callback  Free a previously generated callback.
";

/// Command exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
    Usage,
}

impl ExitStatus {
    /// Numeric status the host reports to its own callers
    #[inline]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Usage => 2,
        }
    }
}

/// Run the `callback` command against a word list.
///
/// `words` excludes the command name itself. On success the generated
/// pointer token is bound into the result variable and, in interactive
/// sessions, echoed on stderr.
pub fn callback_builtin(interp: &mut dyn Interpreter, words: &[&str]) -> ExitStatus {
    let mut result_name = RESULT_VARIABLE;
    let mut index = 0;

    while index < words.len() {
        match words[index] {
            "-n" => {
                index += 1;
                match words.get(index) {
                    Some(&name) => result_name = name,
                    None => return ExitStatus::Usage,
                }
                index += 1;
            }
            "-d" => {
                index += 1;
                return match words.get(index) {
                    Some(token) => destroy_callback(token),
                    None => ExitStatus::Usage,
                };
            }
            "--" => {
                index += 1;
                break;
            }
            word if word.starts_with('-') && word.len() > 1 => {
                return ExitStatus::Usage;
            }
            _ => break,
        }
    }

    let positional = &words[index..];
    if positional.len() < 2 {
        return ExitStatus::Usage;
    }
    let function = positional[0];
    let return_token = positional[1];
    let arg_tokens = &positional[2..];

    match callback::create(function, return_token, arg_tokens) {
        Ok(addr) => {
            let token = format!("pointer:{:#x}", addr);
            if interp.interactive() {
                eprintln!("{}", token);
            }
            interp.bind_variable(result_name, &token);
            ExitStatus::Success
        }
        Err(err) => {
            error!(function = function, error = %err, "callback generation failed");
            ExitStatus::Failure
        }
    }
}

/// Handle `-d`: the operand is a codec pointer token naming the callback.
fn destroy_callback(token: &str) -> ExitStatus {
    let addr = match codec::encode(token) {
        Ok((callback::AbiType::Pointer, value)) => (unsafe { value.ptr }) as usize,
        Ok(_) | Err(_) => {
            error!(token = token, "failed to decode callback from parameter");
            return ExitStatus::Failure;
        }
    };

    match callback::destroy(addr) {
        Ok(()) => ExitStatus::Success,
        Err(err) => {
            error!(error = %err, "callback release failed");
            ExitStatus::Failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{FunctionRef, InvokeError};
    use std::collections::HashMap;

    #[derive(Default)]
    struct ShellState {
        variables: HashMap<String, String>,
    }

    impl Interpreter for ShellState {
        fn resolve(&mut self, _name: &str) -> Option<FunctionRef> {
            Some(FunctionRef(0))
        }
        fn invoke(&mut self, _func: FunctionRef, _words: &[String]) -> Result<(), InvokeError> {
            Ok(())
        }
        fn bind_variable(&mut self, name: &str, value: &str) {
            self.variables.insert(name.to_owned(), value.to_owned());
        }
    }

    #[test]
    fn test_missing_positionals_is_usage() {
        let mut shell = ShellState::default();
        assert_eq!(callback_builtin(&mut shell, &[]), ExitStatus::Usage);
        assert_eq!(callback_builtin(&mut shell, &["myfn"]), ExitStatus::Usage);
        assert_eq!(
            callback_builtin(&mut shell, &["-n"]),
            ExitStatus::Usage
        );
        assert!(shell.variables.is_empty());
    }

    #[test]
    fn test_unknown_option_is_usage() {
        let mut shell = ShellState::default();
        assert_eq!(
            callback_builtin(&mut shell, &["-x", "myfn", "int"]),
            ExitStatus::Usage
        );
    }

    #[test]
    fn test_bad_type_token_binds_nothing() {
        let mut shell = ShellState::default();
        let status = callback_builtin(&mut shell, &["myfn", "int", "quaternion"]);
        assert_eq!(status, ExitStatus::Failure);
        assert!(shell.variables.is_empty());
    }

    #[test]
    fn test_generates_and_binds_pointer_token() {
        let mut shell = ShellState::default();
        let status = callback_builtin(&mut shell, &["myfn", "int", "int", "int"]);
        assert_eq!(status, ExitStatus::Success);

        let token = shell.variables.get(RESULT_VARIABLE).unwrap().clone();
        assert!(token.starts_with("pointer:0x"));

        // Release through the same surface a script would use.
        assert_eq!(
            callback_builtin(&mut shell, &["-d", &token]),
            ExitStatus::Success
        );
        assert_eq!(
            callback_builtin(&mut shell, &["-d", &token]),
            ExitStatus::Failure
        );
    }

    #[test]
    fn test_result_name_option() {
        let mut shell = ShellState::default();
        let status = callback_builtin(&mut shell, &["-n", "CB", "myfn", "void"]);
        assert_eq!(status, ExitStatus::Success);
        assert!(shell.variables.contains_key("CB"));
        assert!(!shell.variables.contains_key(RESULT_VARIABLE));

        let token = shell.variables.get("CB").unwrap().clone();
        assert_eq!(
            callback_builtin(&mut shell, &["-d", &token]),
            ExitStatus::Success
        );
    }

    #[test]
    fn test_destroy_garbage_token() {
        let mut shell = ShellState::default();
        assert_eq!(
            callback_builtin(&mut shell, &["-d", "int:5"]),
            ExitStatus::Failure
        );
        assert_eq!(
            callback_builtin(&mut shell, &["-d", "not-a-token"]),
            ExitStatus::Failure
        );
    }
}
