use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// Faults raised while locating or parsing the files of a program
/// directory, before any gate is emitted.
#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("bytecode file for '{function}' doesn't exist -- {path}")]
    MissingBytecode { function: String, path: PathBuf },
    #[error("share map file doesn't exist -- {0}")]
    MissingShareMap(PathBuf),
    #[error("test input file doesn't exist -- {0}")]
    MissingTestInputs(PathBuf),
    #[error("program directory has no usable basename -- {0}")]
    BadRoot(PathBuf),
    #[error("no bytecode registered for function '{0}'")]
    UnknownFunction(String),
    #[error("unknown circuit type: {0}")]
    UnknownSharing(String),
    #[error("malformed integer '{token}'")]
    BadInt {
        token: String,
        #[source]
        source: ParseIntError,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Faults raised while lowering bytecode into the circuit. All of them
/// abort the run; partial circuits are discarded by the caller.
#[derive(Error, Debug)]
pub enum InterpreterError {
    #[error("unknown operator: {0}")]
    UnknownOp(String),
    #[error("unable to parse function name out of call op: {0}")]
    BadCallTarget(String),
    #[error("unsupported constant width: {0}")]
    ConsWidth(u32),
    #[error("malformed instruction line: {0}")]
    MalformedLine(String),
    #[error("malformed literal '{0}' in bytecode")]
    BadLiteral(String),
    #[error("wire '{0}' was never bound")]
    UnboundWire(String),
    #[error("no sharing recorded for a wire handle read by {0}")]
    UnknownHandle(&'static str),
    #[error("test inputs carry no value for '{0}'")]
    MissingParam(String),
    #[error("{0} is not available in the arithmetic sharing")]
    ArithUnsupported(&'static str),
    #[error("argument queue ran dry on an IN instruction")]
    ArgUnderflow,
    #[error("return queue ran dry on an OUT instruction")]
    RetUnderflow,
    #[error("call to '{function}' left {args} argument(s) and {rets} return name(s) unconsumed")]
    CallArity {
        function: String,
        args: usize,
        rets: usize,
    },
    #[error("'{0}' produced no declassified outputs")]
    NoOutput(String),
    #[error("circuit execution failed: {0}")]
    Execution(String),
    #[error(transparent)]
    Program(#[from] ProgramError),
}
