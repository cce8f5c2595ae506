//! Error kinds the core distinguishes (see spec §7). Parse/typecheck/runtime
//! errors are reported through the log and the stream table rather than
//! propagated as `Result` failures once the scheduler is running — a single
//! bad `eval` must not take down the simulation — but every fallible
//! construction step still returns a typed `Result` so callers above the
//! scheduler boundary (CLI, tests) can react to it directly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("parse error at {file}:{line}: {message}")]
    Parse {
        file: String,
        line: u32,
        message: String,
    },

    #[error("typecheck error: {0}")]
    Typecheck(String),

    #[error("reference to undefined {kind} '{name}'")]
    UndefinedReference { kind: &'static str, name: String },

    #[error("recursive instantiation detected at '{0}'")]
    RecursiveInstantiation(String),

    #[error("compiler error (recoverable): {0}")]
    CompilerRecoverable(String),

    #[error("fatal compiler error: {0}")]
    CompilerFatal(String),

    #[error("unrecognized march '{0}'")]
    UnknownMarch(String),

    #[error("unable to open save file '{0}'")]
    SaveFileOpen(String),

    #[error("malformed save file: {0}")]
    SaveFileFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CascadeError>;
