use crate::session::Phase;
use std::path::PathBuf;

/// Broad error classes, used by interfaces to decide how to report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// RPC call failed or connection lost.
    Transport,
    /// Debugger server spawn or termination failure.
    Process,
    /// Malformed user input, no state was changed.
    UserInput,
    /// Debugee terminated.
    Exited,
    /// Session control violation (busy, wrong phase, timeout).
    Session,
    /// Host UI collaborator failure.
    Host,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- transport errors ------------------------------------------
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),
    #[error("connection to debugger server closed")]
    ConnectionClosed,
    #[error("rpc `{method}` failed: {message}")]
    Rpc { method: String, message: String },
    #[error("malformed rpc message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    // --------------------------------- process errors --------------------------------------------
    #[error("debugger binary `{0}` not found")]
    BinaryNotFound(String),
    #[error("debug target {0:?} not found")]
    TargetNotFound(PathBuf),
    #[error("spawn debugger server: {0}")]
    Spawn(std::io::Error),
    #[error("{0} syscall error: {1}")]
    Syscall(&'static str, nix::Error),

    // --------------------------------- user input errors -----------------------------------------
    #[error("too many arguments")]
    TooManyArguments,
    #[error("malformed command: {0}")]
    MalformedCommand(String),
    #[error("unknown command `{0}`, type help for list of commands")]
    UnknownCommand(String),
    #[error("breakpoint {0} not found")]
    BreakpointNotFound(i64),

    // --------------------------------- debugee process errors ------------------------------------
    #[error("debugee exited{}", .0.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
    Exited(Option<String>),

    // --------------------------------- session errors --------------------------------------------
    #[error("another command is still in progress")]
    Busy,
    #[error("command not allowed while session is {0}")]
    InvalidPhase(Phase),
    #[error("timeout: {0}")]
    Timeout(&'static str),
    #[error("debug session closed")]
    SessionClosed,

    // --------------------------------- third party errors ----------------------------------------
    #[error("host: {0:#}")]
    Host(anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_)
            | Error::ConnectionClosed
            | Error::Rpc { .. }
            | Error::Codec(_)
            | Error::Connect { .. } => ErrorKind::Transport,
            Error::BinaryNotFound(_)
            | Error::TargetNotFound(_)
            | Error::Spawn(_)
            | Error::Syscall(_, _) => ErrorKind::Process,
            Error::TooManyArguments
            | Error::MalformedCommand(_)
            | Error::UnknownCommand(_)
            | Error::BreakpointNotFound(_) => ErrorKind::UserInput,
            Error::Exited(_) => ErrorKind::Exited,
            Error::Busy | Error::InvalidPhase(_) | Error::Timeout(_) | Error::SessionClosed => {
                ErrorKind::Session
            }
            Error::Host(_) => ErrorKind::Host,
        }
    }

    /// Return a hint to an interface - continue a session after error or close it.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Rpc { .. } => false,
            Error::Codec(_) => false,
            Error::TooManyArguments => false,
            Error::MalformedCommand(_) => false,
            Error::UnknownCommand(_) => false,
            Error::BreakpointNotFound(_) => false,
            Error::Exited(_) => false,
            Error::Busy => false,
            Error::InvalidPhase(_) => false,
            Error::Host(_) => false,

            // connection or server process is gone
            Error::Transport(_) => true,
            Error::ConnectionClosed => true,
            Error::Connect { .. } => true,
            Error::BinaryNotFound(_) => true,
            Error::TargetNotFound(_) => true,
            Error::Spawn(_) => true,
            Error::Syscall(_, _) => true,
            Error::Timeout(_) => true,
            Error::SessionClosed => true,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "dlvctl", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "dlvctl", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(::log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(::log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(::log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(::log::debug, $res, $msg)
    };
}
