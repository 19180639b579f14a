//! Transport to a headless debugger server.
//!
//! [`Transport`] is a blocking request/response interface, every call suspends only a caller
//! thread. [`RpcClient`] is an implementation over a json-rpc tcp connection.

mod client;
pub mod types;

pub use client::RpcClient;
pub use types::{Breakpoint, DebuggerState, Function, Goroutine, Location, Thread, Variable};

use crate::error::Error;
use std::sync::mpsc::Receiver;

pub trait Transport: Send + Sync {
    /// Create a breakpoint, return breakpoint with server assigned id.
    fn create_breakpoint(&self, request: &Breakpoint) -> Result<Breakpoint, Error>;

    fn clear_breakpoint(&self, id: i64) -> Result<(), Error>;

    /// Resume debugee. States are delivered through a channel until the debugee stops or exits,
    /// a closed channel without any state means that no state is available.
    fn continue_execution(&self) -> Receiver<DebuggerState>;

    /// Step over to the next source line.
    fn next(&self) -> Result<DebuggerState, Error>;

    fn restart(&self) -> Result<(), Error>;

    fn process_pid(&self) -> Result<i32, Error>;

    fn list_goroutines(&self) -> Result<Vec<Goroutine>, Error>;

    fn get_state(&self) -> Result<DebuggerState, Error>;

    fn list_functions(&self, filter: &str) -> Result<Vec<String>, Error>;

    fn list_local_vars(&self, goroutine_id: i64) -> Result<Vec<Variable>, Error>;

    fn list_breakpoints(&self) -> Result<Vec<Breakpoint>, Error>;

    /// Detach from the server, kill the debugee if `kill` is true.
    fn detach(&self, kill: bool) -> Result<(), Error>;

    /// Close connection, all pending calls fail.
    fn close(&self);
}
