pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod log;
pub mod rpc;
pub mod session;
pub mod supervisor;

pub use error::Error;
