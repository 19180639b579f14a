//! Host side collaborators of a debug session: an editor UI that shows markers and a session log,
//! and an editable location provider.

pub mod console;
pub mod logger;

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Kind of visual marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Breakpoint,
    /// Current line of a stopped debugee.
    ProgramCounter,
}

/// Opaque marker handle given by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

impl Display for MarkerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host UI primitives used by a session.
/// All methods may be called from any thread.
pub trait HostUi: Send + Sync {
    /// Place a marker of `kind` at file:line, `id` is a breakpoint or thread id.
    fn place_marker(
        &self,
        kind: MarkerKind,
        id: i64,
        file: &str,
        line: u64,
    ) -> anyhow::Result<MarkerHandle>;

    fn remove_marker(&self, handle: MarkerHandle) -> anyhow::Result<()>;

    fn set_cursor(&self, file: &str, line: u64) -> anyhow::Result<()>;

    /// Re-center a view around a cursor.
    fn center_view(&self) -> anyhow::Result<()>;

    /// Append text to a session log.
    fn append_log(&self, text: &str) -> anyhow::Result<()>;

    /// Show a summary of the current debugee context (threads, goroutines).
    fn render_context(&self, summary: &str) -> anyhow::Result<()>;

    /// Report an error to a user.
    fn show_error(&self, message: &str);

    /// Ask a user for a line of text.
    fn prompt_line(&self, prompt: &str, prefill: Option<&str>) -> anyhow::Result<String>;
}

/// Editable location provider.
pub trait EditorContext: Send + Sync {
    /// Current cursor position as a (file, line) pair.
    fn current_cursor_position(&self) -> anyhow::Result<(String, u64)>;

    fn current_working_directory(&self) -> anyhow::Result<PathBuf>;
}
