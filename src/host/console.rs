//! Terminal implementation of host collaborators.

use super::{EditorContext, HostUi, MarkerHandle, MarkerKind};
use anyhow::Context;
use indexmap::IndexMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub mod style {
    use crossterm::style::{Color, Stylize};
    use std::fmt::{Display, Formatter};

    const UNKNOWN_PLACEHOLDER: &str = "???";

    struct View<T: Display> {
        inner: Option<T>,
        color: Color,
    }

    impl<T: Display> Display for View<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            let s = self
                .inner
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());
            f.write_fmt(format_args!("{}", s.with(self.color)))
        }
    }

    /// Construct structure declaration to display data of the same type (file paths, markers, etc.).
    macro_rules! view_struct {
        ($name: ident, $color: expr) => {
            pub struct $name<T: Display>(View<T>);

            impl<T: Display> From<T> for $name<T> {
                fn from(value: T) -> Self {
                    Self(View {
                        inner: Some(value),
                        color: $color,
                    })
                }
            }

            impl<T: Display> From<Option<T>> for $name<T> {
                fn from(value: Option<T>) -> Self {
                    Self(View {
                        inner: value,
                        color: $color,
                    })
                }
            }

            impl<T: Display> Display for $name<T> {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    self.0.fmt(f)
                }
            }
        };
    }

    view_struct!(FilePathView, Color::Green);
    view_struct!(MarkerView, Color::Red);
    view_struct!(CursorView, Color::Yellow);
    view_struct!(KeywordView, Color::Magenta);
    view_struct!(ErrorView, Color::Red);
}

use style::{CursorView, ErrorView, FilePathView, KeywordView, MarkerView};

struct Marker {
    kind: MarkerKind,
    file: String,
    line: u64,
}

/// Host for a terminal: markers are kept in memory and announced on stdout,
/// a cursor is a remembered location.
pub struct ConsoleHost {
    cwd: PathBuf,
    next_handle: AtomicU64,
    markers: Mutex<IndexMap<MarkerHandle, Marker>>,
    cursor: Mutex<Option<(String, u64)>>,
}

impl ConsoleHost {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            next_handle: AtomicU64::new(1),
            markers: Mutex::default(),
            cursor: Mutex::default(),
        }
    }

    /// Set a cursor position explicitly (e.g. `file:line` typed by user).
    pub fn move_cursor(&self, file: impl Into<String>, line: u64) {
        *self.cursor.lock().unwrap() = Some((file.into(), line));
    }

    fn println(&self, msg: impl std::fmt::Display) {
        let mut stdout = std::io::stdout().lock();
        _ = writeln!(stdout, "{msg}");
    }
}

impl HostUi for ConsoleHost {
    fn place_marker(
        &self,
        kind: MarkerKind,
        id: i64,
        file: &str,
        line: u64,
    ) -> anyhow::Result<MarkerHandle> {
        let handle = MarkerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let sign = match kind {
            MarkerKind::Breakpoint => format!("{}", MarkerView::from(format!("● {id}"))),
            MarkerKind::ProgramCounter => format!("{}", CursorView::from("=>")),
        };
        self.println(format!("{sign} {}:{line}", FilePathView::from(file)));
        self.markers.lock().unwrap().insert(
            handle,
            Marker {
                kind,
                file: file.to_string(),
                line,
            },
        );
        Ok(handle)
    }

    fn remove_marker(&self, handle: MarkerHandle) -> anyhow::Result<()> {
        let marker = self
            .markers
            .lock()
            .unwrap()
            .shift_remove(&handle)
            .with_context(|| format!("marker {handle} not placed"))?;
        if marker.kind == MarkerKind::Breakpoint {
            self.println(format!(
                "{} {}:{}",
                MarkerView::from("○"),
                FilePathView::from(&marker.file),
                marker.line
            ));
        }
        Ok(())
    }

    fn set_cursor(&self, file: &str, line: u64) -> anyhow::Result<()> {
        self.move_cursor(file, line);
        Ok(())
    }

    fn center_view(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn append_log(&self, text: &str) -> anyhow::Result<()> {
        self.println(text);
        Ok(())
    }

    fn render_context(&self, summary: &str) -> anyhow::Result<()> {
        self.println(KeywordView::from("context:"));
        self.println(summary);
        Ok(())
    }

    fn show_error(&self, message: &str) {
        self.println(ErrorView::from(message));
    }

    fn prompt_line(&self, prompt: &str, prefill: Option<&str>) -> anyhow::Result<String> {
        let mut editor = rustyline::DefaultEditor::new()?;
        let line = match prefill {
            Some(text) => editor.readline_with_initial(prompt, (text, "")),
            None => editor.readline(prompt),
        }?;
        Ok(line)
    }
}

impl EditorContext for ConsoleHost {
    fn current_cursor_position(&self) -> anyhow::Result<(String, u64)> {
        self.cursor
            .lock()
            .unwrap()
            .clone()
            .context("no cursor position, specify a location")
    }

    fn current_working_directory(&self) -> anyhow::Result<PathBuf> {
        Ok(self.cwd.clone())
    }
}
