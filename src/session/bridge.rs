//! Free-text command bridge.
//!
//! Internal debugger commands write their output into a process-wide [`TextSink`]. The bridge
//! temporarily redirects this sink into a private buffer while a command runs, so output of
//! a single command can be captured and appended to a session log.

use crate::error::Error;
use log::debug;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Executes named commands that write their output into a sink.
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, name: &str, args: &str, out: &TextSink) -> Result<(), Error>;
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Process-wide text output with a replaceable target.
pub struct TextSink {
    target: Mutex<Box<dyn Write + Send>>,
}

impl TextSink {
    pub fn new(target: impl Write + Send + 'static) -> Self {
        Self {
            target: Mutex::new(Box::new(target)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        let mut target = self.target.lock().unwrap();
        target.write_all(text.as_bytes())?;
        target.flush()
    }

    pub fn writeln(&self, text: impl std::fmt::Display) -> io::Result<()> {
        self.write_str(&format!("{text}\n"))
    }

    /// Redirect output into a buffer until a returned capture is finished or dropped.
    pub fn redirect(&self) -> Capture<'_> {
        let buffer = SharedBuffer::default();
        let saved = std::mem::replace(
            &mut *self.target.lock().unwrap(),
            Box::new(buffer.clone()),
        );
        Capture {
            sink: self,
            buffer,
            saved: Some(saved),
        }
    }
}

/// Active output redirection, previous target is restored on drop.
pub struct Capture<'a> {
    sink: &'a TextSink,
    buffer: SharedBuffer,
    saved: Option<Box<dyn Write + Send>>,
}

impl Capture<'_> {
    /// Restore a previous target and return captured output.
    pub fn finish(mut self) -> Vec<u8> {
        self.restore();
        std::mem::take(&mut *self.buffer.0.lock().unwrap())
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.sink.target.lock().unwrap() = saved;
        }
    }
}

impl Drop for Capture<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Runs free-text commands one at a time and captures their output.
pub struct CommandBridge {
    dispatcher: Arc<dyn CommandDispatcher>,
    sink: Arc<TextSink>,
    serial: Mutex<()>,
}

impl CommandBridge {
    pub fn new(dispatcher: Arc<dyn CommandDispatcher>, sink: Arc<TextSink>) -> Self {
        Self {
            dispatcher,
            sink,
            serial: Mutex::new(()),
        }
    }

    /// Execute a raw command (`name args..`), return its output.
    pub fn send(&self, raw: &str) -> Result<Vec<u8>, Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::MalformedCommand("empty command".to_string()));
        }
        let (name, args) = raw.split_once(' ').unwrap_or((raw, ""));

        let _serial = self.serial.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(target: "dlvctl", "bridge command: {name} {args}");
        let capture = self.sink.redirect();
        let result = self.dispatcher.dispatch(name, args.trim(), &self.sink);
        let output = capture.finish();
        result.map(|_| output)
    }
}
