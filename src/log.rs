use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// Global logger that delegates records into a replaceable inner logger.
/// Makes it possible to redirect logs from stderr into a session log in runtime.
pub struct LogSwitcher {
    inner: RwLock<Option<Box<dyn Log>>>,
}

pub static LOGGER_SWITCHER: Lazy<LogSwitcher> = Lazy::new(|| LogSwitcher {
    inner: RwLock::new(None),
});

impl LogSwitcher {
    /// Replace current logger with a new one and set a new max level.
    pub fn switch(&'static self, logger: impl Log + 'static, filter: LevelFilter) {
        // set_logger return error if logger already installed, this is ok
        _ = log::set_logger(self);
        if let Ok(mut inner) = self.inner.write() {
            *inner = Some(Box::new(logger));
        }
        log::set_max_level(filter);
    }
}

impl Log for LogSwitcher {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner
            .read()
            .map(|l| l.as_ref().map(|l| l.enabled(metadata)).unwrap_or_default())
            .unwrap_or_default()
    }

    fn log(&self, record: &Record) {
        if let Ok(inner) = self.inner.read() {
            if let Some(logger) = inner.as_ref() {
                logger.log(record)
            }
        }
    }

    fn flush(&self) {
        if let Ok(inner) = self.inner.read() {
            if let Some(logger) = inner.as_ref() {
                logger.flush()
            }
        }
    }
}
