use super::HostUi;
use log::{Level, LevelFilter};
use std::sync::Arc;

/// Logger that writes records into a host session log.
/// Only warnings and errors are mirrored, everything else goes to the inner logger.
pub struct SessionLogger {
    inner: env_logger::Logger,
    host: Arc<dyn HostUi>,
}

impl SessionLogger {
    pub fn new(host: Arc<dyn HostUi>) -> Self {
        Self {
            inner: env_logger::Logger::from_default_env(),
            host,
        }
    }

    pub fn filter(&self) -> LevelFilter {
        self.inner.filter()
    }
}

impl log::Log for SessionLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= Level::Warn || self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if record.level() > Level::Warn {
            self.inner.log(record);
            return;
        }

        let line = format!("[{}] {}", record.level(), record.args());
        // host failure must not recurse into the logger
        _ = self.host.append_log(&line);
    }

    fn flush(&self) {
        self.inner.flush()
    }
}
