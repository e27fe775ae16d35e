//! Built-in alert subscribers.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use parking_lot::Mutex;
use tracing::info;

use corelib::{AlertEvent, ObserverError};

use crate::observer::Observer;

/// Writes every alert to the tracing output.
#[derive(Debug, Default)]
pub struct AlertLogger;

impl Observer<AlertEvent> for AlertLogger {
    fn update(&self, event: &AlertEvent) -> Result<(), ObserverError> {
        let alert = &event.alert;
        info!(
            kind = %alert.kind,
            symbol = %alert.symbol,
            price = alert.price,
            "{}",
            alert.format()
        );
        Ok(())
    }
}

/// Appends `<RFC3339 timestamp> - <formatted alert>` lines to a file.
#[derive(Debug)]
pub struct AlertFileLogger {
    path: PathBuf,
    // Serializes appends so concurrent alerts never interleave.
    write_lock: Mutex<()>,
}

impl AlertFileLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Observer<AlertEvent> for AlertFileLogger {
    fn update(&self, event: &AlertEvent) -> Result<(), ObserverError> {
        let line = format!(
            "{} - {}\n",
            event.triggered_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            event.alert.format()
        );

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
