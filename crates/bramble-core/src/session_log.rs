//! Per-run operation log.
//!
//! Every bridge operation an [`Application`](crate::application::Application)
//! performs is appended as one JSON Lines record to a file under the
//! configured logs directory. Logging is best-effort: a log that cannot be
//! created or written never fails the run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// One logged operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unique identifier of this record.
    pub id: Uuid,

    /// When the operation completed.
    pub timestamp: DateTime<Utc>,

    /// Operation name (`query`, `touch`, `wait_for`, ...).
    pub operation: String,

    /// Operation argument worth keeping (selector, file name), if any.
    pub detail: Option<String>,

    /// Whether the operation succeeded.
    pub success: bool,

    /// Failure description when it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Appends operation records to `<logs_dir>/<timestamp>_<run-id>.jsonl`.
pub struct SessionLog {
    run_id: Uuid,
    path: Option<PathBuf>,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl SessionLog {
    /// Creates the logs directory and opens a fresh log file for this run.
    ///
    /// On failure the log is disabled and a warning is emitted; the run
    /// proceeds without persistence.
    pub fn create(logs_dir: &Path) -> Self {
        let run_id = Uuid::new_v4();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = logs_dir.join(format!("{timestamp}_{run_id}.jsonl"));

        let writer = std::fs::create_dir_all(logs_dir)
            .and_then(|()| File::create(&path))
            .map(BufWriter::new);

        let writer = match writer {
            Ok(w) => Some(w),
            Err(e) => {
                warn!(dir = %logs_dir.display(), error = %e, "session log disabled");
                None
            }
        };

        Self {
            run_id,
            path: writer.as_ref().map(|_| path),
            writer: Mutex::new(writer),
        }
    }

    /// Identifier of this run, embedded in the log file name.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Path of the log file, when one could be created.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends one record. Write failures are ignored.
    pub fn record(&self, operation: &str, detail: Option<&str>, error: Option<&str>) {
        let record = LogRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation: operation.to_string(),
            detail: detail.map(str::to_string),
            success: error.is_none(),
            error: error.map(str::to_string),
        };

        let Ok(mut guard) = self.writer.lock() else {
            return;
        };
        if let Some(writer) = guard.as_mut() {
            if let Ok(json) = serde_json::to_string(&record) {
                let _ = writeln!(writer, "{json}");
                let _ = writer.flush();
            }
        }
    }
}

impl std::fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLog")
            .field("run_id", &self.run_id)
            .field("path", &self.path)
            .finish()
    }
}
