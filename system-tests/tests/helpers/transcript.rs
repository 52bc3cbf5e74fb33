// system-tests/tests/helpers/transcript.rs
// ============================================================================
// Module: Command Transcript
// Description: Session observer that appends every execution to a JSONL file.
// Purpose: Keep a per-test record of what ran on each host and what it printed.
// Dependencies: fm-harness, serde_json
// ============================================================================

use std::fs::File;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use fm_harness::CommandObserver;
use fm_harness::CommandRecord;
use fm_harness::HarnessError;
use serde::Serialize;

/// Transcript file name inside a test's artifact root.
pub const TRANSCRIPT_FILE: &str = "transcript.jsonl";

#[derive(Serialize)]
struct FailedExecution<'a> {
    command: &'a str,
    error: String,
}

/// Appends one JSON line per host per execution.
///
/// Write failures are dropped; the transcript never fails a test.
pub struct TranscriptObserver {
    file: Mutex<File>,
}

impl TranscriptObserver {
    /// Creates the transcript file under `root`.
    pub fn create(root: &Path) -> io::Result<Self> {
        Ok(Self {
            file: Mutex::new(File::create(root.join(TRANSCRIPT_FILE))?),
        })
    }

    fn append<T: Serialize>(&self, entry: &T) {
        let Ok(mut line) = serde_json::to_vec(entry) else {
            return;
        };
        line.push(b'\n');
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(&line);
        }
    }
}

impl CommandObserver for TranscriptObserver {
    fn on_record(&self, record: &CommandRecord<'_>) {
        self.append(record);
    }

    fn on_error(&self, command: &str, error: &HarnessError) {
        self.append(&FailedExecution {
            command,
            error: error.to_string(),
        });
    }
}
