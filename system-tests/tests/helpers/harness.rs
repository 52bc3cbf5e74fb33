// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: Live Session Harness
// Description: Builds a reporting session against the configured hosts.
// Purpose: Give every live test a session, a transcript, and a summary.
// Dependencies: fm-harness, system-tests
// ============================================================================

use std::error::Error;
use std::sync::Arc;

use fm_harness::HarnessConfig;
use fm_harness::Session;
use fm_harness::config::Product;
use fm_harness::logging;
use system_tests::config::SystemTestConfig;

use super::artifacts::TestReporter;
use super::transcript::TRANSCRIPT_FILE;
use super::transcript::TranscriptObserver;

/// Result type returned by every live test.
pub type TestResult = Result<(), Box<dyn Error>>;

/// Products a test applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductScope {
    /// Only Satellite servers.
    SatelliteOnly,
    /// Satellite servers and Capsules.
    AnyProduct,
}

impl ProductScope {
    /// Returns true when the test applies to `product`.
    fn includes(self, product: Product) -> bool {
        match self {
            Self::SatelliteOnly => product == Product::Satellite,
            Self::AnyProduct => true,
        }
    }
}

/// Session plus reporting state for one live test.
pub struct LiveRun {
    /// Summary writer for the test.
    reporter: TestReporter,
    /// Session over the configured hosts.
    session: Session,
    /// Harness configuration.
    config: HarnessConfig,
    /// System-test settings.
    settings: SystemTestConfig,
    /// Notes recorded in the summary.
    notes: Vec<String>,
}

/// Starts a live test, or records a skip and returns `None`.
///
/// Skips when no host is configured or the configured product is out of scope.
pub fn start(test_name: &str, scope: ProductScope) -> Result<Option<LiveRun>, Box<dyn Error>> {
    let _ = logging::init(logging::DEFAULT_DIRECTIVE)?;
    let settings = SystemTestConfig::load()?;
    let mut reporter = TestReporter::new(test_name, &settings)?;
    let config = HarnessConfig::load()?;
    if !config.has_targets() {
        reporter.finish("skip", vec!["no managed host configured".to_string()], summary_files())?;
        return Ok(None);
    }
    if !scope.includes(config.product) {
        let note = format!("not applicable to {}", config.product);
        reporter.finish("skip", vec![note], summary_files())?;
        return Ok(None);
    }
    let root = reporter.artifacts().root().to_path_buf();
    let transcript = TranscriptObserver::create(&root)?;
    let session = Session::from_config(&config)?
        .with_observer(Arc::new(transcript))
        .with_fetch_root(root.join("fetched"));
    Ok(Some(LiveRun {
        reporter,
        session,
        config,
        settings,
        notes: Vec::new(),
    }))
}

impl LiveRun {
    /// Session over every configured host.
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Harness configuration in effect.
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// System-test settings in effect.
    pub const fn settings(&self) -> &SystemTestConfig {
        &self.settings
    }

    /// Adds a line to the summary notes.
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Records a pass.
    pub fn pass(mut self) -> TestResult {
        let notes = std::mem::take(&mut self.notes);
        self.reporter.finish("pass", notes, run_files())?;
        Ok(())
    }

    /// Records a skip decided after the session was built.
    pub fn skip(mut self, reason: impl Into<String>) -> TestResult {
        let mut notes = std::mem::take(&mut self.notes);
        notes.push(reason.into());
        self.reporter.finish("skip", notes, run_files())?;
        Ok(())
    }
}

/// Fails the test with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        return Ok(());
    }
    let message: String = message.into();
    Err(message.into())
}

/// Files written for every test.
fn summary_files() -> Vec<String> {
    vec!["summary.json".to_string(), "summary.md".to_string()]
}

/// Files written for tests that built a session.
fn run_files() -> Vec<String> {
    let mut files = summary_files();
    files.push(TRANSCRIPT_FILE.to_string());
    files
}
