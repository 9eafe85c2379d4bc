//! Test verification with compensating rollback.
//!
//! Proposed tests are written first, then the test command is run for the
//! model, and any proposed test that did not report a pass is removed from
//! the file again. The removal is idempotent: running it against a file that
//! was already rolled back changes nothing and writes nothing.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::errors::SugarResult;
use crate::models::{ColumnUpdatePayload, DescriptorFile};
use crate::runner::{TestRunReport, TestRunner};
use crate::store::yaml::{read_descriptor, write_descriptor};

/// Column name to the test identifiers to remove from it.
pub type TestsToDelete = IndexMap<String, Vec<String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationState {
    PendingWrite,
    WrittenOptimistically,
    Verified,
    PartiallyRolledBack,
}

/// Why verification ended without checking the pending tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    CompilationError,
    RunnerFailed(String),
    /// `verify` was called before the proposed tests were written.
    NotWritten,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub state: VerificationState,
    pub deleted: TestsToDelete,
    pub skipped: Option<SkipReason>,
}

/// Tests proposed by the payload, per column.
pub fn pending_tests(payload: &ColumnUpdatePayload) -> TestsToDelete {
    payload
        .iter()
        .filter(|(_, update)| !update.tests.is_empty())
        .map(|(column, update)| (column.clone(), update.tests.clone()))
        .collect()
}

/// Pending tests the report has no pass marker for.
pub fn failed_tests(report: &TestRunReport, model: &str, pending: &TestsToDelete) -> TestsToDelete {
    let mut failed = TestsToDelete::new();
    for (column, tests) in pending {
        for test in tests {
            if report.has_passed(test, model, column) {
                continue;
            }
            tracing::warn!(model, column = %column, test = %test, "test did not pass and will be removed");
            failed.entry(column.clone()).or_default().push(test.clone());
        }
    }
    failed
}

/// Remove the listed tests from the model's columns in a parsed document.
/// Returns whether anything changed.
pub fn remove_failed_tests(document: &mut DescriptorFile, model: &str, tests_to_delete: &TestsToDelete) -> bool {
    let Some(entry) = document.model_mut(model) else {
        return false;
    };
    let mut changed = false;
    for column in &mut entry.columns {
        if let Some(tests) = tests_to_delete.get(&column.name) {
            changed |= column.remove_tests(tests);
        }
    }
    changed
}

/// Re-open `path`, drop the failed tests, and rewrite it when anything was
/// removed. Returns whether the file was rewritten.
pub fn delete_failed_tests(path: &Path, model: &str, tests_to_delete: &TestsToDelete) -> SugarResult<bool> {
    if tests_to_delete.is_empty() {
        return Ok(false);
    }
    let mut document = read_descriptor(path)?;
    if !remove_failed_tests(&mut document, model, tests_to_delete) {
        tracing::debug!(model, path = %path.display(), "no failed test left to remove");
        return Ok(false);
    }
    write_descriptor(path, &document)
}

/// One documentation run's write-then-verify cycle for a model.
#[derive(Debug)]
pub struct PendingVerification {
    descriptor: PathBuf,
    model: String,
    pending: TestsToDelete,
    state: VerificationState,
}

impl PendingVerification {
    pub fn new(descriptor: PathBuf, model: &str, payload: &ColumnUpdatePayload) -> Self {
        Self {
            descriptor,
            model: model.to_string(),
            pending: pending_tests(payload),
            state: VerificationState::PendingWrite,
        }
    }

    pub fn state(&self) -> VerificationState {
        self.state
    }

    pub fn pending(&self) -> &TestsToDelete {
        &self.pending
    }

    /// Persist the document including every proposed test.
    pub fn write(&mut self, document: &DescriptorFile) -> SugarResult<()> {
        write_descriptor(&self.descriptor, document)?;
        self.state = VerificationState::WrittenOptimistically;
        Ok(())
    }

    /// Run the model's tests and roll back the ones that did not pass.
    pub fn verify(self, runner: &dyn TestRunner) -> SugarResult<VerificationOutcome> {
        if self.state != VerificationState::WrittenOptimistically {
            tracing::warn!(model = %self.model, state = ?self.state, "proposed tests were never written; nothing to verify");
            return Ok(self.finish(VerificationState::Verified, TestsToDelete::new(), Some(SkipReason::NotWritten)));
        }
        if self.pending.is_empty() {
            return Ok(self.finish(VerificationState::Verified, TestsToDelete::new(), None));
        }

        let report = match runner.run_model_tests(&self.model) {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(model = %self.model, error = %err, "test run failed; proposed tests kept unverified");
                let reason = SkipReason::RunnerFailed(err.to_string());
                return Ok(self.finish(VerificationState::Verified, TestsToDelete::new(), Some(reason)));
            }
        };
        if report.compilation_error {
            tracing::warn!(model = %self.model, "compilation error during test run; proposed tests kept unverified");
            return Ok(self.finish(
                VerificationState::Verified,
                TestsToDelete::new(),
                Some(SkipReason::CompilationError),
            ));
        }

        let failed = failed_tests(&report, &self.model, &self.pending);
        if failed.is_empty() {
            tracing::info!(model = %self.model, "all proposed tests passed");
            return Ok(self.finish(VerificationState::Verified, failed, None));
        }
        delete_failed_tests(&self.descriptor, &self.model, &failed)?;
        Ok(self.finish(VerificationState::PartiallyRolledBack, failed, None))
    }

    fn finish(self, state: VerificationState, deleted: TestsToDelete, skipped: Option<SkipReason>) -> VerificationOutcome {
        VerificationOutcome {
            state,
            deleted,
            skipped,
        }
    }
}
