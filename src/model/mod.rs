//! Immutable test-result model built from raw execution records.

mod builder;

pub use builder::build_suites;

use serde::{Deserialize, Serialize};

/// Outcome of a single test case.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Passed,
    Failed,
    Skipped,
    Errored,
}

impl Outcome {
    /// Presentation rank: failures surface first, passes last.
    pub fn rank(self) -> u8 {
        match self {
            Outcome::Failed => 0,
            Outcome::Errored => 1,
            Outcome::Skipped => 2,
            Outcome::Passed => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::Errored => "errored",
        }
    }
}

/// Kind of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Assertion,
    Exception,
}

/// One frame of a failure stack, ordered outermost-call last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Declaring location, e.g. `com.acme.Service.call`.
    pub location: String,
    pub line: u32,
}

/// Failure detail attached to a test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
    /// Ordered stack frames as reported by the test runner.
    #[serde(default)]
    pub frames: Vec<StackFrame>,
    /// Expected value for assertion failures.
    #[serde(default)]
    pub expected: Option<String>,
    /// Actual value for assertion failures.
    #[serde(default)]
    pub actual: Option<String>,
    /// Nested causes, outermost first.
    #[serde(default)]
    pub causes: Vec<FailureDetail>,
}

/// A single executed test case.
#[derive(Debug, Clone, Serialize)]
pub struct TestCase {
    pub name: String,
    pub display_name: String,
    /// Index for parameterized repetitions of the same case.
    pub param_index: Option<u32>,
    pub outcome: Outcome,
    pub duration_ms: u64,
    /// Epoch milliseconds; 0 when the runner reported no timing.
    pub start_time_ms: u64,
    pub stdout: String,
    pub stderr: String,
    /// Source file relative to the repository root, when known.
    pub source_file: Option<String>,
    pub failures: Vec<FailureDetail>,
}

/// Aggregate counts and timing over a collection of cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub errored: u64,
    pub start_time_ms: u64,
    pub duration_ms: u64,
}

impl Stats {
    /// Accumulate counts and the covering time span from test cases.
    pub fn collect<'a>(cases: impl IntoIterator<Item = &'a TestCase>) -> Stats {
        let mut stats = Stats::default();
        let mut end_time_ms = 0u64;
        let mut summed = 0u64;

        for case in cases {
            stats.total += 1;
            match case.outcome {
                Outcome::Passed => stats.passed += 1,
                Outcome::Failed => stats.failed += 1,
                Outcome::Skipped => stats.skipped += 1,
                Outcome::Errored => stats.errored += 1,
            }
            summed += case.duration_ms;

            if case.start_time_ms > 0 {
                if stats.start_time_ms == 0 {
                    stats.start_time_ms = case.start_time_ms;
                } else {
                    stats.start_time_ms = stats.start_time_ms.min(case.start_time_ms);
                }
                end_time_ms = end_time_ms.max(case.start_time_ms + case.duration_ms);
            }
        }

        // Span of the timed cases; untimed runners fall back to the sum.
        stats.duration_ms = if stats.start_time_ms > 0 {
            end_time_ms - stats.start_time_ms
        } else {
            summed
        };
        stats
    }

    /// Merge already-collected stats, e.g. across suites or runs.
    pub fn merge<'a>(all: impl IntoIterator<Item = &'a Stats>) -> Stats {
        let mut combined = Stats::default();
        let mut end_time_ms = 0u64;
        let mut summed = 0u64;

        for stats in all {
            combined.total += stats.total;
            combined.passed += stats.passed;
            combined.failed += stats.failed;
            combined.skipped += stats.skipped;
            combined.errored += stats.errored;
            summed += stats.duration_ms;

            if stats.start_time_ms > 0 {
                if combined.start_time_ms == 0 {
                    combined.start_time_ms = stats.start_time_ms;
                } else {
                    combined.start_time_ms = combined.start_time_ms.min(stats.start_time_ms);
                }
                end_time_ms = end_time_ms.max(stats.start_time_ms + stats.duration_ms);
            }
        }

        combined.duration_ms = if combined.start_time_ms > 0 {
            end_time_ms - combined.start_time_ms
        } else {
            summed
        };
        combined
    }
}

/// A test suite: ordered cases plus aggregate stats.
#[derive(Debug, Clone, Serialize)]
pub struct TestSuite {
    pub name: String,
    pub stats: Stats,
    pub stdout: String,
    pub stderr: String,
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    /// Derived suite outcome: failed if any case failed or errored,
    /// skipped if every case was skipped (or the suite is empty),
    /// passed otherwise.
    pub fn outcome(&self) -> Outcome {
        if self.stats.failed > 0 || self.stats.errored > 0 {
            Outcome::Failed
        } else if self.stats.total == self.stats.skipped {
            Outcome::Skipped
        } else {
            Outcome::Passed
        }
    }
}

/// Raw test-case record as handed over by the result parser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTestCase {
    /// Suite identity the case belongs to, e.g. the test class name.
    pub suite: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub param_index: Option<u32>,
    pub outcome: Outcome,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub start_time_ms: u64,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub failures: Vec<FailureDetail>,
}

/// Raw suite declaration; lets empty suites and suite-level captured
/// output survive into the model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSuite {
    pub name: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}
