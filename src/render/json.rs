//! Structured-data artifacts: one self-describing JSON record tree per
//! run, or a single combined tree in aggregated mode.
//!
//! The record tree carries everything a consumer needs to rebuild the
//! presentation without re-reading raw inputs: suite and case outcomes,
//! durations, filtered stack frames, and coverage counter pairs at
//! every granularity. Counts are exact integers; ratios are fixed-point
//! decimal strings, never floats.

use serde::Serialize;

use crate::config::{Config, JsonConfig};
use crate::core::Result;
use crate::coverage::{ClassCoverage, Counter, Counters, MethodCoverage, ModuleCoverage,
    PackageCoverage};
use crate::filter::{CaseView, FilteredView, RunView, SuiteView};
use crate::model::{FailureDetail, FailureKind, Outcome};
use crate::template::seconds;

use super::{report_file_name, Artifact, Rendered, ReportRenderer};

/// Version of the structured artifact schema. Field names and nesting
/// are a stability contract; any change bumps this.
pub const SCHEMA_VERSION: u32 = 1;

pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn enabled(&self, config: &Config) -> bool {
        config.json.enabled
    }

    fn render(&self, view: &FilteredView<'_>, config: &Config) -> Vec<Rendered> {
        if config.json.aggregate {
            vec![Rendered::aggregated(render_aggregated(view, config))]
        } else {
            view.runs()
                .map(|run| Rendered::for_run(run.id(), render_run(&run, config)))
                .collect()
        }
    }
}

fn render_aggregated(view: &FilteredView<'_>, config: &Config) -> Result<Artifact> {
    let totals = view.totals();
    let combined = view.combined_coverage()?;
    let report = AggregatedReport {
        schema_version: SCHEMA_VERSION,
        name: config.title.clone(),
        tests: totals.total,
        passed: totals.passed,
        failures: totals.failed,
        errors: totals.errored,
        skipped: totals.skipped,
        timestamp: timestamp(totals.start_time_ms),
        time: seconds(totals.duration_ms),
        runs: view.runs().map(|run| run_json(&run, config)).collect(),
        coverage: combined
            .as_ref()
            .map(|root| coverage_json(root, &view.coverage_detail(root), &config.json)),
    };
    artifact(report_file_name("report", ".json"), &report)
}

fn render_run(run: &RunView<'_>, config: &Config) -> Result<Artifact> {
    let report = RunReportJson {
        schema_version: SCHEMA_VERSION,
        run: run_json(run, config),
    };
    artifact(report_file_name(run.id(), ".json"), &report)
}

fn artifact<T: Serialize>(relative_path: String, report: &T) -> Result<Artifact> {
    let mut bytes = serde_json::to_vec_pretty(report)?;
    bytes.push(b'\n');
    Ok(Artifact {
        relative_path,
        bytes,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedReport {
    schema_version: u32,
    name: String,
    tests: u64,
    passed: u64,
    failures: u64,
    errors: u64,
    skipped: u64,
    timestamp: Option<String>,
    time: String,
    runs: Vec<RunJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coverage: Option<CoverageJson>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportJson {
    schema_version: u32,
    #[serde(flatten)]
    run: RunJson,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunJson {
    name: String,
    tests: u64,
    passed: u64,
    failures: u64,
    errors: u64,
    skipped: u64,
    timestamp: Option<String>,
    time: String,
    test_suites: Vec<SuiteJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coverage: Option<CoverageJson>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuiteJson {
    name: String,
    tests: u64,
    passed: u64,
    failures: u64,
    errors: u64,
    skipped: u64,
    timestamp: Option<String>,
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
    test_cases: Vec<CaseJson>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CaseJson {
    status: Outcome,
    name: String,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    param_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
    failures: Vec<FailureJson>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureJson {
    #[serde(rename = "type")]
    kind: FailureKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<String>,
    frames: Vec<FrameJson>,
    omitted_frames: usize,
    causes: Vec<FailureJson>,
}

#[derive(Serialize)]
struct FrameJson {
    location: String,
    line: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CoverageJson {
    name: String,
    counters: CountersJson,
    packages: Vec<PackageJson>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    name: String,
    counters: CountersJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    classes: Option<Vec<ClassJson>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassJson {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_file: Option<String>,
    counters: CountersJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    methods: Option<Vec<MethodJson>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MethodJson {
    name: String,
    line: LineRangeJson,
    counters: CountersJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    lines: Option<Vec<LineJson>>,
}

#[derive(Serialize)]
struct LineRangeJson {
    first: u32,
    last: u32,
}

#[derive(Serialize)]
struct LineJson {
    number: u32,
    instructions: CounterJson,
    branches: CounterJson,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CountersJson {
    instruction: CounterJson,
    branch: CounterJson,
    line: CounterJson,
    class: CounterJson,
    method: CounterJson,
}

/// Either an exact covered/missed pair, or (in simplified mode) a
/// two-decimal half-up percent string.
#[derive(Serialize)]
#[serde(untagged)]
enum CounterJson {
    Pair { covered: u64, missed: u64 },
    Percent(String),
}

fn run_json(run: &RunView<'_>, config: &Config) -> RunJson {
    let totals = run.totals();
    RunJson {
        name: run.id().to_string(),
        tests: totals.total,
        passed: totals.passed,
        failures: totals.failed,
        errors: totals.errored,
        skipped: totals.skipped,
        timestamp: timestamp(totals.start_time_ms),
        time: seconds(totals.duration_ms),
        test_suites: run.suites().map(|suite| suite_json(&suite, config)).collect(),
        coverage: run
            .coverage()
            .map(|root| coverage_json(root, &run.coverage_detail(root), &config.json)),
    }
}

fn suite_json(suite: &SuiteView<'_>, config: &Config) -> SuiteJson {
    let stats = suite.suite.stats;
    SuiteJson {
        name: suite.suite.name.clone(),
        tests: stats.total,
        passed: stats.passed,
        failures: stats.failed,
        errors: stats.errored,
        skipped: stats.skipped,
        timestamp: timestamp(stats.start_time_ms),
        time: seconds(stats.duration_ms),
        stdout: captured(&suite.suite.stdout, config.json.include_stdout),
        stderr: captured(&suite.suite.stderr, config.json.include_stderr),
        test_cases: suite.detail_cases().map(|case| case_json(&case, config)).collect(),
    }
}

fn case_json(view: &CaseView<'_>, config: &Config) -> CaseJson {
    let case = view.case;
    CaseJson {
        status: case.outcome,
        name: case.name.clone(),
        display_name: case.display_name.clone(),
        param_index: case.param_index,
        file: case.source_file.clone(),
        url: case
            .source_file
            .as_deref()
            .and_then(|file| config.git_links.link_for(file)),
        time: seconds(case.duration_ms),
        stdout: captured(&case.stdout, config.json.include_stdout),
        stderr: captured(&case.stderr, config.json.include_stderr),
        failures: case
            .failures
            .iter()
            .map(|failure| failure_json(view, failure))
            .collect(),
    }
}

fn failure_json(view: &CaseView<'_>, failure: &FailureDetail) -> FailureJson {
    let (kept, omitted) = view.filtered_frames(failure);
    FailureJson {
        kind: failure.kind,
        message: failure.message.clone(),
        expected: failure.expected.clone(),
        actual: failure.actual.clone(),
        frames: kept
            .iter()
            .map(|frame| FrameJson {
                location: frame.location.clone(),
                line: frame.line,
            })
            .collect(),
        omitted_frames: omitted,
        causes: failure
            .causes
            .iter()
            .map(|cause| failure_json(view, cause))
            .collect(),
    }
}

fn coverage_json(
    root: &ModuleCoverage,
    detail: &[(&PackageCoverage, Vec<&ClassCoverage>)],
    config: &JsonConfig,
) -> CoverageJson {
    CoverageJson {
        name: root.name.clone(),
        counters: counters_json(&root.counters, config),
        packages: root
            .packages
            .iter()
            .map(|package| {
                let classes = config.include_classes.then(|| {
                    detail
                        .iter()
                        .find(|(listed, _)| listed.name == package.name)
                        .map(|(_, classes)| classes.as_slice())
                        .unwrap_or(&[])
                        .iter()
                        .map(|class| class_json(class, config))
                        .collect()
                });
                PackageJson {
                    name: package.name.clone(),
                    counters: counters_json(&package.counters, config),
                    classes,
                }
            })
            .collect(),
    }
}

fn class_json(class: &ClassCoverage, config: &JsonConfig) -> ClassJson {
    ClassJson {
        name: class.name.clone(),
        source_file: class.source_file.clone(),
        counters: counters_json(&class.counters, config),
        methods: config.include_methods.then(|| {
            class
                .methods
                .iter()
                .map(|method| method_json(method, config))
                .collect()
        }),
    }
}

fn method_json(method: &MethodCoverage, config: &JsonConfig) -> MethodJson {
    MethodJson {
        name: method.name.clone(),
        line: LineRangeJson {
            first: method.first_line,
            last: method.last_line,
        },
        counters: counters_json(&method.counters, config),
        lines: config.include_lines.then(|| {
            method
                .lines
                .iter()
                .map(|line| LineJson {
                    number: line.number,
                    instructions: counter_json(&line.instructions, config),
                    branches: counter_json(&line.branches, config),
                })
                .collect()
        }),
    }
}

fn counters_json(counters: &Counters, config: &JsonConfig) -> CountersJson {
    CountersJson {
        instruction: counter_json(&counters.instruction, config),
        branch: counter_json(&counters.branch, config),
        line: counter_json(&counters.line, config),
        class: counter_json(&counters.class, config),
        method: counter_json(&counters.method, config),
    }
}

fn counter_json(counter: &Counter, config: &JsonConfig) -> CounterJson {
    if config.simplified_counters {
        CounterJson::Percent(counter.percent_string(2))
    } else {
        CounterJson::Pair {
            covered: counter.covered,
            missed: counter.missed(),
        }
    }
}

/// Captured output text under its include flag; empty capture is
/// omitted rather than serialized as an empty string.
fn captured(text: &str, include: bool) -> Option<String> {
    if include && !text.is_empty() {
        Some(text.to_string())
    } else {
        None
    }
}

/// Epoch milliseconds from the raw records as an ISO-8601 UTC string;
/// absent timing stays absent instead of becoming the epoch.
fn timestamp(start_ms: u64) -> Option<String> {
    if start_ms == 0 {
        return None;
    }
    chrono::DateTime::from_timestamp_millis(start_ms as i64)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}
