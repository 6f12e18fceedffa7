//! Detailed markdown artifacts: one section per suite with per-case
//! rows, failure detail blocks, and coverage tables.

use minijinja::context;
use serde::Serialize;

use crate::config::Config;
use crate::core::Result;
use crate::coverage::{Counter, ModuleCoverage};
use crate::filter::{CaseView, FilteredView, RunView};
use crate::model::{FailureDetail, Outcome, Stats};
use crate::render::badge::Badge;
use crate::template::{self, seconds, DETAILED_TEMPLATE};

use super::{report_file_name, Artifact, Rendered, ReportRenderer};

pub struct DetailedRenderer;

impl ReportRenderer for DetailedRenderer {
    fn name(&self) -> &'static str {
        "detailed"
    }

    fn enabled(&self, config: &Config) -> bool {
        config.detailed.enabled
    }

    fn render(&self, view: &FilteredView<'_>, config: &Config) -> Vec<Rendered> {
        let env = match template::environment(&config.templates) {
            Ok(env) => env,
            Err(err) => return vec![Rendered::aggregated(Err(err))],
        };
        let badge = config.badge.badge();
        if config.detailed.aggregate {
            let runs: Vec<RunCtx> = view.runs().map(|run| run_ctx(&run, config, &badge)).collect();
            vec![Rendered::aggregated(render_document(
                &env,
                report_file_name("detailed", ".md"),
                config.title.clone(),
                runs,
            ))]
        } else {
            view.runs()
                .map(|run| {
                    let ctx = run_ctx(&run, config, &badge);
                    Rendered::for_run(
                        run.id(),
                        render_document(
                            &env,
                            report_file_name(&format!("detailed-{}", run.id()), ".md"),
                            format!("{} - {}", config.title, run.id()),
                            vec![ctx],
                        ),
                    )
                })
                .collect()
        }
    }
}

fn render_document(
    env: &minijinja::Environment<'_>,
    relative_path: String,
    title: String,
    runs: Vec<RunCtx>,
) -> Result<Artifact> {
    let text = template::render(
        env,
        DETAILED_TEMPLATE,
        context! {
            title => title,
            runs => runs,
        },
    )?;
    Ok(Artifact::new(relative_path, text))
}

#[derive(Serialize)]
struct RunCtx {
    id: String,
    status: String,
    summary_line: String,
    suites: Vec<SuiteCtx>,
    coverage: Option<CoverageCtx>,
}

#[derive(Serialize)]
struct SuiteCtx {
    name: String,
    summary_line: String,
    cases: Vec<CaseCtx>,
    failures: Vec<BlockCtx>,
}

#[derive(Serialize)]
struct CaseCtx {
    outcome: String,
    name: String,
    duration: String,
}

/// A collapsible details block: a failure, or a captured output log.
#[derive(Serialize)]
struct BlockCtx {
    title: String,
    body: String,
}

#[derive(Serialize)]
struct CoverageCtx {
    badge: String,
    packages: Vec<PackageRow>,
    classes: Vec<ClassRow>,
}

#[derive(Serialize)]
struct PackageRow {
    name: String,
    instruction: String,
    branch: String,
    line: String,
    method: String,
    class: String,
}

#[derive(Serialize)]
struct ClassRow {
    name: String,
    instruction: String,
    branch: String,
    line: String,
    method: String,
}

fn run_ctx(run: &RunView<'_>, config: &Config, badge: &Badge) -> RunCtx {
    let totals = run.totals();
    RunCtx {
        id: run.id().to_string(),
        status: badge.status(totals.failed == 0 && totals.errored == 0),
        summary_line: summary_line(&totals),
        suites: run
            .detail_suites()
            .iter()
            .map(|suite| suite_ctx(suite, config))
            .collect(),
        coverage: run
            .coverage()
            .map(|root| coverage_ctx(root, run, config, badge)),
    }
}

fn summary_line(stats: &Stats) -> String {
    format!(
        "{} tests: {} passed, {} failed, {} errored, {} skipped in {}s",
        stats.total,
        stats.passed,
        stats.failed,
        stats.errored,
        stats.skipped,
        seconds(stats.duration_ms)
    )
}

fn suite_ctx(suite: &crate::filter::SuiteView<'_>, config: &Config) -> SuiteCtx {
    let mut cases = Vec::new();
    let mut failures = Vec::new();
    if config.detailed.per_test_case {
        for case in suite.detail_cases() {
            cases.push(case_ctx(&case));
            collect_blocks(&case, config, &mut failures);
        }
    }
    SuiteCtx {
        name: suite.suite.name.clone(),
        summary_line: summary_line(&suite.suite.stats),
        cases,
        failures,
    }
}

fn case_ctx(view: &CaseView<'_>) -> CaseCtx {
    CaseCtx {
        outcome: outcome_cell(view.case.outcome),
        name: case_name(view),
        duration: format!("{}s", seconds(view.case.duration_ms)),
    }
}

fn case_name(view: &CaseView<'_>) -> String {
    match view.case.param_index {
        Some(idx) => format!("{}[{}]", view.case.display_name, idx),
        None => view.case.display_name.clone(),
    }
}

fn outcome_cell(outcome: Outcome) -> String {
    let icon = match outcome {
        Outcome::Passed => "✅",
        Outcome::Failed => "❌",
        Outcome::Skipped => "⏭️",
        Outcome::Errored => "💥",
    };
    format!("{icon} {}", outcome.as_str())
}

/// Failure blocks for a case, followed by its captured output. Output
/// is shown only for non-passed cases unless configured otherwise.
fn collect_blocks(view: &CaseView<'_>, config: &Config, blocks: &mut Vec<BlockCtx>) {
    let name = case_name(view);
    for failure in &view.case.failures {
        blocks.push(BlockCtx {
            title: format!("{}: {}", name, first_line(&failure.message)),
            body: failure_body(view, failure),
        });
    }

    let show_output =
        config.detailed.always_include_output || view.case.outcome != Outcome::Passed;
    if !show_output {
        return;
    }
    if config.detailed.include_stdout && !view.case.stdout.is_empty() {
        blocks.push(BlockCtx {
            title: format!("{name} stdout"),
            body: fenced(&view.case.stdout),
        });
    }
    if config.detailed.include_stderr && !view.case.stderr.is_empty() {
        blocks.push(BlockCtx {
            title: format!("{name} stderr"),
            body: fenced(&view.case.stderr),
        });
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}

fn fenced(text: &str) -> String {
    let mut body = String::from("```\n");
    body.push_str(text);
    if !text.ends_with('\n') {
        body.push('\n');
    }
    body.push_str("```\n");
    body
}

fn failure_body(view: &CaseView<'_>, failure: &FailureDetail) -> String {
    let mut body = String::new();
    body.push_str(&failure.message);
    body.push('\n');

    if let Some(expected) = &failure.expected {
        body.push_str(&format!("\nExpected: `{expected}`"));
    }
    if let Some(actual) = &failure.actual {
        body.push_str(&format!("\nActual: `{actual}`"));
    }
    if failure.expected.is_some() || failure.actual.is_some() {
        body.push('\n');
    }

    push_frames(view, failure, &mut body);
    for cause in &failure.causes {
        push_cause(view, cause, &mut body);
    }
    body
}

fn push_cause(view: &CaseView<'_>, cause: &FailureDetail, body: &mut String) {
    body.push_str(&format!("\nCaused by: {}\n", first_line(&cause.message)));
    push_frames(view, cause, body);
    for nested in &cause.causes {
        push_cause(view, nested, body);
    }
}

/// Frames in their filtered order, with a trailer counting what the
/// stack filter dropped.
fn push_frames(view: &CaseView<'_>, failure: &FailureDetail, body: &mut String) {
    let (kept, omitted) = view.filtered_frames(failure);
    if kept.is_empty() && omitted == 0 {
        return;
    }
    body.push_str("\n```\n");
    for frame in kept {
        body.push_str(&format!("at {}:{}\n", frame.location, frame.line));
    }
    if omitted > 0 {
        body.push_str(&format!("... {omitted} filtered\n"));
    }
    body.push_str("```\n");
}

fn coverage_ctx(
    root: &ModuleCoverage,
    run: &RunView<'_>,
    config: &Config,
    badge: &Badge,
) -> CoverageCtx {
    let names: Vec<String> = root.packages.iter().map(|p| p.name.clone()).collect();
    let display = if config.detailed.abbreviate_packages {
        abbreviate(&names)
    } else {
        names
    };

    let packages = root
        .packages
        .iter()
        .zip(display)
        .map(|(package, name)| PackageRow {
            name: package_label(&name),
            instruction: cell(&package.counters.instruction),
            branch: cell(&package.counters.branch),
            line: cell(&package.counters.line),
            method: cell(&package.counters.method),
            class: cell(&package.counters.class),
        })
        .collect();

    let classes = run
        .coverage_detail(root)
        .iter()
        .flat_map(|(_, classes)| classes.iter())
        .map(|class| ClassRow {
            name: class.name.clone(),
            instruction: cell(&class.counters.instruction),
            branch: cell(&class.counters.branch),
            line: cell(&class.counters.line),
            method: cell(&class.counters.method),
        })
        .collect();

    CoverageCtx {
        badge: badge.coverage(&root.counters.line, config.summary.precision),
        packages,
        classes,
    }
}

fn package_label(name: &str) -> String {
    if name.is_empty() {
        "(default)".to_string()
    } else {
        name.to_string()
    }
}

fn cell(counter: &Counter) -> String {
    if counter.total == 0 {
        return "n/a".to_string();
    }
    format!(
        "{}/{} ({}%)",
        counter.covered,
        counter.total,
        counter.percent_string(0)
    )
}

/// Compress the dot-separated prefix shared by every package name:
/// `com.acme.core` and `com.acme.util` become `….core` and `….util`.
/// Each name keeps at least its last segment.
fn abbreviate(names: &[String]) -> Vec<String> {
    if names.len() < 2 {
        return names.to_vec();
    }
    let split: Vec<Vec<&str>> = names.iter().map(|n| n.split('.').collect()).collect();
    let max_prefix = split
        .iter()
        .map(|segments| segments.len().saturating_sub(1))
        .min()
        .unwrap_or(0);
    let mut prefix = 0;
    while prefix < max_prefix && split.iter().all(|s| s[prefix] == split[0][prefix]) {
        prefix += 1;
    }
    if prefix == 0 {
        return names.to_vec();
    }
    split
        .iter()
        .map(|segments| {
            let mut out = String::from("…");
            for segment in &segments[prefix..] {
                out.push('.');
                out.push_str(segment);
            }
            out
        })
        .collect()
}
