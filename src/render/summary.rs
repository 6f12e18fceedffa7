//! Summary markdown artifacts: one table row per run, with badges for
//! pass/fail status and line coverage.

use minijinja::context;
use serde::Serialize;

use crate::config::Config;
use crate::core::Result;
use crate::coverage::Counter;
use crate::filter::{FilteredView, RunView};
use crate::model::Stats;
use crate::render::badge::Badge;
use crate::template::{self, seconds, SUMMARY_TEMPLATE};

use super::{report_file_name, Artifact, Rendered, ReportRenderer};

pub struct SummaryRenderer;

impl ReportRenderer for SummaryRenderer {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn enabled(&self, config: &Config) -> bool {
        config.summary.enabled
    }

    fn render(&self, view: &FilteredView<'_>, config: &Config) -> Vec<Rendered> {
        let env = match template::environment(&config.templates) {
            Ok(env) => env,
            Err(err) => return vec![Rendered::aggregated(Err(err))],
        };
        let badge = config.badge.badge();
        if config.summary.aggregate {
            vec![Rendered::aggregated(render_aggregated(
                &env, view, config, &badge,
            ))]
        } else {
            view.runs()
                .map(|run| Rendered::for_run(run.id(), render_run(&env, &run, config, &badge)))
                .collect()
        }
    }
}

#[derive(Serialize)]
struct Row {
    name: String,
    total: u64,
    passed: u64,
    failed: u64,
    errored: u64,
    skipped: u64,
    duration: String,
    status: String,
    coverage: String,
}

/// The line counter drives the coverage badge; runs without coverage
/// render a plain `n/a` cell.
fn row(name: &str, stats: &Stats, coverage: Option<&Counter>, badge: &Badge, precision: u32) -> Row {
    Row {
        name: name.to_string(),
        total: stats.total,
        passed: stats.passed,
        failed: stats.failed,
        errored: stats.errored,
        skipped: stats.skipped,
        duration: format!("{}s", seconds(stats.duration_ms)),
        status: badge.status(stats.failed == 0 && stats.errored == 0),
        coverage: coverage
            .map(|counter| badge.coverage(counter, precision))
            .unwrap_or_else(|| "n/a".to_string()),
    }
}

fn render_aggregated(
    env: &minijinja::Environment<'_>,
    view: &FilteredView<'_>,
    config: &Config,
    badge: &Badge,
) -> Result<Artifact> {
    let precision = config.summary.precision;
    let rows: Vec<Row> = view
        .runs()
        .map(|run| {
            let totals = run.totals();
            row(
                run.id(),
                &totals,
                run.coverage().map(|root| &root.counters.line),
                badge,
                precision,
            )
        })
        .collect();

    let combined = view.combined_coverage()?;
    let totals = view.totals();
    let total = row(
        "Total",
        &totals,
        combined.as_ref().map(|root| &root.counters.line),
        badge,
        precision,
    );

    let text = template::render(
        env,
        SUMMARY_TEMPLATE,
        context! {
            title => config.title.clone(),
            rows => rows,
            total => total,
        },
    )?;
    Ok(Artifact::new(report_file_name("summary", ".md"), text))
}

fn render_run(
    env: &minijinja::Environment<'_>,
    run: &RunView<'_>,
    config: &Config,
    badge: &Badge,
) -> Result<Artifact> {
    let totals = run.totals();
    let rows = vec![row(
        run.id(),
        &totals,
        run.coverage().map(|root| &root.counters.line),
        badge,
        config.summary.precision,
    )];

    let text = template::render(
        env,
        SUMMARY_TEMPLATE,
        context! {
            title => format!("{} - {}", config.title, run.id()),
            rows => rows,
            total => (),
        },
    )?;
    Ok(Artifact::new(
        report_file_name(&format!("summary-{}", run.id()), ".md"),
        text,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ReportModel, RunReport};
    use crate::coverage::{build_coverage, RawClassCoverage, RawCounter, RawLineCoverage,
        RawMethodRange};
    use crate::model::{build_suites, Outcome, RawTestCase};

    fn coverage(covered: &[u32], total: u32) -> crate::coverage::ModuleCoverage {
        let lines = (1..=total)
            .map(|n| RawLineCoverage {
                class_name: "pkg.Foo".to_string(),
                line: n,
                instructions: RawCounter {
                    covered: u64::from(covered.contains(&n)),
                    total: 1,
                },
                branches: RawCounter {
                    covered: 0,
                    total: 0,
                },
            })
            .collect();
        build_coverage(
            "core",
            vec![RawClassCoverage {
                name: "pkg.Foo".to_string(),
                source_file: None,
                methods: vec![RawMethodRange {
                    name: "run()".to_string(),
                    first_line: 1,
                    last_line: total,
                }],
            }],
            lines,
        )
        .unwrap()
    }

    fn model(outcomes: &[Outcome], covered: &[u32]) -> ReportModel {
        let cases = outcomes
            .iter()
            .enumerate()
            .map(|(i, outcome)| RawTestCase {
                suite: "pkg.FooTest".to_string(),
                name: format!("t{i}"),
                outcome: *outcome,
                duration_ms: 10,
                ..RawTestCase::default()
            })
            .collect();
        let mut model = ReportModel::new();
        model.upsert(RunReport {
            id: "core".to_string(),
            suites: build_suites(Vec::new(), cases),
            coverage: Some(coverage(covered, 10)),
        });
        model
    }

    fn render_text(model: &ReportModel, config: &Config) -> String {
        let filter = config.filter.compile().unwrap();
        let view = FilteredView::new(model, &filter);
        let rendered = SummaryRenderer.render(&view, config);
        let artifact = rendered.into_iter().next().unwrap().result.unwrap();
        String::from_utf8(artifact.bytes).unwrap()
    }

    #[test]
    fn test_aggregated_table_has_run_and_total_rows() {
        let model = model(&[Outcome::Passed, Outcome::Passed], &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let config = Config::default();
        let text = render_text(&model, &config);

        assert!(text.starts_with("# Test Report\n"));
        assert!(text.contains("| core | 2 | 2 | 0 | 0 | 0 | 0.020s |"));
        assert!(text.contains("| **Total** | 2 |"));
        // 9/10 lines covered, default whole-percent precision
        assert!(text.contains("![90%](https://img.shields.io/badge/90%25-brightgreen?style=flat)"));
        assert!(text.contains("![passed](https://img.shields.io/badge/passed-brightgreen?style=flat)"));
    }

    #[test]
    fn test_failed_run_gets_red_badge_regardless_of_coverage() {
        // a failing suite with full coverage still reports failed status,
        // and low coverage is red even when all tests pass
        let model = model(
            &[Outcome::Passed, Outcome::Passed, Outcome::Passed, Outcome::Failed, Outcome::Skipped],
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
        );
        let text = render_text(&model, &Config::default());
        assert!(text.contains("![failed](https://img.shields.io/badge/failed-red?style=flat)"));
        assert!(text.contains("100%25-brightgreen"));

        let low = model_with_low_coverage();
        let text = render_text(&low, &Config::default());
        assert!(text.contains("![passed]"));
        assert!(text.contains("50%25-red"));
    }

    fn model_with_low_coverage() -> ReportModel {
        model(&[Outcome::Passed], &[1, 2, 3, 4, 5])
    }

    #[test]
    fn test_precision_config_controls_decimals() {
        let mut config = Config::default();
        config.summary.precision = 1;
        let model = model(&[Outcome::Passed], &[1, 2, 3, 4, 5, 6, 7]);
        let text = render_text(&model, &config);
        assert!(text.contains("70.0%25"));
    }

    #[test]
    fn test_per_run_artifact_naming() {
        let mut config = Config::default();
        config.summary.aggregate = false;
        let model = model(&[Outcome::Passed], &[1]);
        let filter = config.filter.compile().unwrap();
        let view = FilteredView::new(&model, &filter);
        let rendered = SummaryRenderer.render(&view, &config);
        assert_eq!(rendered.len(), 1);
        let artifact = rendered.into_iter().next().unwrap().result.unwrap();
        assert_eq!(artifact.relative_path, "TEST-summary-core.md");
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.starts_with("# Test Report - core\n"));
        assert!(!text.contains("**Total**"));
    }

    #[test]
    fn test_missing_template_key_fails_this_renderer() {
        let mut config = Config::default();
        config
            .templates
            .overrides
            .insert(SUMMARY_TEMPLATE.to_string(), "{{ nonexistent }}".to_string());
        let model = model(&[Outcome::Passed], &[1]);
        let filter = config.filter.compile().unwrap();
        let view = FilteredView::new(&model, &filter);
        let rendered = SummaryRenderer.render(&view, &config);
        let err = rendered.into_iter().next().unwrap().result.unwrap_err();
        assert!(matches!(err, crate::core::Error::Template(_)));
    }
}
