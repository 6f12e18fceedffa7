//! The aggregation context for one report cycle.
//!
//! A [`ReportSession`] is created at the start of a cycle, fed one run
//! at a time as test tasks complete (possibly from parallel workers),
//! and rendered exactly once at the end. Dropping a session without
//! rendering discards every partial model and writes nothing, so
//! consumers never observe artifacts from a half-aggregated build.

use std::path::PathBuf;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::aggregate::{ReportModel, RunReport};
use crate::config::Config;
use crate::core::{Error, Result};
use crate::coverage::{build_coverage, RawClassCoverage, RawLineCoverage};
use crate::filter::FilteredView;
use crate::model::{build_suites, RawSuite, RawTestCase};
use crate::output::ArtifactWriter;
use crate::render::{registry, Rendered, ReportRenderer};

/// Raw records of one run, as handed over by the input parsers.
#[derive(Debug, Clone, Default)]
pub struct RawRun {
    /// Suite declarations; lets empty suites and suite-level captured
    /// output survive into the model.
    pub suites: Vec<RawSuite>,
    pub cases: Vec<RawTestCase>,
    pub coverage: Option<RawCoverage>,
}

/// Raw coverage records of one run.
#[derive(Debug, Clone, Default)]
pub struct RawCoverage {
    pub classes: Vec<RawClassCoverage>,
    pub lines: Vec<RawLineCoverage>,
}

/// One aggregation-then-render cycle.
pub struct ReportSession {
    config: Config,
    model: Mutex<ReportModel>,
}

impl ReportSession {
    pub fn new(config: Config) -> ReportSession {
        ReportSession {
            config,
            model: Mutex::new(ReportModel::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Record one run's raw records, building its immutable model and
    /// upserting it into the shared report model. Thread-safe; the
    /// upsert itself is serialized.
    ///
    /// Malformed records fail this run only. Recording an id a second
    /// time replaces the prior data wholesale.
    pub fn record_run(&self, run_id: impl Into<String>, raw: RawRun) -> Result<()> {
        let id = run_id.into();
        let suites = build_suites(raw.suites, raw.cases);
        let coverage = raw
            .coverage
            .map(|c| build_coverage(&id, c.classes, c.lines))
            .transpose()?;
        tracing::debug!(run = %id, suites = suites.len(), "run recorded");
        self.model.lock().upsert(RunReport {
            id,
            suites,
            coverage,
        });
        Ok(())
    }

    /// Number of runs recorded so far.
    pub fn run_count(&self) -> usize {
        self.model.lock().runs().len()
    }

    /// The render barrier: filter the aggregated model, run every
    /// enabled renderer and write their artifacts.
    ///
    /// Called once per cycle, after all expected runs are recorded.
    /// Renderers run in parallel over the same immutable view; a
    /// failing renderer never aborts its siblings, and its failures are
    /// collected in the returned [`CycleReport`]. The `Err` branch is
    /// reserved for configuration-level problems such as an invalid
    /// filter pattern.
    pub fn render(&self) -> Result<CycleReport> {
        let model = self.model.lock().clone();
        let filter = self.config.filter.compile()?;
        let view = FilteredView::new(&model, &filter);

        let renderers = registry();
        let enabled: Vec<&dyn ReportRenderer> = renderers
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| {
                let on = r.enabled(&self.config);
                if !on {
                    tracing::debug!(renderer = r.name(), "renderer disabled, skipped");
                }
                on
            })
            .collect();

        let outputs: Vec<(&'static str, Vec<Rendered>)> = enabled
            .par_iter()
            .map(|renderer| (renderer.name(), renderer.render(&view, &self.config)))
            .collect();

        let writer = ArtifactWriter::new(&self.config.output_dir);
        let mut cycle = CycleReport::default();
        for (renderer, rendered) in outputs {
            for unit in rendered {
                let written = unit.result.and_then(|artifact| writer.write(&artifact));
                match written {
                    Ok(path) => {
                        tracing::info!(renderer, path = %path.display(), "artifact written");
                        cycle.written.push(path);
                    }
                    Err(error) => {
                        tracing::warn!(
                            renderer,
                            run = unit.run.as_deref().unwrap_or("aggregated"),
                            %error,
                            "renderer failed"
                        );
                        cycle.failures.push(RenderFailure {
                            renderer,
                            run: unit.run,
                            error,
                        });
                    }
                }
            }
        }
        Ok(cycle)
    }
}

/// What one render cycle produced: the artifacts written and the
/// failures collected along the way, surfaced together rather than
/// aborting on the first.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<RenderFailure>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One collected renderer failure.
#[derive(Debug)]
pub struct RenderFailure {
    pub renderer: &'static str,
    /// Run the failing unit belonged to; `None` for aggregated output.
    pub run: Option<String>,
    pub error: Error,
}
