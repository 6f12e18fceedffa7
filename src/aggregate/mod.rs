//! Aggregation of per-run models into one consistent report model.

use std::collections::BTreeMap;

use crate::core::{Error, Result};
use crate::coverage::builder::{build_method, class_counters};
use crate::coverage::{
    ClassCoverage, Counters, CounterKind, LineCoverage, ModuleCoverage, PackageCoverage,
};
use crate::model::{Stats, TestSuite};

/// One recorded run: suites plus optional coverage for a module.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub id: String,
    pub suites: Vec<TestSuite>,
    pub coverage: Option<ModuleCoverage>,
}

/// Root aggregate across runs. Run ids are unique; recording an id a
/// second time replaces the prior data wholesale, and iteration order is
/// the order runs were first inserted.
#[derive(Debug, Clone, Default)]
pub struct ReportModel {
    runs: Vec<RunReport>,
}

impl ReportModel {
    pub fn new() -> ReportModel {
        ReportModel::default()
    }

    /// Upsert a run: replace in place when the id is already present,
    /// keeping its original position, otherwise append.
    pub fn upsert(&mut self, run: RunReport) {
        match self.runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run,
            None => self.runs.push(run),
        }
    }

    pub fn runs(&self) -> &[RunReport] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Test totals across all runs, always over the unfiltered model.
    pub fn totals(&self) -> Stats {
        let per_run: Vec<Stats> = self
            .runs
            .iter()
            .map(|run| Stats::merge(run.suites.iter().map(|s| &s.stats)))
            .collect();
        Stats::merge(&per_run)
    }

    /// Synthetic combined coverage root for aggregated rendering: the
    /// union of all runs' packages, with class subtrees merged by
    /// fully-qualified name.
    ///
    /// Returns `Ok(None)` when no run carries coverage, and a conflict
    /// error when the same class is reported with contradicting totals
    /// by two runs.
    pub fn combined_coverage(&self) -> Result<Option<ModuleCoverage>> {
        let roots: Vec<&ModuleCoverage> =
            self.runs.iter().filter_map(|r| r.coverage.as_ref()).collect();
        if roots.is_empty() {
            return Ok(None);
        }

        let mut classes: BTreeMap<String, ClassCoverage> = BTreeMap::new();
        for root in roots {
            for package in &root.packages {
                for class in &package.classes {
                    match classes.get_mut(&class.name) {
                        Some(existing) => *existing = merge_class(existing, class)?,
                        None => {
                            classes.insert(class.name.clone(), class.clone());
                        }
                    }
                }
            }
        }

        let mut packages: BTreeMap<String, PackageCoverage> = BTreeMap::new();
        for class in classes.into_values() {
            let package = packages
                .entry(crate::coverage::package_of(&class.name).to_string())
                .or_insert_with_key(|name| PackageCoverage {
                    name: name.clone(),
                    counters: Counters::default(),
                    classes: Vec::new(),
                });
            package.counters.add(&class.counters);
            package.classes.push(class);
        }

        let mut combined = ModuleCoverage {
            name: "combined".to_string(),
            counters: Counters::default(),
            packages: packages.into_values().collect(),
        };
        for package in &combined.packages {
            combined.counters.add(&package.counters);
        }
        Ok(Some(combined))
    }
}

/// Merge two occurrences of the same class across runs.
///
/// Totals must agree for every counter kind (an ambiguous source is a
/// conflict). Line coverage takes the covered-union of both runs, capped
/// at each line's total, and every ancestor counter is recomputed
/// bottom-up so parent sums stay exact.
fn merge_class(a: &ClassCoverage, b: &ClassCoverage) -> Result<ClassCoverage> {
    for kind in CounterKind::ALL {
        let (ta, tb) = (a.counters.get(kind).total, b.counters.get(kind).total);
        if ta != tb {
            return Err(Error::conflict(format!(
                "class {} reported with {:?} totals {} and {} by different runs",
                a.name, kind, ta, tb
            )));
        }
    }

    // Union methods by name; shared methods take the per-line union.
    let mut lines_by_method: BTreeMap<String, (u32, u32, BTreeMap<u32, LineCoverage>)> =
        BTreeMap::new();
    for class in [a, b] {
        for method in &class.methods {
            let entry = lines_by_method
                .entry(method.name.clone())
                .or_insert_with(|| (method.first_line, method.last_line, BTreeMap::new()));
            entry.0 = entry.0.min(method.first_line);
            entry.1 = entry.1.max(method.last_line);
            for line in &method.lines {
                entry
                    .2
                    .entry(line.number)
                    .and_modify(|merged| merge_line(merged, line))
                    .or_insert_with(|| line.clone());
            }
        }
    }

    let mut methods: Vec<_> = lines_by_method
        .into_iter()
        .map(|(name, (first, last, lines))| {
            build_method(name, first, last, lines.into_values().collect())
        })
        .collect();
    methods.sort_by_key(|m| (m.first_line, m.name.clone()));

    Ok(ClassCoverage {
        name: a.name.clone(),
        source_file: a.source_file.clone().or_else(|| b.source_file.clone()),
        counters: class_counters(&methods),
        methods,
    })
}

/// A line is covered when covered in any run; counts sum, capped at the
/// (larger) total.
fn merge_line(merged: &mut LineCoverage, other: &LineCoverage) {
    merged.instructions.total = merged.instructions.total.max(other.instructions.total);
    merged.instructions.covered = (merged.instructions.covered + other.instructions.covered)
        .min(merged.instructions.total);
    merged.branches.total = merged.branches.total.max(other.branches.total);
    merged.branches.covered =
        (merged.branches.covered + other.branches.covered).min(merged.branches.total);
}
