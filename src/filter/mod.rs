//! Include/exclude pattern filtering and the read-only filtered view
//! renderers consume.
//!
//! Patterns are dot-path globs: `?` matches one character, `*` matches
//! within one dot segment, a trailing `**` matches any depth
//! (`com.acme.**` matches `com.acme.internal.Util.run`). A value passes
//! a set when it matches no exclude pattern and either the include list
//! is empty or it matches an include pattern.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::aggregate::{ReportModel, RunReport};
use crate::core::{Error, Result};
use crate::coverage::{ClassCoverage, ModuleCoverage, PackageCoverage};
use crate::model::{FailureDetail, Outcome, StackFrame, Stats, TestCase, TestSuite};

/// Ordered include/exclude pattern lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub case_sensitive: bool,
}

impl FilterSet {
    pub fn new() -> FilterSet {
        FilterSet::default()
    }

    pub fn include(mut self, pattern: impl Into<String>) -> FilterSet {
        self.includes.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> FilterSet {
        self.excludes.push(pattern.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Compile both pattern lists into anchored alternation regexes.
    pub fn compile(&self) -> Result<CompiledFilter> {
        Ok(CompiledFilter {
            includes: compile_patterns(&self.includes, self.case_sensitive)?,
            excludes: compile_patterns(&self.excludes, self.case_sensitive)?,
        })
    }
}

fn compile_patterns(patterns: &[String], case_sensitive: bool) -> Result<Option<Regex>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    if patterns.iter().any(|p| p.trim().is_empty()) {
        return Err(Error::config("empty filter pattern"));
    }
    let alternation = patterns
        .iter()
        .map(|p| pattern_to_regex(p))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&format!("^({alternation})$"))
        .case_insensitive(!case_sensitive)
        .build()
        .map(Some)
        .map_err(|e| Error::config(format!("invalid filter pattern: {e}")))
}

fn pattern_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' | '$' | '(' | ')' | '[' | ']' | '{' | '}' | '+' | '^' | '|' | '\\' => {
                regex.push('\\');
                regex.push(chars[i]);
            }
            '?' => regex.push('.'),
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    regex.push_str(".*");
                    i += 1;
                } else {
                    regex.push_str("[^.]*");
                }
            }
            ch => regex.push(ch),
        }
        i += 1;
    }
    regex
}

/// Compiled form of a [`FilterSet`].
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    includes: Option<Regex>,
    excludes: Option<Regex>,
}

impl CompiledFilter {
    /// Excludes win; an empty include list includes everything.
    pub fn matches(&self, value: &str) -> bool {
        if let Some(excludes) = &self.excludes {
            if excludes.is_match(value) {
                return false;
            }
        }
        match &self.includes {
            Some(includes) => includes.is_match(value),
            None => true,
        }
    }
}

/// Filtering configuration for one render invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Applied to stack-frame declaring locations.
    pub stack: FilterSet,
    /// Applied to coverage package/class paths in detail sections.
    pub paths: FilterSet,
    /// Case outcomes shown in rendered detail sections. Summary counts
    /// always cover all outcomes.
    pub outcomes: BTreeSet<Outcome>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        FilterSpec {
            stack: FilterSet::default(),
            paths: FilterSet::default(),
            outcomes: BTreeSet::from([Outcome::Failed, Outcome::Errored]),
        }
    }
}

impl FilterSpec {
    pub fn compile(&self) -> Result<CompiledFilterSpec> {
        Ok(CompiledFilterSpec {
            stack: self.stack.compile()?,
            paths: self.paths.compile()?,
            outcomes: self.outcomes.clone(),
        })
    }
}

/// Compiled form of a [`FilterSpec`].
#[derive(Debug, Clone)]
pub struct CompiledFilterSpec {
    pub stack: CompiledFilter,
    pub paths: CompiledFilter,
    pub outcomes: BTreeSet<Outcome>,
}

/// Read-only projection of a [`ReportModel`] under a filter. Borrows the
/// model; excluded detail is skipped during iteration, never copied.
/// Filtering changes presentation only: outcomes and summary totals come
/// from the unfiltered model.
#[derive(Clone, Copy)]
pub struct FilteredView<'a> {
    model: &'a ReportModel,
    filter: &'a CompiledFilterSpec,
}

impl<'a> FilteredView<'a> {
    pub fn new(model: &'a ReportModel, filter: &'a CompiledFilterSpec) -> FilteredView<'a> {
        FilteredView { model, filter }
    }

    /// Unfiltered totals across all runs.
    pub fn totals(&self) -> Stats {
        self.model.totals()
    }

    pub fn runs(&self) -> impl Iterator<Item = RunView<'a>> + '_ {
        let filter = self.filter;
        self.model.runs().iter().map(move |run| RunView { run, filter })
    }

    pub fn combined_coverage(&self) -> Result<Option<ModuleCoverage>> {
        self.model.combined_coverage()
    }

    /// Coverage detail rows of a combined root, gated by the path
    /// filter the same way per-run detail is.
    pub fn coverage_detail<'b>(
        &self,
        root: &'b ModuleCoverage,
    ) -> Vec<(&'b PackageCoverage, Vec<&'b ClassCoverage>)> {
        coverage_detail(root, self.filter)
    }
}

/// One run under the view's filter.
#[derive(Clone, Copy)]
pub struct RunView<'a> {
    run: &'a RunReport,
    filter: &'a CompiledFilterSpec,
}

impl<'a> RunView<'a> {
    pub fn id(&self) -> &'a str {
        &self.run.id
    }

    /// Unfiltered totals for this run.
    pub fn totals(&self) -> Stats {
        Stats::merge(self.run.suites.iter().map(|s| &s.stats))
    }

    pub fn coverage(&self) -> Option<&'a ModuleCoverage> {
        self.run.coverage.as_ref()
    }

    pub fn suites(&self) -> impl Iterator<Item = SuiteView<'a>> + '_ {
        let filter = self.filter;
        self.run
            .suites
            .iter()
            .map(move |suite| SuiteView { suite, filter })
    }

    /// Suites ordered for detail sections: failing suites first, stable
    /// by first-seen order within equal rank.
    pub fn detail_suites(&self) -> Vec<SuiteView<'a>> {
        let mut suites: Vec<SuiteView<'a>> = self.suites().collect();
        suites.sort_by_key(|view| view.suite.outcome().rank());
        suites
    }

    /// Coverage detail rows gated by the path filter: a class is listed
    /// when its fully-qualified name passes, a package when any of its
    /// classes is listed. Counter values are untouched.
    pub fn coverage_detail<'b>(
        &self,
        root: &'b ModuleCoverage,
    ) -> Vec<(&'b PackageCoverage, Vec<&'b ClassCoverage>)> {
        coverage_detail(root, self.filter)
    }
}

pub(crate) fn coverage_detail<'b>(
    root: &'b ModuleCoverage,
    filter: &CompiledFilterSpec,
) -> Vec<(&'b PackageCoverage, Vec<&'b ClassCoverage>)> {
    root.packages
        .iter()
        .filter_map(|package| {
            let classes: Vec<&ClassCoverage> = package
                .classes
                .iter()
                .filter(|class| filter.paths.matches(&class.name))
                .collect();
            if classes.is_empty() {
                None
            } else {
                Some((package, classes))
            }
        })
        .collect()
}

/// One suite under the view's filter.
#[derive(Clone, Copy)]
pub struct SuiteView<'a> {
    pub suite: &'a TestSuite,
    filter: &'a CompiledFilterSpec,
}

impl<'a> SuiteView<'a> {
    /// Cases visible in detail sections: outcome must be in the
    /// configured outcome set.
    pub fn detail_cases(&self) -> impl Iterator<Item = CaseView<'a>> + '_ {
        let filter = self.filter;
        self.suite
            .cases
            .iter()
            .filter(move |case| filter.outcomes.contains(&case.outcome))
            .map(move |case| CaseView { case, filter })
    }

}

/// One case under the view's filter.
#[derive(Clone, Copy)]
pub struct CaseView<'a> {
    pub case: &'a TestCase,
    filter: &'a CompiledFilterSpec,
}

impl<'a> CaseView<'a> {
    /// Frames of a failure that pass the stack filter, in their original
    /// order, plus the count of frames dropped. Filtering never changes
    /// the case outcome.
    pub fn filtered_frames(&self, failure: &'a FailureDetail) -> (Vec<&'a StackFrame>, usize) {
        let kept: Vec<&StackFrame> = failure
            .frames
            .iter()
            .filter(|frame| self.filter.stack.matches(&frame.location))
            .collect();
        let omitted = failure.frames.len() - kept.len();
        (kept, omitted)
    }
}
