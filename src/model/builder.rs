//! Builds the immutable test model from raw execution records.

use std::collections::HashMap;

use super::{RawSuite, RawTestCase, Stats, TestCase, TestSuite};

/// Group raw test-case records into suites, preserving first-seen order.
///
/// Declared suites (`RawSuite`) seed the ordering and carry suite-level
/// captured output; a declared suite that receives no cases is retained
/// as empty and reports as skipped with zero duration. Cases referencing
/// an undeclared suite create one at the position the suite is first
/// seen.
pub fn build_suites(declared: Vec<RawSuite>, cases: Vec<RawTestCase>) -> Vec<TestSuite> {
    let mut order: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut outputs: HashMap<String, (String, String)> = HashMap::new();
    let mut grouped: HashMap<String, Vec<TestCase>> = HashMap::new();

    for suite in declared {
        if !index.contains_key(&suite.name) {
            index.insert(suite.name.clone(), order.len());
            order.push(suite.name.clone());
        }
        outputs.insert(suite.name.clone(), (suite.stdout, suite.stderr));
    }

    for raw in cases {
        if !index.contains_key(&raw.suite) {
            index.insert(raw.suite.clone(), order.len());
            order.push(raw.suite.clone());
        }
        let case = TestCase {
            display_name: raw.display_name.unwrap_or_else(|| raw.name.clone()),
            name: raw.name,
            param_index: raw.param_index,
            outcome: raw.outcome,
            duration_ms: raw.duration_ms,
            start_time_ms: raw.start_time_ms,
            stdout: raw.stdout,
            stderr: raw.stderr,
            source_file: raw.source_file,
            failures: raw.failures,
        };
        grouped.entry(raw.suite).or_default().push(case);
    }

    order
        .into_iter()
        .map(|name| {
            let cases = grouped.remove(&name).unwrap_or_default();
            let (stdout, stderr) = outputs.remove(&name).unwrap_or_default();
            let stats = Stats::collect(&cases);
            TestSuite {
                name,
                stats,
                stdout,
                stderr,
                cases,
            }
        })
        .collect()
}
