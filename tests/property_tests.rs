//! Property tests for the aggregation and rendering invariants.

use proptest::prelude::*;

use verdict::aggregate::{ReportModel, RunReport};
use verdict::coverage::{
    build_coverage, ClassCoverage, Counter, CounterKind, MethodCoverage, ModuleCoverage,
    PackageCoverage, RawClassCoverage, RawCounter, RawLineCoverage, RawMethodRange,
};
use verdict::filter::{FilterSet, FilterSpec, FilteredView};
use verdict::model::{build_suites, Outcome, RawTestCase};
use verdict::render::registry;
use verdict::Config;

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Passed),
        Just(Outcome::Failed),
        Just(Outcome::Skipped),
        Just(Outcome::Errored),
    ]
}

fn raw_case(suite: &str, name: String, outcome: Outcome) -> RawTestCase {
    RawTestCase {
        suite: suite.to_string(),
        name,
        outcome,
        duration_ms: 1,
        ..RawTestCase::default()
    }
}

/// Coverage for one class spanning lines 1..=50, from (line, covered,
/// missed) triples. Lines are deduplicated by number first.
fn class_coverage(lines: Vec<(u32, u64, u64)>) -> ModuleCoverage {
    let unique: std::collections::BTreeMap<u32, (u64, u64)> = lines
        .into_iter()
        .map(|(line, covered, missed)| (line, (covered, missed)))
        .collect();
    build_coverage(
        "mod",
        vec![RawClassCoverage {
            name: "pkg.Foo".to_string(),
            source_file: None,
            methods: vec![
                RawMethodRange {
                    name: "first()".to_string(),
                    first_line: 1,
                    last_line: 25,
                },
                RawMethodRange {
                    name: "second()".to_string(),
                    first_line: 26,
                    last_line: 50,
                },
            ],
        }],
        unique
            .into_iter()
            .map(|(line, (covered, missed))| RawLineCoverage {
                class_name: "pkg.Foo".to_string(),
                line,
                instructions: RawCounter {
                    covered,
                    total: covered + missed,
                },
                branches: RawCounter {
                    covered: 0,
                    total: 0,
                },
            })
            .collect(),
    )
    .unwrap()
}

fn assert_counter_invariants(counters: &verdict::coverage::Counters) {
    for kind in CounterKind::ALL {
        let counter = counters.get(kind);
        assert!(
            counter.covered <= counter.total,
            "{kind:?}: covered {} > total {}",
            counter.covered,
            counter.total
        );
    }
}

fn summed<'a>(
    parts: impl Iterator<Item = &'a verdict::coverage::Counters>,
) -> verdict::coverage::Counters {
    let mut sum = verdict::coverage::Counters::default();
    for counters in parts {
        sum.add(counters);
    }
    sum
}

fn assert_tree_invariants(root: &ModuleCoverage) {
    assert_counter_invariants(&root.counters);
    let mut from_packages = summed(root.packages.iter().map(|p| &p.counters));
    assert_eq!(root.counters, from_packages);

    for package in &root.packages {
        assert_counter_invariants(&package.counters);
        from_packages = summed(package.classes.iter().map(|c| &c.counters));
        assert_eq!(package.counters, from_packages);
        for class in &package.classes {
            assert_class_invariants(class);
        }
    }
}

fn assert_class_invariants(class: &ClassCoverage) {
    assert_counter_invariants(&class.counters);
    for method in &class.methods {
        assert_method_invariants(method);
    }
    // instruction/branch/line totals roll up from methods; the class
    // counter itself is the class's own 0-or-1 pair
    let rolled = summed(class.methods.iter().map(|m| &m.counters));
    assert_eq!(class.counters.instruction, rolled.instruction);
    assert_eq!(class.counters.branch, rolled.branch);
    assert_eq!(class.counters.line, rolled.line);
    assert_eq!(class.counters.method, rolled.method);
}

fn assert_method_invariants(method: &MethodCoverage) {
    assert_counter_invariants(&method.counters);
    let mut instructions = Counter::default();
    for line in &method.lines {
        instructions.add(&line.instructions);
    }
    assert_eq!(method.counters.instruction, instructions);
}

proptest! {
    /// Percentages computed in integer arithmetic stay within bounds at
    /// every precision and grow monotonically with coverage.
    #[test]
    fn percent_bounded_and_monotone(
        covered in 0u64..5_000,
        extra in 0u64..5_000,
        precision in 0u32..4,
    ) {
        let total = covered + extra;
        let counter = Counter::new(covered, total);
        let scale = 10u64.pow(precision);
        prop_assert!(counter.percent_scaled(precision) <= 100 * scale);

        if covered > 0 {
            let less = Counter::new(covered - 1, total);
            prop_assert!(less.percent_scaled(precision) <= counter.percent_scaled(precision));
        }
    }

    /// Suite statistics partition exactly: every case lands in exactly
    /// one outcome bucket, grouping loses no cases.
    #[test]
    fn suite_stats_partition_cases(
        outcomes in prop::collection::vec((0u8..4, outcome_strategy()), 0..60),
    ) {
        let total = outcomes.len() as u64;
        let cases: Vec<RawTestCase> = outcomes
            .iter()
            .enumerate()
            .map(|(i, (suite, outcome))| raw_case(&format!("s{suite}"), format!("t{i}"), *outcome))
            .collect();

        let suites = build_suites(Vec::new(), cases);
        let grouped: u64 = suites.iter().map(|s| s.stats.total).sum();
        prop_assert_eq!(grouped, total);
        for suite in &suites {
            let stats = suite.stats;
            prop_assert_eq!(
                stats.passed + stats.failed + stats.skipped + stats.errored,
                stats.total
            );
        }
    }

    /// Every constructed coverage tree satisfies covered <= total and
    /// parent-sum equality at all levels.
    #[test]
    fn coverage_tree_invariants_hold(
        lines in prop::collection::vec((1u32..=50, 0u64..=4, 0u64..=4), 1..40),
    ) {
        let root = class_coverage(lines);
        assert_tree_invariants(&root);
    }

    /// Merging runs A, B, then A again equals merging B, A, A: upsert
    /// replaces, and the combined coverage is identical.
    #[test]
    fn upsert_order_independent(
        covered_a in prop::collection::btree_set(1u32..=10, 0..=10),
        covered_b in prop::collection::btree_set(1u32..=10, 0..=10),
    ) {
        let coverage_of = |covered: &std::collections::BTreeSet<u32>| {
            // every line has total 1 so totals agree across runs
            class_coverage(
                (1..=10)
                    .map(|n| {
                        let c = u64::from(covered.contains(&n));
                        (n, c, 1 - c)
                    })
                    .collect(),
            )
        };
        let run = |id: &str, covered: &std::collections::BTreeSet<u32>| RunReport {
            id: id.to_string(),
            suites: Vec::new(),
            coverage: Some(coverage_of(covered)),
        };

        let mut m1 = ReportModel::new();
        m1.upsert(run("a", &covered_a));
        m1.upsert(run("b", &covered_b));
        m1.upsert(run("a", &covered_a));

        let mut m2 = ReportModel::new();
        m2.upsert(run("b", &covered_b));
        m2.upsert(run("a", &covered_a));
        m2.upsert(run("a", &covered_a));

        prop_assert_eq!(m1.runs().len(), 2);
        prop_assert_eq!(m2.runs().len(), 2);

        let c1 = m1.combined_coverage().unwrap().unwrap();
        let c2 = m2.combined_coverage().unwrap().unwrap();
        assert_tree_invariants(&c1);
        prop_assert_eq!(
            serde_json::to_string(&c1).unwrap(),
            serde_json::to_string(&c2).unwrap()
        );
    }

    /// A combined class is covered on a line exactly when any run
    /// covered it, never exceeding the shared total.
    #[test]
    fn combined_coverage_is_covered_union(
        covered_a in prop::collection::btree_set(1u32..=10, 0..=10),
        covered_b in prop::collection::btree_set(1u32..=10, 0..=10),
    ) {
        let coverage_of = |covered: &std::collections::BTreeSet<u32>| {
            class_coverage(
                (1..=10)
                    .map(|n| {
                        let c = u64::from(covered.contains(&n));
                        (n, c, 1 - c)
                    })
                    .collect(),
            )
        };
        let mut model = ReportModel::new();
        model.upsert(RunReport {
            id: "a".to_string(),
            suites: Vec::new(),
            coverage: Some(coverage_of(&covered_a)),
        });
        model.upsert(RunReport {
            id: "b".to_string(),
            suites: Vec::new(),
            coverage: Some(coverage_of(&covered_b)),
        });

        let combined = model.combined_coverage().unwrap().unwrap();
        let union = covered_a.union(&covered_b).count() as u64;
        let class = &combined.packages[0].classes[0];
        prop_assert_eq!(class.counters.line.covered, union);
        prop_assert!(class.counters.line.covered <= class.counters.line.total);
    }

    /// A trailing `**` pattern matches exactly the names under its
    /// prefix, at any depth.
    #[test]
    fn double_star_matches_any_depth(
        segments in prop::collection::vec("[a-z][a-z0-9]{0,5}", 1..4),
        under_acme in any::<bool>(),
    ) {
        let prefix = if under_acme { "com.acme" } else { "org.other" };
        let name = format!("{}.{}", prefix, segments.join("."));
        let filter = FilterSet::new().include("com.acme.**").compile().unwrap();
        prop_assert_eq!(filter.matches(&name), under_acme);
    }

    /// Display filtering never changes the totals reported for a model.
    #[test]
    fn filtering_preserves_totals(
        outcomes in prop::collection::vec(outcome_strategy(), 1..30),
        shown in prop::collection::btree_set(outcome_strategy(), 0..=4),
    ) {
        let cases: Vec<RawTestCase> = outcomes
            .iter()
            .enumerate()
            .map(|(i, outcome)| raw_case("s", format!("t{i}"), *outcome))
            .collect();
        let mut model = ReportModel::new();
        model.upsert(RunReport {
            id: "run".to_string(),
            suites: build_suites(Vec::new(), cases),
            coverage: None,
        });

        let spec = FilterSpec {
            outcomes: shown.clone(),
            ..FilterSpec::default()
        };
        let compiled = spec.compile().unwrap();
        let view = FilteredView::new(&model, &compiled);

        let totals = view.totals();
        prop_assert_eq!(totals.total, outcomes.len() as u64);

        let run = view.runs().next().unwrap();
        let visible: usize = run.suites().map(|s| s.detail_cases().count()).sum();
        let expected = outcomes.iter().filter(|o| shown.contains(*o)).count();
        prop_assert_eq!(visible, expected);
    }
}

// ---------------------------------------------------------------------------
// Deterministic edge cases
// ---------------------------------------------------------------------------

#[test]
fn renderers_are_idempotent_over_one_view() {
    let cases = vec![
        raw_case("com.acme.ATest", "a".to_string(), Outcome::Passed),
        raw_case("com.acme.ATest", "b".to_string(), Outcome::Failed),
    ];
    let mut model = ReportModel::new();
    model.upsert(RunReport {
        id: "core".to_string(),
        suites: build_suites(Vec::new(), cases),
        coverage: Some(class_coverage(vec![(1, 1, 0), (2, 0, 2)])),
    });

    let config = Config::default();
    let compiled = config.filter.compile().unwrap();
    let view = FilteredView::new(&model, &compiled);

    for renderer in registry() {
        let first: Vec<_> = renderer
            .render(&view, &config)
            .into_iter()
            .map(|r| r.result.unwrap())
            .collect();
        let second: Vec<_> = renderer
            .render(&view, &config)
            .into_iter()
            .map(|r| r.result.unwrap())
            .collect();
        assert_eq!(first, second, "{} output drifted", renderer.name());
    }
}

#[test]
fn empty_model_renders_cleanly() {
    let model = ReportModel::new();
    let config = Config::default();
    let compiled = config.filter.compile().unwrap();
    let view = FilteredView::new(&model, &compiled);

    for renderer in registry() {
        for rendered in renderer.render(&view, &config) {
            rendered.result.unwrap();
        }
    }
}

#[test]
fn declared_empty_suite_reports_skipped() {
    use verdict::model::RawSuite;

    let suites = build_suites(
        vec![RawSuite {
            name: "com.acme.EmptyTest".to_string(),
            ..RawSuite::default()
        }],
        Vec::new(),
    );
    assert_eq!(suites.len(), 1);
    assert_eq!(suites[0].outcome(), Outcome::Skipped);
    assert_eq!(suites[0].stats.duration_ms, 0);
}

#[test]
fn zero_total_counter_is_zero_percent() {
    assert_eq!(Counter::new(0, 0).percent_string(2), "0.00");
    assert_eq!(Counter::new(0, 0).percent_scaled(0), 0);
}

#[test]
fn package_rollup_spans_packages() {
    let root = build_coverage(
        "mod",
        vec![
            RawClassCoverage {
                name: "com.a.Foo".to_string(),
                source_file: None,
                methods: vec![RawMethodRange {
                    name: "f()".to_string(),
                    first_line: 1,
                    last_line: 5,
                }],
            },
            RawClassCoverage {
                name: "com.b.Bar".to_string(),
                source_file: None,
                methods: vec![RawMethodRange {
                    name: "g()".to_string(),
                    first_line: 1,
                    last_line: 5,
                }],
            },
        ],
        vec![
            RawLineCoverage {
                class_name: "com.a.Foo".to_string(),
                line: 1,
                instructions: RawCounter {
                    covered: 2,
                    total: 3,
                },
                branches: RawCounter {
                    covered: 1,
                    total: 2,
                },
            },
            RawLineCoverage {
                class_name: "com.b.Bar".to_string(),
                line: 2,
                instructions: RawCounter {
                    covered: 0,
                    total: 4,
                },
                branches: RawCounter {
                    covered: 0,
                    total: 0,
                },
            },
        ],
    )
    .unwrap();

    let packages: Vec<&PackageCoverage> = root.packages.iter().collect();
    assert_eq!(packages.len(), 2);
    assert_eq!(root.counters.instruction, Counter::new(2, 7));
    assert_eq!(root.counters.branch, Counter::new(1, 2));
    assert_eq!(root.counters.class, Counter::new(1, 2));
}
