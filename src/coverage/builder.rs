//! Builds the coverage tree bottom-up from raw per-line counters.

use std::collections::BTreeMap;

use crate::core::{Error, Result};

use super::{
    package_of, ClassCoverage, Counter, Counters, LineCoverage, MethodCoverage, ModuleCoverage,
    PackageCoverage, RawClassCoverage, RawCounter, RawLineCoverage,
};

/// Build one run's coverage tree: line -> enclosing method (by line
/// range) -> class (by declaring type) -> package (by namespace prefix),
/// recomputing covered/total sums at every level.
///
/// Output ordering is fully deterministic regardless of input order:
/// packages and classes sort by name, methods by first line, lines by
/// number.
///
/// Fails with a malformed-input error when a line counter references an
/// undeclared class, falls outside every declared method range of its
/// class, or reports `covered > total`.
pub fn build_coverage(
    module_name: &str,
    classes: Vec<RawClassCoverage>,
    lines: Vec<RawLineCoverage>,
) -> Result<ModuleCoverage> {
    // Class skeletons keyed by fully-qualified name; BTreeMap gives the
    // sorted iteration order the artifacts rely on.
    let mut skeletons: BTreeMap<String, RawClassCoverage> = BTreeMap::new();
    for class in classes {
        if skeletons.contains_key(&class.name) {
            return Err(Error::malformed(format!(
                "class {} declared twice in one run",
                class.name
            )));
        }
        skeletons.insert(class.name.clone(), class);
    }

    // Collect validated lines per (class, method index).
    let mut method_lines: BTreeMap<(String, usize), Vec<LineCoverage>> = BTreeMap::new();
    for raw in lines {
        check_counter(&raw.instructions, &raw.class_name, raw.line)?;
        check_counter(&raw.branches, &raw.class_name, raw.line)?;

        let skeleton = skeletons.get(&raw.class_name).ok_or_else(|| {
            Error::malformed(format!(
                "line {} references undeclared class {}",
                raw.line, raw.class_name
            ))
        })?;
        let method_idx = skeleton
            .methods
            .iter()
            .position(|m| raw.line >= m.first_line && raw.line <= m.last_line)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "line {} of class {} is outside every declared method range",
                    raw.line, raw.class_name
                ))
            })?;

        method_lines
            .entry((raw.class_name, method_idx))
            .or_default()
            .push(LineCoverage {
                number: raw.line,
                instructions: Counter::new(raw.instructions.covered, raw.instructions.total),
                branches: Counter::new(raw.branches.covered, raw.branches.total),
            });
    }

    // Assemble classes bottom-up, then roll classes into packages.
    let mut packages: BTreeMap<String, PackageCoverage> = BTreeMap::new();
    for (name, skeleton) in skeletons {
        let mut methods: Vec<MethodCoverage> = skeleton
            .methods
            .iter()
            .enumerate()
            .map(|(idx, range)| {
                let mut lines = method_lines
                    .remove(&(name.clone(), idx))
                    .unwrap_or_default();
                lines.sort_by_key(|l| l.number);
                build_method(range.name.clone(), range.first_line, range.last_line, lines)
            })
            .collect();
        methods.sort_by_key(|m| (m.first_line, m.name.clone()));

        let class = ClassCoverage {
            source_file: skeleton.source_file,
            counters: class_counters(&methods),
            methods,
            name,
        };

        let package = packages
            .entry(package_of(&class.name).to_string())
            .or_insert_with_key(|name| PackageCoverage {
                name: name.clone(),
                counters: Counters::default(),
                classes: Vec::new(),
            });
        package.counters.add(&class.counters);
        package.classes.push(class);
    }

    let mut root = ModuleCoverage {
        name: module_name.to_string(),
        counters: Counters::default(),
        packages: packages.into_values().collect(),
    };
    for package in &root.packages {
        root.counters.add(&package.counters);
    }
    Ok(root)
}

/// Roll method counters up into class counters; the class counter
/// itself is covered once any method is.
pub(crate) fn class_counters(methods: &[MethodCoverage]) -> Counters {
    let mut counters = Counters::default();
    for method in methods {
        counters.add(&method.counters);
    }
    counters.class = Counter::new(
        u64::from(methods.iter().any(|m| m.counters.method.covered > 0)),
        1,
    );
    counters
}

pub(crate) fn build_method(
    name: String,
    first_line: u32,
    last_line: u32,
    lines: Vec<LineCoverage>,
) -> MethodCoverage {
    let mut counters = Counters::default();
    for line in &lines {
        counters.instruction.add(&line.instructions);
        counters.branch.add(&line.branches);
        if line.instructions.total > 0 {
            counters
                .line
                .add(&Counter::new(u64::from(line.is_covered()), 1));
        }
    }
    counters.method = Counter::new(u64::from(lines.iter().any(LineCoverage::is_covered)), 1);
    MethodCoverage {
        name,
        first_line,
        last_line,
        counters,
        lines,
    }
}

fn check_counter(counter: &RawCounter, class: &str, line: u32) -> Result<()> {
    if counter.covered > counter.total {
        return Err(Error::malformed(format!(
            "covered {} > total {} at {}:{}",
            counter.covered, counter.total, class, line
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::RawMethodRange;

    fn class(name: &str, methods: Vec<(&str, u32, u32)>) -> RawClassCoverage {
        RawClassCoverage {
            name: name.to_string(),
            source_file: Some(format!("{}.java", name.rsplit('.').next().unwrap())),
            methods: methods
                .into_iter()
                .map(|(name, first, last)| RawMethodRange {
                    name: name.to_string(),
                    first_line: first,
                    last_line: last,
                })
                .collect(),
        }
    }

    fn line(class: &str, number: u32, covered: u64, total: u64) -> RawLineCoverage {
        RawLineCoverage {
            class_name: class.to_string(),
            line: number,
            instructions: RawCounter { covered, total },
            branches: RawCounter {
                covered: 0,
                total: 0,
            },
        }
    }

    #[test]
    fn test_bottom_up_sums() {
        let root = build_coverage(
            "app",
            vec![class("com.acme.Foo", vec![("run()", 1, 10), ("stop()", 11, 20)])],
            vec![
                line("com.acme.Foo", 2, 3, 4),
                line("com.acme.Foo", 3, 0, 2),
                line("com.acme.Foo", 12, 5, 5),
            ],
        )
        .unwrap();

        assert_eq!(root.packages.len(), 1);
        let pkg = &root.packages[0];
        assert_eq!(pkg.name, "com.acme");
        let cls = &pkg.classes[0];
        assert_eq!(cls.counters.instruction, Counter::new(8, 11));
        assert_eq!(cls.counters.line, Counter::new(2, 3));
        assert_eq!(cls.counters.method, Counter::new(2, 2));
        assert_eq!(cls.counters.class, Counter::new(1, 1));
        // parent totals equal the sum of their children
        assert_eq!(root.counters, pkg.counters);
    }

    #[test]
    fn test_uncovered_class_counter() {
        let root = build_coverage(
            "app",
            vec![class("com.acme.Dead", vec![("unused()", 1, 5)])],
            vec![line("com.acme.Dead", 2, 0, 3)],
        )
        .unwrap();
        let cls = &root.packages[0].classes[0];
        assert_eq!(cls.counters.method, Counter::new(0, 1));
        assert_eq!(cls.counters.class, Counter::new(0, 1));
    }

    #[test]
    fn test_unknown_class_is_malformed() {
        let err = build_coverage("app", Vec::new(), vec![line("com.acme.Ghost", 1, 1, 1)])
            .unwrap_err();
        assert!(err.to_string().contains("undeclared class"));
    }

    #[test]
    fn test_line_outside_method_ranges_is_malformed() {
        let err = build_coverage(
            "app",
            vec![class("com.acme.Foo", vec![("run()", 1, 10)])],
            vec![line("com.acme.Foo", 42, 1, 1)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("outside every declared method"));
    }

    #[test]
    fn test_covered_above_total_is_malformed() {
        let err = build_coverage(
            "app",
            vec![class("com.acme.Foo", vec![("run()", 1, 10)])],
            vec![line("com.acme.Foo", 2, 9, 3)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[test]
    fn test_deterministic_ordering() {
        let build = |lines: Vec<RawLineCoverage>| {
            build_coverage(
                "app",
                vec![
                    class("com.acme.B", vec![("b()", 1, 5)]),
                    class("com.acme.A", vec![("a()", 1, 5)]),
                ],
                lines,
            )
            .unwrap()
        };
        let a = build(vec![line("com.acme.B", 2, 1, 1), line("com.acme.A", 2, 1, 1)]);
        let b = build(vec![line("com.acme.A", 2, 1, 1), line("com.acme.B", 2, 1, 1)]);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.packages[0].classes[0].name, "com.acme.A");
    }
}
