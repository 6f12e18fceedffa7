//! Immutable coverage model: counter pairs at line, method, class,
//! package and module granularity.

pub(crate) mod builder;

pub use builder::build_coverage;

use serde::{Deserialize, Serialize};

/// Category of a coverage measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    Instruction,
    Branch,
    Line,
    Method,
    Class,
}

impl CounterKind {
    pub const ALL: [CounterKind; 5] = [
        CounterKind::Instruction,
        CounterKind::Branch,
        CounterKind::Line,
        CounterKind::Method,
        CounterKind::Class,
    ];
}

/// A covered/total pair. Invariant: `covered <= total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub covered: u64,
    pub total: u64,
}

impl Counter {
    pub fn new(covered: u64, total: u64) -> Counter {
        Counter { covered, total }
    }

    pub fn missed(&self) -> u64 {
        self.total - self.covered
    }

    pub fn add(&mut self, other: &Counter) {
        self.covered += other.covered;
        self.total += other.total;
    }

    /// Covered percentage scaled by `10^precision`, rounded half-up,
    /// computed in integer arithmetic. An empty counter is 0.
    pub fn percent_scaled(&self, precision: u32) -> u64 {
        if self.total == 0 {
            return 0;
        }
        let scale = 10u128.pow(precision);
        let numerator = self.covered as u128 * 100 * scale;
        let quotient = numerator / self.total as u128;
        let remainder = numerator % self.total as u128;
        let rounded = if remainder * 2 >= self.total as u128 {
            quotient + 1
        } else {
            quotient
        };
        rounded as u64
    }

    /// Covered percentage as a fixed-point decimal string, e.g. `87.50`
    /// at precision 2. Never floating point, never locale-dependent.
    pub fn percent_string(&self, precision: u32) -> String {
        let scaled = self.percent_scaled(precision);
        if precision == 0 {
            return scaled.to_string();
        }
        let scale = 10u64.pow(precision);
        format!(
            "{}.{:0width$}",
            scaled / scale,
            scaled % scale,
            width = precision as usize
        )
    }
}

/// One counter per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub instruction: Counter,
    pub branch: Counter,
    pub line: Counter,
    pub method: Counter,
    pub class: Counter,
}

impl Counters {
    pub fn add(&mut self, other: &Counters) {
        self.instruction.add(&other.instruction);
        self.branch.add(&other.branch);
        self.line.add(&other.line);
        self.method.add(&other.method);
        self.class.add(&other.class);
    }

    pub fn get(&self, kind: CounterKind) -> &Counter {
        match kind {
            CounterKind::Instruction => &self.instruction,
            CounterKind::Branch => &self.branch,
            CounterKind::Line => &self.line,
            CounterKind::Method => &self.method,
            CounterKind::Class => &self.class,
        }
    }
}

/// Coverage of a single source line.
#[derive(Debug, Clone, Serialize)]
pub struct LineCoverage {
    pub number: u32,
    pub instructions: Counter,
    pub branches: Counter,
}

impl LineCoverage {
    /// A line is covered once any of its instructions executed.
    pub fn is_covered(&self) -> bool {
        self.instructions.covered > 0
    }
}

/// Coverage of one method, including its line detail.
#[derive(Debug, Clone, Serialize)]
pub struct MethodCoverage {
    pub name: String,
    pub first_line: u32,
    pub last_line: u32,
    pub counters: Counters,
    pub lines: Vec<LineCoverage>,
}

/// Coverage of one class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassCoverage {
    /// Fully-qualified class name.
    pub name: String,
    pub source_file: Option<String>,
    pub counters: Counters,
    pub methods: Vec<MethodCoverage>,
}

/// Coverage of one package.
#[derive(Debug, Clone, Serialize)]
pub struct PackageCoverage {
    pub name: String,
    pub counters: Counters,
    pub classes: Vec<ClassCoverage>,
}

/// Root coverage node for one run/module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleCoverage {
    pub name: String,
    pub counters: Counters,
    pub packages: Vec<PackageCoverage>,
}

/// Raw covered/total pair as handed over by the coverage parser.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawCounter {
    pub covered: u64,
    pub total: u64,
}

/// Raw method range declaration, grouping key for line counters.
/// `name` must be unique within its class (include the signature for
/// overloads).
#[derive(Debug, Clone, Deserialize)]
pub struct RawMethodRange {
    pub name: String,
    pub first_line: u32,
    pub last_line: u32,
}

/// Raw class declaration providing the grouping skeleton.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClassCoverage {
    /// Fully-qualified class name, dot separated.
    pub name: String,
    #[serde(default)]
    pub source_file: Option<String>,
    pub methods: Vec<RawMethodRange>,
}

/// Raw per-line counter record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLineCoverage {
    pub class_name: String,
    pub line: u32,
    pub instructions: RawCounter,
    pub branches: RawCounter,
}

/// Dotted namespace prefix of a fully-qualified class name; the empty
/// string for classes in the default package.
pub(crate) fn package_of(class_name: &str) -> &str {
    match class_name.rfind('.') {
        Some(idx) => &class_name[..idx],
        None => "",
    }
}
