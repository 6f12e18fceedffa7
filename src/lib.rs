//! Verdict - deterministic aggregation and rendering of test results
//! and code coverage.
//!
//! Verdict consumes already-parsed test-execution and coverage records,
//! merges them across runs into one consistent model, applies
//! user-configured filtering, and renders byte-stable JSON and Markdown
//! artifacts suitable for pull-request comments, dashboards and
//! downstream tooling.
//!
//! # Example
//!
//! ```no_run
//! use verdict::model::{Outcome, RawTestCase};
//! use verdict::{Config, RawRun, ReportSession};
//!
//! let session = ReportSession::new(Config::default());
//! session
//!     .record_run(
//!         "core",
//!         RawRun {
//!             cases: vec![RawTestCase {
//!                 suite: "com.acme.FooTest".to_string(),
//!                 name: "works".to_string(),
//!                 outcome: Outcome::Passed,
//!                 duration_ms: 12,
//!                 ..RawTestCase::default()
//!             }],
//!             ..RawRun::default()
//!         },
//!     )
//!     .unwrap();
//! let cycle = session.render().unwrap();
//! assert!(cycle.is_success());
//! ```

pub mod aggregate;
pub mod config;
pub mod core;
pub mod coverage;
pub mod filter;
pub mod model;
pub mod output;
pub mod render;
mod session;
pub mod template;

pub use config::Config;
pub use core::{Error, Result};
pub use session::{CycleReport, RawCoverage, RawRun, RenderFailure, ReportSession};
