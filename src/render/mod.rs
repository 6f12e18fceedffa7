//! Pluggable artifact renderers.
//!
//! Renderers are pure: identical inputs always produce byte-identical
//! artifacts. The registry is an explicit, ordered list populated at
//! startup; a renderer disabled in configuration is never invoked and
//! produces zero artifacts. A renderer failure is confined to its own
//! unit of output and never aborts sibling renderers.

pub mod badge;
mod detailed;
mod json;
mod summary;

pub use detailed::DetailedRenderer;
pub use json::JsonRenderer;
pub use summary::SummaryRenderer;

use crate::config::Config;
use crate::core::Result;
use crate::filter::FilteredView;

/// One rendered artifact: bytes plus the path it belongs at, relative
/// to the configured output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub relative_path: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(relative_path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Artifact {
        Artifact {
            relative_path: relative_path.into(),
            bytes: bytes.into(),
        }
    }
}

/// Outcome of rendering one unit: a single run, or the aggregated view.
///
/// Failures carry the run they belong to so one broken unit never stops
/// sibling units from being written.
#[derive(Debug)]
pub struct Rendered {
    /// Run the unit belongs to; `None` for aggregated artifacts.
    pub run: Option<String>,
    pub result: Result<Artifact>,
}

impl Rendered {
    pub fn aggregated(result: Result<Artifact>) -> Rendered {
        Rendered { run: None, result }
    }

    pub fn for_run(run: &str, result: Result<Artifact>) -> Rendered {
        Rendered {
            run: Some(run.to_string()),
            result,
        }
    }
}

/// Capability interface implemented by every renderer.
pub trait ReportRenderer: Send + Sync {
    /// Unique identifier, used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Whether this renderer is switched on in the given configuration.
    fn enabled(&self, config: &Config) -> bool;

    /// Render every unit of the view. Pure function of its inputs.
    fn render(&self, view: &FilteredView<'_>, config: &Config) -> Vec<Rendered>;
}

/// The renderer registry: explicit and ordered, no runtime discovery.
pub fn registry() -> Vec<Box<dyn ReportRenderer>> {
    vec![
        Box::new(JsonRenderer),
        Box::new(SummaryRenderer),
        Box::new(DetailedRenderer),
    ]
}

/// Build a `TEST-` artifact file name. Alphanumerics and `_-.$` pass
/// through; any other character becomes a `#` escape followed by its
/// hex code, keeping names safe on every filesystem consumers mount.
pub(crate) fn report_file_name(name: &str, extension: &str) -> String {
    let mut file = String::with_capacity(name.len() + extension.len() + 5);
    file.push_str("TEST-");
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '$') {
            file.push(ch);
        } else {
            file.push('#');
            file.push_str(&format!("{:x}", ch as u32));
        }
    }
    file.push_str(extension);
    file
}
