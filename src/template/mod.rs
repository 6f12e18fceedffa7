//! Named, overridable markdown templates.
//!
//! Built-in templates are embedded in the binary; a caller-supplied
//! override of the same name takes precedence. Unresolved placeholders
//! are a hard error so malformed output is never published unnoticed.

use minijinja::value::Value;
use minijinja::{Environment, UndefinedBehavior};

use crate::config::TemplateConfig;
use crate::core::{Error, Result};
use crate::coverage::Counter;

/// Template name used by the summary document renderer.
pub const SUMMARY_TEMPLATE: &str = "summary.md";
/// Template name used by the detailed document renderer.
pub const DETAILED_TEMPLATE: &str = "detailed.md";

static BUILTINS: &[(&str, &str)] = &[
    (SUMMARY_TEMPLATE, include_str!("summary.md.jinja")),
    (DETAILED_TEMPLATE, include_str!("detailed.md.jinja")),
];

/// Build the template environment: built-ins first, then overrides
/// shadowing by name. Templates only substitute, branch and iterate;
/// nothing in them can execute arbitrary code.
pub fn environment(config: &TemplateConfig) -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);

    env.add_filter("duration", duration_filter);
    env.add_function("percent", percent_fn);

    for (name, source) in BUILTINS {
        env.add_template(name, source)?;
    }
    for (name, source) in &config.overrides {
        env.add_template_owned(name.clone(), source.clone())?;
    }
    Ok(env)
}

/// Render a named template against a context, mapping lookup failures
/// to a template error naming the missing key.
pub fn render(env: &Environment<'_>, name: &str, ctx: Value) -> Result<String> {
    let template = env
        .get_template(name)
        .map_err(|_| Error::template(format!("unresolved template reference '{name}'")))?;
    Ok(template.render(ctx)?)
}

/// Milliseconds to a fixed-point seconds string, e.g. `1.234s`.
fn duration_filter(ms: u64) -> String {
    format!("{}s", seconds(ms))
}

/// Fixed-point seconds with millisecond precision, no unit.
pub(crate) fn seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Covered percentage of a (covered, total) pair at the given precision.
fn percent_fn(covered: u64, total: u64, precision: Option<u32>) -> String {
    Counter::new(covered, total).percent_string(precision.unwrap_or(0))
}
