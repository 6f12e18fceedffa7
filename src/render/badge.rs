//! Coverage/status badges rendered as shields.io markdown images.

use serde::{Deserialize, Serialize};

use crate::coverage::Counter;

/// Visual style of generated badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BadgeStyle {
    #[default]
    Flat,
    FlatSquare,
    Plastic,
    ForTheBadge,
    Social,
    /// Render the bare percentage text without an image.
    None,
}

impl BadgeStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeStyle::Flat => "flat",
            BadgeStyle::FlatSquare => "flat-square",
            BadgeStyle::Plastic => "plastic",
            BadgeStyle::ForTheBadge => "for-the-badge",
            BadgeStyle::Social => "social",
            BadgeStyle::None => "none",
        }
    }
}

/// One color threshold: the color applies at or above the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeThreshold {
    pub threshold: f64,
    pub color: String,
}

/// Badge generator with a style and a descending color scheme.
#[derive(Debug, Clone)]
pub struct Badge {
    style: BadgeStyle,
    colors: Vec<BadgeThreshold>,
}

impl Badge {
    /// Colors are sorted by threshold descending; lookup returns the
    /// first color whose threshold the percentage reaches, falling back
    /// to the last entry.
    pub fn new(style: BadgeStyle, mut colors: Vec<BadgeThreshold>) -> Badge {
        colors.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
        Badge { style, colors }
    }

    /// Stable default scheme: >= 90 green, >= 75 yellow, red below.
    pub fn default_colors() -> Vec<BadgeThreshold> {
        vec![
            BadgeThreshold {
                threshold: 90.0,
                color: "brightgreen".to_string(),
            },
            BadgeThreshold {
                threshold: 75.0,
                color: "yellow".to_string(),
            },
            BadgeThreshold {
                threshold: 0.0,
                color: "red".to_string(),
            },
        ]
    }

    /// Badge for a coverage counter at the configured display
    /// precision, short-circuited at the bounds.
    pub fn coverage(&self, counter: &Counter, precision: u32) -> String {
        let scale = 10u64.pow(precision);
        let scaled = counter.percent_scaled(precision);
        let formatted = if scaled == 0 {
            "0%".to_string()
        } else if scaled >= 100 * scale {
            "100%".to_string()
        } else if precision == 0 {
            format!("{scaled}%")
        } else {
            format!(
                "{}.{:0width$}%",
                scaled / scale,
                scaled % scale,
                width = precision as usize
            )
        };
        // color selection uses a fixed two-decimal percentage so the
        // picked color never depends on the display precision
        self.render(&formatted, self.color_for(counter.percent_scaled(2) as f64 / 100.0))
    }

    /// Pass/fail badge for a test run.
    pub fn status(&self, passed: bool) -> String {
        let (label, color) = if passed {
            ("passed", "brightgreen")
        } else {
            ("failed", "red")
        };
        self.render(label, color)
    }

    fn color_for(&self, percentage: f64) -> &str {
        for color in &self.colors {
            if percentage >= color.threshold {
                return &color.color;
            }
        }
        self.colors
            .last()
            .map(|c| c.color.as_str())
            .unwrap_or("lightgrey")
    }

    fn render(&self, label: &str, color: &str) -> String {
        if self.style == BadgeStyle::None {
            return label.to_string();
        }
        // '%' is the URL escape character and must become %25 inside
        // the shields.io path
        let escaped = label.replace('%', "%25");
        format!(
            "![{label}](https://img.shields.io/badge/{escaped}-{color}?style={style})",
            style = self.style.as_str()
        )
    }
}
