//! Output formatting for diagnostic results
//!
//! Three renderings share one trait: the plain bot message, a colored
//! terminal variant of the same layout, and JSON.

mod colored;
mod formatter;
mod json;

pub use colored::{ColorScheme, ColoredFormatter, PerformanceLevel};
pub use formatter::{FormattingOptions, PlainFormatter, ReportFormatter, SERVER_NOT_SPECIFIED};
pub use json::JsonFormatter;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    pub fn create_formatter(json: bool, enable_color: bool, verbose: bool) -> Box<dyn ReportFormatter> {
        if json {
            return Box::new(JsonFormatter::new(true));
        }

        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
        };
        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }
}
