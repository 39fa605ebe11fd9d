//! Output formats for scan reports.

pub mod json;
pub mod text;

use crate::session::ScanReport;
use std::io::Write;
use std::str::FromStr;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "cli" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {} (expected text or json)", s)),
        }
    }
}

/// Write `report` to `writer` in the given format.
pub fn report(report: &ScanReport, format: OutputFormat, writer: &mut dyn Write) -> std::io::Result<()> {
    match format {
        OutputFormat::Text => text::write_report(report, writer),
        OutputFormat::Json => json::write_report(report, writer),
    }
}
