//! JSON output: the camelCase report contract, pretty-printed.

use crate::session::ScanReport;
use std::io::Write;

pub fn write_report(report: &ScanReport, writer: &mut dyn Write) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OverallStatus;

    #[test]
    fn test_json_output_parses() {
        let report = ScanReport::failed(None, "[not_found] Repository not found: x".to_string());
        let mut out = Vec::new();
        write_report(&report, &mut out).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["scanCompleted"], false);
        assert_eq!(parsed["overallStatus"], "SAFE");
        assert_eq!(parsed["errors"].as_array().unwrap().len(), 1);
        assert!(parsed.get("memoryUsage").is_none());
        assert_eq!(report.overall_status, OverallStatus::Safe);
    }
}
