//! Colored terminal output.

use crate::session::ScanReport;
use crate::types::{Finding, OverallStatus, Severity};
use colored::{ColoredString, Colorize};
use std::io::Write;

fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("[{}]", severity);
    match severity {
        Severity::Critical => label.bright_red().bold(),
        Severity::Warning => label.yellow(),
        Severity::Info => label.blue(),
    }
}

fn status_label(status: OverallStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        OverallStatus::Safe => label.green().bold(),
        OverallStatus::Warning => label.yellow().bold(),
        OverallStatus::Unsafe => label.red().bold(),
    }
}

fn write_finding(finding: &Finding, writer: &mut dyn Write) -> std::io::Result<()> {
    let location = match finding.line {
        Some(line) => format!("{}:{}", finding.file, line),
        None => finding.file.clone(),
    };
    writeln!(
        writer,
        "{} {} {}",
        severity_label(finding.severity),
        finding.subcategory.bright_cyan(),
        location.dimmed()
    )?;
    writeln!(writer, "    {}", finding.description)?;
    if let Some(code) = &finding.code {
        for line in code.lines() {
            writeln!(writer, "      {}", line.dimmed())?;
        }
    }
    Ok(())
}

pub fn write_report(report: &ScanReport, writer: &mut dyn Write) -> std::io::Result<()> {
    if let Some(repo) = &report.repository {
        let name = match &repo.owner {
            Some(owner) => format!("{}/{}", owner, repo.name),
            None => repo.name.clone(),
        };
        writeln!(writer, "{}", format!("Repository: {}", name).bold())?;
        if let Some(commit) = &repo.commit {
            writeln!(writer, "Commit:     {}", commit)?;
        }
    }

    if report.threats.is_empty() {
        writeln!(writer, "{}", "No threats found.".green())?;
    } else {
        writeln!(writer, "{}", "Threats".bold().underline())?;
        for finding in &report.threats {
            write_finding(finding, writer)?;
        }
    }

    if !report.errors.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "{}", format!("Errors ({})", report.errors.len()).yellow())?;
        for error in &report.errors {
            writeln!(writer, "  - {}", error)?;
        }
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "Scanned {} files in {} ms: {} critical, {} warning, {} info",
        report.scanned_files,
        report.scan_time,
        report.count_by_severity(Severity::Critical),
        report.count_by_severity(Severity::Warning),
        report.count_by_severity(Severity::Info)
    )?;
    if !report.scan_completed {
        writeln!(writer, "{}", "Scan did not complete.".yellow())?;
    }
    writeln!(writer, "Status: {}", status_label(report.overall_status))
}
