//! CLI entry point for the threat scanner.

use anyhow::Result;
use clap::Parser;
use codesentry::{
    cli::{Cli, Commands},
    config::generate_default_config,
    reader::MIB,
    reporters::{report, OutputFormat},
    rules::loader::load_rule_set,
    AcquireRequest, LocalSource, ScanConfig, Scanner, Severity,
};
use colored::Colorize;
use std::io;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays clean
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let base_config = if let Some(ref config_path) = cli.config {
        ScanConfig::load(config_path)?
    } else {
        ScanConfig::load_default()
    };

    match cli.command {
        Commands::Scan {
            path,
            output,
            fail_on,
            rules,
            max_depth,
            include_hidden,
            follow_symlinks,
            exclude,
            memory_limit,
            concurrency,
            timeout,
        } => {
            let fail_on_severity = fail_on
                .as_deref()
                .map(|s| s.parse::<Severity>())
                .transpose()
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let format: OutputFormat = cli.format.parse().map_err(|e| anyhow::anyhow!("{}", e))?;

            // CLI flags override the config file
            let mut config = base_config;
            if let Some(depth) = max_depth {
                config.discovery.max_depth = depth;
            }
            if include_hidden {
                config.discovery.include_hidden = true;
            }
            if follow_symlinks {
                config.discovery.follow_symlinks = true;
            }
            config.discovery.exclude.extend(exclude);
            if let Some(mib) = memory_limit {
                config.reader.memory_ceiling = mib * MIB;
            }
            if let Some(n) = concurrency {
                config.limits.max_concurrency = n;
            }
            if timeout.is_some() {
                config.limits.scan_timeout_secs = timeout;
            }
            if rules.is_some() {
                config.rules_file = rules;
            }

            let scanner = Scanner::with_config(config)?;
            let request = AcquireRequest::new(path.to_string_lossy());
            let scan_report = scanner.scan_repository(&LocalSource::new(), &request).await;

            if let Some(output_path) = output {
                let mut file = std::fs::File::create(&output_path)?;
                report(&scan_report, format, &mut file)?;
                eprintln!("Report written to: {}", output_path.display());
            } else {
                let mut stdout = io::stdout().lock();
                report(&scan_report, format, &mut stdout)?;
            }

            if !scan_report.scan_completed {
                std::process::exit(2);
            }
            if let Some(fail_severity) = fail_on_severity {
                if let Some(max_sev) = scan_report.max_severity() {
                    if max_sev >= fail_severity {
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Rules { rule, rules, json } => {
            let rule_set = load_rule_set(rules.as_deref().or(base_config.rules_file.as_deref()))?;
            let rules = rule_set.rules();

            if let Some(rule_id) = rule {
                if let Some(r) = rules.iter().find(|r| r.id == rule_id) {
                    if json {
                        println!("{}", serde_json::to_string_pretty(r)?);
                    } else {
                        println!("{}", format!("Rule: {}", r.id).bold());
                        println!("Title:       {}", r.title);
                        println!("Severity:    {}", r.severity);
                        println!("Category:    {}", r.category);
                        println!("Pattern:     {}", r.subcategory);
                        println!("Matches:     {}", r.target());
                        if !r.callees.is_empty() {
                            println!("Callees:     {}", r.callees.join(", "));
                        }
                        if !r.receivers.is_empty() {
                            println!("Receivers:   {}", r.receivers.join(", "));
                        }
                        if !r.enabled {
                            println!("Enabled:     no");
                        }
                    }
                } else {
                    eprintln!("Rule not found: {}", rule_id);
                    std::process::exit(1);
                }
            } else if json {
                println!("{}", serde_json::to_string_pretty(rules)?);
            } else {
                println!("{}", "Available Rules".bold().underline());
                println!();
                for r in rules {
                    let severity_color = match r.severity {
                        Severity::Critical => r.severity.to_string().bright_red(),
                        Severity::Warning => r.severity.to_string().yellow(),
                        Severity::Info => r.severity.to_string().blue(),
                    };
                    let disabled = if r.enabled { "" } else { " (disabled)" };
                    println!(
                        "  {} [{}] - {}{}",
                        r.id.bright_cyan(),
                        severity_color,
                        r.title,
                        disabled.dimmed()
                    );
                }
                println!();
                println!("Total: {} rules", rules.len());
            }
        }

        Commands::Init { output } => {
            if output.exists() {
                eprintln!(
                    "{}",
                    format!("Config file already exists: {}", output.display()).yellow()
                );
                eprintln!("Use a different path or remove the existing file.");
                std::process::exit(1);
            }

            std::fs::write(&output, generate_default_config())?;
            println!(
                "{}",
                format!("Created config file: {}", output.display()).green()
            );
            println!("Edit this file to adjust traversal, memory and parser limits.");
        }
    }

    Ok(())
}
