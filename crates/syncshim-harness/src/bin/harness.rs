//! CLI entrypoint for the syncshim conformance harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use syncshim_harness::structured_log::{LogEmitter, validate_log_file};
use syncshim_harness::{HarnessError, SCENARIOS, ScenarioRunner};

/// Conformance tooling for syncshim.
#[derive(Debug, Parser)]
#[command(name = "syncshim-harness")]
#[command(about = "Conformance harness for the syncshim threading surface")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run conformance scenarios through the C ABI.
    Conformance {
        /// Structured JSONL log output path.
        #[arg(long, default_value = "target/conformance/syncshim.log.jsonl")]
        log: PathBuf,
        /// Report output path (markdown; a `.json` twin is written alongside).
        #[arg(long)]
        report: Option<PathBuf>,
        /// Run only the named scenario.
        #[arg(long)]
        scenario: Option<String>,
        /// Run identifier used as the trace-id prefix.
        #[arg(long)]
        run_id: Option<String>,
    },
    /// List scenario names.
    List,
    /// Validate a structured JSONL log.
    ValidateLog {
        /// Log path.
        #[arg(long)]
        log: PathBuf,
    },
}

fn default_run_id() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("syncshim-{secs}-{}", std::process::id())
}

fn main() -> Result<(), HarnessError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Conformance {
            log,
            report,
            scenario,
            run_id,
        } => {
            let selected = ScenarioRunner::select(scenario.as_deref())?;
            let runner = ScenarioRunner::new(run_id.unwrap_or_else(default_run_id));
            eprintln!(
                "Running {} scenario(s) on the {} backend",
                selected.len(),
                syncshim_core::BACKEND
            );
            let mut emitter = LogEmitter::to_file(&log, &runner.run_id)?;
            let results = runner.run(&selected, &mut emitter)?;
            for r in &results {
                let status = if r.passed { "PASS" } else { "FAIL" };
                eprintln!("{status} {:<24} {}", r.scenario, r.actual);
            }

            let report_doc = runner.report(results);
            eprintln!(
                "Conformance complete: total={}, passed={}, failed={}",
                report_doc.summary.total, report_doc.summary.passed, report_doc.summary.failed
            );
            eprintln!("Log written to {}", log.display());

            if let Some(report_path) = report {
                if let Some(parent) = report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&report_path, report_doc.to_markdown())?;
                std::fs::write(report_path.with_extension("json"), report_doc.to_json())?;
                eprintln!("Report written to {}", report_path.display());
            }

            if !report_doc.summary.all_passed() {
                return Err(HarnessError::ScenariosFailed {
                    failed: report_doc.summary.failed,
                    total: report_doc.summary.total,
                });
            }
        }
        Command::List => {
            for scenario in SCENARIOS {
                println!("{:<24} {:<22} {}", scenario.name, scenario.symbol, scenario.summary);
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            eprintln!("{}: {lines} line(s), {} error(s)", log.display(), errors.len());
            if !errors.is_empty() {
                return Err(HarnessError::InvalidLog(errors.len()));
            }
        }
    }

    Ok(())
}
