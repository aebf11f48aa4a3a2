//! `she-harness run <scenario>` — replay one built-in end-to-end scenario
//! against a fresh engine and keystore, printing a structured-log trace and
//! exiting non-zero if any step failed.

use clap::{Parser, Subcommand};
use she_harness::{builtin_scenarios, run_by_name, LogEmitter, LogLevel};

#[derive(Parser)]
#[command(name = "she-harness", about = "SHE protocol engine conformance harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in scenario names and their descriptions.
    List,
    /// Run one built-in scenario by name.
    Run {
        scenario: String,
        /// Write the JSONL trace to this file instead of stdout.
        #[arg(long)]
        log_file: Option<std::path::PathBuf>,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::List => {
            for case in builtin_scenarios().cases {
                println!("{:<24} {}", case.name, case.description);
            }
            std::process::ExitCode::SUCCESS
        }
        Command::Run { scenario, log_file } => {
            let mut emitter = match &log_file {
                Some(path) => match LogEmitter::to_file(path, &scenario) {
                    Ok(e) => e,
                    Err(err) => {
                        eprintln!("failed to open log file: {err}");
                        return std::process::ExitCode::FAILURE;
                    }
                },
                None => LogEmitter::to_buffer(&scenario),
            };

            let Some(report) = run_by_name(&scenario, &mut emitter) else {
                eprintln!("unknown scenario: {scenario}");
                return std::process::ExitCode::FAILURE;
            };
            let _ = emitter.flush();

            let mut ok = true;
            for step in &report.steps {
                let marker = if step.ok { "ok  " } else { "FAIL" };
                println!("[{marker}] {} — {}", step.label, step.detail);
                ok &= step.ok;
            }

            if ok {
                emitter.emit(LogLevel::Info, "scenario passed").ok();
                std::process::ExitCode::SUCCESS
            } else {
                emitter.emit(LogLevel::Error, "scenario failed").ok();
                std::process::ExitCode::FAILURE
            }
        }
    }
}
