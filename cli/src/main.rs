mod cases;
mod shell;

use benchrun_core::{render_summary_table, run_with_reporter, Reporter, TestRunResult};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(author, version, about = "benchrun hardware-in-the-loop test executor")]
struct BenchrunCli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List registered test cases
    List {
        /// Output JSON instead of one name per line
        #[arg(long)]
        json: bool,
    },
    /// Run a registered test case through every phase
    Run {
        /// Name of the test case to run
        name: String,
        /// Directory for the run log and report artifacts
        #[arg(long)]
        reports_dir: Option<PathBuf>,
        /// Output format for the final run result
        #[arg(long, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        };
        write!(f, "{value}")
    }
}

#[derive(Debug, Serialize)]
struct CaseList {
    cases: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = BenchrunCli::parse();

    match cli.command {
        Command::List { json } => {
            let registry = cases::builtin_cases();
            if json {
                let list = CaseList {
                    cases: registry.names().iter().map(|s| s.to_string()).collect(),
                };
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                for name in registry.names() {
                    println!("{name}");
                }
            }
            Ok(())
        }
        Command::Run {
            name,
            reports_dir,
            format,
        } => {
            let registry = cases::builtin_cases();
            let mut case = registry
                .create(&name)
                .ok_or_else(|| anyhow::anyhow!("unknown test case '{name}'"))?;

            let result = run_with_reporter(
                case.as_mut(),
                &name,
                reports_dir.as_deref(),
                Arc::new(Reporter::new()),
            );
            output_result(&result, format)?;
            std::process::exit(result.exit_code);
        }
    }
}

fn output_result(result: &TestRunResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{result}");
            println!("{}", render_summary_table(result));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(result)?;
            print!("{yaml}");
        }
    }
    Ok(())
}
