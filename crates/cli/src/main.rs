// Active circles CLI - multi-brand reseller reports from catalog + sales exports

mod exit_codes;
mod fix;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser, Debug)]
#[command(name = "circles")]
#[command(about = "Active and multi-brand reseller reports per billing cycle")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Match sales against the catalog and build the cycle reports
    #[command(after_help = "\
Examples:
  circles run --config circles.toml
  circles run --catalog bd_produtos.csv --sales vendas.csv --json
  circles run --config circles.toml --csv-dir out/
  circles run --config circles.toml --cycle 202401 --sector Norte --only-multibrand
  circles run --config circles.toml --strict --output result.json")]
    Run {
        /// TOML config; catalog/sales paths in it resolve relative to its directory
        #[arg(long, short = 'c', env = "CIRCLES_CONFIG")]
        config: Option<PathBuf>,

        #[command(flatten)]
        inputs: InputArgs,

        /// Output JSON to stdout instead of the human summary only
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write the four core tables as CSV files into this directory
        #[arg(long, value_name = "DIR")]
        csv_dir: Option<PathBuf>,

        /// Keep only these billing cycles. Repeatable.
        #[arg(long, value_name = "CYCLE")]
        cycle: Vec<String>,

        /// Keep only these sectors. Repeatable.
        #[arg(long, value_name = "SECTOR")]
        sector: Vec<String>,

        /// Keep only clients who bought one of these brands. Repeatable.
        #[arg(long, value_name = "BRAND")]
        brand: Vec<String>,

        /// Keep only multi-brand client rows
        #[arg(long)]
        only_multibrand: bool,

        /// Fail (exit 6) when the unmatched ratio exceeds the alert threshold
        #[arg(long)]
        strict: bool,
    },

    /// Validate a config without running
    #[command(after_help = "\
Examples:
  circles validate circles.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Show one client's sale rows and brands
    #[command(after_help = "\
Examples:
  circles client R001 --config circles.toml
  circles client 'Carla Souza|Centro' --config circles.toml --cycle 202402 --json")]
    Client {
        /// Reseller code, or `name|sector` for clients without a code
        client_id: String,

        /// Restrict to one billing cycle
        #[arg(long)]
        cycle: Option<String>,

        #[arg(long, short = 'c', env = "CIRCLES_CONFIG")]
        config: Option<PathBuf>,

        #[command(flatten)]
        inputs: InputArgs,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Rebuild a CSV export with split lines or unquoted separators
    #[command(after_help = "\
Examples:
  circles fix-csv vendas.csv
  circles fix-csv vendas.csv -o vendas_ok.csv --report repair.json
  circles fix-csv export.csv --target-col Descricao --sep ';'")]
    FixCsv {
        /// Broken CSV file
        input: PathBuf,

        /// Repaired output (default: <input>_fixed.csv)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write the JSON repair report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Column that absorbs surplus fields
        #[arg(long, default_value = circles_io::repair::DEFAULT_TARGET_COLUMN)]
        target_col: String,

        /// Force the separator instead of detecting it from the header
        #[arg(long)]
        sep: Option<char>,
    },
}

/// Input file overrides shared by `run` and `client`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Product catalog CSV (overrides the config)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Sales CSV (overrides the config)
    #[arg(long, value_name = "FILE")]
    pub sales: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("CIRCLES_LOG", "info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            inputs,
            json,
            output,
            csv_dir,
            cycle,
            sector,
            brand,
            only_multibrand,
            strict,
        } => {
            let filter = circles_recon::ReportFilter {
                cycles: cycle.into_iter().collect(),
                sectors: sector.into_iter().collect(),
                brands: brand.into_iter().collect(),
                only_multibrand,
            };
            run::cmd_run(run::RunArgs {
                config,
                inputs,
                json,
                output,
                csv_dir,
                filter,
                strict,
            })
        }
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Client {
            client_id,
            cycle,
            config,
            inputs,
            json,
        } => run::cmd_client(client_id, cycle, config, inputs, json),
        Commands::FixCsv {
            input,
            output,
            report,
            target_col,
            sep,
        } => fix::cmd_fix_csv(input, output, report, target_col, sep),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<circles_io::IoError> for CliError {
    fn from(err: circles_io::IoError) -> Self {
        Self::io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_collects_repeated_filters() {
        let cli = Cli::try_parse_from([
            "circles", "run", "--catalog", "p.csv", "--sales", "v.csv", "--cycle", "202401",
            "--cycle", "202402", "--brand", "Eudora", "--only-multibrand",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { inputs, cycle, brand, only_multibrand, strict, json, .. } => {
                assert_eq!(inputs.catalog, Some(PathBuf::from("p.csv")));
                assert_eq!(cycle, vec!["202401", "202402"]);
                assert_eq!(brand, vec!["Eudora"]);
                assert!(only_multibrand);
                assert!(!strict);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn fix_csv_defaults() {
        let cli = Cli::try_parse_from(["circles", "fix-csv", "vendas.csv"]).unwrap();
        match cli.command {
            Commands::FixCsv { input, output, report, target_col, sep } => {
                assert_eq!(input, PathBuf::from("vendas.csv"));
                assert!(output.is_none());
                assert!(report.is_none());
                assert_eq!(target_col, "NomeProduto");
                assert!(sep.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn client_requires_id() {
        assert!(Cli::try_parse_from(["circles", "client"]).is_err());
        let cli = Cli::try_parse_from(["circles", "client", "R001", "--cycle", "202401"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Client { ref client_id, cycle: Some(ref c), .. } if client_id == "R001" && c == "202401"
        ));
    }

    #[test]
    fn hint_attaches() {
        let err = CliError::args("no sales file").with_hint("pass --sales");
        assert_eq!(err.code, EXIT_USAGE);
        assert_eq!(err.hint.as_deref(), Some("pass --sales"));
    }
}
