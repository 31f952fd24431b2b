//! `circles fix-csv` - rebuild CSV exports broken by split lines or
//! unquoted separators.

use std::path::{Path, PathBuf};

use circles_io::repair::{fix_broken_csv, FixAction};

use crate::exit_codes::EXIT_SCHEMA;
use crate::CliError;

pub fn cmd_fix_csv(
    input: PathBuf,
    output: Option<PathBuf>,
    report_path: Option<PathBuf>,
    target_col: String,
    sep: Option<char>,
) -> Result<(), CliError> {
    let separator = match sep {
        None => None,
        Some(c) if c.is_ascii() => Some(c as u8),
        Some(c) => {
            return Err(CliError::args(format!("separator {c:?} is not a single-byte character"))
                .with_hint("use one of: ',' ';' '|' or a tab"))
        }
    };

    let raw = std::fs::read(&input)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", input.display())))?;
    let (text, report) = fix_broken_csv(raw, &target_col, separator)
        .map_err(|e| CliError::new(EXIT_SCHEMA, format!("{}: {e}", input.display())))?;

    if report.target_column != target_col {
        log::warn!(
            "column '{}' not in header, surplus fields go to '{}'",
            target_col,
            report.target_column
        );
    }

    let output = output.unwrap_or_else(|| default_output(&input));
    std::fs::write(&output, text)
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", output.display())))?;
    eprintln!("wrote {}", output.display());

    if let Some(ref path) = report_path {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        std::fs::write(path, json_str)
            .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }

    let s = &report.stats;
    eprintln!(
        "{} lines -> {} records ({}, separator {:?}): {} joined, {} merged, {} padded, {} unchanged",
        s.original_lines,
        s.records_emitted,
        report.encoding,
        report.separator,
        s.joined_records,
        s.fixed_extra_columns,
        s.fixed_missing_columns,
        s.unchanged,
    );
    for fix in report.fixes.iter().take(10) {
        let what = match &fix.action {
            FixAction::JoinedContinuationLines { joined_lines } => {
                format!("joined {joined_lines} continuation line(s)")
            }
            FixAction::MergedExtraColumns { column, original_columns, final_columns } => {
                format!("merged {original_columns} -> {final_columns} columns into '{column}'")
            }
            FixAction::PaddedMissingColumns { original_columns, final_columns } => {
                format!("padded {original_columns} -> {final_columns} columns")
            }
        };
        eprintln!("  lines {}-{}: {what}", fix.line_start, fix.line_end);
    }
    if report.fixes.len() > 10 {
        eprintln!("  ... {} more (see --report)", report.fixes.len() - 10);
    }

    Ok(())
}

/// `dir/vendas.csv` -> `dir/vendas_fixed.csv`
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".into());
    input.with_file_name(format!("{stem}_fixed.{ext}"))
}
