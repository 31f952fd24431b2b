//! `circles run`, `circles validate` and `circles client`.

use std::path::{Path, PathBuf};

use circles_io::export::write_reports;
use circles_io::read_table;
use circles_recon::model::{ClientDetail, RunResult};
use circles_recon::{
    load_catalog_csv, load_sales_csv, CirclesConfig, CirclesError, CirclesInput, ReportFilter,
    RunWarning,
};

use crate::exit_codes::{
    EXIT_CLIENT_NOT_FOUND, EXIT_INVALID_CONFIG, EXIT_SCHEMA, EXIT_UNMATCHED_RATIO,
};
use crate::{CliError, InputArgs};

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub inputs: InputArgs,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub csv_dir: Option<PathBuf>,
    pub filter: ReportFilter,
    pub strict: bool,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let (config, base_dir) = load_config(args.config.as_deref())?;
    let (input, paths) = load_input(&config, &base_dir, &args.inputs)?;

    let result = circles_recon::run(&config, &input, &args.filter)
        .map_err(|e| engine_err(e, &paths))?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }

    if let Some(ref dir) = args.csv_dir {
        for path in write_reports(&result.reports, dir)? {
            eprintln!("wrote {}", path.display());
        }
    }

    if args.json {
        println!("{json_str}");
    }

    print_summary(&result);

    if args.strict {
        if let Some(w) = result
            .warnings
            .iter()
            .find(|w| matches!(w, RunWarning::HighUnmatchedRatio { .. }))
        {
            return Err(CliError::new(EXIT_UNMATCHED_RATIO, w.to_string())
                .with_hint("see reports.unmatched_skus for the codes missing from the catalog"));
        }
    }

    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, base_dir) = load_config(Some(&config_path))?;

    let mut missing = Vec::new();
    for file in [&config.catalog.file, &config.sales.file].into_iter().flatten() {
        let path = base_dir.join(file);
        if !path.is_file() {
            missing.push(path);
        }
    }
    for path in &missing {
        log::warn!("{}: file not found", path.display());
    }

    eprintln!(
        "valid: '{}' with {} match strateg{}, sale type '{}'",
        config.name,
        config.matching.strategies.len(),
        if config.matching.strategies.len() == 1 { "y" } else { "ies" },
        config.sales.sale_type,
    );
    Ok(())
}

pub fn cmd_client(
    client_id: String,
    cycle: Option<String>,
    config_path: Option<PathBuf>,
    inputs: InputArgs,
    json: bool,
) -> Result<(), CliError> {
    let (config, base_dir) = load_config(config_path.as_deref())?;
    let (input, paths) = load_input(&config, &base_dir, &inputs)?;

    let detail = circles_recon::client_detail(&config, &input, &client_id, cycle.as_deref())
        .map_err(|e| engine_err(e, &paths))?;
    let Some(detail) = detail else {
        let scope = cycle.map(|c| format!(" in cycle {c}")).unwrap_or_default();
        return Err(CliError::new(
            EXIT_CLIENT_NOT_FOUND,
            format!("no sale rows for client '{client_id}'{scope}"),
        )
        .with_hint("client ids are the reseller code, or 'name|sector' when the code is blank"));
    };

    if json {
        let json_str = serde_json::to_string_pretty(&detail)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        print_detail(&detail);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parsed config plus the directory its relative file paths resolve against.
/// Without a config file, defaults apply and paths resolve against the
/// working directory.
fn load_config(path: Option<&Path>) -> Result<(CirclesConfig, PathBuf), CliError> {
    let Some(path) = path else {
        return Ok((CirclesConfig::default(), PathBuf::from(".")));
    };

    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    let config = CirclesConfig::from_toml(&config_str)
        .map_err(|e| CliError::new(EXIT_INVALID_CONFIG, format!("{}: {e}", path.display())))?;

    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((config, base_dir))
}

/// Resolved input paths, kept for error hints.
struct InputPaths {
    catalog: PathBuf,
    sales: PathBuf,
}

fn load_input(
    config: &CirclesConfig,
    base_dir: &Path,
    overrides: &InputArgs,
) -> Result<(CirclesInput, InputPaths), CliError> {
    let catalog_path = resolve_path(
        overrides.catalog.as_ref(),
        config.catalog.file.as_deref(),
        base_dir,
        "catalog",
    )?;
    let sales_path = resolve_path(
        overrides.sales.as_ref(),
        config.sales.file.as_deref(),
        base_dir,
        "sales",
    )?;
    let paths = InputPaths {
        catalog: catalog_path,
        sales: sales_path,
    };

    let catalog_csv = read_table(&paths.catalog)?;
    let (catalog, mut warnings) =
        load_catalog_csv(&catalog_csv.text, catalog_csv.delimiter, &config.catalog.columns)
            .map_err(|e| engine_err(e, &paths))?;

    let sales_csv = read_table(&paths.sales)?;
    let (sales, sales_warnings) =
        load_sales_csv(&sales_csv.text, sales_csv.delimiter, &config.sales.columns)
            .map_err(|e| engine_err(e, &paths))?;
    warnings.extend(sales_warnings);

    log::info!(
        "loaded {} catalog rows ({}), {} sales rows ({})",
        catalog.len(),
        catalog_csv.encoding,
        sales.len(),
        sales_csv.encoding
    );

    Ok((
        CirclesInput {
            catalog,
            sales,
            warnings,
        },
        paths,
    ))
}

/// CLI flag wins over the config entry, which resolves against `base_dir`.
fn resolve_path(
    flag: Option<&PathBuf>,
    configured: Option<&str>,
    base_dir: &Path,
    table: &str,
) -> Result<PathBuf, CliError> {
    match (flag, configured) {
        (Some(path), _) => Ok(path.clone()),
        (None, Some(file)) => Ok(base_dir.join(file)),
        (None, None) => Err(CliError::args(format!("no {table} file given"))
            .with_hint(format!("pass --{table} <FILE> or set [{table}] file in the config"))),
    }
}

fn engine_err(err: CirclesError, paths: &InputPaths) -> CliError {
    let message = err.to_string();
    match err {
        CirclesError::ConfigParse(_) | CirclesError::ConfigValidation(_) => {
            CliError::new(EXIT_INVALID_CONFIG, message)
        }
        CirclesError::MissingColumns { table, .. } => CliError::new(EXIT_SCHEMA, message)
            .with_hint(format!("map the column names under [{}.columns] in the config", table)),
        CirclesError::Csv { table, .. } => {
            let path = match table {
                circles_recon::model::Table::Catalog => &paths.catalog,
                circles_recon::model::Table::Sales => &paths.sales,
            };
            CliError::new(EXIT_SCHEMA, message)
                .with_hint(format!("try: circles fix-csv {}", path.display()))
        }
    }
}

// ---------------------------------------------------------------------------
// Human output
// ---------------------------------------------------------------------------

fn print_summary(result: &RunResult) {
    let o = &result.reports.overview;
    let s = &result.match_stats;
    eprintln!(
        "{}: {} active clients, {} multi-brand ({:.1}%), {} items, {}",
        result.meta.config_name,
        o.active_clients,
        o.multibrand_clients,
        o.multibrand_percent,
        o.items,
        fmt_amount(o.amount_cents),
    );
    eprintln!(
        "matching: {} sale rows, {} exact, {} zero-pad, {} unmatched ({} distinct codes)",
        s.sale_rows,
        s.exact,
        s.zero_pad,
        s.not_found,
        result.reports.unmatched_skus.len(),
    );
    for c in &result.reports.cycle_totals {
        eprintln!(
            "  {}: {} active, {} multi-brand ({:.1}%), {}",
            c.cycle,
            c.active_clients,
            c.multibrand_clients,
            c.multibrand_percent,
            fmt_amount(c.amount_cents),
        );
    }
    if !result.warnings.is_empty() {
        eprintln!("{} warning(s)", result.warnings.len());
    }
}

fn print_detail(detail: &ClientDetail) {
    println!("client:  {}", detail.client_id);
    if let Some(ref cycle) = detail.cycle {
        println!("cycle:   {cycle}");
    }
    println!("cycles:  {}", detail.cycles.join(", "));
    println!("brands:  {}", detail.brands.join(", "));
    println!("items:   {}", detail.items);
    println!("amount:  {}", fmt_amount(detail.amount_cents));
    println!();
    for row in &detail.rows {
        println!(
            "{:>5}  {}  {:<8}  {:<10}  {:<20}  {:<9}  {:>4}  {:>10}",
            row.line,
            row.cycle,
            row.product_code,
            row.brand,
            row.product_name,
            row.match_reason.to_string(),
            row.items,
            fmt_amount(row.amount_cents),
        );
    }
}

/// Cents as `1234.56`, sign preserved.
fn fmt_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_formatting() {
        assert_eq!(fmt_amount(87850), "878.50");
        assert_eq!(fmt_amount(5), "0.05");
        assert_eq!(fmt_amount(-1990), "-19.90");
    }

    #[test]
    fn flag_overrides_config_path() {
        let base = Path::new("/data");
        let flag = PathBuf::from("other.csv");
        assert_eq!(
            resolve_path(Some(&flag), Some("vendas.csv"), base, "sales").unwrap(),
            PathBuf::from("other.csv")
        );
        assert_eq!(
            resolve_path(None, Some("vendas.csv"), base, "sales").unwrap(),
            PathBuf::from("/data/vendas.csv")
        );
        let err = resolve_path(None, None, base, "sales").unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);
    }

    #[test]
    fn schema_errors_map_to_exit_5() {
        let paths = InputPaths {
            catalog: PathBuf::from("p.csv"),
            sales: PathBuf::from("v.csv"),
        };
        let err = engine_err(
            CirclesError::Csv {
                table: circles_recon::model::Table::Sales,
                message: "found record with 7 fields".into(),
            },
            &paths,
        );
        assert_eq!(err.code, EXIT_SCHEMA);
        assert_eq!(err.hint.as_deref(), Some("try: circles fix-csv v.csv"));

        let err = engine_err(CirclesError::ConfigValidation("x".into()), &paths);
        assert_eq!(err.code, EXIT_INVALID_CONFIG);
    }
}
