// Report table export

use std::fs;
use std::path::{Path, PathBuf};

use circles_recon::Reports;
use serde::Serialize;

use crate::error::IoError;

/// Write one table as comma-separated CSV with a header row derived from
/// the row type. An empty table still gets its header.
pub fn write_table<T: Serialize>(rows: &[T], header: &[&str], path: &Path) -> Result<(), IoError> {
    let mut writer = ::csv::Writer::from_path(path).map_err(|e| write_error(path, e))?;

    // `serialize` only emits the header alongside the first row
    if rows.is_empty() {
        writer.write_record(header).map_err(|e| write_error(path, e))?;
    }
    for row in rows {
        writer.serialize(row).map_err(|e| write_error(path, e))?;
    }
    writer.flush().map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Write the four core tables into `dir`, creating it if needed. Returns
/// the written paths in table order.
pub fn write_reports(reports: &Reports, dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    fs::create_dir_all(dir).map_err(|source| IoError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let active = dir.join("active_clients.csv");
    write_table(
        &reports.active_clients,
        &[
            "client_id", "code", "name", "sector", "cycle", "rows", "items", "amount_cents",
            "brand_count", "brands", "is_multibrand",
        ],
        &active,
    )?;

    let multibrand = dir.join("multibrand_clients.csv");
    write_table(
        &reports.multibrand_clients,
        &[
            "client_id", "code", "name", "sector", "cycle", "brand_count", "brands", "items",
            "amount_cents",
        ],
        &multibrand,
    )?;

    let sectors = dir.join("sector_cycle_summary.csv");
    write_table(
        &reports.sector_cycle_summary,
        &[
            "cycle", "sector", "active_clients", "multibrand_clients", "multibrand_percent",
            "items", "amount_cents",
        ],
        &sectors,
    )?;

    let unmatched = dir.join("unmatched_skus.csv");
    write_table(
        &reports.unmatched_skus,
        &[
            "product_code", "normalized_code", "product_name", "occurrences", "example_sector",
            "example_client", "items", "amount_cents", "cycles", "sectors",
        ],
        &unmatched,
    )?;

    let paths = vec![active, multibrand, sectors, unmatched];
    log::info!("wrote {} tables to {}", paths.len(), dir.display());
    Ok(paths)
}

fn write_error(path: &Path, err: ::csv::Error) -> IoError {
    match err.into_kind() {
        ::csv::ErrorKind::Io(source) => IoError::Write {
            path: path.to_path_buf(),
            source,
        },
        other => IoError::Csv(format!("{}: {other:?}", path.display())),
    }
}
