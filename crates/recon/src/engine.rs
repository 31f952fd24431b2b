use crate::aggregate::aggregate;
use crate::catalog::Catalog;
use crate::config::CirclesConfig;
use crate::error::CirclesError;
use crate::filter::ReportFilter;
use crate::model::{ClientDetail, CirclesInput, RunMeta, RunResult, RunWarning};
use crate::report::assemble;

/// Run the pipeline: build the catalog, aggregate sale rows, assemble the
/// report tables. Load warnings carried in `input` come first in the
/// result, followed by catalog and audit warnings.
pub fn run(
    config: &CirclesConfig,
    input: &CirclesInput,
    filter: &ReportFilter,
) -> Result<RunResult, CirclesError> {
    config.validate()?;

    let (catalog, catalog_warnings) = Catalog::from_products(&input.catalog, &config.brands);
    log::debug!(
        "catalog: {} products indexed from {} rows",
        catalog.len(),
        input.catalog.len()
    );

    let agg = aggregate(&input.sales, &catalog, config);

    let mut warnings = input.warnings.clone();
    warnings.extend(catalog_warnings);

    let stats = agg.audit.stats.clone();
    let ratio = stats.unmatched_ratio();
    let threshold = config.audit.unmatched_alert_ratio;
    if ratio > threshold {
        warnings.push(RunWarning::HighUnmatchedRatio { ratio, threshold });
    }

    for w in &warnings {
        log::warn!("{w}");
    }

    let reports = assemble(&agg, &config.report, filter);

    log::info!(
        "{}: {} sale rows ({} exact, {} zero-pad, {} unmatched); {} active, {} multi-brand ({}%)",
        config.name,
        stats.sale_rows,
        stats.exact,
        stats.zero_pad,
        stats.not_found,
        reports.overview.active_clients,
        reports.overview.multibrand_clients,
        reports.overview.multibrand_percent
    );

    Ok(RunResult {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            catalog_products: catalog.len(),
            sales_rows: input.sales.len(),
        },
        match_stats: stats,
        warnings,
        reports,
    })
}

/// Sale rows and brand summary for one client id (a reseller code, or
/// `name|sector`). `Ok(None)` when the client has no sale rows.
pub fn client_detail(
    config: &CirclesConfig,
    input: &CirclesInput,
    client_id: &str,
    cycle: Option<&str>,
) -> Result<Option<ClientDetail>, CirclesError> {
    config.validate()?;
    let (catalog, _) = Catalog::from_products(&input.catalog, &config.brands);
    Ok(crate::report::client_detail(
        &input.sales,
        &catalog,
        config,
        client_id,
        cycle,
    ))
}
