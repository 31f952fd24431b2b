use std::path::PathBuf;

use circles_recon::config::CirclesConfig;
use circles_recon::engine::{client_detail, run};
use circles_recon::load::{load_catalog_csv, load_sales_csv};
use circles_recon::model::{CirclesInput, MatchReason, RunResult, RunWarning, UNKNOWN_BRAND};
use circles_recon::ReportFilter;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_input(config: &CirclesConfig) -> CirclesInput {
    let dir = fixtures_dir();
    let read = |file: &Option<String>| {
        let path = dir.join(file.as_deref().unwrap());
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
    };

    let (catalog, mut warnings) =
        load_catalog_csv(&read(&config.catalog.file), b',', &config.catalog.columns).unwrap();
    let (sales, sales_warnings) =
        load_sales_csv(&read(&config.sales.file), b';', &config.sales.columns).unwrap();
    warnings.extend(sales_warnings);
    CirclesInput {
        catalog,
        sales,
        warnings,
    }
}

fn config() -> CirclesConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("circles.toml")).unwrap();
    CirclesConfig::from_toml(&toml).unwrap()
}

fn load_and_run(filter: &ReportFilter) -> RunResult {
    let config = config();
    run(&config, &load_input(&config), filter).unwrap()
}

// -------------------------------------------------------------------------
// README dataset
// -------------------------------------------------------------------------

#[test]
fn maria_is_multibrand_in_both_cycles() {
    let result = load_and_run(&ReportFilter::default());
    let maria: Vec<_> = result
        .reports
        .multibrand_clients
        .iter()
        .filter(|r| r.client_id == "R001")
        .collect();

    assert_eq!(maria.len(), 2);
    assert_eq!(maria[0].cycle, "202401");
    assert_eq!(maria[0].brands, "Eudora, oBoticario");
    assert_eq!(maria[1].cycle, "202402");
    assert_eq!(maria[1].brands, "AuAmigos, Eudora");
    assert_eq!(maria[0].name, "Maria Silva");
}

#[test]
fn joao_single_brand_despite_two_codes() {
    let result = load_and_run(&ReportFilter::default());
    let joao = result
        .reports
        .active_clients
        .iter()
        .find(|r| r.client_id == "R002" && r.cycle == "202401")
        .unwrap();

    // The return row is not a sale
    assert_eq!(joao.rows, 2);
    assert_eq!(joao.brands, "oBoticario");
    assert!(!joao.is_multibrand);
    assert_eq!(joao.amount_cents, 8990 + 9990);
}

#[test]
fn ana_has_one_unmatched_entry() {
    let result = load_and_run(&ReportFilter::default());
    let ana = result
        .reports
        .active_clients
        .iter()
        .find(|r| r.client_id == "R003")
        .unwrap();
    assert!(!ana.is_multibrand);
    assert_eq!(ana.brands, "Quem Disse Berenice");
    assert_eq!(ana.rows, 2);

    let unmatched = &result.reports.unmatched_skus;
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].product_code, "99999");
    assert_eq!(unmatched[0].occurrences, 1);
    assert_eq!(unmatched[0].example_client, "R003");
    assert_eq!(unmatched[0].example_sector, "Centro");
}

#[test]
fn zero_pad_fallback_counts_toward_brands() {
    let result = load_and_run(&ReportFilter::default());
    let bia = result
        .reports
        .multibrand_clients
        .iter()
        .find(|r| r.client_id == "R004")
        .unwrap();
    assert_eq!(bia.brands, "Eudora, Quem Disse Berenice");

    assert_eq!(result.reports.zero_pad_matches.len(), 1);
    assert_eq!(result.reports.zero_pad_matches[0].product_code, "4321");
    assert_eq!(result.reports.zero_pad_matches[0].matched_sku, "04321");
    assert_eq!(result.match_stats.zero_pad, 1);
}

#[test]
fn client_without_code_keyed_by_name_and_sector() {
    let result = load_and_run(&ReportFilter::default());
    let carla = result
        .reports
        .active_clients
        .iter()
        .find(|r| r.client_id == "Carla Souza|Centro")
        .unwrap();
    assert_eq!(carla.code, "");
    assert_eq!(carla.items, 2);
}

#[test]
fn summary_and_overview() {
    let result = load_and_run(&ReportFilter::default());
    let r = &result.reports;

    assert_eq!(r.active_clients.len(), 6);
    assert_eq!(r.multibrand_clients.len(), 3);
    assert_eq!(r.overview.active_clients, 5);
    assert_eq!(r.overview.multibrand_clients, 2);
    assert_eq!(r.overview.multibrand_percent, 40.0);
    assert_eq!(r.overview.amount_cents, 87850);

    let sul_02 = r
        .sector_cycle_summary
        .iter()
        .find(|s| s.sector == "Sul" && s.cycle == "202402")
        .unwrap();
    assert_eq!(sul_02.active_clients, 1);
    assert_eq!(sul_02.multibrand_clients, 1);
    assert_eq!(sul_02.multibrand_percent, 100.0);

    assert_eq!(result.match_stats.sale_rows, 11);
    assert_eq!(result.meta.sales_rows, 12);
    assert_eq!(result.meta.catalog_products, 7);
}

#[test]
fn multibrand_rows_never_contain_unknown() {
    let result = load_and_run(&ReportFilter::default());
    for row in &result.reports.multibrand_clients {
        assert!(row.brand_count >= 2);
        assert!(!row.brands.contains(UNKNOWN_BRAND));
    }
    for row in &result.reports.active_clients {
        assert!(!row.brands.contains(UNKNOWN_BRAND));
    }
}

#[test]
fn unmatched_ratio_warning() {
    let result = load_and_run(&ReportFilter::default());
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, RunWarning::HighUnmatchedRatio { .. })));
}

// -------------------------------------------------------------------------
// Determinism
// -------------------------------------------------------------------------

#[test]
fn rerun_is_identical() {
    let a = load_and_run(&ReportFilter::default());
    let b = load_and_run(&ReportFilter::default());
    assert_eq!(a.reports, b.reports);
    assert_eq!(a.match_stats, b.match_stats);
}

#[test]
fn shuffled_input_is_identical() {
    let config = config();
    let input = load_input(&config);
    let baseline = run(&config, &input, &ReportFilter::default()).unwrap();

    let mut shuffled = load_input(&config);
    shuffled.sales.reverse();
    shuffled.sales.rotate_left(5);
    let result = run(&config, &shuffled, &ReportFilter::default()).unwrap();

    assert_eq!(baseline.reports, result.reports);
}

// -------------------------------------------------------------------------
// Filters + detail
// -------------------------------------------------------------------------

#[test]
fn brand_filter() {
    let filter = ReportFilter {
        brands: ["AuAmigos".to_string()].into(),
        ..Default::default()
    };
    let result = load_and_run(&filter);
    let ids: Vec<_> = result
        .reports
        .active_clients
        .iter()
        .map(|r| (r.client_id.as_str(), r.cycle.as_str()))
        .collect();
    // Coded clients sort before name-keyed ones
    assert_eq!(ids, vec![("R001", "202402"), ("Carla Souza|Centro", "202402")]);
}

#[test]
fn detail_for_joao() {
    let config = config();
    let detail = client_detail(&config, &load_input(&config), "R002", None)
        .unwrap()
        .unwrap();
    assert_eq!(detail.rows.len(), 2);
    assert_eq!(detail.brands, vec!["oBoticario"]);
    assert!(detail.rows.iter().all(|r| r.match_reason == MatchReason::Exact));
}
