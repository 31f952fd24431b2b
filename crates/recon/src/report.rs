use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::{is_sale, Aggregation};
use crate::catalog::Catalog;
use crate::config::{CirclesConfig, ReportConfig};
use crate::filter::ReportFilter;
use crate::identity::resolve_client;
use crate::matcher::SkuMatcher;
use crate::model::{
    join, percent, ActiveClientRow, BrandCombinationRow, ClientDetail, ClientDetailRow,
    ClientKey, CycleFact, CycleTotalsRow, MultibrandClientRow, Overview, Reports, SalesRow,
    SectorCycleRow, SectorFact, SectorRankRow, UnmatchedSkuRow, UnmatchedTally, ZeroPadMatchRow,
};
use crate::normalize::normalize_sku;

/// Build every report table from an aggregation.
///
/// Client tables, the overview and brand combinations honor the whole
/// filter. Sector and cycle tables honor only the cycle and sector
/// criteria; the unmatched audit only the cycle criterion.
pub fn assemble(agg: &Aggregation, config: &ReportConfig, filter: &ReportFilter) -> Reports {
    let facts: Vec<&CycleFact> = agg
        .facts
        .values()
        .filter(|f| filter.accepts_fact(f))
        .collect();
    let sectors: Vec<&SectorFact> = agg
        .sectors
        .values()
        .filter(|s| filter.accepts_cycle(&s.cycle) && filter.accepts_sector(&s.sector))
        .collect();

    Reports {
        overview: overview(&facts),
        active_clients: facts.iter().map(|f| active_row(f)).collect(),
        multibrand_clients: facts
            .iter()
            .filter(|f| f.is_multibrand())
            .map(|f| multibrand_row(f))
            .collect(),
        sector_cycle_summary: sectors.iter().map(|s| sector_row(s)).collect(),
        unmatched_skus: unmatched_rows(agg, filter),
        zero_pad_matches: zero_pad_rows(agg),
        cycle_totals: cycle_totals(&sectors),
        top_sectors_by_amount: top_sectors(&sectors, config.top_sectors, |r| {
            (Reverse(r.amount_cents), Reverse(r.active_clients))
        }),
        top_sectors_by_active: top_sectors(&sectors, config.top_sectors, |r| {
            (Reverse(r.active_clients), Reverse(r.amount_cents))
        }),
        brand_combinations: brand_combinations(&facts, config.brand_combinations),
    }
}

fn active_row(fact: &CycleFact) -> ActiveClientRow {
    ActiveClientRow {
        client_id: fact.client.to_string(),
        code: fact.client.code().unwrap_or_default().to_string(),
        name: fact.display_name().to_string(),
        sector: fact.display_sector().to_string(),
        cycle: fact.cycle.clone(),
        rows: fact.row_count,
        items: fact.quantity,
        amount_cents: fact.amount_cents,
        brand_count: fact.brands.len(),
        brands: fact.brand_list(),
        is_multibrand: fact.is_multibrand(),
    }
}

fn multibrand_row(fact: &CycleFact) -> MultibrandClientRow {
    MultibrandClientRow {
        client_id: fact.client.to_string(),
        code: fact.client.code().unwrap_or_default().to_string(),
        name: fact.display_name().to_string(),
        sector: fact.display_sector().to_string(),
        cycle: fact.cycle.clone(),
        brand_count: fact.brands.len(),
        brands: fact.brand_list(),
        items: fact.quantity,
        amount_cents: fact.amount_cents,
    }
}

fn sector_row(sector: &SectorFact) -> SectorCycleRow {
    let active = sector.active_clients.len();
    let multibrand = sector.multibrand_clients.len();
    SectorCycleRow {
        cycle: sector.cycle.clone(),
        sector: sector.sector.clone(),
        active_clients: active,
        multibrand_clients: multibrand,
        multibrand_percent: percent(multibrand, active),
        items: sector.quantity,
        amount_cents: sector.amount_cents,
    }
}

fn overview(facts: &[&CycleFact]) -> Overview {
    let active: BTreeSet<&ClientKey> = facts.iter().map(|f| &f.client).collect();
    let multibrand: BTreeSet<&ClientKey> = facts
        .iter()
        .filter(|f| f.is_multibrand())
        .map(|f| &f.client)
        .collect();
    Overview {
        active_clients: active.len(),
        multibrand_clients: multibrand.len(),
        multibrand_percent: percent(multibrand.len(), active.len()),
        items: facts.iter().map(|f| f.quantity).fold(0, i64::saturating_add),
        amount_cents: facts.iter().map(|f| f.amount_cents).fold(0, i64::saturating_add),
    }
}

/// Most frequent codes first; ties keep (code, name) order.
///
/// With a cycle filter, counts and totals cover only the selected cycles.
/// Example client and sectors stay those of the whole run.
fn unmatched_rows(agg: &Aggregation, filter: &ReportFilter) -> Vec<UnmatchedSkuRow> {
    let mut rows: Vec<UnmatchedSkuRow> = agg
        .audit
        .unmatched
        .values()
        .filter_map(|r| {
            let (tally, cycles) = if filter.cycles.is_empty() {
                let whole = UnmatchedTally {
                    occurrences: r.occurrences,
                    quantity: r.quantity,
                    amount_cents: r.amount_cents,
                };
                (whole, join(r.cycles.keys()))
            } else {
                let mut tally = UnmatchedTally::default();
                let selected: Vec<&String> = r
                    .cycles
                    .iter()
                    .filter(|(cycle, _)| filter.cycles.contains(*cycle))
                    .map(|(cycle, t)| {
                        tally.merge(t);
                        cycle
                    })
                    .collect();
                (tally, join(selected))
            };
            if tally.occurrences == 0 {
                return None;
            }
            Some(UnmatchedSkuRow {
                product_code: r.raw_code.clone(),
                normalized_code: r.normalized_code.clone(),
                product_name: r.product_name.clone(),
                occurrences: tally.occurrences,
                example_sector: r.example_sector.clone(),
                example_client: r.example_client.clone(),
                items: tally.quantity,
                amount_cents: tally.amount_cents,
                cycles,
                sectors: join(&r.sectors),
            })
        })
        .collect();
    rows.sort_by_key(|r| Reverse(r.occurrences));
    rows
}

fn zero_pad_rows(agg: &Aggregation) -> Vec<ZeroPadMatchRow> {
    let mut rows: Vec<ZeroPadMatchRow> = agg
        .audit
        .zero_pad
        .iter()
        .map(|(key, count)| ZeroPadMatchRow {
            product_code: key.raw_code.clone(),
            matched_sku: key.matched_sku.clone(),
            occurrences: *count,
        })
        .collect();
    rows.sort_by_key(|r| Reverse(r.occurrences));
    rows
}

/// Per-cycle totals. A client active in two sectors is counted once.
fn cycle_totals(sectors: &[&SectorFact]) -> Vec<CycleTotalsRow> {
    struct Acc<'a> {
        active: BTreeSet<&'a ClientKey>,
        multibrand: BTreeSet<&'a ClientKey>,
        items: i64,
        amount_cents: i64,
    }

    let mut cycles: BTreeMap<&str, Acc> = BTreeMap::new();
    for s in sectors {
        let acc = cycles.entry(s.cycle.as_str()).or_insert_with(|| Acc {
            active: BTreeSet::new(),
            multibrand: BTreeSet::new(),
            items: 0,
            amount_cents: 0,
        });
        acc.active.extend(s.active_clients.iter());
        acc.multibrand.extend(s.multibrand_clients.iter());
        acc.items = acc.items.saturating_add(s.quantity);
        acc.amount_cents = acc.amount_cents.saturating_add(s.amount_cents);
    }

    cycles
        .into_iter()
        .map(|(cycle, acc)| CycleTotalsRow {
            cycle: cycle.to_string(),
            active_clients: acc.active.len(),
            multibrand_clients: acc.multibrand.len(),
            multibrand_percent: percent(acc.multibrand.len(), acc.active.len()),
            items: acc.items,
            amount_cents: acc.amount_cents,
        })
        .collect()
}

/// Sectors ranked over all selected cycles. Active clients are distinct
/// across cycles; ties fall back to sector name.
fn top_sectors<K: Ord>(
    sectors: &[&SectorFact],
    limit: usize,
    rank: impl Fn(&SectorRankRow) -> K,
) -> Vec<SectorRankRow> {
    let mut by_sector: BTreeMap<&str, (BTreeSet<&ClientKey>, i64)> = BTreeMap::new();
    for s in sectors {
        let entry = by_sector.entry(s.sector.as_str()).or_default();
        entry.0.extend(s.active_clients.iter());
        entry.1 = entry.1.saturating_add(s.amount_cents);
    }

    let mut rows: Vec<SectorRankRow> = by_sector
        .into_iter()
        .map(|(sector, (clients, amount_cents))| SectorRankRow {
            sector: sector.to_string(),
            active_clients: clients.len(),
            amount_cents,
        })
        .collect();
    rows.sort_by_key(|r| rank(r));
    rows.truncate(limit);
    rows
}

fn brand_combinations(facts: &[&CycleFact], limit: usize) -> Vec<BrandCombinationRow> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for fact in facts.iter().filter(|f| f.is_multibrand()) {
        *counts.entry(fact.brand_list()).or_insert(0) += 1;
    }
    let mut rows: Vec<BrandCombinationRow> = counts
        .into_iter()
        .map(|(brands, clients)| BrandCombinationRow { brands, clients })
        .collect();
    rows.sort_by_key(|r| Reverse(r.clients));
    rows.truncate(limit);
    rows
}

// ---------------------------------------------------------------------------
// Client detail
// ---------------------------------------------------------------------------

/// Sale rows of one client with their matched brand, optionally limited to
/// one cycle. Returns `None` when the client has no sale rows at all.
pub fn client_detail(
    rows: &[SalesRow],
    catalog: &Catalog,
    config: &CirclesConfig,
    client_id: &str,
    cycle: Option<&str>,
) -> Option<ClientDetail> {
    let matcher = SkuMatcher::new(catalog, &config.matching.strategies);
    let mut cycles = BTreeSet::new();
    let mut brands = BTreeSet::new();
    let mut detail = Vec::new();

    for row in rows {
        if !is_sale(row, &config.sales.sale_type) || resolve_client(row).to_string() != client_id {
            continue;
        }
        cycles.insert(row.cycle.clone());
        if cycle.is_some_and(|c| c != row.cycle) {
            continue;
        }

        let outcome = matcher.lookup(&normalize_sku(&row.product_code));
        if outcome.is_known() {
            brands.insert(outcome.brand.clone());
        }
        detail.push(ClientDetailRow {
            line: row.line,
            cycle: row.cycle.clone(),
            sector: row.sector.clone(),
            product_code: row.product_code.clone(),
            product_name: row.product_name.clone(),
            brand: outcome.brand,
            match_reason: outcome.reason,
            transaction_type: row.transaction_type.clone(),
            items: row.quantity,
            amount_cents: row.amount_cents,
            channel: row.channel.clone().unwrap_or_default(),
        });
    }

    if cycles.is_empty() {
        return None;
    }
    detail.sort_by(|a, b| (&a.cycle, a.line).cmp(&(&b.cycle, b.line)));

    Some(ClientDetail {
        client_id: client_id.to_string(),
        cycle: cycle.map(String::from),
        brands: brands.into_iter().collect(),
        items: detail.iter().map(|r| r.items).fold(0, i64::saturating_add),
        amount_cents: detail.iter().map(|r| r.amount_cents).fold(0, i64::saturating_add),
        cycles: cycles.into_iter().collect(),
        rows: detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::config::BrandConfig;
    use crate::model::CatalogRow;

    fn catalog() -> Catalog {
        let rows: Vec<CatalogRow> = [
            ("01234", "oBoticario"),
            ("56789", "Eudora"),
            ("11111", "AuAmigos"),
        ]
        .iter()
        .map(|(sku, brand)| CatalogRow {
            line: 0,
            sku: sku.to_string(),
            name: String::new(),
            brand: brand.to_string(),
        })
        .collect();
        Catalog::from_products(&rows, &BrandConfig::default()).0
    }

    fn sale(line: u64, code: &str, sector: &str, cycle: &str, sku: &str, cents: i64) -> SalesRow {
        SalesRow {
            line,
            sector: sector.into(),
            reseller_name: format!("Cliente {code}"),
            reseller_code: Some(code.into()),
            cycle: cycle.into(),
            product_code: sku.into(),
            product_name: format!("Produto {sku}"),
            transaction_type: "Venda".into(),
            quantity: 1,
            amount_cents: cents,
            channel: None,
        }
    }

    fn rows() -> Vec<SalesRow> {
        vec![
            sale(2, "R001", "Norte", "202401", "01234", 1000),
            sale(3, "R001", "Norte", "202401", "56789", 2000),
            sale(4, "R002", "Sul", "202401", "56789", 500),
            sale(5, "R002", "Sul", "202402", "11111", 700),
            sale(6, "R002", "Sul", "202402", "1234", 300),
            sale(7, "R003", "Sul", "202402", "99999", 100),
            sale(8, "R004", "Sul", "202402", "99999", 100),
        ]
    }

    fn reports(filter: &ReportFilter) -> Reports {
        let config = CirclesConfig::default();
        let agg = aggregate(&rows(), &catalog(), &config);
        assemble(&agg, &config.report, filter)
    }

    #[test]
    fn core_tables() {
        let r = reports(&ReportFilter::default());
        assert_eq!(r.active_clients.len(), 5);
        assert_eq!(r.multibrand_clients.len(), 2);
        assert_eq!(r.multibrand_clients[0].client_id, "R001");
        assert_eq!(r.multibrand_clients[0].brands, "Eudora, oBoticario");
        assert_eq!(r.multibrand_clients[1].client_id, "R002");
        assert_eq!(r.multibrand_clients[1].cycle, "202402");

        let sul_02 = r
            .sector_cycle_summary
            .iter()
            .find(|s| s.sector == "Sul" && s.cycle == "202402")
            .unwrap();
        assert_eq!(sul_02.active_clients, 3);
        assert_eq!(sul_02.multibrand_clients, 1);
        assert_eq!(sul_02.multibrand_percent, 33.3);
        assert_eq!(sul_02.amount_cents, 1200);

        assert_eq!(r.unmatched_skus.len(), 1);
        assert_eq!(r.unmatched_skus[0].occurrences, 2);
        assert_eq!(r.unmatched_skus[0].example_client, "R003");
    }

    #[test]
    fn supplementary_tables() {
        let r = reports(&ReportFilter::default());
        assert_eq!(r.overview.active_clients, 4);
        assert_eq!(r.overview.multibrand_clients, 2);
        assert_eq!(r.overview.multibrand_percent, 50.0);
        assert_eq!(r.overview.amount_cents, 4700);

        assert_eq!(r.cycle_totals.len(), 2);
        assert_eq!(r.cycle_totals[0].cycle, "202401");
        assert_eq!(r.cycle_totals[0].active_clients, 2);
        assert_eq!(r.cycle_totals[0].multibrand_clients, 1);

        assert_eq!(r.top_sectors_by_amount[0].sector, "Norte");
        assert_eq!(r.top_sectors_by_active[0].sector, "Sul");
        assert_eq!(r.top_sectors_by_active[0].active_clients, 3);

        assert_eq!(r.zero_pad_matches.len(), 1);
        assert_eq!(r.zero_pad_matches[0].matched_sku, "01234");

        assert_eq!(r.brand_combinations.len(), 2);
        assert!(r.brand_combinations.iter().all(|c| c.clients == 1));
    }

    #[test]
    fn filter_narrows_client_tables() {
        let filter = ReportFilter {
            cycles: ["202402".to_string()].into(),
            only_multibrand: true,
            ..Default::default()
        };
        let r = reports(&filter);
        assert_eq!(r.active_clients.len(), 1);
        assert_eq!(r.active_clients[0].client_id, "R002");
        assert_eq!(r.overview.active_clients, 1);
        // Sector table keeps every client of the cycle
        assert_eq!(r.sector_cycle_summary.len(), 1);
        assert_eq!(r.sector_cycle_summary[0].active_clients, 3);
    }

    #[test]
    fn unmatched_filtered_by_cycle() {
        let filter = ReportFilter {
            cycles: ["202401".to_string()].into(),
            ..Default::default()
        };
        assert!(reports(&filter).unmatched_skus.is_empty());
    }

    #[test]
    fn unmatched_counts_only_selected_cycles() {
        let mut rows = rows();
        rows.push(sale(9, "R005", "Norte", "202401", "99999", 400));
        rows.push(sale(10, "R005", "Norte", "202403", "99999", 900));
        let config = CirclesConfig::default();
        let agg = aggregate(&rows, &catalog(), &config);

        let all = assemble(&agg, &config.report, &ReportFilter::default());
        assert_eq!(all.unmatched_skus[0].occurrences, 4);
        assert_eq!(all.unmatched_skus[0].cycles, "202401, 202402, 202403");

        let filter = ReportFilter {
            cycles: ["202401".to_string(), "202403".to_string()].into(),
            ..Default::default()
        };
        let r = assemble(&agg, &config.report, &filter);
        assert_eq!(r.unmatched_skus.len(), 1);
        let row = &r.unmatched_skus[0];
        assert_eq!(row.occurrences, 2);
        assert_eq!(row.items, 2);
        assert_eq!(row.amount_cents, 1300);
        assert_eq!(row.cycles, "202401, 202403");
    }

    #[test]
    fn top_sectors_limit() {
        let config = CirclesConfig::default();
        let agg = aggregate(&rows(), &catalog(), &config);
        let report_config = ReportConfig {
            top_sectors: 1,
            ..Default::default()
        };
        let r = assemble(&agg, &report_config, &ReportFilter::default());
        assert_eq!(r.top_sectors_by_amount.len(), 1);
        assert_eq!(r.top_sectors_by_active.len(), 1);
    }

    #[test]
    fn client_detail_lists_rows_and_brands() {
        let config = CirclesConfig::default();
        let detail = client_detail(&rows(), &catalog(), &config, "R002", None).unwrap();
        assert_eq!(detail.rows.len(), 3);
        assert_eq!(detail.cycles, vec!["202401", "202402"]);
        assert_eq!(detail.brands, vec!["AuAmigos", "Eudora", "oBoticario"]);
        assert_eq!(detail.amount_cents, 1500);

        let one = client_detail(&rows(), &catalog(), &config, "R002", Some("202402")).unwrap();
        assert_eq!(one.rows.len(), 2);
        assert_eq!(one.cycles.len(), 2);
        assert_eq!(one.rows[1].match_reason, crate::model::MatchReason::ZeroPad);
    }

    #[test]
    fn client_detail_unknown_client() {
        let config = CirclesConfig::default();
        assert!(client_detail(&rows(), &catalog(), &config, "R999", None).is_none());
    }
}
