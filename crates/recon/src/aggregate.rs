use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::config::CirclesConfig;
use crate::identity::resolve_client;
use crate::matcher::{MatchAudit, SkuMatcher};
use crate::model::{CycleFact, CycleKey, SalesRow, SectorFact, SectorKey};
use crate::normalize::normalize_sku;

/// Grouped facts for one run.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub facts: BTreeMap<CycleKey, CycleFact>,
    pub sectors: BTreeMap<SectorKey, SectorFact>,
    pub audit: MatchAudit,
}

/// Whether a row counts as a qualifying sale.
pub fn is_sale(row: &SalesRow, sale_type: &str) -> bool {
    row.transaction_type.trim() == sale_type.trim()
}

/// Group sale rows by (client, cycle) and (sector, cycle).
///
/// Only the configured sale type participates. Rows without a catalog
/// match still count toward activity and totals but never add a brand.
/// All accumulation is set union or saturating integer addition, so the result does
/// not depend on row order.
pub fn aggregate(rows: &[SalesRow], catalog: &Catalog, config: &CirclesConfig) -> Aggregation {
    let matcher = SkuMatcher::new(catalog, &config.matching.strategies);
    let mut agg = Aggregation::default();
    let mut skipped = 0usize;

    for row in rows {
        if !is_sale(row, &config.sales.sale_type) {
            skipped += 1;
            continue;
        }

        let client = resolve_client(row);
        let normalized = normalize_sku(&row.product_code);
        let outcome = matcher.match_row(row, &normalized, &client, &mut agg.audit);

        let fact = agg
            .facts
            .entry(CycleKey {
                cycle: row.cycle.clone(),
                client: client.clone(),
            })
            .or_insert_with(|| CycleFact::new(client.clone(), &row.cycle));
        fact.row_count += 1;
        fact.quantity = fact.quantity.saturating_add(row.quantity);
        fact.amount_cents = fact.amount_cents.saturating_add(row.amount_cents);
        fact.names.insert(row.reseller_name.clone());
        fact.sectors.insert(row.sector.clone());
        if let Some(channel) = row.channel.as_ref().filter(|c| !c.is_empty()) {
            fact.channels.insert(channel.clone());
        }
        if outcome.is_known() {
            fact.brands.insert(outcome.brand);
        }

        let sector = agg
            .sectors
            .entry(SectorKey {
                cycle: row.cycle.clone(),
                sector: row.sector.clone(),
            })
            .or_insert_with(|| SectorFact {
                sector: row.sector.clone(),
                cycle: row.cycle.clone(),
                ..Default::default()
            });
        sector.active_clients.insert(client);
        sector.row_count += 1;
        sector.quantity = sector.quantity.saturating_add(row.quantity);
        sector.amount_cents = sector.amount_cents.saturating_add(row.amount_cents);
    }

    // Multi-brand status is a property of the whole (client, cycle) fact,
    // so it can only be attributed to sectors once every row is in.
    for (key, sector) in agg.sectors.iter_mut() {
        for client in &sector.active_clients {
            let fact_key = CycleKey {
                cycle: key.cycle.clone(),
                client: client.clone(),
            };
            if agg.facts.get(&fact_key).is_some_and(CycleFact::is_multibrand) {
                sector.multibrand_clients.insert(client.clone());
            }
        }
    }

    log::debug!(
        "aggregated {} sale rows into {} client facts and {} sector facts ({} non-sale rows skipped)",
        agg.audit.stats.sale_rows,
        agg.facts.len(),
        agg.sectors.len(),
        skipped
    );

    agg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrandConfig;
    use crate::model::{CatalogRow, ClientKey, UNKNOWN_BRAND};

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

    fn sale(code: Option<&str>, name: &str, sector: &str, cycle: &str, sku: &str) -> SalesRow {
        SalesRow {
            line: 0,
            sector: sector.into(),
            reseller_name: name.into(),
            reseller_code: code.map(String::from),
            cycle: cycle.into(),
            product_code: sku.into(),
            product_name: format!("Produto {sku}"),
            transaction_type: "Venda".into(),
            quantity: 1,
            amount_cents: 1000,
            channel: Some("App".into()),
        }
    }

    fn fact<'a>(agg: &'a Aggregation, client: &str, cycle: &str) -> &'a CycleFact {
        &agg.facts[&CycleKey {
            cycle: cycle.into(),
            client: ClientKey::Code(client.into()),
        }]
    }

    #[test]
    fn two_brands_make_multibrand() {
        let rows = vec![
            sale(Some("R001"), "Maria", "Norte", "202401", "01234"),
            sale(Some("R001"), "Maria", "Norte", "202401", "56789"),
        ];
        let agg = aggregate(&rows, &catalog(), &CirclesConfig::default());
        let f = fact(&agg, "R001", "202401");
        assert!(f.is_active());
        assert!(f.is_multibrand());
        assert_eq!(f.brand_list(), "Eudora, oBoticario");
        assert_eq!(f.amount_cents, 2000);
    }

    #[test]
    fn fallback_and_exact_same_brand_is_single_brand() {
        let rows = vec![
            sale(Some("R002"), "Joao", "Sul", "202401", "1234"),
            sale(Some("R002"), "Joao", "Sul", "202401", "01234"),
        ];
        let agg = aggregate(&rows, &catalog(), &CirclesConfig::default());
        let f = fact(&agg, "R002", "202401");
        assert_eq!(f.row_count, 2);
        assert!(!f.is_multibrand());
        assert_eq!(agg.audit.stats.zero_pad, 1);
    }

    #[test]
    fn unknown_never_counts_as_brand() {
        let rows = vec![
            sale(Some("R003"), "Ana", "Centro", "202401", "56789"),
            sale(Some("R003"), "Ana", "Centro", "202401", "99999"),
        ];
        let agg = aggregate(&rows, &catalog(), &CirclesConfig::default());
        let f = fact(&agg, "R003", "202401");
        assert_eq!(f.row_count, 2);
        assert!(!f.brands.contains(UNKNOWN_BRAND));
        assert!(!f.is_multibrand());
        assert_eq!(agg.audit.unmatched.len(), 1);
    }

    #[test]
    fn non_sale_rows_ignored_everywhere() {
        let mut returned = sale(Some("R001"), "Maria", "Norte", "202401", "99999");
        returned.transaction_type = "Devolucao".into();
        let rows = vec![returned, sale(Some("R001"), "Maria", "Norte", "202401", "11111")];
        let agg = aggregate(&rows, &catalog(), &CirclesConfig::default());
        assert_eq!(fact(&agg, "R001", "202401").row_count, 1);
        assert!(agg.audit.unmatched.is_empty());
        assert_eq!(agg.audit.stats.sale_rows, 1);
    }

    #[test]
    fn brands_do_not_leak_across_cycles() {
        let rows = vec![
            sale(Some("R001"), "Maria", "Norte", "202401", "01234"),
            sale(Some("R001"), "Maria", "Norte", "202402", "56789"),
        ];
        let agg = aggregate(&rows, &catalog(), &CirclesConfig::default());
        assert!(!fact(&agg, "R001", "202401").is_multibrand());
        assert!(!fact(&agg, "R001", "202402").is_multibrand());
    }

    #[test]
    fn sector_rollup_uses_whole_client_fact() {
        // Same code in two sectors: multi-brand overall, one brand per sector
        let rows = vec![
            sale(Some("R001"), "Maria", "Norte", "202401", "01234"),
            sale(Some("R001"), "Maria", "Sul", "202401", "56789"),
            sale(Some("R009"), "Bia", "Sul", "202401", "56789"),
        ];
        let agg = aggregate(&rows, &catalog(), &CirclesConfig::default());
        assert_eq!(agg.facts.len(), 2);

        let sul = &agg.sectors[&SectorKey {
            cycle: "202401".into(),
            sector: "Sul".into(),
        }];
        assert_eq!(sul.active_clients.len(), 2);
        assert_eq!(sul.multibrand_clients.len(), 1);
        assert_eq!(sul.amount_cents, 2000);

        let norte = &agg.sectors[&SectorKey {
            cycle: "202401".into(),
            sector: "Norte".into(),
        }];
        assert_eq!(norte.multibrand_clients.len(), 1);
        assert_eq!(norte.row_count, 1);
    }

    #[test]
    fn display_identity_is_order_independent() {
        let rows = vec![
            sale(Some("R001"), "Maria Silva", "Sul", "202401", "01234"),
            sale(Some("R001"), "MARIA S", "Norte", "202401", "56789"),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();
        let a = aggregate(&rows, &catalog(), &CirclesConfig::default());
        let b = aggregate(&reversed, &catalog(), &CirclesConfig::default());
        assert_eq!(a.facts, b.facts);
        let f = fact(&a, "R001", "202401");
        assert_eq!(f.display_name(), "MARIA S");
        assert_eq!(f.display_sector(), "Norte");
    }

    #[test]
    fn name_sector_clients_without_code() {
        let rows = vec![
            sale(None, "Joana", "Sul", "202401", "01234"),
            sale(Some(""), "Joana", "Sul", "202401", "56789"),
        ];
        let agg = aggregate(&rows, &catalog(), &CirclesConfig::default());
        assert_eq!(agg.facts.len(), 1);
        assert!(agg.facts.values().all(CycleFact::is_multibrand));
    }

    #[test]
    fn huge_totals_saturate_instead_of_overflowing() {
        let mut big = sale(Some("R001"), "Maria", "Norte", "202401", "01234");
        big.quantity = i64::MAX;
        big.amount_cents = i64::MAX;
        let mut lost = sale(Some("R001"), "Maria", "Norte", "202401", "99999");
        lost.quantity = i64::MAX;
        lost.amount_cents = i64::MAX;
        let small = sale(Some("R001"), "Maria", "Norte", "202401", "56789");
        let rows = vec![big, lost.clone(), lost, small];

        let agg = aggregate(&rows, &catalog(), &CirclesConfig::default());
        let f = fact(&agg, "R001", "202401");
        assert_eq!(f.quantity, i64::MAX);
        assert_eq!(f.amount_cents, i64::MAX);
        assert_eq!(agg.sectors.values().next().unwrap().amount_cents, i64::MAX);

        let record = agg.audit.unmatched.values().next().unwrap();
        assert_eq!(record.occurrences, 2);
        assert_eq!(record.quantity, i64::MAX);
        assert_eq!(record.cycles["202401"].amount_cents, i64::MAX);
    }
}
