use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::config::MatchStrategy;
use crate::model::{
    ClientKey, MatchOutcome, MatchReason, MatchStats, SalesRow, UnmatchedKey,
    UnmatchedSkuRecord, ZeroPadKey,
};

/// Resolves normalized product codes against a catalog by trying each
/// configured strategy in order.
pub struct SkuMatcher<'a> {
    catalog: &'a Catalog,
    strategies: &'a [MatchStrategy],
}

impl<'a> SkuMatcher<'a> {
    pub fn new(catalog: &'a Catalog, strategies: &'a [MatchStrategy]) -> Self {
        Self {
            catalog,
            strategies,
        }
    }

    /// Look up an already-normalized code. Empty codes never match.
    pub fn lookup(&self, normalized: &str) -> MatchOutcome {
        if normalized.is_empty() {
            return MatchOutcome::unknown();
        }
        for strategy in self.strategies {
            let (candidate, reason) = match strategy {
                MatchStrategy::Exact => (normalized.to_string(), MatchReason::Exact),
                MatchStrategy::ZeroPad => match zero_pad(normalized) {
                    Some(padded) => (padded, MatchReason::ZeroPad),
                    None => continue,
                },
            };
            if let Some(product) = self.catalog.get(&candidate) {
                return MatchOutcome {
                    brand: product.brand.clone(),
                    matched_sku: Some(product.sku.clone()),
                    reason,
                };
            }
        }
        MatchOutcome::unknown()
    }

    /// Match one sale row and record the outcome in `audit`.
    pub fn match_row(
        &self,
        row: &SalesRow,
        normalized: &str,
        client: &ClientKey,
        audit: &mut MatchAudit,
    ) -> MatchOutcome {
        let outcome = self.lookup(normalized);
        audit.record(row, normalized, client, &outcome);
        outcome
    }
}

/// A 4-digit code gets exactly one leading zero; anything else has no
/// fallback form.
fn zero_pad(normalized: &str) -> Option<String> {
    (normalized.len() == 4).then(|| format!("0{normalized}"))
}

/// Match bookkeeping accumulated over the sale rows of one run.
#[derive(Debug, Clone, Default)]
pub struct MatchAudit {
    pub unmatched: BTreeMap<UnmatchedKey, UnmatchedSkuRecord>,
    pub zero_pad: BTreeMap<ZeroPadKey, usize>,
    pub stats: MatchStats,
}

impl MatchAudit {
    pub fn record(
        &mut self,
        row: &SalesRow,
        normalized: &str,
        client: &ClientKey,
        outcome: &MatchOutcome,
    ) {
        self.stats.record(outcome.reason);
        match outcome.reason {
            MatchReason::Exact => {}
            MatchReason::ZeroPad => {
                if let Some(sku) = &outcome.matched_sku {
                    let key = ZeroPadKey {
                        raw_code: row.product_code.clone(),
                        matched_sku: sku.clone(),
                    };
                    *self.zero_pad.entry(key).or_insert(0) += 1;
                }
            }
            MatchReason::NotFound => self.record_unmatched(row, normalized, client),
        }
    }

    fn record_unmatched(&mut self, row: &SalesRow, normalized: &str, client: &ClientKey) {
        let key = UnmatchedKey {
            raw_code: row.product_code.clone(),
            product_name: row.product_name.clone(),
        };
        let client_id = client.to_string();
        let entry = self
            .unmatched
            .entry(key)
            .or_insert_with(|| UnmatchedSkuRecord {
                raw_code: row.product_code.clone(),
                normalized_code: normalized.to_string(),
                product_name: row.product_name.clone(),
                occurrences: 0,
                example_sector: row.sector.clone(),
                example_client: client_id.clone(),
                quantity: 0,
                amount_cents: 0,
                cycles: Default::default(),
                sectors: Default::default(),
            });

        entry.occurrences += 1;
        entry.quantity = entry.quantity.saturating_add(row.quantity);
        entry.amount_cents = entry.amount_cents.saturating_add(row.amount_cents);
        entry
            .cycles
            .entry(row.cycle.clone())
            .or_default()
            .add(row.quantity, row.amount_cents);
        entry.sectors.insert(row.sector.clone());

        // Smallest (sector, client) keeps the example independent of row order
        if (row.sector.as_str(), client_id.as_str())
            < (entry.example_sector.as_str(), entry.example_client.as_str())
        {
            entry.example_sector = row.sector.clone();
            entry.example_client = client_id;
        }
    }
}
