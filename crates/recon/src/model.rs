use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};

/// Brand assigned to rows whose product code has no catalog match.
pub const UNKNOWN_BRAND: &str = "UNKNOWN";

/// Which input table a row or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Catalog,
    Sales,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog => write!(f, "catalog"),
            Self::Sales => write!(f, "sales"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A catalog row as read from the product table, before SKU normalization.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    pub line: u64,
    pub sku: String,
    pub name: String,
    pub brand: String,
}

/// A catalog entry after normalization. `sku` is a digit string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    pub sku: String,
    pub name: String,
    pub brand: String,
}

/// A typed sales transaction. Text fields are trimmed at load time;
/// `product_code` is kept exactly as read so the audit can show it.
#[derive(Debug, Clone)]
pub struct SalesRow {
    pub line: u64,
    pub sector: String,
    pub reseller_name: String,
    pub reseller_code: Option<String>,
    pub cycle: String,
    pub product_code: String,
    pub product_name: String,
    pub transaction_type: String,
    pub quantity: i64,
    pub amount_cents: i64,
    pub channel: Option<String>,
}

/// Pre-loaded rows for both tables plus the warnings raised while loading.
#[derive(Debug, Default)]
pub struct CirclesInput {
    pub catalog: Vec<CatalogRow>,
    pub sales: Vec<SalesRow>,
    pub warnings: Vec<RunWarning>,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable client identity: the reseller code when present, otherwise the
/// (name, sector) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClientKey {
    Code(String),
    NameSector { name: String, sector: String },
}

impl ClientKey {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Code(code) => Some(code),
            Self::NameSector { .. } => None,
        }
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::NameSector { name, sector } => write!(f, "{name}|{sector}"),
        }
    }
}

impl Serialize for ClientKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Exact,
    ZeroPad,
    NotFound,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::ZeroPad => write!(f, "zero_pad"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Catalog brand, or [`UNKNOWN_BRAND`].
    pub brand: String,
    pub matched_sku: Option<String>,
    pub reason: MatchReason,
}

impl MatchOutcome {
    pub fn unknown() -> Self {
        Self {
            brand: UNKNOWN_BRAND.to_string(),
            matched_sku: None,
            reason: MatchReason::NotFound,
        }
    }

    pub fn is_known(&self) -> bool {
        self.reason != MatchReason::NotFound
    }
}

/// Per-run match counters over sale rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchStats {
    pub sale_rows: usize,
    pub exact: usize,
    pub zero_pad: usize,
    pub not_found: usize,
}

impl MatchStats {
    pub fn record(&mut self, reason: MatchReason) {
        self.sale_rows += 1;
        match reason {
            MatchReason::Exact => self.exact += 1,
            MatchReason::ZeroPad => self.zero_pad += 1,
            MatchReason::NotFound => self.not_found += 1,
        }
    }

    /// Share of sale rows without a catalog match, 0.0 when there are none.
    pub fn unmatched_ratio(&self) -> f64 {
        if self.sale_rows == 0 {
            0.0
        } else {
            self.not_found as f64 / self.sale_rows as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Key of a client fact. Field order puts the cycle first so `BTreeMap`
/// iteration is grouped by cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleKey {
    pub cycle: String,
    pub client: ClientKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectorKey {
    pub cycle: String,
    pub sector: String,
}

/// Everything one client bought in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleFact {
    pub client: ClientKey,
    pub cycle: String,
    pub names: BTreeSet<String>,
    pub sectors: BTreeSet<String>,
    pub channels: BTreeSet<String>,
    /// Catalog brands only; never contains [`UNKNOWN_BRAND`].
    pub brands: BTreeSet<String>,
    pub row_count: usize,
    pub quantity: i64,
    pub amount_cents: i64,
}

impl CycleFact {
    pub fn new(client: ClientKey, cycle: &str) -> Self {
        Self {
            client,
            cycle: cycle.to_string(),
            names: BTreeSet::new(),
            sectors: BTreeSet::new(),
            channels: BTreeSet::new(),
            brands: BTreeSet::new(),
            row_count: 0,
            quantity: 0,
            amount_cents: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.row_count >= 1
    }

    pub fn is_multibrand(&self) -> bool {
        self.brands.len() >= 2
    }

    /// Smallest observed name, so the choice does not depend on row order.
    pub fn display_name(&self) -> &str {
        self.names.iter().next().map(String::as_str).unwrap_or("")
    }

    pub fn display_sector(&self) -> &str {
        self.sectors.iter().next().map(String::as_str).unwrap_or("")
    }

    /// Sorted brand list joined with `", "`.
    pub fn brand_list(&self) -> String {
        join(&self.brands)
    }
}

/// Sector rollup for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorFact {
    pub sector: String,
    pub cycle: String,
    pub active_clients: BTreeSet<ClientKey>,
    pub multibrand_clients: BTreeSet<ClientKey>,
    pub row_count: usize,
    pub quantity: i64,
    pub amount_cents: i64,
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnmatchedKey {
    pub raw_code: String,
    pub product_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedSkuRecord {
    pub raw_code: String,
    pub normalized_code: String,
    pub product_name: String,
    pub occurrences: usize,
    /// Smallest (sector, client) pair seen for this code.
    pub example_sector: String,
    pub example_client: String,
    pub quantity: i64,
    pub amount_cents: i64,
    /// Per-cycle share of the totals above.
    pub cycles: BTreeMap<String, UnmatchedTally>,
    pub sectors: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnmatchedTally {
    pub occurrences: usize,
    pub quantity: i64,
    pub amount_cents: i64,
}

impl UnmatchedTally {
    pub fn add(&mut self, quantity: i64, amount_cents: i64) {
        self.occurrences += 1;
        self.quantity = self.quantity.saturating_add(quantity);
        self.amount_cents = self.amount_cents.saturating_add(amount_cents);
    }

    pub fn merge(&mut self, other: &UnmatchedTally) {
        self.occurrences += other.occurrences;
        self.quantity = self.quantity.saturating_add(other.quantity);
        self.amount_cents = self.amount_cents.saturating_add(other.amount_cents);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZeroPadKey {
    pub raw_code: String,
    pub matched_sku: String,
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Non-fatal diagnostics collected during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    MissingOptionalColumn { table: Table, column: String },
    EmptyCatalogSkus { rows: usize },
    DuplicateCatalogSkus { skus: Vec<String>, rows: usize },
    UnrecognizedBrand { brand: String },
    MalformedNumber { table: Table, line: u64, column: String, value: String },
    MalformedRow { table: Table, line: u64, fields: usize, expected: usize },
    SuppressedRowWarnings { count: usize },
    HighUnmatchedRatio { ratio: f64, threshold: f64 },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOptionalColumn { table, column } => {
                write!(f, "{table}: optional column '{column}' not found")
            }
            Self::EmptyCatalogSkus { rows } => {
                write!(f, "catalog: {rows} row(s) dropped for empty or non-numeric SKU")
            }
            Self::DuplicateCatalogSkus { skus, rows } => write!(
                f,
                "catalog: duplicate SKUs {} ({rows} row(s) involved, first occurrence kept)",
                skus.join(", ")
            ),
            Self::UnrecognizedBrand { brand } => {
                write!(f, "catalog: unrecognized brand '{brand}'")
            }
            Self::MalformedNumber { table, line, column, value } => write!(
                f,
                "{table}, line {line}: cannot parse {column} '{value}', treated as zero"
            ),
            Self::MalformedRow { table, line, fields, expected } => write!(
                f,
                "{table}, line {line}: {fields} field(s) where the header has {expected}, row skipped"
            ),
            Self::SuppressedRowWarnings { count } => {
                write!(f, "{count} further row warning(s) suppressed")
            }
            Self::HighUnmatchedRatio { ratio, threshold } => write!(
                f,
                "{:.1}% of sale rows have no catalog match (alert above {:.1}%)",
                ratio * 100.0,
                threshold * 100.0
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Report tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveClientRow {
    pub client_id: String,
    pub code: String,
    pub name: String,
    pub sector: String,
    pub cycle: String,
    pub rows: usize,
    pub items: i64,
    pub amount_cents: i64,
    pub brand_count: usize,
    pub brands: String,
    pub is_multibrand: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultibrandClientRow {
    pub client_id: String,
    pub code: String,
    pub name: String,
    pub sector: String,
    pub cycle: String,
    pub brand_count: usize,
    pub brands: String,
    pub items: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorCycleRow {
    pub cycle: String,
    pub sector: String,
    pub active_clients: usize,
    pub multibrand_clients: usize,
    pub multibrand_percent: f64,
    pub items: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedSkuRow {
    pub product_code: String,
    pub normalized_code: String,
    pub product_name: String,
    pub occurrences: usize,
    pub example_sector: String,
    pub example_client: String,
    pub items: i64,
    pub amount_cents: i64,
    pub cycles: String,
    pub sectors: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZeroPadMatchRow {
    pub product_code: String,
    pub matched_sku: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub active_clients: usize,
    pub multibrand_clients: usize,
    pub multibrand_percent: f64,
    pub items: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleTotalsRow {
    pub cycle: String,
    pub active_clients: usize,
    pub multibrand_clients: usize,
    pub multibrand_percent: f64,
    pub items: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorRankRow {
    pub sector: String,
    pub active_clients: usize,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandCombinationRow {
    pub brands: String,
    pub clients: usize,
}

/// All report tables produced by one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reports {
    pub overview: Overview,
    pub active_clients: Vec<ActiveClientRow>,
    pub multibrand_clients: Vec<MultibrandClientRow>,
    pub sector_cycle_summary: Vec<SectorCycleRow>,
    pub unmatched_skus: Vec<UnmatchedSkuRow>,
    pub zero_pad_matches: Vec<ZeroPadMatchRow>,
    pub cycle_totals: Vec<CycleTotalsRow>,
    pub top_sectors_by_amount: Vec<SectorRankRow>,
    pub top_sectors_by_active: Vec<SectorRankRow>,
    pub brand_combinations: Vec<BrandCombinationRow>,
}

// ---------------------------------------------------------------------------
// Client detail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientDetailRow {
    pub line: u64,
    pub cycle: String,
    pub sector: String,
    pub product_code: String,
    pub product_name: String,
    pub brand: String,
    pub match_reason: MatchReason,
    pub transaction_type: String,
    pub items: i64,
    pub amount_cents: i64,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientDetail {
    pub client_id: String,
    pub cycle: Option<String>,
    pub brands: Vec<String>,
    pub items: i64,
    pub amount_cents: i64,
    pub cycles: Vec<String>,
    pub rows: Vec<ClientDetailRow>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub catalog_products: usize,
    pub sales_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub meta: RunMeta,
    pub match_stats: MatchStats,
    pub warnings: Vec<RunWarning>,
    pub reports: Reports,
}

pub(crate) fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Percentage rounded to one decimal place; 0.0 for an empty denominator.
pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}
