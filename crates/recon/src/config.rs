use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::CirclesError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration. Every section has defaults, so an empty document is
/// a valid config for the standard catalog/sales schemas.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CirclesConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub sales: SalesConfig,
    #[serde(default)]
    pub brands: BrandConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_name() -> String {
    "active-circles".into()
}

impl Default for CirclesConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            catalog: CatalogConfig::default(),
            sales: SalesConfig::default(),
            brands: BrandConfig::default(),
            matching: MatchingConfig::default(),
            audit: AuditConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Path to the product table, relative to the config file.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub columns: CatalogColumns,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CatalogColumns {
    pub sku: String,
    pub name: String,
    pub brand: String,
}

impl Default for CatalogColumns {
    fn default() -> Self {
        Self {
            sku: "SKU".into(),
            name: "Nome".into(),
            brand: "Marca".into(),
        }
    }
}

impl CatalogColumns {
    pub fn required(&self) -> [&str; 3] {
        [&self.sku, &self.name, &self.brand]
    }
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SalesConfig {
    /// Path to the transaction table, relative to the config file.
    #[serde(default)]
    pub file: Option<String>,
    /// `Tipo` value that marks a qualifying sale.
    #[serde(default = "default_sale_type")]
    pub sale_type: String,
    #[serde(default)]
    pub columns: SalesColumns,
}

fn default_sale_type() -> String {
    "Venda".into()
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self {
            file: None,
            sale_type: default_sale_type(),
            columns: SalesColumns::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SalesColumns {
    pub sector: String,
    pub reseller_name: String,
    pub reseller_code: String,
    pub cycle: String,
    pub product_code: String,
    pub product_name: String,
    pub transaction_type: String,
    pub quantity: String,
    pub amount: String,
    /// Optional: absence only produces a warning.
    pub channel: String,
}

impl Default for SalesColumns {
    fn default() -> Self {
        Self {
            sector: "Setor".into(),
            reseller_name: "NomeRevendedora".into(),
            reseller_code: "CodigoRevendedora".into(),
            cycle: "CicloFaturamento".into(),
            product_code: "CodigoProduto".into(),
            product_name: "NomeProduto".into(),
            transaction_type: "Tipo".into(),
            quantity: "QuantidadeItens".into(),
            amount: "ValorPraticado".into(),
            channel: "MeioCaptacao".into(),
        }
    }
}

impl SalesColumns {
    pub fn required(&self) -> [&str; 9] {
        [
            &self.sector,
            &self.reseller_name,
            &self.reseller_code,
            &self.cycle,
            &self.product_code,
            &self.product_name,
            &self.transaction_type,
            &self.quantity,
            &self.amount,
        ]
    }
}

// ---------------------------------------------------------------------------
// Brands
// ---------------------------------------------------------------------------

/// Known brand names and upper-cased aliases mapping to them.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BrandConfig {
    pub known: Vec<String>,
    pub aliases: BTreeMap<String, String>,
}

impl Default for BrandConfig {
    fn default() -> Self {
        let aliases = [
            ("QDB", "Quem Disse Berenice"),
            ("QUEM DISSE BERENICE", "Quem Disse Berenice"),
            ("OBOTICARIO", "oBoticario"),
            ("OBOTICÁRIO", "oBoticario"),
            ("O BOTICARIO", "oBoticario"),
            ("BOTICARIO", "oBoticario"),
            ("EUDORA", "Eudora"),
            ("AUAMIGOS", "AuAmigos"),
            ("AU AMIGOS", "AuAmigos"),
            ("OUI", "O.U.I"),
            ("O.U.I", "O.U.I"),
        ];
        Self {
            known: ["oBoticario", "Eudora", "AuAmigos", "Quem Disse Berenice", "O.U.I"]
                .into_iter()
                .map(String::from)
                .collect(),
            aliases: aliases
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl BrandConfig {
    /// Whether a canonical brand belongs to the expected set (case-insensitive).
    pub fn is_recognized(&self, brand: &str) -> bool {
        let upper = brand.to_uppercase();
        self.known.iter().any(|k| k.to_uppercase() == upper) || self.aliases.contains_key(&upper)
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Direct lookup of the normalized code.
    Exact,
    /// A 4-digit code retried with one leading zero.
    ZeroPad,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MatchingConfig {
    /// Evaluated in order; the first strategy that hits wins.
    pub strategies: Vec<MatchStrategy>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strategies: vec![MatchStrategy::Exact, MatchStrategy::ZeroPad],
        }
    }
}

// ---------------------------------------------------------------------------
// Audit + Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AuditConfig {
    /// Unmatched share of sale rows above which a warning is raised.
    pub unmatched_alert_ratio: f64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            unmatched_alert_ratio: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReportConfig {
    pub top_sectors: usize,
    pub brand_combinations: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_sectors: 5,
            brand_combinations: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl CirclesConfig {
    pub fn from_toml(input: &str) -> Result<Self, CirclesError> {
        let config: CirclesConfig =
            toml::from_str(input).map_err(|e| CirclesError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CirclesError> {
        if self.sales.sale_type.trim().is_empty() {
            return Err(CirclesError::ConfigValidation(
                "sales.sale_type must be non-empty".into(),
            ));
        }

        let catalog_cols = self.catalog.columns.required();
        let mut sales_cols = self.sales.columns.required().to_vec();
        sales_cols.push(&self.sales.columns.channel);
        for (table, cols) in [("catalog", catalog_cols.to_vec()), ("sales", sales_cols)] {
            let mut seen = HashSet::new();
            for col in cols {
                if col.trim().is_empty() {
                    return Err(CirclesError::ConfigValidation(format!(
                        "{table}.columns: column names must be non-empty"
                    )));
                }
                if !seen.insert(col) {
                    return Err(CirclesError::ConfigValidation(format!(
                        "{table}.columns: column '{col}' mapped twice"
                    )));
                }
            }
        }

        if self.matching.strategies.is_empty() {
            return Err(CirclesError::ConfigValidation(
                "matching.strategies must list at least one strategy".into(),
            ));
        }
        if self.matching.strategies[0] != MatchStrategy::Exact {
            return Err(CirclesError::ConfigValidation(
                "matching.strategies must start with \"exact\"; fallbacks only follow an exact miss"
                    .into(),
            ));
        }
        let mut seen = HashSet::new();
        for s in &self.matching.strategies {
            if !seen.insert(s) {
                return Err(CirclesError::ConfigValidation(format!(
                    "matching.strategies: {s:?} listed twice"
                )));
            }
        }

        let ratio = self.audit.unmatched_alert_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(CirclesError::ConfigValidation(format!(
                "audit.unmatched_alert_ratio must be between 0 and 1, got {ratio}"
            )));
        }

        for (alias, target) in &self.brands.aliases {
            if *alias != alias.to_uppercase() {
                return Err(CirclesError::ConfigValidation(format!(
                    "brands.aliases: key '{alias}' must be upper-case"
                )));
            }
            if target.trim().is_empty() {
                return Err(CirclesError::ConfigValidation(format!(
                    "brands.aliases: '{alias}' maps to an empty brand"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
