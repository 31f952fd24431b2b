use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::BrandConfig;
use crate::model::{CatalogRow, ProductRecord, RunWarning};
use crate::normalize::{normalize_brand, normalize_sku};

const DUPLICATE_SAMPLE: usize = 5;

/// Normalized SKU index over the product table. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: HashMap<String, ProductRecord>,
}

impl Catalog {
    /// Build the index. Rows whose SKU normalizes to empty are dropped;
    /// the first row wins when two SKUs normalize to the same value.
    pub fn from_products(rows: &[CatalogRow], brands: &BrandConfig) -> (Self, Vec<RunWarning>) {
        let mut products: HashMap<String, ProductRecord> = HashMap::with_capacity(rows.len());
        let mut empty = 0usize;
        let mut duplicates: BTreeMap<String, usize> = BTreeMap::new();

        for row in rows {
            let sku = normalize_sku(&row.sku);
            if sku.is_empty() {
                empty += 1;
                continue;
            }
            if products.contains_key(&sku) {
                *duplicates.entry(sku).or_insert(1) += 1;
                continue;
            }
            products.insert(
                sku.clone(),
                ProductRecord {
                    sku,
                    name: row.name.trim().to_string(),
                    brand: normalize_brand(&row.brand, &brands.aliases),
                },
            );
        }

        let mut warnings = Vec::new();
        if empty > 0 {
            warnings.push(RunWarning::EmptyCatalogSkus { rows: empty });
        }
        if !duplicates.is_empty() {
            warnings.push(RunWarning::DuplicateCatalogSkus {
                skus: duplicates.keys().take(DUPLICATE_SAMPLE).cloned().collect(),
                rows: duplicates.values().sum(),
            });
        }

        if !brands.known.is_empty() {
            let unrecognized: BTreeSet<&str> = products
                .values()
                .map(|p| p.brand.as_str())
                .filter(|b| !brands.is_recognized(b))
                .collect();
            for brand in unrecognized {
                warnings.push(RunWarning::UnrecognizedBrand {
                    brand: brand.to_string(),
                });
            }
        }

        (Self { products }, warnings)
    }

    pub fn get(&self, sku: &str) -> Option<&ProductRecord> {
        self.products.get(sku)
    }

    pub fn contains(&self, sku: &str) -> bool {
        self.products.contains_key(sku)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
