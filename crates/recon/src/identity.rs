use crate::model::{ClientKey, SalesRow};

/// Stable client identity for a sales row. A non-blank reseller code always
/// wins, so rows sharing a code are one client even when the name or sector
/// differs.
pub fn resolve_client(row: &SalesRow) -> ClientKey {
    match row.reseller_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => ClientKey::Code(code.to_string()),
        _ => ClientKey::NameSector {
            name: row.reseller_name.trim().to_string(),
            sector: row.sector.trim().to_string(),
        },
    }
}
