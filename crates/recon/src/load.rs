use crate::config::{CatalogColumns, SalesColumns};
use crate::error::CirclesError;
use crate::model::{CatalogRow, RunWarning, SalesRow, Table};

/// Row-level warnings kept per table before the rest are only counted.
pub const MAX_ROW_WARNINGS: usize = 100;

/// Parse the product table from decoded CSV text. Rows whose field count
/// differs from the header are skipped with a warning.
pub fn load_catalog_csv(
    csv_data: &str,
    delimiter: u8,
    columns: &CatalogColumns,
) -> Result<(Vec<CatalogRow>, Vec<RunWarning>), CirclesError> {
    let mut reader = reader(csv_data, delimiter);
    let headers = read_headers(&mut reader, Table::Catalog)?;
    let [sku_idx, name_idx, brand_idx] = resolve_columns(&headers, Table::Catalog, columns.required())?;

    let mut malformed = MalformedLog::new(Table::Catalog);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CirclesError::csv(Table::Catalog, &e))?;
        let line = line_of(&record);
        if record.len() != headers.len() {
            malformed.push_row(line, record.len(), headers.len());
            continue;
        }
        let field = |i: usize| record.get(i).unwrap_or("");
        rows.push(CatalogRow {
            line,
            sku: field(sku_idx).to_string(),
            name: field(name_idx).trim().to_string(),
            brand: field(brand_idx).trim().to_string(),
        });
    }

    log::debug!("catalog: {} rows read", rows.len());
    Ok((rows, malformed.finish()))
}

/// Parse the transaction table from decoded CSV text. Unparseable numbers
/// become zero and ragged rows are skipped, each with a warning; neither
/// aborts the load.
pub fn load_sales_csv(
    csv_data: &str,
    delimiter: u8,
    columns: &SalesColumns,
) -> Result<(Vec<SalesRow>, Vec<RunWarning>), CirclesError> {
    let mut reader = reader(csv_data, delimiter);
    let headers = read_headers(&mut reader, Table::Sales)?;
    let [sector_idx, name_idx, code_idx, cycle_idx, product_idx, product_name_idx, type_idx, qty_idx, amount_idx] =
        resolve_columns(&headers, Table::Sales, columns.required())?;

    let mut warnings = Vec::new();
    let channel_idx = headers.iter().position(|h| *h == columns.channel);
    if channel_idx.is_none() {
        warnings.push(RunWarning::MissingOptionalColumn {
            table: Table::Sales,
            column: columns.channel.clone(),
        });
    }

    let mut malformed = MalformedLog::new(Table::Sales);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CirclesError::csv(Table::Sales, &e))?;
        let line = line_of(&record);
        if record.len() != headers.len() {
            malformed.push_row(line, record.len(), headers.len());
            continue;
        }
        let field = |i: usize| record.get(i).unwrap_or("");

        let quantity = match parse_quantity(field(qty_idx)) {
            Some(q) => q,
            None => {
                malformed.push(line, &columns.quantity, field(qty_idx));
                0
            }
        };
        let amount_cents = match parse_amount_cents(field(amount_idx)) {
            Some(a) => a,
            None => {
                malformed.push(line, &columns.amount, field(amount_idx));
                0
            }
        };

        let code = field(code_idx).trim();
        rows.push(SalesRow {
            line,
            sector: field(sector_idx).trim().to_string(),
            reseller_name: field(name_idx).trim().to_string(),
            reseller_code: (!code.is_empty()).then(|| code.to_string()),
            cycle: field(cycle_idx).trim().to_string(),
            product_code: field(product_idx).to_string(),
            product_name: field(product_name_idx).trim().to_string(),
            transaction_type: field(type_idx).trim().to_string(),
            quantity,
            amount_cents,
            channel: channel_idx.map(|i| field(i).trim().to_string()),
        });
    }

    warnings.extend(malformed.finish());
    log::debug!("sales: {} rows read", rows.len());
    Ok((rows, warnings))
}

fn reader(csv_data: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    // Field counts are checked per record so a ragged row costs only itself
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(csv_data.as_bytes())
}

fn read_headers(reader: &mut csv::Reader<&[u8]>, table: Table) -> Result<Vec<String>, CirclesError> {
    Ok(reader
        .headers()
        .map_err(|e| CirclesError::csv(table, &e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect())
}

/// Index of every required column, or one error naming all that are absent.
fn resolve_columns<const N: usize>(
    headers: &[String],
    table: Table,
    required: [&str; N],
) -> Result<[usize; N], CirclesError> {
    let mut found = [0usize; N];
    let mut missing = Vec::new();
    for (slot, name) in found.iter_mut().zip(required) {
        match headers.iter().position(|h| h == name) {
            Some(i) => *slot = i,
            None => missing.push(name.to_string()),
        }
    }
    if missing.is_empty() {
        Ok(found)
    } else {
        Err(CirclesError::MissingColumns {
            table,
            columns: missing,
        })
    }
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Row-level warnings for one table, capped at `MAX_ROW_WARNINGS`.
struct MalformedLog {
    table: Table,
    warnings: Vec<RunWarning>,
    suppressed: usize,
}

impl MalformedLog {
    fn new(table: Table) -> Self {
        Self {
            table,
            warnings: Vec::new(),
            suppressed: 0,
        }
    }

    fn add(&mut self, warning: RunWarning) {
        if self.warnings.len() < MAX_ROW_WARNINGS {
            self.warnings.push(warning);
        } else {
            self.suppressed += 1;
        }
    }

    fn push(&mut self, line: u64, column: &str, value: &str) {
        self.add(RunWarning::MalformedNumber {
            table: self.table,
            line,
            column: column.to_string(),
            value: value.to_string(),
        });
    }

    fn push_row(&mut self, line: u64, fields: usize, expected: usize) {
        self.add(RunWarning::MalformedRow {
            table: self.table,
            line,
            fields,
            expected,
        });
    }

    fn finish(mut self) -> Vec<RunWarning> {
        if self.suppressed > 0 {
            self.warnings.push(RunWarning::SuppressedRowWarnings {
                count: self.suppressed,
            });
        }
        self.warnings
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

struct Decimal<'a> {
    negative: bool,
    whole: i64,
    frac: &'a str,
}

/// `1.234` but not `0.125` or `1234.567`.
fn is_thousands_group(s: &str, dot: usize) -> bool {
    let (int_part, group) = (&s[..dot], &s[dot + 1..]);
    (1..=3).contains(&int_part.len())
        && !int_part.starts_with('0')
        && group.len() == 3
        && int_part.bytes().chain(group.bytes()).all(|b| b.is_ascii_digit())
}

/// Split a locale-ambiguous decimal. With both `.` and `,` present the
/// rightmost one is the decimal mark; a lone separator is decimal only when
/// it occurs once. A single `.` that looks like a thousands group
/// (`1.234`, `12.500`) is a separator, matching `1.234.567` and `1.234,56`.
fn parse_decimal(raw: &str) -> Option<Decimal<'_>> {
    let (neg_outer, s) = strip_sign(raw.trim());
    let s = s.trim_start();
    let s = s.strip_prefix("R$").unwrap_or(s).trim_start();
    let (neg_inner, s) = strip_sign(s);
    if neg_outer && neg_inner {
        return None;
    }
    let s = s.trim();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let mark = match (s.rfind('.'), s.rfind(',')) {
        (Some(d), Some(c)) => Some(if d > c { d } else { c }),
        (Some(d), None) if s.matches('.').count() == 1 && !is_thousands_group(s, d) => Some(d),
        (None, Some(c)) if s.matches(',').count() == 1 => Some(c),
        _ => None,
    };

    let (int_part, frac) = match mark {
        Some(pos) => (&s[..pos], &s[pos + 1..]),
        None => (s, ""),
    };
    if let Some(pos) = mark {
        let mark_char = &s[pos..pos + 1];
        if int_part.contains(mark_char) || frac.contains(['.', ',']) {
            return None;
        }
    }

    let digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
    let whole = if digits.is_empty() {
        0
    } else {
        digits.parse().ok()?
    };

    Some(Decimal {
        negative: neg_outer || neg_inner,
        whole,
        frac,
    })
}

fn strip_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else {
        (false, s.strip_prefix('+').unwrap_or(s))
    }
}

/// Monetary value in cents. Accepts `89.90`, `89,90`, `1.234,56`,
/// `1,234.56`, an optional `R$` prefix and a sign. Extra fraction digits
/// are rounded half up.
pub fn parse_amount_cents(raw: &str) -> Option<i64> {
    let d = parse_decimal(raw)?;
    let mut frac = d.frac.bytes().map(|b| i64::from(b - b'0'));
    let tens = frac.next().unwrap_or(0);
    let units = frac.next().unwrap_or(0);
    let round_up = frac.next().is_some_and(|b| b >= 5);

    let cents = d
        .whole
        .checked_mul(100)?
        .checked_add(tens * 10 + units + i64::from(round_up))?;
    Some(if d.negative { -cents } else { cents })
}

/// Item count. Decimal input is truncated toward zero.
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let d = parse_decimal(raw)?;
    Some(if d.negative { -d.whole } else { d.whole })
}
