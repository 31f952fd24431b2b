//! Repair of broken CSV exports.
//!
//! Some sales platforms split one record over several physical lines, the
//! continuation lines starting with the separator, and leave unquoted
//! separators inside product names. Repair works on raw lines, rebuilding
//! split records and forcing every record to the header's column count.

use serde::Serialize;

use crate::csv::decode_bytes;
use crate::error::IoError;

/// Column that absorbs surplus fields by default.
pub const DEFAULT_TARGET_COLUMN: &str = "NomeProduto";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FixAction {
    JoinedContinuationLines { joined_lines: usize },
    MergedExtraColumns {
        column: String,
        original_columns: usize,
        final_columns: usize,
    },
    PaddedMissingColumns {
        original_columns: usize,
        final_columns: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fix {
    /// 1-based physical lines the record spanned.
    pub line_start: usize,
    pub line_end: usize,
    #[serde(flatten)]
    pub action: FixAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixStats {
    pub original_lines: usize,
    pub records_emitted: usize,
    pub joined_records: usize,
    pub fixed_extra_columns: usize,
    pub fixed_missing_columns: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixReport {
    pub encoding: String,
    pub separator: String,
    pub expected_columns: usize,
    pub header: Vec<String>,
    pub target_column: String,
    pub fixes: Vec<Fix>,
    pub stats: FixStats,
}

impl FixReport {
    pub fn changed(&self) -> bool {
        !self.fixes.is_empty()
    }
}

/// Rebuild a broken CSV. Returns UTF-8 text (no BOM) with the detected
/// separator, and a report of every change.
///
/// Surplus fields are merged back into `target_column` (the first column
/// when absent); short records are padded with empty fields.
pub fn fix_broken_csv(
    raw: Vec<u8>,
    target_column: &str,
    separator: Option<u8>,
) -> Result<(String, FixReport), IoError> {
    let (text, encoding) = decode_bytes(raw);
    let lines: Vec<&str> = text.lines().collect();
    let Some(header_line) = lines.first() else {
        return Err(IoError::Csv("input has no header line".into()));
    };

    let sep = separator.unwrap_or_else(|| header_separator(header_line));
    let sep_str = (sep as char).to_string();
    let header: Vec<String> = split_naive(header_line, &sep_str)
        .into_iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let expected = header.len();
    if expected < 2 {
        return Err(IoError::Csv(format!(
            "header has a single column with separator {:?}",
            sep as char
        )));
    }
    let target_idx = header.iter().position(|h| h == target_column).unwrap_or(0);

    let mut report = FixReport {
        encoding: encoding.to_string(),
        separator: sep_str.clone(),
        expected_columns: expected,
        header: header.clone(),
        target_column: header[target_idx].clone(),
        fixes: Vec::new(),
        stats: FixStats {
            original_lines: lines.len(),
            ..Default::default()
        },
    };

    let mut writer = ::csv::WriterBuilder::new()
        .delimiter(sep)
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&header)?;

    let mut i = 1;
    while i < lines.len() {
        let line_start = i + 1;
        let mut buf = lines[i].to_string();
        let mut parts = split_naive(&buf, &sep_str);

        let mut joined = 0;
        while parts.len() < expected && i + 1 < lines.len() && lines[i + 1].starts_with(&sep_str) {
            buf.push_str(lines[i + 1]);
            i += 1;
            joined += 1;
            parts = split_naive(&buf, &sep_str);
        }
        let line_end = i + 1;

        if joined > 0 {
            report.stats.joined_records += 1;
            report.fixes.push(Fix {
                line_start,
                line_end,
                action: FixAction::JoinedContinuationLines { joined_lines: joined },
            });
        }

        let original = parts.len();
        let record: Vec<String> = if original > expected {
            let extra = original - expected;
            let mut fixed: Vec<String> = parts[..target_idx].iter().map(|s| s.to_string()).collect();
            fixed.push(parts[target_idx..=target_idx + extra].join(sep_str.as_str()));
            fixed.extend(parts[target_idx + extra + 1..].iter().map(|s| s.to_string()));
            report.stats.fixed_extra_columns += 1;
            report.fixes.push(Fix {
                line_start,
                line_end,
                action: FixAction::MergedExtraColumns {
                    column: header[target_idx].clone(),
                    original_columns: original,
                    final_columns: fixed.len(),
                },
            });
            fixed
        } else if original < expected {
            let mut fixed: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
            fixed.resize(expected, String::new());
            report.stats.fixed_missing_columns += 1;
            report.fixes.push(Fix {
                line_start,
                line_end,
                action: FixAction::PaddedMissingColumns {
                    original_columns: original,
                    final_columns: expected,
                },
            });
            fixed
        } else {
            if joined == 0 {
                report.stats.unchanged += 1;
            }
            parts.iter().map(|s| s.to_string()).collect()
        };

        writer.write_record(&record)?;
        report.stats.records_emitted += 1;
        i += 1;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| IoError::Csv(e.error().to_string()))?;
    // Every field came from UTF-8 text
    let output = String::from_utf8(bytes).map_err(|e| IoError::Csv(e.to_string()))?;

    log::debug!(
        "repair: {} records, {} joined, {} merged, {} padded",
        report.stats.records_emitted,
        report.stats.joined_records,
        report.stats.fixed_extra_columns,
        report.stats.fixed_missing_columns
    );
    Ok((output, report))
}

/// Separator occurring most often in the header, ties going to `|`, `;`,
/// `,` then tab. Falls back to comma.
fn header_separator(header: &str) -> u8 {
    let mut best = (b',', 0usize);
    for sep in [b'|', b';', b',', b'\t'] {
        let count = header.bytes().filter(|&b| b == sep).count();
        if count > best.1 {
            best = (sep, count);
        }
    }
    best.0
}

/// Split without honoring quotes: broken exports do not quote consistently.
fn split_naive<'a>(line: &'a str, sep: &str) -> Vec<&'a str> {
    line.trim_end_matches(['\r', '\n']).split(sep).collect()
}
