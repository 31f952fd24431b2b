// CSV decoding and delimiter detection

use std::path::Path;

use crate::error::IoError;

/// Decoded table text plus what was detected about it.
#[derive(Debug, Clone)]
pub struct CsvText {
    pub text: String,
    pub delimiter: u8,
    pub encoding: &'static str,
}

/// Read a CSV file, decode it and sniff its delimiter.
pub fn read_table(path: &Path) -> Result<CsvText, IoError> {
    let bytes = std::fs::read(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, encoding) = decode_bytes(bytes);
    if text.trim().is_empty() {
        return Err(IoError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    let delimiter = sniff_delimiter(&text);
    log::debug!(
        "{}: {encoding}, delimiter {:?}",
        path.display(),
        delimiter as char
    );
    Ok(CsvText {
        text,
        delimiter,
        encoding,
    })
}

/// UTF-8 (BOM stripped) when valid, otherwise Windows-1252, which is what
/// spreadsheet exports on Brazilian Windows machines produce.
pub fn decode_bytes(bytes: Vec<u8>) -> (String, &'static str) {
    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => match s.strip_prefix('\u{feff}') {
            Some(rest) => (rest.to_string(), "utf-8-sig"),
            None => (s, "utf-8"),
        },
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            (decoded.into_owned(), "windows-1252")
        }
    }
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| field_count(line, delim))
            .collect();

        // Header must split for the candidate to be viable
        let target = counts[0];
        if target <= 1 {
            continue;
        }

        // More columns breaks ties between equally consistent candidates
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

fn field_count(line: &str, delimiter: u8) -> usize {
    ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map(|r| r.len())
        .unwrap_or(1)
}
