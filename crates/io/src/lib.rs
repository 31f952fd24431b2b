// CSV plumbing: decoding, delimiter sniffing, repair, table export

pub mod csv;
pub mod error;
pub mod export;
pub mod repair;

pub use crate::csv::{read_table, sniff_delimiter, CsvText};
pub use error::IoError;
