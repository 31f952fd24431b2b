use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No header line to work from.
    #[error("{} is empty", path.display())]
    EmptyInput { path: PathBuf },

    #[error("CSV error: {0}")]
    Csv(String),
}

impl From<csv::Error> for IoError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}
