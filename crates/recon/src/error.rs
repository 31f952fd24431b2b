use thiserror::Error;

use crate::model::Table;

#[derive(Debug, Error)]
pub enum CirclesError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (empty column name, bad strategy list, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// One or more required columns absent from an input table.
    #[error("{table}: missing required column(s): {}", columns.join(", "))]
    MissingColumns { table: Table, columns: Vec<String> },

    /// Malformed CSV structure (unreadable header, broken quoting).
    /// `message` is the csv crate's own text, which already says "CSV error".
    #[error("{table}: {message}")]
    Csv { table: Table, message: String },
}

impl CirclesError {
    pub(crate) fn csv(table: Table, err: &csv::Error) -> Self {
        Self::Csv {
            table,
            message: err.to_string(),
        }
    }
}
