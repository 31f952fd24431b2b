//! `circles-recon`: catalog matching and multi-brand cycle engine.
//!
//! Pure engine crate: receives decoded CSV text or pre-loaded rows, returns
//! report tables. No filesystem or CLI dependencies.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod identity;
pub mod load;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod report;

pub use catalog::Catalog;
pub use config::CirclesConfig;
pub use engine::{client_detail, run};
pub use error::CirclesError;
pub use filter::ReportFilter;
pub use load::{load_catalog_csv, load_sales_csv};
pub use model::{CirclesInput, Reports, RunResult, RunWarning};
pub use normalize::normalize_sku;
