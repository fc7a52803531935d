pub mod api;
pub mod config;
pub mod error;
pub mod registry;
pub mod scraper;

pub use error::{Result, ScrapeError};
pub use config::Config;
pub use registry::CapabilityRegistry;
pub use scraper::ModuleCatalog;
