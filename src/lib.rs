pub mod batch;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod embed;
pub mod error;
pub mod manifest;
pub mod memory;
pub mod queue;
pub mod store;
pub mod table;
pub mod utils;
pub mod vectorizer;

pub use config::Opts;
pub use error::{Error, Result};
