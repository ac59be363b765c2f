pub mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod server;
pub mod storage;
mod utils;


pub use api::Mode;
pub use config::{
    AccountConfig, Config, GoogleConfig, PlaidConfig, ServerConfig, SheetsConfig, StorageConfig,
};
pub use error::{Error, ErrorType, IntoResult, Result};
