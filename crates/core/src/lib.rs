pub mod action;
pub mod config;
pub mod controller;
pub mod error;
pub mod logger;
pub mod matcher;
pub mod oracle;
pub mod platform;
pub mod runner;
pub mod settings;
pub mod sleep;
pub mod step;
pub mod types;

pub use error::{Error, Result};
