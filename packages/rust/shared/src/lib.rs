//! Shared types, error model, and configuration for SiteKiln.
//!
//! This crate is the foundation depended on by all other SiteKiln crates.
//! It provides:
//! - Error handling ([`SiteKilnError`])
//! - Domain types ([`ProjectLayout`], [`FileReport`])
//! - Configuration ([`SiteConfig`], config loading)
//! - File-tree helpers ([`fs`])

pub mod config;
pub mod error;
pub mod fs;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    CONFIG_FILE_NAME, PathsConfig, ServerConfig, SiteConfig, StaticFilesConfig, StylesConfig,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SiteKilnError};
pub use types::{CSS_DIR, FileReport, ProjectLayout, total_bytes};
