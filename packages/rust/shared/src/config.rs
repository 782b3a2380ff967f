//! Project configuration for SiteKiln.
//!
//! Project config lives at `<root>/sitekiln.toml` and is optional.
//! CLI flags override config file values, which override defaults.
//! The defaults reproduce the fixed constants the pipeline was designed around.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteKilnError};

/// Default configuration file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "sitekiln.toml";

// ---------------------------------------------------------------------------
// Config structs (matching sitekiln.toml schema)
// ---------------------------------------------------------------------------

/// Top-level project config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Source, staging and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Sass compilation and CSS post-processing.
    #[serde(default)]
    pub styles: StylesConfig,

    /// Static assets copied verbatim into the output tree.
    #[serde(default)]
    pub static_files: StaticFilesConfig,

    /// Development server.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[paths]` section. Relative paths are resolved against the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Author-provided sources (read-only input).
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// Transient intermediate tree.
    #[serde(default = "default_staging")]
    pub staging: PathBuf,

    /// Final deployable tree.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Top-level entries of the output tree that `clean` never deletes.
    #[serde(default = "default_preserve")]
    pub preserve: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            staging: default_staging(),
            output: default_output(),
            preserve: default_preserve(),
        }
    }
}

fn default_source() -> PathBuf {
    "src".into()
}
fn default_staging() -> PathBuf {
    ".tmp".into()
}
fn default_output() -> PathBuf {
    "dist".into()
}
fn default_preserve() -> Vec<String> {
    vec![".git".into()]
}

/// `[styles]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Extra Sass load paths, relative to the project root.
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<PathBuf>,

    /// Browser support matrix in `name >= version` form.
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            include_paths: default_include_paths(),
            browsers: default_browsers(),
        }
    }
}

fn default_include_paths() -> Vec<PathBuf> {
    vec![
        "node_modules/bootstrap/scss/".into(),
        "node_modules/froala-design-blocks/src/scss/".into(),
    ]
}

fn default_browsers() -> Vec<String> {
    [
        "ie >= 10",
        "ie_mob >= 10",
        "ff >= 30",
        "chrome >= 34",
        "safari >= 7",
        "opera >= 23",
        "ios >= 7",
        "android >= 4.4",
        "bb >= 10",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[static_files]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticFilesConfig {
    /// Top-level source files copied to the output root.
    #[serde(default = "default_static_files")]
    pub files: Vec<String>,

    /// Source subdirectory whose files are copied to the same name in the output.
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            files: default_static_files(),
            image_dir: default_image_dir(),
        }
    }
}

fn default_static_files() -> Vec<String> {
    ["favicon.ico", "manifest.json", "humans.txt", "robots.txt", "CNAME"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_image_dir() -> String {
    "img".into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Local HTTP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Delay between a rebuild finishing and the reload signal, in ms.
    #[serde(default = "default_reload_delay")]
    pub reload_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            reload_delay_ms: default_reload_delay(),
        }
    }
}

fn default_port() -> u16 {
    3000
}
fn default_reload_delay() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config file for a project root.
pub fn config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Load the project config. Returns defaults if the file does not exist.
pub fn load_config(root: &Path) -> Result<SiteConfig> {
    let path = config_file_path(root);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(SiteConfig::default());
    }

    load_config_from(&path)
}

/// Load the project config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<SiteConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteKilnError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SiteKilnError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file into the project root.
/// Refuses to overwrite an existing file. Returns the path to the created file.
pub fn init_config(root: &Path) -> Result<PathBuf> {
    let path = config_file_path(root);
    if path.exists() {
        return Err(SiteKilnError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&SiteConfig::default())
        .map_err(|e| SiteKilnError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteKilnError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = SiteConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("reload_delay_ms"));
        assert!(toml_str.contains("android >= 4.4"));
    }

    #[test]
    fn defaults_match_build_constants() {
        let config = SiteConfig::default();
        assert_eq!(config.paths.source, PathBuf::from("src"));
        assert_eq!(config.paths.staging, PathBuf::from(".tmp"));
        assert_eq!(config.paths.output, PathBuf::from("dist"));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.styles.browsers.len(), 9);
        assert!(config.static_files.files.contains(&"CNAME".to_string()));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let toml_str = r#"
[server]
port = 8080

[paths]
output = "public"
"#;
        let config: SiteConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.reload_delay_ms, 1000);
        assert_eq!(config.paths.output, PathBuf::from("public"));
        assert_eq!(config.paths.staging, PathBuf::from(".tmp"));
        assert_eq!(config.static_files.image_dir, "img");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(dir.path()).expect("load");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn init_writes_then_refuses_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = init_config(dir.path()).expect("init");
        assert!(path.exists());

        let loaded = load_config_from(&path).expect("reload");
        assert_eq!(loaded.paths.preserve, vec![".git".to_string()]);

        let err = init_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").expect("write");
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("config error"));
    }
}
