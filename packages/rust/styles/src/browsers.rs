//! Browser support matrix: `name >= version` queries → prefixer targets.

use lightningcss::targets::Browsers;
use tracing::debug;

use sitekiln_shared::{Result, SiteKilnError};

/// Browsers that appear in support matrices but have no prefixer target.
const UNMODELLED: &[&str] = &[
    "ie_mob", "bb", "op_mini", "op_mob", "and_chr", "and_ff", "and_uc", "and_qq", "baidu",
    "kaios",
];

/// Parse a list of `name >= version` queries into prefixer targets.
///
/// Browsers without a prefixer target are skipped. Unknown names and
/// operators other than `>=` are config errors.
pub fn parse_browsers(queries: &[String]) -> Result<Browsers> {
    let mut browsers = Browsers::default();

    for query in queries {
        let (name, version) = split_query(query)?;
        let slot = match name.as_str() {
            "ie" | "explorer" => &mut browsers.ie,
            "edge" => &mut browsers.edge,
            "ff" | "firefox" => &mut browsers.firefox,
            "chrome" => &mut browsers.chrome,
            "safari" => &mut browsers.safari,
            "opera" => &mut browsers.opera,
            "ios" | "ios_saf" => &mut browsers.ios_saf,
            "android" => &mut browsers.android,
            "samsung" => &mut browsers.samsung,
            other if UNMODELLED.contains(&other) => {
                debug!(browser = other, "no prefixer target, skipping");
                continue;
            }
            other => {
                return Err(SiteKilnError::config(format!(
                    "unknown browser '{other}' in '{query}'"
                )));
            }
        };

        // The lowest requested version wins when a browser is listed twice.
        *slot = Some(match *slot {
            Some(existing) => existing.min(version),
            None => version,
        });
    }

    Ok(browsers)
}

/// Split `"android >= 4.4"` into `("android", encoded 4.4)`.
fn split_query(query: &str) -> Result<(String, u32)> {
    let invalid = || SiteKilnError::config(format!("invalid browser query '{query}'"));

    let (name, version) = query.split_once(">=").ok_or_else(invalid)?;
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err(invalid());
    }

    let mut parts = version.trim().split('.').map(str::parse::<u32>);
    let major = parts.next().ok_or_else(invalid)?.map_err(|_| invalid())?;
    let minor = parts.next().transpose().map_err(|_| invalid())?.unwrap_or(0);
    let patch = parts.next().transpose().map_err(|_| invalid())?.unwrap_or(0);

    Ok((name, encode_version(major, minor, patch)))
}

/// Version encoding used by the prefixer: one byte per component.
fn encode_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 16) | (minor << 8) | patch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_matrix_maps_supported_browsers() {
        let config = sitekiln_shared::SiteConfig::default();
        let browsers = parse_browsers(&config.styles.browsers).expect("parse");

        assert_eq!(browsers.ie, Some(10 << 16));
        assert_eq!(browsers.firefox, Some(30 << 16));
        assert_eq!(browsers.chrome, Some(34 << 16));
        assert_eq!(browsers.safari, Some(7 << 16));
        assert_eq!(browsers.opera, Some(23 << 16));
        assert_eq!(browsers.ios_saf, Some(7 << 16));
        assert_eq!(browsers.android, Some((4 << 16) | (4 << 8)));
        assert_eq!(browsers.edge, None);
    }

    #[test]
    fn lowest_version_wins() {
        let browsers = parse_browsers(&queries(&["chrome >= 60", "chrome >= 50"])).unwrap();
        assert_eq!(browsers.chrome, Some(50 << 16));
    }

    #[test]
    fn unknown_browser_is_config_error() {
        let err = parse_browsers(&queries(&["netscape >= 4"])).unwrap_err();
        assert!(err.to_string().contains("netscape"));
    }

    #[test]
    fn unsupported_operator_is_rejected() {
        assert!(parse_browsers(&queries(&["chrome < 40"])).is_err());
        assert!(parse_browsers(&queries(&["chrome >= latest"])).is_err());
    }
}
