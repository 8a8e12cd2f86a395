use std::time::Duration;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

static APP_NAME: &str = "classifieds-suite";
static DEFAULT_CONFIG: Lazy<SuiteConfig> = Lazy::new(SuiteConfig::default);

pub const ENV_PREFIX: &str = "CLASSIFIEDS_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sellers: SellerRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path segment after `/api/`. Numeric values from env or TOML are accepted.
    #[serde(default = "default_version", deserialize_with = "version_segment")]
    pub version: String,
    /// Overall per-request timeout. Unset leaves the HTTP client default in place.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: default_version(),
            timeout_secs: None,
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// `{base_url}/api/{version}`
    pub fn api_root(&self) -> String {
        format!(
            "{}/api/{}",
            self.base_url.trim_end_matches('/'),
            self.version
        )
    }
}

/// Inclusive range test seller ids are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerRange {
    #[serde(default = "default_seller_min")]
    pub min: i64,
    #[serde(default = "default_seller_max")]
    pub max: i64,
}

impl SellerRange {
    pub fn validate(&self) -> Result<()> {
        if self.min > self.max {
            bail!(
                "sellers.min ({}) must not exceed sellers.max ({})",
                self.min,
                self.max
            );
        }
        Ok(())
    }
}

impl Default for SellerRange {
    fn default() -> Self {
        Self {
            min: default_seller_min(),
            max: default_seller_max(),
        }
    }
}

fn default_base_url() -> String {
    "https://qa-internship.avito.com".into()
}

fn default_version() -> String {
    "1".into()
}

fn version_segment<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Segment {
        Text(String),
        Number(u64),
    }

    Ok(match Segment::deserialize(deserializer)? {
        Segment::Text(text) => text,
        Segment::Number(number) => number.to_string(),
    })
}

fn default_seller_min() -> i64 {
    111_111
}

fn default_seller_max() -> i64 {
    999_999
}

/// Defaults, then a TOML file, then `CLASSIFIEDS_*` environment overrides
/// (`CLASSIFIEDS_API__BASE_URL=...`).
pub fn load_config(explicit_path: Option<&Utf8Path>) -> Result<SuiteConfig> {
    let mut figment = Figment::from(Serialized::defaults(DEFAULT_CONFIG.clone()));

    if let Some(path) = explicit_path {
        figment = figment.merge(Toml::file(path));
    } else if let Some(path) = resolve_default_config_path() {
        debug!(%path, "using config file");
        figment = figment.merge(Toml::file(path));
    } else {
        debug!("no config file found; relying on defaults + env overrides");
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: SuiteConfig = figment
        .extract()
        .context("failed to load classifieds-suite configuration")?;
    config.sellers.validate()?;
    Ok(config)
}

pub fn workspace_root() -> &'static Utf8Path {
    static ROOT: Lazy<Utf8PathBuf> = Lazy::new(|| {
        let manifest_dir = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        manifest_dir
            .parent()
            .and_then(|p| p.parent())
            .map(Utf8PathBuf::from)
            .unwrap_or(manifest_dir)
    });
    ROOT.as_path()
}

fn resolve_default_config_path() -> Option<Utf8PathBuf> {
    let repo_relative = workspace_root().join("config/suite.toml");
    if repo_relative.exists() {
        return Some(repo_relative);
    }

    if let Some(dirs) = ProjectDirs::from("com", "Classifieds", APP_NAME)
        && let Ok(path) = Utf8PathBuf::from_path_buf(dirs.config_dir().join("config.toml"))
        && path.exists()
    {
        return Some(path);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_public_deployment() {
        let config = SuiteConfig::default();
        assert_eq!(config.api.base_url, "https://qa-internship.avito.com");
        assert_eq!(config.api.version, "1");
        assert_eq!(config.api.timeout(), None);
        assert_eq!(config.sellers, SellerRange { min: 111_111, max: 999_999 });
    }

    #[test]
    fn api_root_trims_trailing_slash() {
        let api = ApiConfig::with_base_url("http://127.0.0.1:8080/");
        assert_eq!(api.api_root(), "http://127.0.0.1:8080/api/1");
    }

    #[test]
    fn toml_then_env_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "suite.toml",
                r#"
                [api]
                base_url = "http://toml.local"
                timeout_secs = 5

                [sellers]
                min = 200000
                "#,
            )?;
            jail.set_env("CLASSIFIEDS_API__VERSION", "2");

            let path = Utf8PathBuf::from("suite.toml");
            let config = load_config(Some(path.as_path())).map_err(|err| err.to_string())?;

            assert_eq!(config.api.base_url, "http://toml.local");
            assert_eq!(config.api.version, "2");
            assert_eq!(config.api.timeout(), Some(Duration::from_secs(5)));
            assert_eq!(config.sellers.min, 200_000);
            assert_eq!(config.sellers.max, 999_999);
            Ok(())
        });
    }

    #[test]
    fn numeric_version_from_env_is_kept_as_segment() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CLASSIFIEDS_API__VERSION", "2");
            jail.set_env("CLASSIFIEDS_API__BASE_URL", "http://env.local");

            let config = load_config(None).map_err(|err| err.to_string())?;

            assert_eq!(config.api.version, "2");
            assert_eq!(config.api.api_root(), "http://env.local/api/2");
            Ok(())
        });
    }

    #[test]
    fn inverted_seller_range_is_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "suite.toml",
                r#"
                [sellers]
                min = 999999
                max = 111111
                "#,
            )?;

            let path = Utf8PathBuf::from("suite.toml");
            let err = load_config(Some(path.as_path())).expect_err("inverted range must fail");
            assert!(
                err.to_string().contains("sellers.min (999999) must not exceed sellers.max (111111)"),
                "{err}"
            );
            Ok(())
        });
    }

    #[test]
    fn env_can_invert_the_range_too() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CLASSIFIEDS_SELLERS__MIN", "500000");
            jail.set_env("CLASSIFIEDS_SELLERS__MAX", "400000");
            assert!(load_config(None).is_err());
            Ok(())
        });
    }
}
