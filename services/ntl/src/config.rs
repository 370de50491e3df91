//! Configuration for the ntl CLI.
//!
//! Layering, lowest to highest precedence:
//! - built-in defaults
//! - YAML file (`--config`), with `${VAR}` / `${VAR:-default}` expansion
//! - `NTL_*` environment variables (see [`CompositeConfig::apply_env`])
//! - command-line flags

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use catalog::GLOBAL_NIGHTLIGHT_URL;
use composite::CompositeConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NtlConfig {
    /// Scene catalog CSV.
    pub catalog: Option<PathBuf>,
    pub composite: CompositeConfig,
    pub s3: S3Config,
    pub stac: StacConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "globalnightlight".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StacConfig {
    /// Base URL asset hrefs are built from.
    pub base_url: String,
}

impl Default for StacConfig {
    fn default() -> Self {
        Self {
            base_url: GLOBAL_NIGHTLIGHT_URL.to_string(),
        }
    }
}

impl NtlConfig {
    /// Load from an optional YAML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };

        if let Ok(val) = std::env::var("NTL_CATALOG") {
            config.catalog = Some(PathBuf::from(val));
        }
        config.composite.apply_env();

        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        Ok(serde_yaml::from_str(&expanded)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.composite.validate().map_err(anyhow::Error::msg)?;
        anyhow::ensure!(!self.s3.bucket.is_empty(), "s3.bucket cannot be empty");
        anyhow::ensure!(!self.s3.region.is_empty(), "s3.region cannot be empty");
        Ok(())
    }

    /// Catalog path from the flag, falling back to the configured one.
    pub fn catalog_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        flag.map(Path::to_path_buf)
            .or_else(|| self.catalog.clone())
            .context("No catalog given: pass --catalog or set `catalog` / NTL_CATALOG")
    }
}

/// Expand `${VAR}` and `${VAR:-default}` references.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("Unclosed variable substitution: ${{{}", after))?;
        result.push_str(&resolve_var_expr(&after[..end])?);
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    match expr.split_once(":-") {
        Some((name, default)) => match std::env::var(name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        },
        None => std::env::var(expr.trim())
            .with_context(|| format!("Environment variable {} not set", expr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composite::SourceFailurePolicy;

    #[test]
    fn test_expand_env_vars_simple() {
        std::env::set_var("NTL_TEST_EXPAND", "value");
        let result = expand_env_vars("a_${NTL_TEST_EXPAND}_b").unwrap();
        assert_eq!(result, "a_value_b");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("NTL_TEST_UNSET");
        let result = expand_env_vars("x: ${NTL_TEST_UNSET:-fallback}").unwrap();
        assert_eq!(result, "x: fallback");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        std::env::remove_var("NTL_TEST_REQUIRED");
        assert!(expand_env_vars("${NTL_TEST_REQUIRED}").is_err());
        assert!(expand_env_vars("${UNCLOSED").is_err());
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = NtlConfig::from_yaml_str(
            r#"
catalog: data/viirs.csv
composite:
  concurrency: 8
  failure_policy: skip
s3:
  bucket: my-bucket
"#,
        )
        .unwrap();

        assert_eq!(config.catalog, Some(PathBuf::from("data/viirs.csv")));
        assert_eq!(config.composite.concurrency, 8);
        assert_eq!(config.composite.failure_policy, SourceFailurePolicy::Skip);
        assert_eq!(config.composite.max_retries, 3);
        assert_eq!(config.s3.bucket, "my-bucket");
        assert_eq!(config.s3.region, "us-east-1");
        assert_eq!(config.stac.base_url, GLOBAL_NIGHTLIGHT_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/ntl.yaml");
        let config = NtlConfig::from_yaml_file(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.s3.bucket, "globalnightlight");
    }

    #[test]
    fn test_invalid_composite_section_rejected() {
        let config = NtlConfig::from_yaml_str("composite:\n  concurrency: 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_catalog_flag_wins() {
        let config = NtlConfig {
            catalog: Some(PathBuf::from("from_config.csv")),
            ..Default::default()
        };
        assert_eq!(
            config.catalog_path(Some(Path::new("flag.csv"))).unwrap(),
            PathBuf::from("flag.csv")
        );
        assert_eq!(config.catalog_path(None).unwrap(), PathBuf::from("from_config.csv"));
        assert!(NtlConfig::default().catalog_path(None).is_err());
    }
}
