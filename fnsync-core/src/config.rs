// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML manifest parser with strict schema validation.
//!
//! Turns a manifest into validated [`DesiredState`]s. The platform address is
//! resolved once here (manifest value, else `FNSYNC_ADDRESS`) and carried
//! explicitly in every desired state from then on.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{FnsyncError, FnsyncResult, HardValidationError};
use crate::types::{DesiredState, Environment, FunctionName, PlatformAddress, ThreadCount};

/// Environment variable consulted when the manifest has no platform address.
pub const ADDRESS_ENV: &str = "FNSYNC_ADDRESS";

/// Upper bound for the per-request deadline (10 minutes).
const MAX_REQUEST_TIMEOUT_MS: u64 = 600_000;

/// Raw platform section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlatformConfig {
    #[serde(default)]
    address: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for RawPlatformConfig {
    fn default() -> Self {
        Self {
            address: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Raw function resource.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFunctionConfig {
    name: String,
    tarball_path: String,
    num_threads: i64,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    environment: Option<Environment>,
}

/// Raw root manifest.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    platform: RawPlatformConfig,
    #[serde(default)]
    functions: BTreeMap<String, RawFunctionConfig>,
}

/// Validated platform settings.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Default address for functions without their own.
    pub address: Option<PlatformAddress>,
    pub request_timeout: Duration,
}

/// One validated function resource.
#[derive(Debug, Clone)]
pub struct FunctionConfig {
    /// Resource key under which the handle is persisted.
    pub key: String,
    pub desired: DesiredState,
}

/// Complete validated manifest.
#[derive(Debug, Clone)]
pub struct Config {
    pub platform: PlatformConfig,
    /// Ordered by resource key.
    pub functions: Vec<FunctionConfig>,
}

impl Config {
    pub fn function(&self, key: &str) -> Option<&FunctionConfig> {
        self.functions.iter().find(|f| f.key == key)
    }

    /// Every distinct address the manifest deploys to.
    pub fn addresses(&self) -> Vec<PlatformAddress> {
        let mut addresses: Vec<PlatformAddress> = self
            .functions
            .iter()
            .map(|f| f.desired.address.clone())
            .chain(self.platform.address.clone())
            .collect();
        addresses.sort();
        addresses.dedup();
        addresses
    }
}

/// External inputs to manifest resolution.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Fallback address, normally read from [`ADDRESS_ENV`].
    pub fallback_address: Option<String>,
    /// Directory relative tarball paths are resolved against.
    pub base_dir: Option<PathBuf>,
}

/// Manifest loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a manifest file.
    ///
    /// Relative tarball paths resolve against the manifest's directory and the
    /// address falls back to `FNSYNC_ADDRESS`.
    pub fn load_file(path: impl AsRef<Path>) -> FnsyncResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(FnsyncError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FnsyncError::Io {
            context: "reading manifest",
            source: e,
        })?;

        let options = LoadOptions {
            fallback_address: std::env::var(ADDRESS_ENV).ok().filter(|a| !a.is_empty()),
            base_dir: path.parent().map(Path::to_path_buf),
        };

        Self::load_str_with(&content, &options)
    }

    /// Load and validate a manifest from a YAML string, with no fallbacks.
    pub fn load_string(content: &str) -> FnsyncResult<Config> {
        Self::load_str_with(content, &LoadOptions::default())
    }

    /// Load and validate a manifest from a YAML string.
    pub fn load_str_with(content: &str, options: &LoadOptions) -> FnsyncResult<Config> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| FnsyncError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw, options)
    }

    fn validate(raw: RawConfig, options: &LoadOptions) -> FnsyncResult<Config> {
        let platform = Self::validate_platform(raw.platform, options)?;

        if raw.functions.is_empty() {
            return Err(HardValidationError::SchemaValidation {
                message: "At least one function must be defined".to_string(),
            }
            .into());
        }

        let mut functions = Vec::with_capacity(raw.functions.len());
        let mut seen: HashMap<(PlatformAddress, FunctionName), String> = HashMap::new();

        for (key, raw_func) in raw.functions {
            let func = Self::validate_function(key, raw_func, &platform, options)?;

            // Two resources sharing a name on one platform would clobber each other.
            let slot = (func.desired.address.clone(), func.desired.name.clone());
            if let Some(first) = seen.insert(slot, func.key.clone()) {
                return Err(HardValidationError::DuplicateFunctionName {
                    name: func.desired.name.to_string(),
                    address: func.desired.address.to_string(),
                    first,
                    second: func.key,
                }
                .into());
            }

            functions.push(func);
        }

        Ok(Config {
            platform,
            functions,
        })
    }

    fn validate_platform(
        raw: RawPlatformConfig,
        options: &LoadOptions,
    ) -> FnsyncResult<PlatformConfig> {
        if raw.request_timeout_ms == 0 || raw.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(HardValidationError::InvalidFieldValue {
                field: "request_timeout_ms",
                value: raw.request_timeout_ms.to_string(),
                reason: format!("Must be between 1 and {}", MAX_REQUEST_TIMEOUT_MS),
            }
            .into());
        }

        let address = raw
            .address
            .or_else(|| options.fallback_address.clone())
            .map(PlatformAddress::new)
            .transpose()?;

        Ok(PlatformConfig {
            address,
            request_timeout: Duration::from_millis(raw.request_timeout_ms),
        })
    }

    fn validate_function(
        key: String,
        raw: RawFunctionConfig,
        platform: &PlatformConfig,
        options: &LoadOptions,
    ) -> FnsyncResult<FunctionConfig> {
        let context = format!("resource '{}'", key);

        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "resource key",
                value: key,
                reason: "Resource keys must be non-empty and contain no whitespace".to_string(),
            }
            .into());
        }

        let name = FunctionName::new(raw.name)?;

        let address = match raw.address {
            Some(address) => PlatformAddress::new(address)?,
            None => platform.address.clone().ok_or_else(|| {
                HardValidationError::MissingRequiredField {
                    field: "address",
                    context: format!("{} (set platform.address or {})", context, ADDRESS_ENV),
                }
            })?,
        };

        let thread_count = u32::try_from(raw.num_threads)
            .map_err(|_| HardValidationError::InvalidFieldValue {
                field: "num_threads",
                value: raw.num_threads.to_string(),
                reason: "Thread count must be a positive 32-bit integer".to_string(),
            })
            .and_then(ThreadCount::new)?;

        if raw.tarball_path.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "tarball_path",
                context,
            }
            .into());
        }

        let mut artifact_path = PathBuf::from(&raw.tarball_path);
        if artifact_path.is_relative() {
            if let Some(base) = &options.base_dir {
                artifact_path = base.join(artifact_path);
            }
        }

        if let Some(environment) = &raw.environment {
            if environment.keys().any(|k| k.is_empty()) {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "environment",
                    value: format!("empty key in {}", context),
                    reason: "Environment variable names cannot be empty".to_string(),
                }
                .into());
            }
        }

        let mut desired = DesiredState::new(address, name, artifact_path, thread_count);
        if let Some(environment) = raw.environment {
            desired = desired.with_environment(environment);
        }

        Ok(FunctionConfig { key, desired })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
platform:
  address: 10.0.0.5
  request_timeout_ms: 5000

functions:
  greet:
    name: greet
    tarball_path: /srv/functions/greet.tar.gz
    num_threads: 4
    environment:
      GREETING: hello
      RETRIES: 3
  resize:
    name: resize
    tarball_path: resize.tar.gz
    num_threads: 2
    address: 10.0.0.6
"#;

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.functions.len(), 2);
        assert_eq!(config.platform.request_timeout, Duration::from_millis(5000));

        let greet = config.function("greet").unwrap();
        assert_eq!(greet.desired.address.as_str(), "10.0.0.5");
        assert_eq!(greet.desired.thread_count.value(), 4);
        let env = greet.desired.environment.as_ref().unwrap();
        assert_eq!(env["GREETING"], serde_json::json!("hello"));
        assert_eq!(env["RETRIES"], serde_json::json!(3));

        let resize = config.function("resize").unwrap();
        assert_eq!(resize.desired.address.as_str(), "10.0.0.6");
        assert!(resize.desired.environment.is_none());
        assert_eq!(config.addresses().len(), 2);
    }

    #[test]
    fn test_relative_path_resolution() {
        let options = LoadOptions {
            fallback_address: None,
            base_dir: Some(PathBuf::from("/srv/manifests")),
        };
        let config = ConfigLoader::load_str_with(VALID_CONFIG, &options).unwrap();
        let resize = config.function("resize").unwrap();
        assert_eq!(
            resize.desired.artifact_path,
            PathBuf::from("/srv/manifests/resize.tar.gz")
        );
        let greet = config.function("greet").unwrap();
        assert_eq!(
            greet.desired.artifact_path,
            PathBuf::from("/srv/functions/greet.tar.gz")
        );
    }

    #[test]
    fn test_address_fallback() {
        let yaml = r#"
functions:
  greet:
    name: greet
    tarball_path: greet.tar.gz
    num_threads: 1
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());

        let options = LoadOptions {
            fallback_address: Some("192.168.1.10".to_string()),
            base_dir: None,
        };
        let config = ConfigLoader::load_str_with(yaml, &options).unwrap();
        assert_eq!(config.functions[0].desired.address.as_str(), "192.168.1.10");
    }

    #[test]
    fn test_missing_functions() {
        let yaml = r#"
platform:
  address: 10.0.0.5
functions: {}
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_zero_threads() {
        let yaml = r#"
platform:
  address: 10.0.0.5
functions:
  greet:
    name: greet
    tarball_path: greet.tar.gz
    num_threads: 0
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_negative_threads() {
        let yaml = r#"
platform:
  address: 10.0.0.5
functions:
  greet:
    name: greet
    tarball_path: greet.tar.gz
    num_threads: -2
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(err.to_string().contains("num_threads"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = r#"
platform:
  address: 10.0.0.5
functions:
  first:
    name: greet
    tarball_path: a.tar.gz
    num_threads: 1
  second:
    name: greet
    tarball_path: b.tar.gz
    num_threads: 2
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(matches!(
            err,
            FnsyncError::HardValidation(HardValidationError::DuplicateFunctionName { .. })
        ));
    }

    #[test]
    fn test_same_name_on_different_platforms() {
        let yaml = r#"
platform:
  address: 10.0.0.5
functions:
  primary:
    name: greet
    tarball_path: a.tar.gz
    num_threads: 1
  replica:
    name: greet
    tarball_path: a.tar.gz
    num_threads: 1
    address: 10.0.0.6
"#;
        assert!(ConfigLoader::load_string(yaml).is_ok());
    }

    #[test]
    fn test_name_with_whitespace() {
        let yaml = r#"
platform:
  address: 10.0.0.5
functions:
  greet:
    name: "hello world"
    tarball_path: greet.tar.gz
    num_threads: 1
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_empty_environment_key() {
        let yaml = r#"
platform:
  address: 10.0.0.5
functions:
  greet:
    name: greet
    tarball_path: greet.tar.gz
    num_threads: 1
    environment:
      "": value
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
platform:
  address: 10.0.0.5
functions:
  greet:
    name: greet
    tarball_path: greet.tar.gz
    num_threads: 1
    memory_mb: 128
"#;
        assert!(matches!(
            ConfigLoader::load_string(yaml),
            Err(FnsyncError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_timeout_bounds() {
        let yaml = r#"
platform:
  address: 10.0.0.5
  request_timeout_ms: 0
functions:
  greet:
    name: greet
    tarball_path: greet.tar.gz
    num_threads: 1
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
platform:
  address: 10.0.0.5
functions:
  greet:
    name: greet
    tarball_path: greet.tar.gz
    num_threads: 1
"#;
        let config = ConfigLoader::load_string(yaml).unwrap();
        assert_eq!(config.platform.request_timeout, Duration::from_secs(30));
    }
}
