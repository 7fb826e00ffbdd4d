//! Server configuration.

use tierlift_core::azure::DEFAULT_ENDPOINT_TEMPLATE;
use tierlift_core::credential::{ManagedIdentity, StorageCredential};
use tierlift_core::{Error, Result};
use tierlift_remediation::OutputDestination;

/// Container the download proxy reads from when none is configured.
pub const DEFAULT_DOWNLOAD_CONTAINER: &str = "processed-files";

/// Default multipart body limit (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Which blob store implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackendKind {
    /// Blob REST API.
    #[default]
    Azure,
    /// In-memory store (debug only).
    Memory,
}

/// How the server authenticates to the blob service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageAuthMode {
    /// No authentication.
    None,
    /// Static bearer token from configuration.
    StaticBearer,
    /// SAS query string from configuration.
    Sas,
    /// Token from the platform managed identity.
    #[default]
    ManagedIdentity,
}

/// Blob service authentication settings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StorageAuthConfig {
    /// Auth mode.
    pub mode: StorageAuthMode,
    /// Token for `static_bearer` mode.
    pub static_bearer_token: Option<String>,
    /// Query string for `sas` mode.
    pub sas_token: Option<String>,
    /// Client ID of a user-assigned identity for `managed_identity` mode.
    pub managed_identity_client_id: Option<String>,
}

impl std::fmt::Debug for StorageAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAuthConfig")
            .field("mode", &self.mode)
            .field(
                "static_bearer_token",
                &self.static_bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sas_token", &self.sas_token.as_ref().map(|_| "[REDACTED]"))
            .field("managed_identity_client_id", &self.managed_identity_client_id)
            .finish()
    }
}

impl StorageAuthConfig {
    /// Builds the credential for the configured mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret required by the active mode is missing.
    pub fn credential(&self) -> Result<StorageCredential> {
        match self.mode {
            StorageAuthMode::None => Ok(StorageCredential::Anonymous),
            StorageAuthMode::StaticBearer => self
                .static_bearer_token
                .clone()
                .map(StorageCredential::Bearer)
                .ok_or_else(|| {
                    Error::Configuration(
                        "TIERLIFT_STORAGE_BEARER_TOKEN is required for static_bearer auth"
                            .to_string(),
                    )
                }),
            StorageAuthMode::Sas => self
                .sas_token
                .clone()
                .map(StorageCredential::Sas)
                .ok_or_else(|| {
                    Error::Configuration(
                        "TIERLIFT_STORAGE_SAS_TOKEN is required for sas auth".to_string(),
                    )
                }),
            StorageAuthMode::ManagedIdentity => Ok(StorageCredential::ManagedIdentity(
                ManagedIdentity::from_env(self.managed_identity_client_id.clone()),
            )),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Backend implementation.
    pub backend: StorageBackendKind,
    /// Endpoint template containing `{account}`.
    pub blob_endpoint: String,
    /// Authentication.
    pub auth: StorageAuthConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            blob_endpoint: DEFAULT_ENDPOINT_TEMPLATE.to_string(),
            auth: StorageAuthConfig::default(),
        }
    }
}

/// An account/container pair whose parts may each be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationConfig {
    /// Storage account name.
    pub account: Option<String>,
    /// Container name.
    pub container: Option<String>,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP listen port.
    pub http_port: u16,
    /// Debug mode: pretty logs and the memory backend are allowed.
    pub debug: bool,
    /// Storage backend settings.
    pub storage: StorageConfig,
    /// Where uploaded spreadsheets are written.
    pub input: LocationConfig,
    /// Where annotated spreadsheets are published.
    pub output: LocationConfig,
    /// Worksheet to remediate (`None` = first sheet).
    pub sheet_name: Option<String>,
    /// Extra header names accepted as the reference column.
    pub reference_headers: Vec<String>,
    /// Multipart body limit for `/upload`.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: false,
            storage: StorageConfig::default(),
            input: LocationConfig::default(),
            output: LocationConfig::default(),
            sheet_name: None,
            reference_headers: Vec::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `TIERLIFT_HTTP_PORT` (falls back to `PORT`)
    /// - `TIERLIFT_DEBUG`
    /// - `TIERLIFT_STORAGE_BACKEND` (`azure` | `memory`)
    /// - `TIERLIFT_BLOB_ENDPOINT` (template containing `{account}`)
    /// - `TIERLIFT_STORAGE_AUTH_MODE` (`none` | `static_bearer` | `sas` | `managed_identity`)
    /// - `TIERLIFT_STORAGE_BEARER_TOKEN`
    /// - `TIERLIFT_STORAGE_SAS_TOKEN`
    /// - `TIERLIFT_MANAGED_IDENTITY_CLIENT_ID`
    /// - `TIERLIFT_INPUT_ACCOUNT`, `TIERLIFT_INPUT_CONTAINER`
    /// - `TIERLIFT_OUTPUT_ACCOUNT`, `TIERLIFT_OUTPUT_CONTAINER`
    /// - `TIERLIFT_SHEET_NAME`
    /// - `TIERLIFT_REFERENCE_HEADERS` (comma-separated)
    /// - `TIERLIFT_MAX_UPLOAD_BYTES`
    ///
    /// Input and output locations are optional here; requests that need them
    /// fail on their own when they are unset.
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(&lookup);
        let mut config = Self::default();

        let port = match vars.u16("TIERLIFT_HTTP_PORT")? {
            Some(port) => Some(port),
            None => vars.u16("PORT")?,
        };
        if let Some(port) = port {
            config.http_port = port;
        }
        if let Some(debug) = vars.bool("TIERLIFT_DEBUG")? {
            config.debug = debug;
        }

        if let Some(backend) = vars.string("TIERLIFT_STORAGE_BACKEND") {
            config.storage.backend = parse_backend("TIERLIFT_STORAGE_BACKEND", &backend)?;
        }
        if let Some(endpoint) = vars.string("TIERLIFT_BLOB_ENDPOINT") {
            config.storage.blob_endpoint = endpoint;
        }
        if let Some(mode) = vars.string("TIERLIFT_STORAGE_AUTH_MODE") {
            config.storage.auth.mode = parse_auth_mode("TIERLIFT_STORAGE_AUTH_MODE", &mode)?;
        }
        config.storage.auth.static_bearer_token = vars.string("TIERLIFT_STORAGE_BEARER_TOKEN");
        config.storage.auth.sas_token = vars.string("TIERLIFT_STORAGE_SAS_TOKEN");
        config.storage.auth.managed_identity_client_id =
            vars.string("TIERLIFT_MANAGED_IDENTITY_CLIENT_ID");

        config.input = LocationConfig {
            account: vars.string("TIERLIFT_INPUT_ACCOUNT"),
            container: vars.string("TIERLIFT_INPUT_CONTAINER"),
        };
        config.output = LocationConfig {
            account: vars.string("TIERLIFT_OUTPUT_ACCOUNT"),
            container: vars.string("TIERLIFT_OUTPUT_CONTAINER"),
        };

        config.sheet_name = vars.string("TIERLIFT_SHEET_NAME");
        if let Some(headers) = vars.string("TIERLIFT_REFERENCE_HEADERS") {
            config.reference_headers = parse_list(&headers);
        }
        if let Some(limit) = vars.usize("TIERLIFT_MAX_UPLOAD_BYTES")? {
            config.max_upload_bytes = limit;
        }

        Ok(config)
    }

    /// Where `/process` publishes annotated spreadsheets, if fully configured.
    #[must_use]
    pub fn output_destination(&self) -> Option<OutputDestination> {
        Some(OutputDestination::new(
            self.output.account.clone()?,
            self.output.container.clone()?,
        ))
    }

    /// Where `/upload` writes spreadsheets, if fully configured.
    #[must_use]
    pub fn upload_destination(&self) -> Option<(String, String)> {
        Some((self.input.account.clone()?, self.input.container.clone()?))
    }

    /// Where the download proxy reads from.
    ///
    /// The output account falls back to the input account; the output
    /// container falls back to [`DEFAULT_DOWNLOAD_CONTAINER`].
    #[must_use]
    pub fn download_location(&self) -> Option<(String, String)> {
        let account = self
            .output
            .account
            .clone()
            .or_else(|| self.input.account.clone())?;
        let container = self
            .output
            .container
            .clone()
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_CONTAINER.to_string());
        Some((account, container))
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u16(&self, name: &str) -> Result<Option<u16>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u16>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
    }

    fn usize(&self, name: &str) -> Result<Option<usize>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<usize>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a usize: {e}")))
    }

    fn bool(&self, name: &str) -> Result<Option<bool>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        parse_bool(name, &v).map(Some)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn parse_backend(name: &str, value: &str) -> Result<StorageBackendKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "azure" => Ok(StorageBackendKind::Azure),
        "memory" => Ok(StorageBackendKind::Memory),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be one of: azure, memory (got {value})"
        ))),
    }
}

fn parse_auth_mode(name: &str, value: &str) -> Result<StorageAuthMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" => Ok(StorageAuthMode::None),
        "static_bearer" => Ok(StorageAuthMode::StaticBearer),
        "sas" => Ok(StorageAuthMode::Sas),
        "managed_identity" => Ok(StorageAuthMode::ManagedIdentity),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be one of: none, static_bearer, sas, managed_identity (got {value})"
        ))),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_variables() -> Result<()> {
        let config = config_from(&[])?;
        assert_eq!(config, Config::default());
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.storage.auth.mode, StorageAuthMode::ManagedIdentity);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.output_destination().is_none());
        assert!(config.upload_destination().is_none());
        Ok(())
    }

    #[test]
    fn port_falls_back_to_platform_variable() -> Result<()> {
        assert_eq!(config_from(&[("PORT", "9000")])?.http_port, 9000);
        assert_eq!(
            config_from(&[("PORT", "9000"), ("TIERLIFT_HTTP_PORT", "7000")])?.http_port,
            7000
        );
        Ok(())
    }

    #[test]
    fn output_destination_requires_both_parts() -> Result<()> {
        let config = config_from(&[("TIERLIFT_OUTPUT_ACCOUNT", "out")])?;
        assert!(config.output_destination().is_none());

        let config = config_from(&[
            ("TIERLIFT_OUTPUT_ACCOUNT", "out"),
            ("TIERLIFT_OUTPUT_CONTAINER", " processed "),
        ])?;
        assert_eq!(
            config.output_destination(),
            Some(OutputDestination::new("out", "processed"))
        );
        Ok(())
    }

    #[test]
    fn download_location_falls_back_to_input_account() -> Result<()> {
        let config = config_from(&[("TIERLIFT_INPUT_ACCOUNT", "inacct")])?;
        assert_eq!(
            config.download_location(),
            Some(("inacct".to_string(), DEFAULT_DOWNLOAD_CONTAINER.to_string()))
        );
        assert!(config_from(&[])?.download_location().is_none());
        Ok(())
    }

    #[test]
    fn reference_headers_are_split_and_trimmed() -> Result<()> {
        let config = config_from(&[("TIERLIFT_REFERENCE_HEADERS", " Document Link, ,asset_url ")])?;
        assert_eq!(config.reference_headers, vec!["Document Link", "asset_url"]);
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("TIERLIFT_HTTP_PORT", "http")]).is_err());
        assert!(config_from(&[("TIERLIFT_DEBUG", "maybe")]).is_err());
        assert!(config_from(&[("TIERLIFT_STORAGE_BACKEND", "s3")]).is_err());
        assert!(config_from(&[("TIERLIFT_STORAGE_AUTH_MODE", "shared_key")]).is_err());
        assert!(config_from(&[("TIERLIFT_MAX_UPLOAD_BYTES", "-1")]).is_err());
    }

    #[test]
    fn parse_bool_accepts_true_and_false_values() {
        assert!(parse_bool("TEST", "TRUE").unwrap());
        assert!(parse_bool("TEST", "y").unwrap());
        assert!(!parse_bool("TEST", "0").unwrap());
        assert!(parse_bool("TEST", "").is_err());
    }

    #[test]
    fn credential_requires_secret_for_mode() -> Result<()> {
        let config = config_from(&[("TIERLIFT_STORAGE_AUTH_MODE", "sas")])?;
        assert!(matches!(
            config.storage.auth.credential(),
            Err(Error::Configuration(_))
        ));

        let config = config_from(&[
            ("TIERLIFT_STORAGE_AUTH_MODE", "static_bearer"),
            ("TIERLIFT_STORAGE_BEARER_TOKEN", "tok"),
        ])?;
        assert!(matches!(
            config.storage.auth.credential()?,
            StorageCredential::Bearer(_)
        ));
        Ok(())
    }

    #[test]
    fn debug_output_redacts_secrets() -> Result<()> {
        let config = config_from(&[("TIERLIFT_STORAGE_SAS_TOKEN", "sig=topsecret")])?;
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("topsecret"));
        Ok(())
    }
}
