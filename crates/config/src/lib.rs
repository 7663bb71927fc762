//! Manages application configuration by loading settings from standard locations.
//!
//! This crate provides a unified configuration object (`Config`) that aggregates
//! settings from files and environment variables, making them accessible
//! globally via a lazily initialized static reference (`CONFIG`).

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use etcetera::BaseStrategy;
use figment::providers::{Env, Format, Toml};
use figment::{Figment, Metadata, Provider};
use serde::{Deserialize, Serialize};

/// The default configuration values
const DEFAULT_TOML_CONFIG: &str = include_str!("./docfan.default.toml");
const APP: &str = "docfan";

//================================================================================================
// Statics
//================================================================================================

/// Provides a lazily instantiated static reference to the application `Config`.
///
/// This static variable ensures that configuration is parsed only once from
/// canonical locations and then made immutably available throughout the
/// application's lifecycle.
pub static CONFIG: LazyLock<Config> = LazyLock::new(load_config);

//================================================================================================
// Types
//================================================================================================

/// Settings that shape how a distribution fans out.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FanoutConfig {
    /// Seconds a single provider call may run before it is recorded as failed.
    pub call_timeout: u64,
    /// Upper bound on provider calls in flight at once.
    pub max_concurrent: usize,
}

/// Where the local document provider keeps its documents.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ProviderConfig {
    pub root: PathBuf,
}

/// Where activity records and result records are persisted.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StateConfig {
    pub root: PathBuf,
}

/// Represents the application's primary configuration structure.
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub state: StateConfig,
}

//================================================================================================
// Impls
//================================================================================================

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            call_timeout: 30,
            max_concurrent: 16,
        }
    }
}

impl FanoutConfig {
    /// The per-call timeout as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            root: get_data_dir().join("documents"),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            root: get_data_dir().join("state"),
        }
    }
}

impl Config {
    /// Constructs a `Figment` instance for configuration loading.
    ///
    /// This method builds a configuration provider by layering default settings,
    /// the user-specific configuration file, and environment variables. Nested keys
    /// are addressed in the environment with a double underscore, e.g.
    /// `DOCFAN_FANOUT__CALL_TIMEOUT=10`.
    pub fn figment() -> Figment {
        let mut fig = Figment::from(Config::default()).merge(Toml::string(DEFAULT_TOML_CONFIG));

        if let Ok(c) = etcetera::choose_base_strategy() {
            let config = c.config_dir().join(format!("{APP}.toml"));
            fig = fig.admerge(Toml::file(config));
        }

        fig.admerge(Env::prefixed("DOCFAN_").split("__"))
    }
}

impl Provider for Config {
    fn metadata(&self) -> figment::Metadata {
        Metadata::named("Docfan CLI Config")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        figment::providers::Serialized::defaults(self).data()
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Determines the appropriate data directory based on the operating system.
fn get_data_dir() -> PathBuf {
    if let Ok(c) = etcetera::choose_base_strategy() {
        c.data_dir().join(APP)
    } else {
        std::env::temp_dir().join(APP)
    }
}

/// Loads the application configuration using the default `Figment` provider.
///
/// This function is used to initialize the `CONFIG` static variable.
fn load_config() -> Config {
    Config::figment().extract().unwrap_or_else(|e| {
        tracing::error!(error = %e, "problem loading config from default sources, falling back to defaults");
        Config::default()
    })
}
