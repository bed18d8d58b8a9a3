use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name of the per-repository configuration file.
pub const CONFIG_FILE: &str = "ferry.toml";

/// ferry.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FerryConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub release: ReleaseConfig,
    #[serde(default)]
    pub installation: Installation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// GitHub organisation (defaults to the CI environment or git remote)
    pub organisation: Option<String>,
    /// Project name (defaults to the CI environment or git remote)
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Container registry host
    #[serde(default = "default_registry_host")]
    pub host: String,
    /// Registry organisation; falls back to the project organisation
    pub organisation: Option<String>,
    /// Registry login user
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Changelog rewritten by `prepare-release`
    #[serde(default = "default_changelog")]
    pub changelog: String,
    /// Source file holding the `version = "..."` declaration
    #[serde(default = "default_version_file")]
    pub version_file: String,
    /// Directory whose files are attached to GitHub releases
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
    /// Directory holding Helm charts
    #[serde(default = "default_charts_dir")]
    pub charts_dir: String,
    /// Stability tracks used to derive release channels
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

/// Target environment a chart is rendered for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase", deserialize = "snake_case"))]
pub struct Installation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub api: ApiEndpoints,
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase", deserialize = "snake_case"))]
pub struct ApiEndpoints {
    /// Control-plane API address
    #[serde(default)]
    pub address: String,
    /// Externally reachable API address
    #[serde(default)]
    pub public_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase", deserialize = "snake_case"))]
pub struct KubernetesConfig {
    #[serde(default)]
    pub api_address: String,
    #[serde(default = "default_cluster_domain")]
    pub cluster_domain: String,
    #[serde(default)]
    pub ingress_class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase", deserialize = "snake_case"))]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus_address: String,
    /// How often alerts are evaluated
    #[serde(
        with = "crate::duration::go_format",
        default = "default_alert_interval"
    )]
    pub alert_interval: Duration,
    /// How often synthetic tests run
    #[serde(
        with = "crate::duration::go_format",
        default = "default_testing_interval"
    )]
    pub testing_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: default_registry_host(),
            organisation: None,
            username: None,
        }
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            changelog: default_changelog(),
            version_file: default_version_file(),
            assets_dir: default_assets_dir(),
            charts_dir: default_charts_dir(),
            channels: default_channels(),
        }
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            api_address: String::new(),
            cluster_domain: default_cluster_domain(),
            ingress_class: String::new(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_address: String::new(),
            alert_interval: default_alert_interval(),
            testing_interval: default_testing_interval(),
        }
    }
}

impl FerryConfig {
    /// Load from ferry.toml at the given path, or return defaults if not found.
    pub fn load(working_dir: &Path) -> crate::Result<Self> {
        let config_path = working_dir.join(CONFIG_FILE);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            let config = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path.clone(),
                source: e,
            })?;
            tracing::debug!(path = %config_path.display(), "loaded ferry config");
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

fn default_registry_host() -> String {
    "quay.io".to_owned()
}

fn default_changelog() -> String {
    "CHANGELOG.md".to_owned()
}

fn default_version_file() -> String {
    "pkg/project/project.go".to_owned()
}

fn default_assets_dir() -> String {
    "dist".to_owned()
}

fn default_charts_dir() -> String {
    "helm".to_owned()
}

fn default_channels() -> Vec<String> {
    crate::version::DEFAULT_STABILITIES
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

fn default_cluster_domain() -> String {
    "cluster.local".to_owned()
}

fn default_alert_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_testing_interval() -> Duration {
    Duration::from_secs(300)
}
