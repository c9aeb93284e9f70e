// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Access Catalog Configuration
//
// Defines the bootstrap manifest for the access kernel:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Extra permissions and their builtin-role bindings
// - Custom roles seeded at startup
// - List pagination defaults

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::permission::{BuiltinRole, PermissionId};

pub const API_VERSION: &str = "storegate.io/v1";
pub const KIND: &str = "AccessCatalog";

/// Top-level Kubernetes-style access catalog manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfigManifest {
    /// API version (must be "storegate.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "AccessCatalog")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: KernelConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfigSpec {
    /// Register the retail permission set (users, inventory, sales, reports)
    #[serde(default = "default_true")]
    pub include_standard_permissions: bool,

    /// Additional permissions registered after the standard set
    #[serde(default)]
    pub permissions: Vec<PermissionConfig>,

    /// Custom roles registered at startup
    #[serde(default)]
    pub custom_roles: Vec<CustomRoleConfig>,

    #[serde(default)]
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    pub id: PermissionId,

    /// Builtin roles granted this permission ("admin" is always implied)
    #[serde(default)]
    pub roles: BTreeSet<BuiltinRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRoleConfig {
    pub name: String,
    pub permissions: BTreeSet<PermissionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when a list call does not ask for one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound applied to every requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl PaginationConfig {
    /// Effective page size for a request.
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    100
}

fn default_max_page_size() -> usize {
    1000
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for KernelConfigSpec {
    fn default() -> Self {
        Self {
            include_standard_permissions: true,
            permissions: Vec::new(),
            custom_roles: Vec::new(),
            pagination: PaginationConfig::default(),
        }
    }
}

impl Default for KernelConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "default".to_string(),
                version: None,
                labels: None,
            },
            spec: KernelConfigSpec::default(),
        }
    }
}

impl KernelConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. STOREGATE_CONFIG_PATH environment variable
    /// 2. ./storegate-config.yaml (working directory)
    /// 3. ~/.storegate/config.yaml (user home)
    /// 4. /etc/storegate/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("STOREGATE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./storegate-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".storegate").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/storegate/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading access catalog from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load access catalog at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading access catalog from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No access catalog found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        for (var, target) in [
            ("STOREGATE_DEFAULT_PAGE_SIZE", &mut self.spec.pagination.default_page_size),
            ("STOREGATE_MAX_PAGE_SIZE", &mut self.spec.pagination.max_page_size),
        ] {
            if let Ok(val) = std::env::var(var) {
                match val.trim().parse::<usize>() {
                    Ok(parsed) => {
                        tracing::info!("Environment override: {}={}", var, parsed);
                        *target = parsed;
                    }
                    Err(_) => {
                        tracing::warn!(
                            "Invalid value for {}: '{}'. Expected a positive integer. Ignoring.",
                            var,
                            val
                        );
                    }
                }
            }
        }
    }

    /// Validate structure. Registry consistency (unknown permissions,
    /// role collisions) is checked when the catalog is built.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let pagination = &self.spec.pagination;
        if pagination.default_page_size == 0 || pagination.max_page_size == 0 {
            anyhow::bail!("pagination sizes must be greater than zero");
        }
        if pagination.default_page_size > pagination.max_page_size {
            anyhow::bail!(
                "pagination.default_page_size ({}) exceeds pagination.max_page_size ({})",
                pagination.default_page_size,
                pagination.max_page_size
            );
        }

        let mut seen = BTreeSet::new();
        for role in &self.spec.custom_roles {
            if role.name.trim().is_empty() {
                anyhow::bail!("custom role name cannot be empty");
            }
            if !seen.insert(role.name.as_str()) {
                anyhow::bail!("custom role '{}' is declared more than once", role.name);
            }
        }

        Ok(())
    }
}
