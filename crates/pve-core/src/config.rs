use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::workflow::{Environment, EnvironmentPolicy};

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    /// Root for the baseline, drift reports, backups and execution records.
    pub state_dir: PathBuf,
    /// YAML trees whose syntax is checked before every deployment.
    #[serde(default)]
    pub config_dirs: Vec<PathBuf>,
    /// Directory of `<branch>.yaml` deployment manifests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployments_dir: Option<PathBuf>,
    /// VMIDs of templates that must exist before deploying.
    #[serde(default)]
    pub required_templates: Vec<String>,
    /// Credential names that must resolve before deploying. Values are never stored here.
    #[serde(default)]
    pub required_credentials: Vec<String>,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    /// VMID used for the throwaway smoke-test guest.
    #[serde(default = "default_smoke_test_vmid")]
    pub smoke_test_vmid: String,
    #[serde(default)]
    pub policies: EnvironmentPolicies,
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Node memory/CPU ratio above which the verify stage warns.
    #[serde(default = "default_utilization_warn_ratio")]
    pub utilization_warn_ratio: f64,
}

fn default_verify_ssl() -> bool {
    true
}

fn default_smoke_test_vmid() -> String {
    "9999".to_string()
}

fn default_utilization_warn_ratio() -> f64 {
    0.9
}

impl ReconcileConfig {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_version: CURRENT_VERSION,
            state_dir: state_dir.into(),
            config_dirs: Vec::new(),
            deployments_dir: None,
            required_templates: Vec::new(),
            required_credentials: Vec::new(),
            verify_ssl: default_verify_ssl(),
            smoke_test_vmid: default_smoke_test_vmid(),
            policies: EnvironmentPolicies::default(),
            monitor: MonitorSettings::default(),
            utilization_warn_ratio: default_utilization_warn_ratio(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentPolicies {
    pub development: EnvironmentPolicy,
    pub staging: EnvironmentPolicy,
    pub production: EnvironmentPolicy,
}

impl EnvironmentPolicies {
    pub fn get(&self, environment: Environment) -> &EnvironmentPolicy {
        match environment {
            Environment::Development => &self.development,
            Environment::Staging => &self.staging,
            Environment::Production => &self.production,
        }
    }
}

impl Default for EnvironmentPolicies {
    fn default() -> Self {
        Self {
            development: EnvironmentPolicy::default_for(Environment::Development),
            staging: EnvironmentPolicy::default_for(Environment::Staging),
            production: EnvironmentPolicy::default_for(Environment::Production),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval_secs: u64,
    /// Back-off after a failed tick.
    pub retry_secs: u64,
    pub auto_remediate_low: bool,
}

impl MonitorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 900,
            retry_secs: 60,
            auto_remediate_low: false,
        }
    }
}

/// `$XDG_CONFIG_HOME/pve-reconcile/config.json` or the platform equivalent.
pub fn default_config_path() -> Result<PathBuf, CoreError> {
    let base = dirs::config_dir()
        .ok_or_else(|| CoreError::Config("no config directory found".into()))?;
    Ok(base.join("pve-reconcile").join("config.json"))
}

pub fn load_config(path: &Path) -> Result<ReconcileConfig, CoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;

    // Parse as raw JSON so we can run migrations before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: ReconcileConfig = serde_json::from_value(migrated)?;
    Ok(config)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
///
/// Each migration is a pure transform on the raw JSON value.
fn migrate(mut json: serde_json::Value, from_version: u32) -> Result<serde_json::Value, CoreError> {
    if from_version > CURRENT_VERSION {
        return Err(CoreError::Config(format!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION})"
        )));
    }

    // v0 → v1: flat `drift_interval_secs` moved into the `monitor` block
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| CoreError::Config("config is not a JSON object".into()))?;
        if let Some(interval) = obj.remove("drift_interval_secs") {
            let monitor = obj
                .entry("monitor")
                .or_insert_with(|| serde_json::json!({}));
            if let Some(monitor) = monitor.as_object_mut() {
                monitor.entry("interval_secs").or_insert(interval);
            }
        }
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (moved drift_interval_secs into monitor)");
    }

    Ok(json)
}

pub fn save_config(path: &Path, config: &ReconcileConfig) -> Result<(), CoreError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;
    let json = serde_json::to_string_pretty(&stamped)?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"config_version": 1, "state_dir": "/var/lib/pve"}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.verify_ssl);
        assert_eq!(config.monitor.interval(), Duration::from_secs(900));
        assert_eq!(config.monitor.retry_interval(), Duration::from_secs(60));
        assert!(config.policies.get(Environment::Production).approval_required);
        assert_eq!(config.policies.get(Environment::Development).branch, "develop");
    }

    #[test]
    fn v0_interval_moves_into_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"state_dir": "/srv", "drift_interval_secs": 300}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.config_version, 1);
        assert_eq!(config.monitor.interval_secs, 300);
        assert_eq!(config.monitor.retry_secs, 60);
    }

    #[test]
    fn newer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"config_version": 99, "state_dir": "/srv"}"#).unwrap();
        assert!(matches!(load_config(&path), Err(CoreError::Config(_))));
    }

    #[test]
    fn save_then_load_keeps_policies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = ReconcileConfig::new(dir.path());
        config.policies.staging.approval_required = true;
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert!(loaded.policies.staging.approval_required);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
