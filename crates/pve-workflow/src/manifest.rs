use std::path::{Path, PathBuf};

use pve_core::ResourceCategory;
use pve_drift::Attributes;
use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// Changes a branch deploys, read from `<deployments_dir>/<branch>.yaml`.
///
/// ```yaml
/// changes:
///   - category: vm
///     id: "100"
///     attributes:
///       memory: 4096
///   - category: user
///     id: ci@pve
///     action: create
///     attributes:
///       enable: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    #[serde(default)]
    pub changes: Vec<ResourceChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub category: ResourceCategory,
    pub id: String,
    #[serde(default)]
    pub action: ChangeAction,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    #[default]
    Update,
    Create,
}

impl DeploymentManifest {
    /// `feature/x` → `feature_x.yaml`
    pub fn path_for(deployments_dir: &Path, branch: &str) -> PathBuf {
        deployments_dir.join(format!("{}.yaml", branch.replace('/', "_")))
    }

    /// Manifest for `branch`. No directory or no file means no changes.
    pub fn load(deployments_dir: Option<&Path>, branch: &str) -> Result<Self, StageError> {
        let Some(dir) = deployments_dir else {
            return Ok(Self::default());
        };
        let path = Self::path_for(dir, branch);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no deployment manifest for branch");
                return Ok(Self::default());
            }
            Err(source) => return Err(StageError::ReadConfig { path, source }),
        };
        // An empty file parses as YAML null.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| StageError::InvalidManifest { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_means_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DeploymentManifest::load(None, "develop").unwrap().changes.is_empty());
        assert!(
            DeploymentManifest::load(Some(dir.path()), "develop")
                .unwrap()
                .changes
                .is_empty()
        );
    }

    #[test]
    fn parses_changes_with_default_action() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("feature_bigger-web.yaml"),
            "changes:\n  - category: vm\n    id: \"100\"\n    attributes:\n      memory: 4096\n  - category: user\n    id: ci@pve\n    action: create\n",
        )
        .unwrap();

        let manifest = DeploymentManifest::load(Some(dir.path()), "feature/bigger-web").unwrap();
        assert_eq!(manifest.changes.len(), 2);
        assert_eq!(manifest.changes[0].category, ResourceCategory::Vm);
        assert_eq!(manifest.changes[0].action, ChangeAction::Update);
        assert_eq!(manifest.changes[0].attributes["memory"], serde_json::json!(4096));
        assert_eq!(manifest.changes[1].action, ChangeAction::Create);
        assert!(manifest.changes[1].attributes.is_empty());
    }

    #[test]
    fn bad_manifest_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.yaml"), "changes: [category: lxc").unwrap();

        let err = DeploymentManifest::load(Some(dir.path()), "main").unwrap_err();
        assert!(err.to_string().contains("main.yaml"));
    }
}
