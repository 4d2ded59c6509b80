use std::path::{Path, PathBuf};

use pve_core::ResourceCategory;
use serde::Deserialize;

use super::StageContext;
use crate::error::StageError;
use crate::manifest::DeploymentManifest;

/// Output of a passed validation: the artifact reference and the parsed
/// branch manifest the deploy stage applies.
#[derive(Debug)]
pub struct Validated {
    pub reference: String,
    pub manifest: DeploymentManifest,
}

/// Syntax, manifest, connectivity, template and security checks. Performs no writes.
pub async fn run(ctx: &StageContext<'_>) -> Result<Validated, StageError> {
    let files = check_config_trees(&ctx.config.config_dirs)?;
    tracing::info!(files, "configuration syntax ok");

    let manifest = DeploymentManifest::load(ctx.config.deployments_dir.as_deref(), ctx.branch)?;
    tracing::info!(branch = %ctx.branch, changes = manifest.changes.len(), "deployment manifest ok");

    let status = ctx.client().get_cluster_status().await?;
    if !status.quorate {
        return Err(StageError::NoQuorum);
    }
    tracing::info!(nodes = status.nodes.len(), "cluster reachable");

    check_templates(ctx).await?;
    check_security(ctx).await?;

    Ok(Validated {
        reference: format!("passed ({files} config files, {} changes)", manifest.changes.len()),
        manifest,
    })
}

/// Parse every `.yaml`/`.yml` file under `dirs`. Returns the number checked.
pub fn check_config_trees(dirs: &[PathBuf]) -> Result<usize, StageError> {
    let mut files = Vec::new();
    for dir in dirs {
        collect_yaml(dir, &mut files)?;
    }
    files.sort();
    for path in &files {
        check_yaml(path)?;
    }
    Ok(files.len())
}

fn collect_yaml(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StageError> {
    let read_err = |source| StageError::ReadConfig {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_dir() {
            collect_yaml(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

fn check_yaml(path: &Path) -> Result<(), StageError> {
    let contents = std::fs::read_to_string(path).map_err(|source| StageError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    // Multi-document files are valid; check each document.
    for document in serde_yaml::Deserializer::from_str(&contents) {
        serde_yaml::Value::deserialize(document).map_err(|source| StageError::InvalidYaml {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

async fn check_templates(ctx: &StageContext<'_>) -> Result<(), StageError> {
    if ctx.config.required_templates.is_empty() {
        return Ok(());
    }
    let vms = ctx.client().list_vms().await?;
    let missing: Vec<String> = ctx
        .config
        .required_templates
        .iter()
        .filter(|id| !vms.get(id.as_str()).is_some_and(|vm| vm.template))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(StageError::MissingTemplates(missing));
    }
    tracing::info!(
        category = %ResourceCategory::Vm,
        templates = ctx.config.required_templates.len(),
        "templates available"
    );
    Ok(())
}

async fn check_security(ctx: &StageContext<'_>) -> Result<(), StageError> {
    if !ctx.config.verify_ssl {
        return Err(StageError::Insecure("TLS certificate verification is disabled".into()));
    }
    for name in &ctx.config.required_credentials {
        // Only presence matters here; the value is dropped immediately.
        let present = ctx.credentials.get_credential(name).await?.is_some();
        if !present {
            return Err(StageError::MissingCredential(name.clone()));
        }
        tracing::debug!(credential = %name, "credential available");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_nested_dirs_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vms/web")).unwrap();
        std::fs::write(dir.path().join("cluster.yml"), "name: lab\n").unwrap();
        std::fs::write(dir.path().join("vms/web/100.yaml"), "memory: 2048\n---\ncores: 2\n")
            .unwrap();
        std::fs::write(dir.path().join("README.md"), "{{ not yaml").unwrap();

        assert_eq!(check_config_trees(&[dir.path().to_path_buf()]).unwrap(), 2);
    }

    #[test]
    fn syntax_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.yaml"), "a: 1\n").unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "a: [1, 2\n").unwrap();

        let err = check_config_trees(&[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, StageError::InvalidYaml { .. }));
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_config_trees(&[dir.path().join("absent")]).unwrap_err();
        assert!(matches!(err, StageError::ReadConfig { .. }));
    }
}
