extern crate serde;

#[macro_use]
extern crate serde_derive;

pub mod abi;
pub mod artifacts;
pub mod context;
pub mod errors;
pub mod linker;
pub mod migrations;
pub mod onchain;
pub mod types;

use std::fs;
use std::path::{Path, PathBuf};

use migrator_files::ProjectManifest;

pub use errors::DeploymentError;
use migrations::MigrationSet;
use types::{DeploymentSpecification, DeploymentStateFile};

pub fn get_default_deployment_path(manifest: &ProjectManifest, network: &str) -> PathBuf {
    manifest
        .get_deployments_dir()
        .join(format!("default.{}-plan.yaml", network))
}

pub fn get_deployment_state_path(manifest: &ProjectManifest, network: &str) -> PathBuf {
    manifest
        .get_deployments_dir()
        .join(format!("{}.state.yaml", network))
}

pub fn generate_default_deployment(
    manifest: &ProjectManifest,
    network: &str,
    migration_set: MigrationSet,
) -> Result<DeploymentSpecification, String> {
    manifest.get_network(network)?;
    Ok(migration_set.deployment(network))
}

pub fn load_deployment(deployment_plan_path: &Path) -> Result<DeploymentSpecification, String> {
    DeploymentSpecification::from_config_file(deployment_plan_path).map_err(|msg| {
        format!(
            "{} syntax incorrect\n{}",
            deployment_plan_path.display(),
            msg
        )
    })
}

/// Loads a plan given explicitly, refusing one written for another network.
pub fn load_deployment_for_network(
    deployment_plan_path: &Path,
    network: &str,
) -> Result<DeploymentSpecification, String> {
    let deployment = load_deployment(deployment_plan_path)?;
    if deployment.network != network {
        return Err(format!(
            "{} targets network '{}', not '{}'",
            deployment_plan_path.display(),
            deployment.network,
            network
        ));
    }
    Ok(deployment)
}

/// Loads the plan written for `network` if there is one, otherwise builds it from the migration set.
pub fn read_deployment_or_generate_default(
    manifest: &ProjectManifest,
    network: &str,
    migration_set: Option<MigrationSet>,
) -> Result<(DeploymentSpecification, bool), String> {
    let default_deployment_path = get_default_deployment_path(manifest, network);
    if default_deployment_path.exists() {
        let deployment = load_deployment(&default_deployment_path)?;
        if let (Some(selected), Some(recorded)) = (migration_set, &deployment.migration_set) {
            if selected.name() != recorded.as_str() {
                return Err(format!(
                    "{} was generated for migration set {}, regenerate it for {}",
                    default_deployment_path.display(),
                    recorded,
                    selected
                ));
            }
        }
        Ok((deployment, false))
    } else {
        let migration_set = migrations::select_migration_set(
            migration_set.map(|s| s.name()),
            manifest.project.migration_set.as_deref(),
        )?;
        let deployment = generate_default_deployment(manifest, network, migration_set)?;
        Ok((deployment, true))
    }
}

pub fn serialize_deployment(deployment: &DeploymentSpecification) -> Result<String, String> {
    serde_yaml::to_string(&deployment.to_specification_file())
        .map_err(|e| format!("failed serializing deployment\n{}", e))
}

/// Plan files (`*-plan.yaml`) found in the deployments directory, sorted by name.
pub fn get_deployments_files(manifest: &ProjectManifest) -> Result<Vec<PathBuf>, String> {
    let deployments_dir = manifest.get_deployments_dir();
    let entries = match fs::read_dir(&deployments_dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(vec![]),
    };
    let mut plans_paths = vec![];
    for entry in entries {
        let path = entry
            .map_err(|e| format!("unable to list {}: {}", deployments_dir.display(), e))?
            .path();
        let is_plan = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with("-plan.yaml") || name.ends_with("-plan.yml"))
            .unwrap_or(false);
        if is_plan {
            plans_paths.push(path);
        }
    }
    plans_paths.sort();
    Ok(plans_paths)
}

pub fn load_deployment_state(path: &Path) -> Result<Option<DeploymentStateFile>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
    let state = serde_yaml::from_str(&content)
        .map_err(|e| format!("deployment state {} malformatted\n{}", path.display(), e))?;
    Ok(Some(state))
}

pub fn write_deployment_state(path: &Path, state: &DeploymentStateFile) -> Result<(), String> {
    let content = serde_yaml::to_string(state)
        .map_err(|e| format!("failed serializing deployment state\n{}", e))?;
    write_file(path, content.as_bytes())
}

pub fn write_file(path: &Path, content: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("unable to create {}: {}", parent.display(), e))?;
    }
    fs::write(path, content).map_err(|e| format!("unable to write {}: {}", path.display(), e))
}
