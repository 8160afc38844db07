use std::collections::BTreeSet;
use std::path::Path;

use migrator_deployments::onchain::{StepStatus, StepTracker};
use migrator_deployments::types::DeploymentSpecification;
use migrator_deployments::{get_deployments_files, load_deployment, serialize_deployment, write_file};
use migrator_files::ProjectManifest;

pub fn write_deployment(
    deployment: &DeploymentSpecification,
    target_path: &Path,
    prompt_override: bool,
) -> Result<(), String> {
    if target_path.exists() && prompt_override {
        println!(
            "Deployment {} already exists.\n{}?",
            target_path.display(),
            yellow!("Overwrite [Y/n]")
        );
        let mut buffer = String::new();
        std::io::stdin()
            .read_line(&mut buffer)
            .map_err(|e| format!("unable to read answer: {}", e))?;
        if buffer.starts_with('n') {
            return Err("deployment update aborted".to_string());
        }
    }

    let content = serialize_deployment(deployment)?;
    write_file(target_path, content.as_bytes())
}

/// Returns false when at least one plan is malformed or misordered.
pub fn check_deployments(manifest: &ProjectManifest) -> Result<bool, String> {
    let files = get_deployments_files(manifest)?;
    if files.is_empty() {
        println!(
            "{} no plan found in {}",
            yellow!("note:"),
            manifest.get_deployments_dir().display()
        );
        return Ok(true);
    }

    let mut success = true;
    for path in files.into_iter() {
        let deployment = match load_deployment(&path) {
            Ok(deployment) => deployment,
            Err(msg) => {
                println!("{} {}", red!("x"), msg);
                success = false;
                continue;
            }
        };
        let issues = deployment.check_ordering(&BTreeSet::new());
        if issues.is_empty() {
            println!("{} {} successfully checked", green!("✔"), path.display());
        } else {
            println!("{} {} steps misordered", red!("x"), path.display());
            for issue in issues.iter() {
                println!("  {}", issue);
            }
            success = false;
        }
    }
    Ok(success)
}

pub fn display_step_update(tracker: &StepTracker) {
    let position = tracker.index + 1;
    match tracker.status {
        StepStatus::Queued => {}
        StepStatus::Submitted(ref transaction_hash) => {
            println!(
                "{} {}. {} (tx {})",
                blue!("➡"),
                position,
                tracker.name,
                transaction_hash
            );
        }
        StepStatus::Confirmed(Some(ref address)) => {
            println!("{} {}. {} at {}", green!("✔"), position, tracker.name, address);
        }
        StepStatus::Confirmed(None) => {
            println!("{} {}. {}", green!("✔"), position, tracker.name);
        }
        StepStatus::Linked(ref address) => {
            println!(
                "{} {}. {} ({})",
                green!("✔"),
                position,
                tracker.name,
                address
            );
        }
        StepStatus::Error(ref message) => {
            println!("{} {}. {}: {}", red!("x"), position, tracker.name, message);
        }
    }
}
