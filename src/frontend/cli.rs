use crate::deployments::{check_deployments, display_step_update, write_deployment};

use clap::{Parser, Subcommand};
use migrator_deployments::artifacts::FileArtifactRegistry;
use migrator_deployments::context::DeploymentContext;
use migrator_deployments::migrations::{select_migration_set, MigrationSet};
use migrator_deployments::onchain::{
    apply_on_chain_deployment, DeploymentEvent, OrchestratorSettings, RpcChainBackend,
    SimulatedChain,
};
use migrator_deployments::types::{check_step_ordering, DeploymentSpecification};
use migrator_deployments::{
    generate_default_deployment, get_default_deployment_path, get_deployment_state_path,
    load_deployment_for_network, load_deployment_state, read_deployment_or_generate_default,
    write_deployment_state,
};
use migrator_files::{find_manifest_path, ProjectManifest, MANIFEST_FILE_NAME};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::channel;
use std::{env, fs, process};

const DEFAULT_NETWORK: &str = "development";

/// Migrator runs the hotel project's contract migrations, in order, against a configured network.
#[derive(Parser, PartialEq, Clone, Debug)]
#[clap(version = env!("CARGO_PKG_VERSION"), name = "migrator", bin_name = "migrator")]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Deploy the contracts, link libraries and run post-deployment calls
    #[clap(name = "migrate", bin_name = "migrate")]
    Migrate(Migrate),
    /// Subcommands for working with deployment plans
    #[clap(subcommand, name = "plan", aliases = &["plans"])]
    Plan(Plan),
    /// List the networks declared in Migrator.toml
    #[clap(name = "networks", bin_name = "networks")]
    Networks(ManifestOnly),
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Plan {
    /// Write the default plan for a network
    #[clap(name = "generate", bin_name = "generate", aliases = &["new"])]
    Generate(GeneratePlan),
    /// Check plans format and steps ordering
    #[clap(name = "check", bin_name = "check")]
    Check(ManifestOnly),
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct Migrate {
    /// Network profile to deploy to
    #[clap(long = "network", short = 'n')]
    pub network: Option<String>,
    /// First migration to use (resource-manager, basic-hotel-manager)
    #[clap(long = "migration-set", short = 's')]
    pub migration_set: Option<String>,
    /// Plan file to apply instead of the network's default plan
    #[clap(long = "plan", short = 'p')]
    pub plan: Option<String>,
    /// Skip migrations with a lower id, reusing instances recorded by a previous run
    #[clap(long = "from")]
    pub from: Option<usize>,
    /// Run against an in-memory chain instead of the network
    #[clap(long = "simulate")]
    pub simulate: bool,
    /// Path to Migrator.toml
    #[clap(long = "manifest-path", short = 'm')]
    pub manifest_path: Option<String>,
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct GeneratePlan {
    /// Network profile the plan targets
    #[clap(long = "network", short = 'n')]
    pub network: Option<String>,
    /// First migration to use (resource-manager, basic-hotel-manager)
    #[clap(long = "migration-set", short = 's')]
    pub migration_set: Option<String>,
    /// Path to Migrator.toml
    #[clap(long = "manifest-path", short = 'm')]
    pub manifest_path: Option<String>,
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct ManifestOnly {
    /// Path to Migrator.toml
    #[clap(long = "manifest-path", short = 'm')]
    pub manifest_path: Option<String>,
}

pub fn main() {
    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            println!("{}", e);
            process::exit(match e.use_stderr() {
                true => 1,
                false => 0,
            });
        }
    };

    match opts.command {
        Command::Migrate(cmd) => {
            if let Err(message) = migrate(cmd) {
                exit_with_error(&message);
            }
        }
        Command::Plan(Plan::Generate(cmd)) => {
            let manifest = load_manifest_or_exit(cmd.manifest_path);
            let network = cmd.network.unwrap_or_else(|| DEFAULT_NETWORK.to_string());
            let migration_set = select_migration_set(
                cmd.migration_set.as_deref(),
                manifest.project.migration_set.as_deref(),
            )
            .unwrap_or_else(|e| exit_with_error(&e));
            let deployment = generate_default_deployment(&manifest, &network, migration_set)
                .unwrap_or_else(|e| exit_with_error(&e));
            let target_path = get_default_deployment_path(&manifest, &network);
            match write_deployment(&deployment, &target_path, true) {
                Ok(()) => println!(
                    "{} Generated file {}",
                    green!("✔"),
                    target_path.display()
                ),
                Err(message) => exit_with_error(&message),
            }
        }
        Command::Plan(Plan::Check(cmd)) => {
            let manifest = load_manifest_or_exit(cmd.manifest_path);
            match check_deployments(&manifest) {
                Ok(true) => {}
                Ok(false) => process::exit(1),
                Err(message) => exit_with_error(&message),
            }
        }
        Command::Networks(cmd) => {
            let manifest = load_manifest_or_exit(cmd.manifest_path);
            if manifest.networks.is_empty() {
                println!(
                    "{} no [networks] declared in {}",
                    yellow!("note:"),
                    MANIFEST_FILE_NAME
                );
            }
            for (name, profile) in manifest.networks.iter() {
                println!(
                    "{} {} (network_id: {}, from: {})",
                    blue!(format!("{:<16}", name)),
                    profile.rpc_url(),
                    profile.network_id,
                    profile.from.as_deref().unwrap_or("first node account")
                );
            }
        }
    }
}

fn migrate(cmd: Migrate) -> Result<(), String> {
    let manifest = load_manifest_or_exit(cmd.manifest_path);
    let network = cmd.network.unwrap_or_else(|| DEFAULT_NETWORK.to_string());
    let profile = manifest.get_network(&network)?.clone();

    let migration_set = match cmd.migration_set {
        Some(ref name) => Some(MigrationSet::from_str(name)?),
        None => None,
    };

    let deployment = match cmd.plan {
        Some(ref plan_path) => load_deployment_for_network(&PathBuf::from(plan_path), &network)?,
        None => {
            let (deployment, generated) =
                read_deployment_or_generate_default(&manifest, &network, migration_set)?;
            if generated && !cmd.simulate {
                let target_path = get_default_deployment_path(&manifest, &network);
                write_deployment(&deployment, &target_path, false)?;
                println!("{} Generated file {}", green!("✔"), target_path.display());
            }
            deployment
        }
    };

    let state_path = get_deployment_state_path(&manifest, &network);
    let from_migration = cmd.from.unwrap_or(0);
    let context = if from_migration > 1 {
        match load_deployment_state(&state_path)? {
            Some(state) => DeploymentContext::from_state_file(&state)?,
            None => {
                return Err(format!(
                    "--from {} needs instances from a previous run, {} not found",
                    from_migration,
                    state_path.display()
                ))
            }
        }
    } else {
        DeploymentContext::new()
    };

    let steps = deployment.steps_from(from_migration);
    let issues = check_step_ordering(&steps, &context.known_instances());
    if !issues.is_empty() {
        return Err(format!(
            "plan {} cannot be applied\n  {}",
            deployment.name,
            issues.join("\n  ")
        ));
    }

    let mut settings = OrchestratorSettings::from_network_profile(&profile, &manifest.compiler)?;
    if cmd.simulate {
        settings = settings.simulated();
    }
    let registry = FileArtifactRegistry::new(manifest.get_build_dir());

    let deployments_dir = manifest.get_deployments_dir();
    fs::create_dir_all(&deployments_dir)
        .map_err(|e| format!("unable to create {}: {}", deployments_dir.display(), e))?;
    let file_appender = tracing_appender::rolling::never(&deployments_dir, "migrator.log");
    // Dropped when this function returns, flushing the log before `main` exits.
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(non_blocking)
        .init();

    println!(
        "{} Applying {} ({} steps) on {}",
        blue!("➡"),
        describe_deployment(&deployment),
        steps.len(),
        match cmd.simulate {
            true => "a simulated chain".to_string(),
            false => format!("{} ({})", network, profile.rpc_url()),
        }
    );

    let (deployment_event_tx, deployment_event_rx) = channel();
    let simulate = cmd.simulate;
    let backend_profile = profile.clone();
    let handle = std::thread::spawn(move || {
        if simulate {
            apply_on_chain_deployment(
                SimulatedChain::new(),
                registry,
                settings,
                steps,
                context,
                deployment_event_tx,
            )
        } else {
            apply_on_chain_deployment(
                RpcChainBackend::from_network_profile(&backend_profile),
                registry,
                settings,
                steps,
                context,
                deployment_event_tx,
            )
        }
    });

    loop {
        let event = match deployment_event_rx.recv() {
            Ok(event) => event,
            Err(_) => break,
        };
        match event {
            DeploymentEvent::StepUpdate(tracker) => display_step_update(&tracker),
            DeploymentEvent::Interrupted(message) => {
                eprintln!("{} Migration interrupted: {}", red!("x"), message);
                break;
            }
            DeploymentEvent::DeploymentCompleted => {
                println!(
                    "{} Migrations successfully applied on {}",
                    green!("✔"),
                    network
                );
                break;
            }
        }
    }

    let (context, result) = handle
        .join()
        .map_err(|_| "deployment thread panicked".to_string())?;

    for instance in context.instances() {
        println!("  {:<20} {}", instance.artifact.to_string(), instance.address);
    }

    if !simulate {
        let state = context.to_state_file(&network);
        if let Err(message) = write_deployment_state(&state_path, &state) {
            eprintln!("{} {}", red!("error:"), message);
        }
    }

    result.map_err(|e| e.to_string())
}

fn describe_deployment(deployment: &DeploymentSpecification) -> String {
    match deployment.migration_set {
        Some(ref set) if set != &deployment.name => format!("{} [{}]", deployment.name, set),
        _ => deployment.name.clone(),
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("{} {}", red!("error:"), message);
    process::exit(1);
}

fn get_manifest_path_or_exit(path: Option<String>) -> PathBuf {
    if let Some(path) = path {
        let manifest_path = PathBuf::from(path);
        if !manifest_path.exists() {
            eprintln!("Could not find {}", MANIFEST_FILE_NAME);
            process::exit(1);
        }
        return manifest_path;
    }
    let current_dir = env::current_dir().unwrap_or_else(|e| exit_with_error(&e.to_string()));
    match find_manifest_path(&current_dir) {
        Some(manifest_path) => manifest_path,
        None => {
            eprintln!("Could not find {}", MANIFEST_FILE_NAME);
            process::exit(1);
        }
    }
}

fn load_manifest_or_exit(path: Option<String>) -> ProjectManifest {
    let manifest_path = get_manifest_path_or_exit(path);
    match ProjectManifest::from_path(&manifest_path) {
        Ok(manifest) => manifest,
        Err(message) => {
            eprintln!(
                "{} syntax errors in {}\n{}",
                red!("error:"),
                MANIFEST_FILE_NAME,
                message
            );
            process::exit(1);
        }
    }
}
