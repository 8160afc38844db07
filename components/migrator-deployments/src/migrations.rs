use std::fmt;
use std::str::FromStr;

use crate::types::{
    ArtifactName, CallArgument, DeploymentSpecification, DeploymentStep, MigrationSpecification,
};

/// The two interchangeable first migrations of the hotel project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationSet {
    /// StringUtils and ResourceManager.
    ResourceManager,
    /// StringUtils, ResourceManager and BasicHotelManager.
    BasicHotelManager,
}

pub const MIGRATION_SETS: [MigrationSet; 2] =
    [MigrationSet::ResourceManager, MigrationSet::BasicHotelManager];

impl MigrationSet {
    pub fn name(&self) -> &'static str {
        match self {
            MigrationSet::ResourceManager => "resource-manager",
            MigrationSet::BasicHotelManager => "basic-hotel-manager",
        }
    }

    pub fn migrations(&self) -> Vec<MigrationSpecification> {
        let string_utils = ArtifactName::from_static("StringUtils");
        let resource_manager = ArtifactName::from_static("ResourceManager");
        let basic_hotel_manager = ArtifactName::from_static("BasicHotelManager");
        let hotel_manager = ArtifactName::from_static("HotelManager");

        let first = match self {
            MigrationSet::ResourceManager => MigrationSpecification {
                id: 1,
                name: "deploy_rmsc".into(),
                steps: vec![
                    DeploymentStep::deploy_library(string_utils.clone()),
                    DeploymentStep::link_library(string_utils, resource_manager.clone()),
                    DeploymentStep::deploy_contract(resource_manager.clone(), vec![]),
                ],
            },
            MigrationSet::BasicHotelManager => MigrationSpecification {
                id: 1,
                name: "deploy_rmsc_basic_hotel_manager".into(),
                steps: vec![
                    DeploymentStep::deploy_library(string_utils.clone()),
                    DeploymentStep::link_library(string_utils.clone(), resource_manager.clone()),
                    DeploymentStep::link_library(string_utils, basic_hotel_manager.clone()),
                    DeploymentStep::deploy_contract(resource_manager.clone(), vec![]),
                    DeploymentStep::deploy_contract(basic_hotel_manager, vec![]),
                ],
            },
        };

        let second = MigrationSpecification {
            id: 2,
            name: "deploy_hotel_manager".into(),
            steps: vec![
                DeploymentStep::deploy_contract(hotel_manager.clone(), vec![]),
                DeploymentStep::post_deploy_call(
                    hotel_manager,
                    "setResourceManagerAddress",
                    vec![CallArgument::Instance(resource_manager)],
                ),
            ],
        };

        vec![first, second]
    }

    pub fn deployment(&self, network: &str) -> DeploymentSpecification {
        DeploymentSpecification {
            id: 0,
            name: self.name().to_string(),
            network: network.to_string(),
            migration_set: Some(self.name().to_string()),
            migrations: self.migrations(),
        }
    }
}

impl FromStr for MigrationSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MIGRATION_SETS
            .iter()
            .find(|set| set.name() == s.trim())
            .copied()
            .ok_or_else(|| {
                let known = MIGRATION_SETS.iter().map(|s| s.name()).collect::<Vec<_>>();
                format!(
                    "unknown migration set '{}' (expected one of: {})",
                    s,
                    known.join(", ")
                )
            })
    }
}

impl fmt::Display for MigrationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The command line wins over the manifest; with neither, the operator has to choose.
pub fn select_migration_set(
    from_command_line: Option<&str>,
    from_manifest: Option<&str>,
) -> Result<MigrationSet, String> {
    match from_command_line.or(from_manifest) {
        Some(name) => MigrationSet::from_str(name),
        None => Err(format!(
            "no migration set selected: pass --migration-set or set project.migration_set ({})",
            MIGRATION_SETS
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(" or ")
        )),
    }
}
