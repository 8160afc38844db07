use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use alloy_primitives::{Address, U256};

/// Name of a compiled contract, validated against Solidity identifier rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactName(String);

pub(crate) fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl ArtifactName {
    pub(crate) fn from_static(name: &'static str) -> ArtifactName {
        debug_assert!(is_valid_identifier(name));
        ArtifactName(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_identifier(&value) {
            Ok(ArtifactName(value))
        } else {
            Err(format!(
                "unable to parse '{}' as a valid artifact name",
                value
            ))
        }
    }
}

impl FromStr for ArtifactName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactName::try_from(s.to_string())
    }
}

impl From<ArtifactName> for String {
    fn from(name: ArtifactName) -> String {
        name.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn parse_address(value: &str) -> Result<Address, String> {
    Address::from_str(value.trim())
        .map_err(|_| format!("unable to parse '{}' as a valid address", value))
}

/// Lowercase hex, without prefix, as it is spliced into bytecode.
pub fn address_hex(address: &Address) -> String {
    hex::encode(address.as_slice())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallArgumentFile {
    Instance(String),
    Address(String),
    Uint(String),
    Bool(bool),
    String(String),
    Bytes(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArgument {
    /// Address of an instance deployed earlier in the run.
    Instance(ArtifactName),
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl CallArgument {
    pub fn from_specifications(specs: &CallArgumentFile) -> Result<CallArgument, String> {
        let argument = match specs {
            CallArgumentFile::Instance(name) => CallArgument::Instance(ArtifactName::from_str(name)?),
            CallArgumentFile::Address(address) => CallArgument::Address(parse_address(address)?),
            CallArgumentFile::Uint(value) => {
                let value = value.trim().replace('_', "");
                let parsed = match value.strip_prefix("0x") {
                    Some(digits) => U256::from_str_radix(digits, 16),
                    None => U256::from_str_radix(&value, 10),
                };
                CallArgument::Uint(
                    parsed.map_err(|_| format!("unable to parse '{}' as an unsigned integer", value))?,
                )
            }
            CallArgumentFile::Bool(value) => CallArgument::Bool(*value),
            CallArgumentFile::String(value) => CallArgument::String(value.clone()),
            CallArgumentFile::Bytes(value) => {
                let digits = value.trim().trim_start_matches("0x");
                CallArgument::Bytes(
                    hex::decode(digits)
                        .map_err(|_| format!("unable to parse '{}' as hex bytes", value))?,
                )
            }
        };
        Ok(argument)
    }

    pub fn to_specification_file(&self) -> CallArgumentFile {
        match self {
            CallArgument::Instance(name) => CallArgumentFile::Instance(name.to_string()),
            CallArgument::Address(address) => CallArgumentFile::Address(address.to_string()),
            CallArgument::Uint(value) => CallArgumentFile::Uint(value.to_string()),
            CallArgument::Bool(value) => CallArgumentFile::Bool(*value),
            CallArgument::String(value) => CallArgumentFile::String(value.clone()),
            CallArgument::Bytes(value) => CallArgumentFile::Bytes(format!("0x{}", hex::encode(value))),
        }
    }
}

impl fmt::Display for CallArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallArgument::Instance(name) => write!(f, "{}.address", name),
            CallArgument::Address(address) => write!(f, "{}", address),
            CallArgument::Uint(value) => write!(f, "{}", value),
            CallArgument::Bool(value) => write!(f, "{}", value),
            CallArgument::String(value) => write!(f, "{:?}", value),
            CallArgument::Bytes(value) => write!(f, "0x{}", hex::encode(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStepFile {
    DeployLibrary(DeployLibrarySpecificationFile),
    LinkLibrary(LinkLibrarySpecificationFile),
    DeployContract(DeployContractSpecificationFile),
    PostDeployCall(PostDeployCallSpecificationFile),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeployLibrarySpecificationFile {
    pub artifact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LinkLibrarySpecificationFile {
    pub library: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeployContractSpecificationFile {
    pub artifact: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<CallArgumentFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PostDeployCallSpecificationFile {
    pub instance: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<CallArgumentFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentStep {
    DeployLibrary(DeployLibrarySpecification),
    LinkLibrary(LinkLibrarySpecification),
    DeployContract(DeployContractSpecification),
    PostDeployCall(PostDeployCallSpecification),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployLibrarySpecification {
    pub artifact: ArtifactName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkLibrarySpecification {
    pub library: ArtifactName,
    pub target: ArtifactName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployContractSpecification {
    pub artifact: ArtifactName,
    pub arguments: Vec<CallArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDeployCallSpecification {
    pub instance: ArtifactName,
    pub method: String,
    pub arguments: Vec<CallArgument>,
}

fn parse_arguments(arguments: &[CallArgumentFile]) -> Result<Vec<CallArgument>, String> {
    arguments.iter().map(CallArgument::from_specifications).collect()
}

impl DeploymentStep {
    pub fn deploy_library(artifact: ArtifactName) -> DeploymentStep {
        DeploymentStep::DeployLibrary(DeployLibrarySpecification { artifact })
    }

    pub fn link_library(library: ArtifactName, target: ArtifactName) -> DeploymentStep {
        DeploymentStep::LinkLibrary(LinkLibrarySpecification { library, target })
    }

    pub fn deploy_contract(artifact: ArtifactName, arguments: Vec<CallArgument>) -> DeploymentStep {
        DeploymentStep::DeployContract(DeployContractSpecification {
            artifact,
            arguments,
        })
    }

    pub fn post_deploy_call(
        instance: ArtifactName,
        method: &str,
        arguments: Vec<CallArgument>,
    ) -> DeploymentStep {
        DeploymentStep::PostDeployCall(PostDeployCallSpecification {
            instance,
            method: method.to_string(),
            arguments,
        })
    }

    pub fn from_specifications(specs: &DeploymentStepFile) -> Result<DeploymentStep, String> {
        let step = match specs {
            DeploymentStepFile::DeployLibrary(spec) => {
                DeploymentStep::deploy_library(ArtifactName::from_str(&spec.artifact)?)
            }
            DeploymentStepFile::LinkLibrary(spec) => DeploymentStep::link_library(
                ArtifactName::from_str(&spec.library)?,
                ArtifactName::from_str(&spec.target)?,
            ),
            DeploymentStepFile::DeployContract(spec) => DeploymentStep::deploy_contract(
                ArtifactName::from_str(&spec.artifact)?,
                parse_arguments(&spec.arguments)?,
            ),
            DeploymentStepFile::PostDeployCall(spec) => {
                if !is_valid_identifier(&spec.method) {
                    return Err(format!(
                        "unable to parse '{}' as a valid method name",
                        spec.method
                    ));
                }
                DeploymentStep::post_deploy_call(
                    ArtifactName::from_str(&spec.instance)?,
                    &spec.method,
                    parse_arguments(&spec.arguments)?,
                )
            }
        };
        Ok(step)
    }

    pub fn to_specification_file(&self) -> DeploymentStepFile {
        match self {
            DeploymentStep::DeployLibrary(spec) => {
                DeploymentStepFile::DeployLibrary(DeployLibrarySpecificationFile {
                    artifact: spec.artifact.to_string(),
                })
            }
            DeploymentStep::LinkLibrary(spec) => {
                DeploymentStepFile::LinkLibrary(LinkLibrarySpecificationFile {
                    library: spec.library.to_string(),
                    target: spec.target.to_string(),
                })
            }
            DeploymentStep::DeployContract(spec) => {
                DeploymentStepFile::DeployContract(DeployContractSpecificationFile {
                    artifact: spec.artifact.to_string(),
                    arguments: spec
                        .arguments
                        .iter()
                        .map(|a| a.to_specification_file())
                        .collect(),
                })
            }
            DeploymentStep::PostDeployCall(spec) => {
                DeploymentStepFile::PostDeployCall(PostDeployCallSpecificationFile {
                    instance: spec.instance.to_string(),
                    method: spec.method.clone(),
                    arguments: spec
                        .arguments
                        .iter()
                        .map(|a| a.to_specification_file())
                        .collect(),
                })
            }
        }
    }
}

impl fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStep::DeployLibrary(spec) => write!(f, "deploy library {}", spec.artifact),
            DeploymentStep::LinkLibrary(spec) => {
                write!(f, "link {} into {}", spec.library, spec.target)
            }
            DeploymentStep::DeployContract(spec) => write!(f, "deploy {}", spec.artifact),
            DeploymentStep::PostDeployCall(spec) => {
                let arguments = spec
                    .arguments
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>();
                write!(f, "call {}.{}({})", spec.instance, spec.method, arguments.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MigrationSpecificationFile {
    pub id: usize,
    pub name: String,
    pub steps: Vec<DeploymentStepFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSpecification {
    pub id: usize,
    pub name: String,
    pub steps: Vec<DeploymentStep>,
}

impl MigrationSpecification {
    pub fn from_specifications(
        specs: &MigrationSpecificationFile,
    ) -> Result<MigrationSpecification, String> {
        let mut steps = vec![];
        for (index, step) in specs.steps.iter().enumerate() {
            let step = DeploymentStep::from_specifications(step).map_err(|e| {
                format!("migration {} ({}), step {}: {}", specs.id, specs.name, index + 1, e)
            })?;
            steps.push(step);
        }
        Ok(MigrationSpecification {
            id: specs.id,
            name: specs.name.clone(),
            steps,
        })
    }

    pub fn to_specification_file(&self) -> MigrationSpecificationFile {
        MigrationSpecificationFile {
            id: self.id,
            name: self.name.clone(),
            steps: self.steps.iter().map(|s| s.to_specification_file()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeploymentSpecificationFile {
    pub id: Option<u32>,
    pub name: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_set: Option<String>,
    pub migrations: Vec<MigrationSpecificationFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSpecification {
    pub id: u32,
    pub name: String,
    pub network: String,
    pub migration_set: Option<String>,
    pub migrations: Vec<MigrationSpecification>,
}

impl DeploymentSpecification {
    pub fn from_config_file(path: &Path) -> Result<DeploymentSpecification, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
        let specification_file: DeploymentSpecificationFile = serde_yaml::from_str(&content)
            .map_err(|e| format!("deployment plan malformatted {}", e))?;
        DeploymentSpecification::from_specifications(&specification_file)
    }

    pub fn from_specifications(
        specs: &DeploymentSpecificationFile,
    ) -> Result<DeploymentSpecification, String> {
        let mut migrations: Vec<MigrationSpecification> = vec![];
        for migration in specs.migrations.iter() {
            if let Some(previous) = migrations.last() {
                if migration.id <= previous.id {
                    return Err(format!(
                        "migration ids must be strictly increasing ({} follows {})",
                        migration.id, previous.id
                    ));
                }
            }
            migrations.push(MigrationSpecification::from_specifications(migration)?);
        }
        Ok(DeploymentSpecification {
            id: specs.id.unwrap_or(0),
            name: specs.name.clone(),
            network: specs.network.clone(),
            migration_set: specs.migration_set.clone(),
            migrations,
        })
    }

    pub fn to_specification_file(&self) -> DeploymentSpecificationFile {
        DeploymentSpecificationFile {
            id: Some(self.id),
            name: self.name.clone(),
            network: self.network.clone(),
            migration_set: self.migration_set.clone(),
            migrations: self
                .migrations
                .iter()
                .map(|m| m.to_specification_file())
                .collect(),
        }
    }

    /// Steps of every migration whose id is at least `from_migration`, in plan order.
    pub fn steps_from(&self, from_migration: usize) -> Vec<DeploymentStep> {
        self.migrations
            .iter()
            .filter(|m| m.id >= from_migration)
            .flat_map(|m| m.steps.iter().cloned())
            .collect()
    }

    pub fn steps(&self) -> Vec<DeploymentStep> {
        self.steps_from(0)
    }

    pub fn check_ordering(&self, preloaded: &BTreeSet<ArtifactName>) -> Vec<String> {
        check_step_ordering(&self.steps(), preloaded)
    }
}

/// Static counterpart of the run-time checks: reports, in plan order, every step that would
/// reference a library or instance not deployed yet, and every link that comes too late.
pub fn check_step_ordering(
    steps: &[DeploymentStep],
    preloaded: &BTreeSet<ArtifactName>,
) -> Vec<String> {
    let mut deployed = preloaded.clone();
    let mut deployed_by_plan = BTreeSet::new();
    let mut issues = vec![];

    for (index, step) in steps.iter().enumerate() {
        let position = index + 1;
        match step {
            DeploymentStep::DeployLibrary(DeployLibrarySpecification { artifact })
            | DeploymentStep::DeployContract(DeployContractSpecification { artifact, .. }) => {
                deployed.insert(artifact.clone());
                deployed_by_plan.insert(artifact.clone());
            }
            DeploymentStep::LinkLibrary(spec) => {
                if !deployed.contains(&spec.library) {
                    issues.push(format!(
                        "step {}: {} is linked into {} before being deployed",
                        position, spec.library, spec.target
                    ));
                }
                if deployed_by_plan.contains(&spec.target) {
                    issues.push(format!(
                        "step {}: {} is linked into {} after {} was deployed",
                        position, spec.library, spec.target, spec.target
                    ));
                }
            }
            DeploymentStep::PostDeployCall(spec) => {
                if !deployed.contains(&spec.instance) {
                    issues.push(format!(
                        "step {}: {}.{} is called before {} is deployed",
                        position, spec.instance, spec.method, spec.instance
                    ));
                }
                for argument in spec.arguments.iter() {
                    if let CallArgument::Instance(name) = argument {
                        if !deployed.contains(name) {
                            issues.push(format!(
                                "step {}: {}.{} references {} before it is deployed",
                                position, spec.instance, spec.method, name
                            ));
                        }
                    }
                }
            }
        }
    }
    issues
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedInstance {
    pub artifact: ArtifactName,
    pub address: Address,
    /// Linked bytecode that was submitted, empty for instances reloaded from a state file.
    pub bytecode: Vec<u8>,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeployedInstanceFile {
    pub artifact: String,
    pub address: String,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeploymentStateFile {
    pub network: String,
    pub completed_steps: Vec<String>,
    pub instances: Vec<DeployedInstanceFile>,
}

impl DeployedInstance {
    pub fn from_specifications(specs: &DeployedInstanceFile) -> Result<DeployedInstance, String> {
        Ok(DeployedInstance {
            artifact: ArtifactName::from_str(&specs.artifact)?,
            address: parse_address(&specs.address)?,
            bytecode: vec![],
            transaction_hash: specs.transaction_hash.clone(),
        })
    }

    pub fn to_specification_file(&self) -> DeployedInstanceFile {
        DeployedInstanceFile {
            artifact: self.artifact.to_string(),
            address: self.address.to_string(),
            transaction_hash: self.transaction_hash.clone(),
        }
    }
}
