use std::collections::{BTreeMap, BTreeSet};

use alloy_dyn_abi::DynSolValue;

use crate::errors::DeploymentError;
use crate::types::{
    Address, ArtifactName, CallArgument, DeployedInstance, DeploymentStateFile, DeploymentStep,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedLibrary {
    pub library: ArtifactName,
    pub address: Address,
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub index: usize,
    pub step: DeploymentStep,
}

/// State threaded through a run: deployed instances, pending links, completed steps.
#[derive(Debug, Clone, Default)]
pub struct DeploymentContext {
    instances: BTreeMap<ArtifactName, DeployedInstance>,
    history: Vec<DeployedInstance>,
    links: BTreeMap<ArtifactName, Vec<LinkedLibrary>>,
    completed_steps: Vec<StepRecord>,
}

impl DeploymentContext {
    pub fn new() -> DeploymentContext {
        DeploymentContext::default()
    }

    /// Context seeded with instances from a previous run, so later migrations can resume.
    pub fn with_instances(instances: Vec<DeployedInstance>) -> DeploymentContext {
        let mut context = DeploymentContext::new();
        for instance in instances {
            context.instances.insert(instance.artifact.clone(), instance);
        }
        context
    }

    pub fn from_state_file(state: &DeploymentStateFile) -> Result<DeploymentContext, String> {
        let instances = state
            .instances
            .iter()
            .map(DeployedInstance::from_specifications)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DeploymentContext::with_instances(instances))
    }

    pub fn to_state_file(&self, network: &str) -> DeploymentStateFile {
        DeploymentStateFile {
            network: network.to_string(),
            completed_steps: self
                .completed_steps
                .iter()
                .map(|record| format!("{}. {}", record.index + 1, record.step))
                .collect(),
            instances: self
                .instances
                .values()
                .map(|i| i.to_specification_file())
                .collect(),
        }
    }

    pub fn get_instance(&self, name: &ArtifactName) -> Result<&DeployedInstance, DeploymentError> {
        self.instances
            .get(name)
            .ok_or_else(|| DeploymentError::UnknownInstance {
                instance: name.clone(),
            })
    }

    pub fn is_deployed(&self, name: &ArtifactName) -> bool {
        self.instances.contains_key(name)
    }

    pub fn known_instances(&self) -> BTreeSet<ArtifactName> {
        self.instances.keys().cloned().collect()
    }

    pub fn instances(&self) -> impl Iterator<Item = &DeployedInstance> {
        self.instances.values()
    }

    /// Every instance deployed during this run, in deployment order, redeployments included.
    pub fn history(&self) -> &[DeployedInstance] {
        &self.history
    }

    pub(crate) fn record_deployment(&mut self, instance: DeployedInstance) {
        self.history.push(instance.clone());
        self.instances.insert(instance.artifact.clone(), instance);
    }

    pub(crate) fn record_link(&mut self, target: &ArtifactName, link: LinkedLibrary) {
        let links = self.links.entry(target.clone()).or_default();
        links.retain(|existing| existing.library != link.library);
        links.push(link);
    }

    pub fn links_for(&self, target: &ArtifactName) -> &[LinkedLibrary] {
        self.links
            .get(target)
            .map(|links| links.as_slice())
            .unwrap_or_default()
    }

    pub(crate) fn record_step(&mut self, index: usize, step: &DeploymentStep) {
        self.completed_steps.push(StepRecord {
            index,
            step: step.clone(),
        });
    }

    pub fn completed_steps(&self) -> &[StepRecord] {
        &self.completed_steps
    }

    /// Integers resolve at full width; the declared parameter type narrows them at encoding.
    pub fn resolve_argument(&self, argument: &CallArgument) -> Result<DynSolValue, DeploymentError> {
        let value = match argument {
            CallArgument::Instance(name) => DynSolValue::Address(self.get_instance(name)?.address),
            CallArgument::Address(address) => DynSolValue::Address(*address),
            CallArgument::Uint(value) => DynSolValue::Uint(*value, 256),
            CallArgument::Bool(value) => DynSolValue::Bool(*value),
            CallArgument::String(value) => DynSolValue::String(value.clone()),
            CallArgument::Bytes(value) => DynSolValue::Bytes(value.clone()),
        };
        Ok(value)
    }

    pub fn resolve_arguments(
        &self,
        arguments: &[CallArgument],
    ) -> Result<Vec<DynSolValue>, DeploymentError> {
        arguments.iter().map(|a| self.resolve_argument(a)).collect()
    }
}
