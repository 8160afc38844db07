use std::fmt;
use std::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};

use migrator_files::{CompilerConfig, NetworkId, NetworkProfile, DEFAULT_GAS_LIMIT};

use crate::abi::{encode_arguments, encode_function_call, find_constructor, find_function};
use crate::artifacts::ArtifactRegistry;
use crate::context::{DeploymentContext, LinkedLibrary};
use crate::errors::DeploymentError;
use crate::linker::{
    decode_bytecode, describe_placeholder, library_placeholders, link_bytecode,
    unresolved_placeholders,
};
use crate::types::{
    parse_address, Address, ArtifactName, CallArgument, DeployedInstance, DeploymentStep,
    LinkLibrarySpecification, PostDeployCallSpecification,
};

mod rpc_backend;
mod simnet;

pub use rpc_backend::RpcChainBackend;
pub use simnet::{SimulatedCall, SimulatedChain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub contract_address: Option<Address>,
    pub succeeded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The node could not be reached or answered something unreadable.
    Transport(String),
    /// The node refused the transaction.
    Rejected(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Transport(e) => write!(f, "unable to reach node: {}", e),
            ChainError::Rejected(e) => write!(f, "rejected by node: {}", e),
        }
    }
}

pub trait ChainBackend {
    fn network_id(&self) -> Result<String, ChainError>;

    fn default_sender(&self) -> Result<Address, ChainError>;

    fn submit_deployment(
        &mut self,
        sender: &Address,
        bytecode: &[u8],
        gas: u64,
    ) -> Result<String, ChainError>;

    fn submit_call(
        &mut self,
        sender: &Address,
        to: &Address,
        data: &[u8],
        gas: u64,
    ) -> Result<String, ChainError>;

    /// Blocks until the transaction is mined.
    fn wait_for_receipt(&mut self, transaction_hash: &str) -> Result<Receipt, ChainError>;
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub expected_network_id: NetworkId,
    pub sender: Option<Address>,
    pub gas: u64,
    pub compiler: CompilerConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        OrchestratorSettings {
            expected_network_id: NetworkId::Any,
            sender: None,
            gas: DEFAULT_GAS_LIMIT,
            compiler: CompilerConfig::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_network_profile(
        profile: &NetworkProfile,
        compiler: &CompilerConfig,
    ) -> Result<OrchestratorSettings, String> {
        let sender = match profile.from {
            Some(ref from) => Some(
                parse_address(from).map_err(|e| format!("network '{}': {}", profile.name, e))?,
            ),
            None => None,
        };
        Ok(OrchestratorSettings {
            expected_network_id: profile.network_id.clone(),
            sender,
            gas: profile.gas,
            compiler: compiler.clone(),
        })
    }

    /// Settings for a dry run: the simulated chain signs with its own accounts and
    /// answers with its own network id.
    pub fn simulated(self) -> OrchestratorSettings {
        OrchestratorSettings {
            expected_network_id: NetworkId::Any,
            sender: None,
            ..self
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Queued,
    Submitted(String),
    Confirmed(Option<Address>),
    Linked(Address),
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepTracker {
    pub index: usize,
    pub name: String,
    pub status: StepStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeploymentEvent {
    StepUpdate(StepTracker),
    Interrupted(String),
    DeploymentCompleted,
}

pub struct DeploymentOrchestrator<B: ChainBackend, R: ArtifactRegistry> {
    backend: B,
    registry: R,
    settings: OrchestratorSettings,
    deployment_event_tx: Option<Sender<DeploymentEvent>>,
}

impl<B: ChainBackend, R: ArtifactRegistry> DeploymentOrchestrator<B, R> {
    pub fn new(backend: B, registry: R, settings: OrchestratorSettings) -> Self {
        DeploymentOrchestrator {
            backend,
            registry,
            settings,
            deployment_event_tx: None,
        }
    }

    pub fn with_event_sender(mut self, deployment_event_tx: Sender<DeploymentEvent>) -> Self {
        self.deployment_event_tx = Some(deployment_event_tx);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn emit(&self, event: DeploymentEvent) {
        if let Some(ref tx) = self.deployment_event_tx {
            let _ = tx.send(event);
        }
    }

    fn emit_step(&self, index: usize, step: &DeploymentStep, status: StepStatus) {
        self.emit(DeploymentEvent::StepUpdate(StepTracker {
            index,
            name: step.to_string(),
            status,
        }));
    }

    /// Executes `steps` in order, stopping at the first failure. Completed steps stay
    /// recorded in `context`.
    pub fn run(
        &mut self,
        steps: &[DeploymentStep],
        context: &mut DeploymentContext,
    ) -> Result<(), DeploymentError> {
        let sender = match self.prepare() {
            Ok(sender) => sender,
            Err(e) => {
                self.emit(DeploymentEvent::Interrupted(e.to_string()));
                return Err(e);
            }
        };

        for (index, step) in steps.iter().enumerate() {
            self.emit_step(index, step, StepStatus::Queued);
            info!("step {}: {}", index + 1, step);
            if let Err(e) = self.execute_step(index, step, &sender, context) {
                error!("step {} failed: {}", index + 1, e);
                self.emit_step(index, step, StepStatus::Error(e.to_string()));
                let summary = match index {
                    0 => format!("step 1 ({}) failed: {}", step, e),
                    _ => format!(
                        "steps 1..{} succeeded, step {} ({}) failed: {}",
                        index,
                        index + 1,
                        step,
                        e
                    ),
                };
                self.emit(DeploymentEvent::Interrupted(summary));
                return Err(e);
            }
            context.record_step(index, step);
        }

        self.emit(DeploymentEvent::DeploymentCompleted);
        Ok(())
    }

    fn prepare(&self) -> Result<Address, DeploymentError> {
        if let NetworkId::Exact(ref expected) = self.settings.expected_network_id {
            let reported = self
                .backend
                .network_id()
                .map_err(|e| DeploymentError::Network(e.to_string()))?;
            if !self.settings.expected_network_id.matches(&reported) {
                return Err(DeploymentError::NetworkMismatch {
                    expected: expected.clone(),
                    reported,
                });
            }
        }
        match self.settings.sender {
            Some(sender) => Ok(sender),
            None => self
                .backend
                .default_sender()
                .map_err(|e| DeploymentError::Network(e.to_string())),
        }
    }

    fn execute_step(
        &mut self,
        index: usize,
        step: &DeploymentStep,
        sender: &Address,
        context: &mut DeploymentContext,
    ) -> Result<(), DeploymentError> {
        match step {
            DeploymentStep::DeployLibrary(spec) => {
                self.deploy(index, step, &spec.artifact, &[], sender, context)
            }
            DeploymentStep::DeployContract(spec) => {
                self.deploy(index, step, &spec.artifact, &spec.arguments, sender, context)
            }
            DeploymentStep::LinkLibrary(spec) => self.link(index, step, spec, context),
            DeploymentStep::PostDeployCall(spec) => self.call(index, step, spec, sender, context),
        }
    }

    fn deploy(
        &mut self,
        index: usize,
        step: &DeploymentStep,
        name: &ArtifactName,
        arguments: &[CallArgument],
        sender: &Address,
        context: &mut DeploymentContext,
    ) -> Result<(), DeploymentError> {
        let artifact = self.registry.resolve(name)?;
        if let Some(ref version) = artifact.compiler_version {
            if !self.settings.compiler.accepts(version) {
                warn!(
                    "{} was compiled with solc {}, project pins {}",
                    name,
                    version,
                    self.settings.compiler.version.as_deref().unwrap_or("*")
                );
            }
        }

        let mut bytecode = artifact.bytecode.clone();
        for link in context.links_for(name) {
            let (linked, substitutions) = link_bytecode(&bytecode, &link.placeholders, &link.address);
            debug!(
                "{}: {} placeholder(s) for {} replaced",
                name, substitutions, link.library
            );
            bytecode = linked;
        }
        if let Some(placeholder) = unresolved_placeholders(&bytecode).first() {
            return Err(DeploymentError::UnresolvedLibrary {
                library: describe_placeholder(placeholder),
                target: name.clone(),
            });
        }
        if bytecode.is_empty() {
            return Err(DeploymentError::DeploymentFailed {
                artifact: name.clone(),
                reason: "artifact has no creation bytecode (abstract contract or interface)"
                    .into(),
            });
        }
        let code = decode_bytecode(&bytecode).map_err(|e| DeploymentError::InvalidArtifact {
            name: name.clone(),
            reason: format!("bytecode: {}", e),
        })?;

        let values = context.resolve_arguments(arguments)?;
        let mut data = code.clone();
        match find_constructor(&artifact.abi) {
            Some(constructor) if constructor.inputs.len() == values.len() => {
                data.extend(
                    encode_arguments(&constructor.inputs, &values)
                        .map_err(DeploymentError::InvalidArgument)?,
                );
            }
            None if values.is_empty() => {}
            _ => {
                return Err(DeploymentError::UnknownMethod {
                    instance: name.clone(),
                    method: "constructor".into(),
                    arity: values.len(),
                })
            }
        }

        let failed = |reason: String| DeploymentError::DeploymentFailed {
            artifact: name.clone(),
            reason,
        };

        let transaction_hash = self
            .backend
            .submit_deployment(sender, &data, self.settings.gas)
            .map_err(|e| failed(e.to_string()))?;
        self.emit_step(index, step, StepStatus::Submitted(transaction_hash.clone()));

        let receipt = self
            .backend
            .wait_for_receipt(&transaction_hash)
            .map_err(|e| failed(e.to_string()))?;
        if !receipt.succeeded {
            return Err(failed(format!("transaction {} reverted", transaction_hash)));
        }
        let address = receipt
            .contract_address
            .ok_or_else(|| failed(format!("receipt of {} has no contract address", transaction_hash)))?;

        info!("{} deployed at {} ({})", name, address, transaction_hash);
        context.record_deployment(DeployedInstance {
            artifact: name.clone(),
            address,
            bytecode: code,
            transaction_hash,
        });
        self.emit_step(index, step, StepStatus::Confirmed(Some(address)));
        Ok(())
    }

    fn link(
        &mut self,
        index: usize,
        step: &DeploymentStep,
        spec: &LinkLibrarySpecification,
        context: &mut DeploymentContext,
    ) -> Result<(), DeploymentError> {
        let address = match context.get_instance(&spec.library) {
            Ok(instance) => instance.address,
            Err(_) => {
                return Err(DeploymentError::UnresolvedLibrary {
                    library: spec.library.to_string(),
                    target: spec.target.clone(),
                })
            }
        };

        let library = self.registry.resolve(&spec.library)?;
        let target = self.registry.resolve(&spec.target)?;
        let placeholders = library_placeholders(&library);

        if !placeholders.iter().any(|p| target.bytecode.contains(p.as_str())) {
            warn!(
                "{} does not reference {}, link has no effect",
                spec.target, spec.library
            );
        }
        if context.is_deployed(&spec.target) {
            warn!(
                "{} is already deployed, link only applies to later deployments",
                spec.target
            );
        }

        context.record_link(
            &spec.target,
            LinkedLibrary {
                library: spec.library.clone(),
                address,
                placeholders,
            },
        );
        info!("{} linked into {} at {}", spec.library, spec.target, address);
        self.emit_step(index, step, StepStatus::Linked(address));
        Ok(())
    }

    fn call(
        &mut self,
        index: usize,
        step: &DeploymentStep,
        spec: &PostDeployCallSpecification,
        sender: &Address,
        context: &mut DeploymentContext,
    ) -> Result<(), DeploymentError> {
        let to = context.get_instance(&spec.instance)?.address;
        let values = context.resolve_arguments(&spec.arguments)?;

        let artifact = self.registry.resolve(&spec.instance)?;
        let function = find_function(&artifact.abi, &spec.method, values.len()).ok_or_else(|| {
            DeploymentError::UnknownMethod {
                instance: spec.instance.clone(),
                method: spec.method.clone(),
                arity: values.len(),
            }
        })?;
        let data =
            encode_function_call(function, &values).map_err(DeploymentError::InvalidArgument)?;

        let failed = |reason: String| DeploymentError::MethodCall {
            instance: spec.instance.clone(),
            method: spec.method.clone(),
            reason,
        };

        let transaction_hash = self
            .backend
            .submit_call(sender, &to, &data, self.settings.gas)
            .map_err(|e| failed(e.to_string()))?;
        self.emit_step(index, step, StepStatus::Submitted(transaction_hash.clone()));

        let receipt = self
            .backend
            .wait_for_receipt(&transaction_hash)
            .map_err(|e| failed(e.to_string()))?;
        if !receipt.succeeded {
            return Err(failed(format!("transaction {} reverted", transaction_hash)));
        }

        info!("{}.{} confirmed ({})", spec.instance, spec.method, transaction_hash);
        self.emit_step(index, step, StepStatus::Confirmed(None));
        Ok(())
    }
}

/// Entry point for a worker thread: progress goes through `deployment_event_tx`, the final
/// context comes back with the outcome so the caller can persist it.
pub fn apply_on_chain_deployment<B: ChainBackend, R: ArtifactRegistry>(
    backend: B,
    registry: R,
    settings: OrchestratorSettings,
    steps: Vec<DeploymentStep>,
    mut context: DeploymentContext,
    deployment_event_tx: Sender<DeploymentEvent>,
) -> (DeploymentContext, Result<(), DeploymentError>) {
    let mut orchestrator =
        DeploymentOrchestrator::new(backend, registry, settings).with_event_sender(deployment_event_tx);
    let result = orchestrator.run(&steps, &mut context);
    (context, result)
}
