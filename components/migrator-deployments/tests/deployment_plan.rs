use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::mpsc::channel;

use alloy_json_abi::JsonAbi;
use migrator_deployments::abi::function_selector;
use migrator_deployments::artifacts::{Artifact, InMemoryArtifactRegistry};
use migrator_deployments::context::DeploymentContext;
use migrator_deployments::linker::{hashed_placeholder, legacy_placeholder};
use migrator_deployments::migrations::MigrationSet;
use migrator_deployments::onchain::{
    apply_on_chain_deployment, ChainBackend, DeploymentEvent, DeploymentOrchestrator,
    OrchestratorSettings, SimulatedChain, StepStatus,
};
use migrator_deployments::types::{
    address_hex, check_step_ordering, ArtifactName, CallArgument, DeploymentStep,
};
use migrator_deployments::DeploymentError;
use migrator_files::{CompilerConfig, NetworkId, NetworkProfile, DEFAULT_GAS_LIMIT};
use serde_json::json;

fn name(value: &str) -> ArtifactName {
    ArtifactName::from_str(value).unwrap()
}

fn abi_with_function(method: &str, input: &str) -> JsonAbi {
    serde_json::from_value(json!([{
        "type": "function",
        "name": method,
        "inputs": [{ "name": "", "type": input, "internalType": input }],
        "outputs": [],
        "stateMutability": "nonpayable"
    }]))
    .unwrap()
}

fn hotel_registry() -> InMemoryArtifactRegistry {
    let string_utils = Artifact::new(
        name("StringUtils"),
        JsonAbi::default(),
        "0x60566050600b82828239",
    );
    let resource_manager = Artifact::new(
        name("ResourceManager"),
        abi_with_function("addResource", "string"),
        &format!(
            "0x608060405234801561001057600080fd5b5073{}6300",
            hashed_placeholder("project:/contracts/StringUtils.sol:StringUtils")
        ),
    );
    let basic_hotel_manager = Artifact::new(
        name("BasicHotelManager"),
        JsonAbi::default(),
        &format!("0x6080604052{}00", legacy_placeholder("StringUtils")),
    );
    let hotel_manager = Artifact::new(
        name("HotelManager"),
        abi_with_function("setResourceManagerAddress", "address"),
        "0x608060405234801561001057600080fd5b50",
    );
    InMemoryArtifactRegistry::with_artifacts(vec![
        string_utils,
        resource_manager,
        basic_hotel_manager,
        hotel_manager,
    ])
}

fn orchestrator(
    chain: SimulatedChain,
) -> DeploymentOrchestrator<SimulatedChain, InMemoryArtifactRegistry> {
    DeploymentOrchestrator::new(chain, hotel_registry(), OrchestratorSettings::default())
}

fn resource_manager_steps() -> Vec<DeploymentStep> {
    vec![
        DeploymentStep::deploy_library(name("StringUtils")),
        DeploymentStep::link_library(name("StringUtils"), name("ResourceManager")),
        DeploymentStep::deploy_contract(name("ResourceManager"), vec![]),
    ]
}

fn set_address_call() -> DeploymentStep {
    DeploymentStep::post_deploy_call(
        name("HotelManager"),
        "setResourceManagerAddress",
        vec![CallArgument::Instance(name("ResourceManager"))],
    )
}

#[test]
fn linked_contract_carries_library_address() {
    let mut orchestrator = orchestrator(SimulatedChain::new());
    let mut context = DeploymentContext::new();
    orchestrator
        .run(&resource_manager_steps(), &mut context)
        .unwrap();

    let library = context.get_instance(&name("StringUtils")).unwrap().clone();
    let resource_manager = context.get_instance(&name("ResourceManager")).unwrap();

    let deployed_hex = hex::encode(&resource_manager.bytecode);
    assert!(deployed_hex.contains(&address_hex(&library.address)));
    assert!(!deployed_hex.contains("__"));
    assert_eq!(
        orchestrator.backend().code_at(&resource_manager.address),
        Some(resource_manager.bytecode.as_slice())
    );
    assert_eq!(context.completed_steps().len(), 3);
}

#[test]
fn call_before_target_instance_exists_fails() {
    let mut orchestrator = orchestrator(SimulatedChain::new());
    let mut context = DeploymentContext::new();
    let steps = vec![
        DeploymentStep::deploy_contract(name("HotelManager"), vec![]),
        set_address_call(),
    ];

    let err = orchestrator.run(&steps, &mut context).unwrap_err();
    assert_eq!(
        err,
        DeploymentError::UnknownInstance {
            instance: name("ResourceManager")
        }
    );
    assert_eq!(context.completed_steps().len(), 1);
    assert!(orchestrator.backend().calls().is_empty());
}

#[test]
fn link_before_library_deployment_fails() {
    let mut orchestrator = orchestrator(SimulatedChain::new());
    let mut context = DeploymentContext::new();
    let steps = vec![
        DeploymentStep::link_library(name("StringUtils"), name("ResourceManager")),
        DeploymentStep::deploy_library(name("StringUtils")),
    ];

    let err = orchestrator.run(&steps, &mut context).unwrap_err();
    assert_eq!(
        err,
        DeploymentError::UnresolvedLibrary {
            library: "StringUtils".into(),
            target: name("ResourceManager"),
        }
    );
    assert!(context.completed_steps().is_empty());
    assert_eq!(orchestrator.backend().block_number(), 0);
}

#[test]
fn unlinked_contract_is_not_deployed() {
    let mut orchestrator = orchestrator(SimulatedChain::new());
    let mut context = DeploymentContext::new();
    let steps = vec![
        DeploymentStep::deploy_library(name("StringUtils")),
        DeploymentStep::deploy_contract(name("BasicHotelManager"), vec![]),
    ];

    let err = orchestrator.run(&steps, &mut context).unwrap_err();
    assert_eq!(
        err,
        DeploymentError::UnresolvedLibrary {
            library: "StringUtils".into(),
            target: name("BasicHotelManager"),
        }
    );
    assert_eq!(orchestrator.backend().block_number(), 1);
}

#[test]
fn full_sequences_run_in_order() {
    for set in [MigrationSet::ResourceManager, MigrationSet::BasicHotelManager] {
        let steps = set.deployment("development").steps();
        let (deployment_event_tx, deployment_event_rx) = channel();

        let (context, result) = apply_on_chain_deployment(
            SimulatedChain::new(),
            hotel_registry(),
            OrchestratorSettings::default(),
            steps.clone(),
            DeploymentContext::new(),
            deployment_event_tx,
        );
        result.unwrap();

        let completed = context
            .completed_steps()
            .iter()
            .map(|record| record.step.clone())
            .collect::<Vec<_>>();
        assert_eq!(completed, steps);

        let deployed = context
            .history()
            .iter()
            .map(|instance| instance.artifact.to_string())
            .collect::<Vec<_>>();
        let expected = match set {
            MigrationSet::ResourceManager => {
                vec!["StringUtils", "ResourceManager", "HotelManager"]
            }
            MigrationSet::BasicHotelManager => vec![
                "StringUtils",
                "ResourceManager",
                "BasicHotelManager",
                "HotelManager",
            ],
        };
        assert_eq!(deployed, expected);

        let events = deployment_event_rx.try_iter().collect::<Vec<_>>();
        assert_eq!(events.last(), Some(&DeploymentEvent::DeploymentCompleted));
        let confirmed_indexes = events
            .iter()
            .filter_map(|event| match event {
                DeploymentEvent::StepUpdate(tracker) => match tracker.status {
                    StepStatus::Confirmed(_) | StepStatus::Linked(_) => Some(tracker.index),
                    _ => None,
                },
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(confirmed_indexes, (0..steps.len()).collect::<Vec<_>>());
    }
}

#[test]
fn post_deploy_call_passes_resource_manager_address() {
    let mut orchestrator = orchestrator(SimulatedChain::new());
    let mut context = DeploymentContext::new();
    let steps = MigrationSet::ResourceManager
        .deployment("development")
        .steps();
    orchestrator.run(&steps, &mut context).unwrap();

    let resource_manager = context.get_instance(&name("ResourceManager")).unwrap();
    let hotel_manager = context.get_instance(&name("HotelManager")).unwrap();
    let calls = orchestrator.backend().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].to, hotel_manager.address);

    let mut expected = function_selector("setResourceManagerAddress(address)").to_vec();
    expected.extend_from_slice(&[0u8; 12]);
    expected.extend_from_slice(resource_manager.address.as_slice());
    assert_eq!(calls[0].data, expected);
}

#[test]
fn fresh_networks_yield_new_addresses() {
    let steps = MigrationSet::ResourceManager
        .deployment("development")
        .steps();

    let mut first = DeploymentContext::new();
    orchestrator(SimulatedChain::new())
        .run(&steps, &mut first)
        .unwrap();
    let mut second = DeploymentContext::new();
    orchestrator(SimulatedChain::new())
        .run(&steps, &mut second)
        .unwrap();

    for artifact in ["StringUtils", "ResourceManager", "HotelManager"] {
        assert_ne!(
            first.get_instance(&name(artifact)).unwrap().address,
            second.get_instance(&name(artifact)).unwrap().address
        );
    }
}

#[test]
fn reverted_call_aborts_with_method_call_error() {
    let mut chain = SimulatedChain::new();
    chain.revert_method("setResourceManagerAddress(address)");
    let mut orchestrator = orchestrator(chain);
    let mut context = DeploymentContext::new();
    let steps = MigrationSet::ResourceManager
        .deployment("development")
        .steps();

    let err = orchestrator.run(&steps, &mut context).unwrap_err();
    assert!(matches!(
        err,
        DeploymentError::MethodCall { ref method, .. } if method == "setResourceManagerAddress"
    ));
    assert_eq!(context.completed_steps().len(), 4);
}

#[test]
fn reverted_deployment_aborts_remaining_steps() {
    let mut chain = SimulatedChain::new();
    chain.revert_next_deployment();
    let mut orchestrator = orchestrator(chain);
    let mut context = DeploymentContext::new();
    let (deployment_event_tx, deployment_event_rx) = channel();
    orchestrator = orchestrator.with_event_sender(deployment_event_tx);

    let err = orchestrator
        .run(&resource_manager_steps(), &mut context)
        .unwrap_err();
    assert!(matches!(err, DeploymentError::DeploymentFailed { .. }));
    assert!(context.completed_steps().is_empty());
    assert_eq!(orchestrator.backend().block_number(), 1);

    let events = deployment_event_rx.try_iter().collect::<Vec<_>>();
    match events.last() {
        Some(DeploymentEvent::Interrupted(message)) => {
            assert!(message.starts_with("step 1 (deploy library StringUtils) failed"))
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn rejected_transaction_is_a_deployment_failure() {
    let mut chain = SimulatedChain::new();
    chain.reject_transactions(Some("insufficient funds for gas"));
    let mut context = DeploymentContext::new();

    let err = orchestrator(chain)
        .run(&resource_manager_steps(), &mut context)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "deployment of StringUtils failed: rejected by node: insufficient funds for gas"
    );
}

#[test]
fn unknown_artifact_is_reported() {
    let mut context = DeploymentContext::new();
    let steps = vec![DeploymentStep::deploy_contract(name("Reservations"), vec![])];
    let err = orchestrator(SimulatedChain::new())
        .run(&steps, &mut context)
        .unwrap_err();
    assert!(matches!(err, DeploymentError::ArtifactNotFound { .. }));
}

#[test]
fn unknown_method_is_reported() {
    let mut context = DeploymentContext::new();
    let steps = vec![
        DeploymentStep::deploy_contract(name("HotelManager"), vec![]),
        DeploymentStep::post_deploy_call(name("HotelManager"), "checkIn", vec![]),
    ];
    let err = orchestrator(SimulatedChain::new())
        .run(&steps, &mut context)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "HotelManager has no method checkIn taking 0 argument(s)"
    );
}

#[test]
fn network_id_is_checked_before_submitting() {
    let settings = OrchestratorSettings {
        expected_network_id: NetworkId::Exact("1".into()),
        ..OrchestratorSettings::default()
    };
    let mut orchestrator = DeploymentOrchestrator::new(
        SimulatedChain::new().with_network_id("5777"),
        hotel_registry(),
        settings,
    );
    let mut context = DeploymentContext::new();

    let err = orchestrator
        .run(&resource_manager_steps(), &mut context)
        .unwrap_err();
    assert_eq!(
        err,
        DeploymentError::NetworkMismatch {
            expected: "1".into(),
            reported: "5777".into(),
        }
    );
    assert_eq!(orchestrator.backend().block_number(), 0);
}

#[test]
fn later_migrations_resume_from_preloaded_instances() {
    let deployment = MigrationSet::ResourceManager.deployment("development");

    let chain = SimulatedChain::new();
    let sender = chain.default_sender().unwrap();
    let mut first_run = DeploymentContext::new();
    let mut orchestrator = orchestrator(chain);
    orchestrator
        .run(&deployment.steps_from(1)[..3], &mut first_run)
        .unwrap();
    assert_eq!(orchestrator.backend().accounts()[0], sender);

    let state = first_run.to_state_file("development");
    let mut resumed = DeploymentContext::from_state_file(&state).unwrap();
    let remaining = deployment.steps_from(2);
    assert!(check_step_ordering(&remaining, &resumed.known_instances()).is_empty());
    assert!(!check_step_ordering(&remaining, &BTreeSet::new()).is_empty());

    orchestrator.run(&remaining, &mut resumed).unwrap();
    let calls = orchestrator.backend().calls();
    assert_eq!(calls.len(), 1);
    assert!(hex::encode(&calls[0].data).ends_with(&address_hex(
        &first_run
            .get_instance(&name("ResourceManager"))
            .unwrap()
            .address
    )));
}

#[test]
fn dry_run_ignores_the_profile_sender() {
    let profile = NetworkProfile {
        name: "development".into(),
        network_id: NetworkId::Exact("1337".into()),
        host: "127.0.0.1".into(),
        port: 7545,
        from: Some("0x627306090abaB3A6e1400e9345bC60c78a8BEf57".into()),
        gas: DEFAULT_GAS_LIMIT,
        confirmation_poll_interval_ms: 500,
    };
    let settings =
        OrchestratorSettings::from_network_profile(&profile, &CompilerConfig::default()).unwrap();
    assert!(settings.sender.is_some());
    let settings = settings.simulated();
    assert_eq!(settings.sender, None);
    assert_eq!(settings.expected_network_id, NetworkId::Any);

    let chain = SimulatedChain::new();
    let simulated_sender = chain.default_sender().unwrap();
    let mut orchestrator = DeploymentOrchestrator::new(chain, hotel_registry(), settings);
    let mut context = DeploymentContext::new();
    orchestrator
        .run(&resource_manager_steps(), &mut context)
        .unwrap();
    assert_eq!(context.completed_steps().len(), 3);
    assert_eq!(orchestrator.backend().accounts()[0], simulated_sender);
}

#[test]
fn profile_sender_is_rejected_by_the_simulated_chain() {
    let settings = OrchestratorSettings {
        sender: Some("0x627306090abaB3A6e1400e9345bC60c78a8BEf57".parse().unwrap()),
        ..OrchestratorSettings::default()
    };
    let err = DeploymentOrchestrator::new(SimulatedChain::new(), hotel_registry(), settings)
        .run(&resource_manager_steps(), &mut DeploymentContext::new())
        .unwrap_err();
    assert!(matches!(err, DeploymentError::DeploymentFailed { .. }));
}
