use thiserror::Error;

use crate::types::ArtifactName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeploymentError {
    #[error("artifact {name} not found in {location}")]
    ArtifactNotFound { name: ArtifactName, location: String },

    #[error("artifact {name} is invalid: {reason}")]
    InvalidArtifact { name: ArtifactName, reason: String },

    #[error("library {library} is not resolved for {target}")]
    UnresolvedLibrary { library: String, target: ArtifactName },

    #[error("deployment of {artifact} failed: {reason}")]
    DeploymentFailed { artifact: ArtifactName, reason: String },

    #[error("instance {instance} has not been deployed in this run")]
    UnknownInstance { instance: ArtifactName },

    #[error("call {instance}.{method} failed: {reason}")]
    MethodCall {
        instance: ArtifactName,
        method: String,
        reason: String,
    },

    #[error("{instance} has no method {method} taking {arity} argument(s)")]
    UnknownMethod {
        instance: ArtifactName,
        method: String,
        arity: usize,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("network id mismatch: expected {expected}, node reported {reported}")]
    NetworkMismatch { expected: String, reported: String },

    #[error("network error: {0}")]
    Network(String),
}
