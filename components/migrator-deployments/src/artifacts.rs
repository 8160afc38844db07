use std::collections::BTreeMap;
use std::path::PathBuf;

use alloy_json_abi::JsonAbi;

use crate::errors::DeploymentError;
use crate::types::ArtifactName;

/// Subset of a Truffle build artifact (`build/contracts/<Name>.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactFile {
    pub contract_name: String,
    #[serde(default)]
    pub abi: JsonAbi,
    #[serde(default)]
    pub bytecode: String,
    #[serde(default)]
    pub source_path: Option<String>,
    #[serde(default)]
    pub ast: Option<ArtifactAstFile>,
    #[serde(default)]
    pub compiler: Option<ArtifactCompilerFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactAstFile {
    pub absolute_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactCompilerFile {
    pub name: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: ArtifactName,
    pub abi: JsonAbi,
    /// Unlinked creation bytecode, hex without prefix, placeholders included.
    pub bytecode: String,
    pub source_unit: Option<String>,
    pub compiler_version: Option<String>,
}

impl Artifact {
    pub fn new(name: ArtifactName, abi: JsonAbi, bytecode: &str) -> Artifact {
        Artifact {
            source_unit: Some(format!("project:/contracts/{}.sol", name)),
            name,
            abi,
            bytecode: bytecode.trim_start_matches("0x").to_string(),
            compiler_version: None,
        }
    }

    pub fn from_specifications(
        name: &ArtifactName,
        specs: &ArtifactFile,
    ) -> Result<Artifact, DeploymentError> {
        if specs.contract_name != name.as_str() {
            return Err(DeploymentError::InvalidArtifact {
                name: name.clone(),
                reason: format!("artifact declares contract {}", specs.contract_name),
            });
        }
        let bytecode = specs.bytecode.trim().trim_start_matches("0x").to_string();
        if bytecode.len() % 2 != 0 {
            return Err(DeploymentError::InvalidArtifact {
                name: name.clone(),
                reason: "bytecode has an odd number of hex digits".into(),
            });
        }
        let source_unit = specs
            .ast
            .as_ref()
            .and_then(|ast| ast.absolute_path.clone())
            .or_else(|| specs.source_path.clone());
        Ok(Artifact {
            name: name.clone(),
            abi: specs.abi.clone(),
            bytecode,
            source_unit,
            compiler_version: specs.compiler.as_ref().and_then(|c| c.version.clone()),
        })
    }

    /// Fully qualified name used to derive hashed link placeholders.
    pub fn fully_qualified_name(&self) -> String {
        match &self.source_unit {
            Some(source_unit) => format!("{}:{}", source_unit, self.name),
            None => self.name.to_string(),
        }
    }
}

pub trait ArtifactRegistry {
    fn resolve(&self, name: &ArtifactName) -> Result<Artifact, DeploymentError>;
}

/// Reads artifacts from a Truffle build directory.
pub struct FileArtifactRegistry {
    pub build_dir: PathBuf,
}

impl FileArtifactRegistry {
    pub fn new(build_dir: PathBuf) -> FileArtifactRegistry {
        FileArtifactRegistry { build_dir }
    }

    pub fn artifact_path(&self, name: &ArtifactName) -> PathBuf {
        self.build_dir.join(format!("{}.json", name))
    }
}

impl ArtifactRegistry for FileArtifactRegistry {
    fn resolve(&self, name: &ArtifactName) -> Result<Artifact, DeploymentError> {
        let path = self.artifact_path(name);
        let content = std::fs::read_to_string(&path).map_err(|_| {
            DeploymentError::ArtifactNotFound {
                name: name.clone(),
                location: self.build_dir.display().to_string(),
            }
        })?;
        let artifact_file: ArtifactFile =
            serde_json::from_str(&content).map_err(|e| DeploymentError::InvalidArtifact {
                name: name.clone(),
                reason: format!("{}: {}", path.display(), e),
            })?;
        Artifact::from_specifications(name, &artifact_file)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactRegistry {
    artifacts: BTreeMap<ArtifactName, Artifact>,
}

impl InMemoryArtifactRegistry {
    pub fn new() -> InMemoryArtifactRegistry {
        InMemoryArtifactRegistry::default()
    }

    pub fn register(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.name.clone(), artifact);
    }

    pub fn with_artifacts(artifacts: Vec<Artifact>) -> InMemoryArtifactRegistry {
        let mut registry = InMemoryArtifactRegistry::new();
        for artifact in artifacts {
            registry.register(artifact);
        }
        registry
    }
}

impl ArtifactRegistry for InMemoryArtifactRegistry {
    fn resolve(&self, name: &ArtifactName) -> Result<Artifact, DeploymentError> {
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| DeploymentError::ArtifactNotFound {
                name: name.clone(),
                location: "in-memory registry".into(),
            })
    }
}
