use super::network_manifest::{NetworkProfile, NetworkProfileFile};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "Migrator.toml";

const DEFAULT_BUILD_DIR: &str = "build/contracts";
const DEFAULT_DEPLOYMENTS_DIR: &str = "deployments";

#[derive(Serialize, Deserialize, Debug)]
pub struct ProjectManifestFile {
    project: ProjectConfigFile,
    compiler: Option<CompilerConfigFile>,
    networks: Option<BTreeMap<String, NetworkProfileFile>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ProjectConfigFile {
    name: String,
    description: Option<String>,
    build_dir: Option<String>,
    deployments_dir: Option<String>,
    migration_set: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CompilerConfigFile {
    version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectManifest {
    pub project: ProjectConfig,
    pub compiler: CompilerConfig,
    pub networks: BTreeMap<String, NetworkProfile>,
    pub location: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub name: String,
    pub description: String,
    pub build_dir: String,
    pub deployments_dir: String,
    /// Operator-selected first migration; `None` means it has to come from the command line.
    pub migration_set: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub version: Option<String>,
}

impl CompilerConfig {
    /// Artifacts record versions such as `0.8.17+commit.8df45f5f.Emscripten.clang`,
    /// only the leading semver part is compared.
    pub fn accepts(&self, artifact_compiler_version: &str) -> bool {
        match self.version {
            None => true,
            Some(ref pinned) => {
                let recorded = artifact_compiler_version
                    .split('+')
                    .next()
                    .unwrap_or(artifact_compiler_version);
                recorded.trim() == pinned.trim()
            }
        }
    }
}

impl ProjectManifest {
    pub fn from_path(path: &Path) -> Result<ProjectManifest, String> {
        let file = File::open(path)
            .map_err(|e| format!("unable to open {}: {}", path.display(), e))?;
        let mut project_manifest_file_reader = BufReader::new(file);
        let mut project_manifest_file_buffer = String::new();
        project_manifest_file_reader
            .read_to_string(&mut project_manifest_file_buffer)
            .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
        ProjectManifest::from_toml_str(&project_manifest_file_buffer, path)
    }

    pub fn from_toml_str(content: &str, location: &Path) -> Result<ProjectManifest, String> {
        let project_manifest_file: ProjectManifestFile = toml::from_str(content).map_err(|e| {
            format!(
                "there is an issue with the {} file\n{}",
                MANIFEST_FILE_NAME, e
            )
        })?;
        ProjectManifest::from_project_manifest_file(project_manifest_file, location)
    }

    pub fn from_project_manifest_file(
        project_manifest_file: ProjectManifestFile,
        location: &Path,
    ) -> Result<ProjectManifest, String> {
        let project_file = project_manifest_file.project;
        let project = ProjectConfig {
            name: project_file.name,
            description: project_file.description.unwrap_or_default(),
            build_dir: project_file
                .build_dir
                .unwrap_or_else(|| DEFAULT_BUILD_DIR.to_string()),
            deployments_dir: project_file
                .deployments_dir
                .unwrap_or_else(|| DEFAULT_DEPLOYMENTS_DIR.to_string()),
            migration_set: project_file.migration_set,
        };

        let compiler = CompilerConfig {
            version: project_manifest_file.compiler.and_then(|c| c.version),
        };

        let mut networks = BTreeMap::new();
        if let Some(networks_files) = project_manifest_file.networks {
            for (name, network_file) in networks_files.iter() {
                let profile = NetworkProfile::from_network_profile_file(name, network_file)?;
                networks.insert(name.clone(), profile);
            }
        }

        Ok(ProjectManifest {
            project,
            compiler,
            networks,
            location: location.to_path_buf(),
        })
    }

    pub fn get_project_root_dir(&self) -> PathBuf {
        let mut project_root_dir = self.location.clone();
        project_root_dir.pop();
        project_root_dir
    }

    pub fn get_build_dir(&self) -> PathBuf {
        self.get_project_root_dir().join(&self.project.build_dir)
    }

    pub fn get_deployments_dir(&self) -> PathBuf {
        self.get_project_root_dir().join(&self.project.deployments_dir)
    }

    pub fn get_network(&self, name: &str) -> Result<&NetworkProfile, String> {
        self.networks.get(name).ok_or_else(|| {
            let known = self.networks.keys().cloned().collect::<Vec<_>>();
            if known.is_empty() {
                format!(
                    "network '{}' not found: no [networks] declared in {}",
                    name, MANIFEST_FILE_NAME
                )
            } else {
                format!(
                    "network '{}' not found (available: {})",
                    name,
                    known.join(", ")
                )
            }
        })
    }
}
