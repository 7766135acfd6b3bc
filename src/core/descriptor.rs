//! Project descriptor loading
//!
//! Reads `config/game-properties.yaml` and the resource manifests under
//! `config/databases/` of a project directory. Decoding is strict: missing
//! required fields reject the project, only explicitly optional fields get
//! defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::sanitize::sanitize_name;
use crate::error::DescriptorError;

/// Raw project manifest as written by game developers
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectManifest {
    project_id: String,
    #[serde(default)]
    namespace_id: Option<String>,
    #[serde(default)]
    game: Option<GameSection>,
    #[serde(default)]
    dependencies: DependencySection,
    #[serde(default)]
    secret_environment_variable_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameSection {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    visibility: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DependencySection {
    #[serde(default)]
    libraries: Vec<LibraryEntry>,
}

/// A library may be listed by name or with an explicit requirement flag
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LibraryEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        required: Option<bool>,
    },
}

/// A dependency library declared by a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredLibrary {
    /// Catalog identifier (e.g. `PROTOCOLLIB`)
    pub id: String,
    /// Explicit requirement; `None` defers to the catalog default
    pub required: Option<bool>,
}

impl DeclaredLibrary {
    /// Declare a library that uses the catalog's requirement
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            required: None,
        }
    }
}

/// Descriptive game metadata, carried through to service labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameMetadata {
    /// Listing visibility
    pub visibility: Option<String>,
    /// Game category
    pub category: Option<String>,
    /// Free-form tags
    pub tags: Vec<String>,
}

/// Backing-store kinds a project can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// MongoDB document store
    Mongodb,
    /// PostgreSQL
    Postgres,
    /// Redis key-value store
    Redis,
    /// MySQL
    Mysql,
}

impl ResourceKind {
    /// Parse a manifest `type` value
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Some(Self::Mongodb),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "redis" => Some(Self::Redis),
            "mysql" => Some(Self::Mysql),
            _ => None,
        }
    }

    /// Default image for this kind
    pub fn image(self) -> &'static str {
        match self {
            Self::Mongodb => "mongo:7",
            Self::Postgres => "postgres:16",
            Self::Redis => "redis:7-alpine",
            Self::Mysql => "mysql:8",
        }
    }

    /// Port the store listens on inside its container
    pub fn container_port(self) -> u16 {
        match self {
            Self::Mongodb => 27017,
            Self::Postgres => 5432,
            Self::Redis => 6379,
            Self::Mysql => 3306,
        }
    }

    /// Where the store keeps its data inside the container
    pub fn data_path(self) -> &'static str {
        match self {
            Self::Mongodb => "/data/db",
            Self::Postgres => "/var/lib/postgresql/data",
            Self::Redis => "/data",
            Self::Mysql => "/var/lib/mysql",
        }
    }

    /// Local-development credential environment for an instance
    pub fn credentials(self, database: &str) -> Vec<(String, String)> {
        let pairs: Vec<(&str, String)> = match self {
            Self::Mongodb => vec![
                ("MONGO_INITDB_ROOT_USERNAME", "root".to_string()),
                ("MONGO_INITDB_ROOT_PASSWORD", "password".to_string()),
                ("MONGO_INITDB_DATABASE", database.to_string()),
            ],
            Self::Postgres => vec![
                ("POSTGRES_USER", "postgres".to_string()),
                ("POSTGRES_PASSWORD", "password".to_string()),
                ("POSTGRES_DB", database.to_string()),
            ],
            Self::Redis => Vec::new(),
            Self::Mysql => vec![
                ("MYSQL_ROOT_PASSWORD", "password".to_string()),
                ("MYSQL_DATABASE", database.to_string()),
            ],
        };
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mongodb => "mongodb",
            Self::Postgres => "postgres",
            Self::Redis => "redis",
            Self::Mysql => "mysql",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
struct ResourceManifest {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

/// A backing-store instance requested by a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRequest {
    /// Project that declared the instance
    pub project_id: String,
    /// Declared instance name (deduplication key)
    pub name: String,
    /// Store kind
    pub kind: ResourceKind,
}

/// A loaded, validated project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectDescriptor {
    /// Unique project identifier
    pub project_id: String,
    /// Optional namespace identifier
    pub namespace_id: Option<String>,
    /// Game name; falls back to the project directory name
    pub service_name: String,
    /// Human-facing name, may carry color codes
    pub display_name: Option<String>,
    /// Descriptive metadata
    pub metadata: GameMetadata,
    /// Declared dependency libraries, in manifest order
    pub libraries: Vec<DeclaredLibrary>,
    /// Declared secret environment variable keys
    pub secret_keys: BTreeSet<String>,
    /// Backing stores requested by the project
    pub resources: Vec<ResourceRequest>,
    /// Project source directory
    pub source_dir: PathBuf,
}

impl ProjectDescriptor {
    /// Minimal descriptor, mostly useful for tests and programmatic callers
    pub fn new(project_id: impl Into<String>, source_dir: impl Into<PathBuf>) -> Self {
        let project_id = project_id.into();
        Self {
            service_name: project_id.clone(),
            project_id,
            namespace_id: None,
            display_name: None,
            metadata: GameMetadata::default(),
            libraries: Vec::new(),
            secret_keys: BTreeSet::new(),
            resources: Vec::new(),
            source_dir: source_dir.into(),
        }
    }

    /// Load a project from its directory
    pub fn load(project_dir: &Path) -> Result<Self, DescriptorError> {
        if !project_dir.is_dir() {
            return Err(DescriptorError::NotFound {
                path: project_dir.to_path_buf(),
            });
        }

        let manifest_path = project_dir.join(defaults::PROJECT_MANIFEST);
        let content = read_manifest(&manifest_path)?;
        let fallback_name = project_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut descriptor = Self::from_yaml(&content, &manifest_path, &fallback_name)?;
        descriptor.source_dir = project_dir.to_path_buf();
        descriptor.resources = load_resources(project_dir, &descriptor.project_id);
        Ok(descriptor)
    }

    /// Topology service key and image name of this project
    pub fn service_key(&self) -> String {
        sanitize_name(&self.project_id)
    }

    /// Decode a manifest body; `path` is only used in error messages
    pub fn from_yaml(
        content: &str,
        path: &Path,
        fallback_name: &str,
    ) -> Result<Self, DescriptorError> {
        let manifest: ProjectManifest =
            serde_yml::from_str(content).map_err(|e| DescriptorError::Parse {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        let project_id = manifest.project_id.trim().to_string();
        if project_id.is_empty() {
            return Err(DescriptorError::MissingField {
                path: path.to_path_buf(),
                field: "projectId".to_string(),
            });
        }
        if sanitize_name(&project_id).is_empty() {
            return Err(DescriptorError::UnusableIdentifier {
                path: path.to_path_buf(),
                field: "projectId".to_string(),
                value: project_id,
            });
        }

        let game = manifest.game.unwrap_or_default();
        let service_name = non_empty(game.name)
            .or_else(|| non_empty(Some(fallback_name.to_string())))
            .unwrap_or_else(|| project_id.clone());

        let libraries = manifest
            .dependencies
            .libraries
            .into_iter()
            .map(|entry| match entry {
                LibraryEntry::Name(id) => DeclaredLibrary::new(id),
                LibraryEntry::Detailed { name, required } => DeclaredLibrary { id: name, required },
            })
            .filter(|lib| !lib.id.trim().is_empty())
            .collect();

        Ok(Self {
            project_id,
            namespace_id: non_empty(manifest.namespace_id),
            service_name,
            display_name: non_empty(game.display_name),
            metadata: GameMetadata {
                visibility: non_empty(game.visibility),
                category: non_empty(game.category),
                tags: game.tags,
            },
            libraries,
            secret_keys: manifest
                .secret_environment_variable_keys
                .into_iter()
                .filter(|k| !k.trim().is_empty())
                .collect(),
            resources: Vec::new(),
            source_dir: PathBuf::new(),
        })
    }
}

fn read_manifest(path: &Path) -> Result<String, DescriptorError> {
    if !path.exists() {
        return Err(DescriptorError::NotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|e| DescriptorError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a single resource manifest
pub fn parse_resource(
    content: &str,
    path: &Path,
    project_id: &str,
) -> Result<ResourceRequest, DescriptorError> {
    let manifest: ResourceManifest =
        serde_yml::from_str(content).map_err(|e| DescriptorError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

    let name = manifest.name.trim().to_string();
    if name.is_empty() {
        return Err(DescriptorError::MissingField {
            path: path.to_path_buf(),
            field: "name".to_string(),
        });
    }

    let kind = ResourceKind::parse(&manifest.kind).ok_or_else(|| {
        DescriptorError::UnknownResourceKind {
            path: path.to_path_buf(),
            kind: manifest.kind.clone(),
        }
    })?;

    Ok(ResourceRequest {
        project_id: project_id.to_string(),
        name,
        kind,
    })
}

/// Load every resource manifest of a project, in file-name order.
///
/// Invalid manifests are logged and skipped; they never fail the project.
pub fn load_resources(project_dir: &Path, project_id: &str) -> Vec<ResourceRequest> {
    let dir = project_dir.join(defaults::RESOURCE_MANIFEST_DIR);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    paths.sort();

    let mut resources = Vec::new();
    for path in paths {
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| DescriptorError::Read {
                path: path.clone(),
                error: e.to_string(),
            })
            .and_then(|content| parse_resource(&content, &path, project_id));

        match parsed {
            Ok(request) => {
                tracing::debug!(
                    project = project_id,
                    name = %request.name,
                    kind = %request.kind,
                    "Found resource manifest"
                );
                resources.push(request);
            }
            Err(e) => tracing::warn!("Skipping resource manifest: {e}"),
        }
    }
    resources
}
