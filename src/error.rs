//! Error types for gamestack
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Project and resource manifest errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptorError {
    /// Manifest file missing
    #[error("Manifest not found at '{path}'")]
    NotFound { path: PathBuf },

    /// Manifest could not be read
    #[error("Failed to read manifest '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Manifest is not valid YAML or does not match the schema
    #[error("Failed to parse manifest '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Required identifier field missing or empty
    #[error("Manifest '{path}' is missing required field '{field}'")]
    MissingField { path: PathBuf, field: String },

    /// Identifier has no characters usable in a service or image name
    #[error("Manifest '{path}' field '{field}' has no usable characters: '{value}'")]
    UnusableIdentifier {
        path: PathBuf,
        field: String,
        value: String,
    },

    /// Resource manifest names a store type we cannot provision
    #[error("Resource manifest '{path}' has unsupported type '{kind}'")]
    UnknownResourceKind { path: PathBuf, kind: String },
}

/// Artifact resolution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// Library is not in the artifact catalog
    #[error("Unknown library '{library}'")]
    UnknownLibrary { library: String },

    /// Every configured source was tried and rejected
    #[error("Artifact '{library}' could not be resolved from any source ({} tried)", attempts.len())]
    Unresolvable {
        library: String,
        attempts: Vec<String>,
    },
}

/// Download errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DownloadError {
    /// Network error
    #[error("Network error downloading '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Downloaded file is too small to be the real artifact
    #[error("Download from '{url}' is implausibly small ({size} bytes, need more than {min})")]
    TooSmall { url: String, size: u64, min: u64 },
}

/// Filesystem errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to copy a file or tree
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}

/// Errors raised by one step of a Build Task
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Pinned runtime bridge path is unusable
    #[error("Pinned runtime bridge '{path}' is unusable: {reason}")]
    InvalidBridgeOverride { path: PathBuf, reason: String },

    /// External project build exceeded its time budget
    #[error("External build timed out after {secs}s")]
    ExternalBuildTimeout { secs: u64 },

    /// External build or image build failed
    #[error("External build failed: {message}")]
    ExternalBuildFailed { message: String },

    /// Mandatory artifact could not be resolved
    #[error("Mandatory artifact unresolvable: {0}")]
    ArtifactUnresolvable(#[from] ResolveError),

    /// Proxy trust fragment could not be merged
    #[error("Failed to merge proxy configuration '{path}': {error}")]
    ProxyConfig { path: PathBuf, error: String },

    /// Filesystem failure inside the scratch workspace
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// No port left for this project in the batch's port range
    #[error("No port left after {base_port} for batch position {index}")]
    NoPortLeft { base_port: u16, index: usize },

    /// Topology service key could not be claimed
    #[error("Service name '{service}' unavailable: {reason}")]
    ServiceNameUnavailable { service: String, reason: String },

    /// Task was aborted before it reported a result
    #[error("Build task aborted: {message}")]
    Aborted { message: String },
}

/// Topology file errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    /// Topology file could not be read
    #[error("Failed to read topology '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Topology file is not a valid multi-service description
    #[error("Failed to parse topology '{path}': {error}")]
    Parse { path: PathBuf, error: String },
}

/// Durable write errors; fatal to the whole run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistError {
    /// Value could not be serialized
    #[error("Failed to serialize '{path}': {error}")]
    Serialize { path: PathBuf, error: String },

    /// Temporary file could not be written
    #[error("Failed to write '{path}': {error}")]
    Write { path: PathBuf, error: String },

    /// Temporary file could not replace the previous one
    #[error("Failed to replace '{path}': {error}")]
    Replace { path: PathBuf, error: String },
}

/// Workspace configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Base ports leave too little room for the batch
    #[error(
        "Ports starting at {base_port} (debug {debug_base_port}) cannot fit {count} projects below 65536"
    )]
    PortRange {
        base_port: u16,
        debug_base_port: u16,
        count: usize,
    },
}

/// Server console errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    /// Container runtime could not list or reach containers
    #[error("Failed to query running servers: {message}")]
    Query { message: String },

    /// No running game server matches the requested service
    #[error("No running server matches '{query}'")]
    NotFound { query: String, available: Vec<String> },

    /// Command was rejected by the server console
    #[error("Command failed in {container}: {message}")]
    Failed { container: String, message: String },

    /// Console did not answer in time
    #[error("Command in {container} timed out after {secs}s")]
    Timeout { container: String, secs: u64 },
}

/// Top-level gamestack error type
#[derive(Error, Debug)]
pub enum GamestackError {
    /// Descriptor error
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Resolve error
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Download error
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    /// Build task error
    #[error("Build error: {0}")]
    Task(#[from] TaskError),

    /// Topology error
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Persist error
    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),

    /// Config error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Console error
    #[error("Console error: {0}")]
    Console(#[from] ConsoleError),
}
