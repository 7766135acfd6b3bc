//! Artifact catalog
//!
//! Static, process-wide description of where each dependency library and the
//! runtime bridge can be fetched from, as a ranked list of sources.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::{defaults, urls};

/// How a source endpoint is turned into a download URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Registry API returning a version listing to filter
    VersionListing,
    /// Release feed API returning the latest release's assets
    ReleaseFeed,
    /// The endpoint is the download URL itself
    Direct,
}

/// One ranked source for an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSource {
    /// Source kind
    pub kind: SourceKind,
    /// Endpoint URL
    pub endpoint: String,
}

impl ArtifactSource {
    /// A registry version listing
    pub fn version_listing(endpoint: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::VersionListing,
            endpoint: endpoint.into(),
        }
    }

    /// A "latest release" feed
    pub fn release_feed(endpoint: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::ReleaseFeed,
            endpoint: endpoint.into(),
        }
    }

    /// A static download URL
    pub fn direct(endpoint: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Direct,
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            SourceKind::VersionListing => "registry",
            SourceKind::ReleaseFeed => "release feed",
            SourceKind::Direct => "static url",
        };
        write!(f, "{kind} {}", self.endpoint)
    }
}

/// Whether a missing artifact fails the build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Logged and skipped when unresolvable
    Optional,
    /// Fails the build unless the project ships a fallback
    Mandatory,
}

impl Requirement {
    /// Requirement from an explicit per-declaration flag
    pub fn from_flag(required: bool) -> Self {
        if required {
            Self::Mandatory
        } else {
            Self::Optional
        }
    }
}

/// Everything needed to fetch one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Library identifier (upper-case)
    pub id: String,
    /// File name inside the plugins directory
    pub file_name: String,
    /// Default requirement
    pub requirement: Requirement,
    /// Downloads at or below this size are rejected
    pub min_size: u64,
    /// Sources in priority order
    pub sources: Vec<ArtifactSource>,
}

impl ArtifactSpec {
    /// An optional plugin stored as `<ID>.jar`
    pub fn new(id: &str, sources: Vec<ArtifactSource>) -> Self {
        let id = id.to_ascii_uppercase();
        Self {
            file_name: format!("{id}.jar"),
            id,
            requirement: Requirement::Optional,
            min_size: defaults::MIN_ARTIFACT_SIZE,
            sources,
        }
    }

    /// Mark the artifact mandatory
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.requirement = Requirement::Mandatory;
        self
    }

    /// Override the plausibility threshold
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Override the file name
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

/// Base URLs of every upstream the catalog points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Curated registry API
    pub modrinth: String,
    /// Community registry API
    pub spiget: String,
    /// Release feed API
    pub github_api: String,
    /// Static release downloads
    pub github: String,
    /// Cross-play download API
    pub geyser: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            modrinth: urls::MODRINTH_API.to_string(),
            spiget: urls::SPIGET_API.to_string(),
            github_api: urls::GITHUB_API.to_string(),
            github: urls::GITHUB.to_string(),
            geyser: urls::GEYSER_DOWNLOADS.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every upstream at one base URL (mock servers)
    pub fn all(base: &str) -> Self {
        Self {
            modrinth: base.to_string(),
            spiget: base.to_string(),
            github_api: base.to_string(),
            github: base.to_string(),
            geyser: base.to_string(),
        }
    }
}

/// Identifier of the runtime bridge in logs and errors
pub const BRIDGE_ID: &str = "LOCAL_ENGINE";

/// Known libraries and the runtime bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCatalog {
    entries: BTreeMap<String, ArtifactSpec>,
    bridge: ArtifactSpec,
}

impl ArtifactCatalog {
    /// An empty catalog with the given bridge
    pub fn new(bridge: ArtifactSpec) -> Self {
        Self {
            entries: BTreeMap::new(),
            bridge,
        }
    }

    /// The built-in catalog against the given upstreams
    pub fn standard(endpoints: &Endpoints) -> Self {
        let Endpoints {
            modrinth,
            spiget,
            github_api,
            github,
            geyser,
        } = endpoints;

        let bridge = ArtifactSpec::new(
            BRIDGE_ID,
            vec![ArtifactSource::release_feed(format!(
                "{github_api}/repos/{}/releases/latest",
                urls::BRIDGE_REPOSITORY
            ))],
        )
        .mandatory()
        .with_min_size(0)
        .with_file_name(defaults::BRIDGE_FILE_NAME);

        Self::new(bridge)
            .with_entry(ArtifactSpec::new(
                "PROTOCOLLIB",
                vec![
                    ArtifactSource::version_listing(format!("{modrinth}/project/protocollib/version")),
                    ArtifactSource::direct(format!("{spiget}/resources/1997/download")),
                    ArtifactSource::direct(format!(
                        "{github}/dmulloy2/ProtocolLib/releases/latest/download/ProtocolLib.jar"
                    )),
                ],
            ))
            .with_entry(ArtifactSpec::new(
                "LIBSDISGUISES",
                vec![
                    ArtifactSource::direct(format!("{spiget}/resources/32453/download")),
                    ArtifactSource::direct(format!(
                        "{github}/libraryaddict/LibsDisguises/releases/latest/download/LibsDisguises.jar"
                    )),
                ],
            ))
            .with_entry(ArtifactSpec::new(
                "DECENTHOLOGRAMS",
                vec![
                    ArtifactSource::version_listing(format!(
                        "{modrinth}/project/decentholograms/version"
                    )),
                    ArtifactSource::direct(format!("{spiget}/resources/96927/download")),
                    ArtifactSource::direct(format!(
                        "{github}/DecentSoftware-eu/DecentHolograms/releases/latest/download/DecentHolograms.jar"
                    )),
                ],
            ))
            .with_entry(ArtifactSpec::new(
                "VIAVERSION",
                vec![
                    ArtifactSource::version_listing(format!("{modrinth}/project/viaversion/version")),
                    ArtifactSource::direct(format!("{spiget}/resources/19254/download")),
                ],
            ))
            .with_entry(
                ArtifactSpec::new(
                    "GEYSER",
                    vec![
                        ArtifactSource::version_listing(format!("{modrinth}/project/geyser/version")),
                        ArtifactSource::direct(format!(
                            "{geyser}/geyser/versions/latest/builds/latest/downloads/spigot"
                        )),
                    ],
                )
                .mandatory(),
            )
            .with_entry(
                ArtifactSpec::new(
                    "FLOODGATE",
                    vec![
                        ArtifactSource::version_listing(format!(
                            "{modrinth}/project/floodgate/version"
                        )),
                        ArtifactSource::direct(format!(
                            "{geyser}/floodgate/versions/latest/builds/latest/downloads/spigot"
                        )),
                    ],
                )
                .mandatory(),
            )
    }

    /// Add or replace an entry
    #[must_use]
    pub fn with_entry(mut self, spec: ArtifactSpec) -> Self {
        self.entries.insert(spec.id.clone(), spec);
        self
    }

    /// Look up a library, case-insensitively
    pub fn get(&self, library_id: &str) -> Option<&ArtifactSpec> {
        self.entries.get(&library_id.trim().to_ascii_uppercase())
    }

    /// The runtime bridge spec
    pub fn bridge(&self) -> &ArtifactSpec {
        &self.bridge
    }
}

impl Default for ArtifactCatalog {
    fn default() -> Self {
        Self::standard(&Endpoints::default())
    }
}
