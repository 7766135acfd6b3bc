//! Artifact resolution
//!
//! Walks an artifact's ranked sources until one yields a plausible binary.
//! Each source gets exactly one timeout-bounded attempt; a rejected download
//! is deleted before the next source is tried.

use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::artifact::{ArtifactCatalog, ArtifactSource, ArtifactSpec, SourceKind};
use crate::error::ResolveError;
use crate::infra::download::{validate_artifact, DownloadManager};
use crate::registry::models::{select_release_asset, select_version_file};
use crate::registry::RegistryClient;

/// A fetched, validated artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Library identifier
    pub library_id: String,
    /// Where the artifact was written
    pub local_path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
}

/// Candidate filtering settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Game version tag builds must support (exact or prefix match)
    pub compat_tag: String,
    /// File-name fragments identifying the target platform, in preference order
    pub platform_patterns: Vec<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            compat_tag: defaults::COMPAT_TAG.to_string(),
            platform_patterns: vec![
                "paper".to_string(),
                "spigot".to_string(),
                "bukkit".to_string(),
            ],
        }
    }
}

/// Resolves library identifiers to local files
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    catalog: ArtifactCatalog,
    settings: ResolverSettings,
    registry: RegistryClient,
    downloads: DownloadManager,
}

impl ArtifactResolver {
    /// Create a resolver over a catalog with default settings and clients
    pub fn new(catalog: ArtifactCatalog) -> Self {
        Self {
            catalog,
            settings: ResolverSettings::default(),
            registry: RegistryClient::new(),
            downloads: DownloadManager::new(),
        }
    }

    /// The catalog this resolver reads
    pub fn catalog(&self) -> &ArtifactCatalog {
        &self.catalog
    }

    /// Resolve a catalog library into `dest_dir`
    pub async fn resolve(
        &self,
        library_id: &str,
        dest_dir: &Path,
    ) -> Result<ResolvedArtifact, ResolveError> {
        let spec = self
            .catalog
            .get(library_id)
            .ok_or_else(|| ResolveError::UnknownLibrary {
                library: library_id.to_string(),
            })?;
        self.resolve_spec(spec, dest_dir).await
    }

    /// Resolve an explicit spec into `dest_dir`
    pub async fn resolve_spec(
        &self,
        spec: &ArtifactSpec,
        dest_dir: &Path,
    ) -> Result<ResolvedArtifact, ResolveError> {
        let dest = dest_dir.join(&spec.file_name);
        let partial = dest_dir.join(format!(".{}.part", spec.file_name));
        let mut attempts = Vec::with_capacity(spec.sources.len());

        for source in &spec.sources {
            match self.try_source(spec, source, &partial, &dest).await {
                Ok(size_bytes) => {
                    tracing::info!("Resolved {} from {source} ({size_bytes} bytes)", spec.id);
                    return Ok(ResolvedArtifact {
                        library_id: spec.id.clone(),
                        local_path: dest,
                        size_bytes,
                    });
                }
                Err(reason) => {
                    let _ = std::fs::remove_file(&partial);
                    tracing::warn!("{}: {source} rejected: {reason}", spec.id);
                    attempts.push(format!("{source}: {reason}"));
                }
            }
        }

        Err(ResolveError::Unresolvable {
            library: spec.id.clone(),
            attempts,
        })
    }

    async fn try_source(
        &self,
        spec: &ArtifactSpec,
        source: &ArtifactSource,
        partial: &Path,
        dest: &Path,
    ) -> Result<u64, String> {
        let url = self.candidate_url(source).await?;
        tracing::debug!("{}: downloading {url}", spec.id);

        let download = self
            .downloads
            .download(&url, partial)
            .await
            .map_err(|e| e.to_string())?;
        tracing::debug!("{}: sha256 {}", spec.id, download.checksum);

        let size = validate_artifact(partial, &url, spec.min_size).map_err(|e| e.to_string())?;
        std::fs::rename(partial, dest).map_err(|e| e.to_string())?;
        Ok(size)
    }

    async fn candidate_url(&self, source: &ArtifactSource) -> Result<String, String> {
        match source.kind {
            SourceKind::Direct => Ok(source.endpoint.clone()),
            SourceKind::VersionListing => {
                let versions = self
                    .registry
                    .list_versions(&source.endpoint)
                    .await
                    .map_err(|e| e.to_string())?;
                select_version_file(
                    &versions,
                    &self.settings.compat_tag,
                    &self.settings.platform_patterns,
                )
                .map(|f| f.url.clone())
                .ok_or_else(|| format!("no build compatible with {}", self.settings.compat_tag))
            }
            SourceKind::ReleaseFeed => {
                let release = self
                    .registry
                    .latest_release(&source.endpoint)
                    .await
                    .map_err(|e| e.to_string())?;
                select_release_asset(&release)
                    .map(|a| a.browser_download_url.clone())
                    .ok_or_else(|| "latest release has no jar asset".to_string())
            }
        }
    }
}
