//! Runtime bridge acquisition
//!
//! Exactly one source provides the bridge for a task: the pinned override,
//! then a local build newer than the cached copy, then the upstream release
//! feed. The choice is made again by every task.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::build_config::BridgeSource;
use crate::core::resolver::ArtifactResolver;
use crate::error::TaskError;
use crate::infra::filesystem;

/// Which source supplied the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOrigin {
    /// Explicit local override
    Pinned(PathBuf),
    /// Fresh local build
    LocalBuild(PathBuf),
    /// Upstream release feed
    Upstream,
}

impl fmt::Display for BridgeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pinned(path) => write!(f, "pinned {}", path.display()),
            Self::LocalBuild(path) => write!(f, "local build {}", path.display()),
            Self::Upstream => f.write_str("upstream release"),
        }
    }
}

/// Place the runtime bridge into `plugins_dir`
pub async fn acquire_bridge(
    source: &BridgeSource,
    resolver: &ArtifactResolver,
    plugins_dir: &Path,
) -> Result<BridgeOrigin, TaskError> {
    let spec = resolver.catalog().bridge();
    let dest = plugins_dir.join(&spec.file_name);

    if let Some(pinned) = &source.pinned {
        validate_pinned(pinned)?;
        filesystem::copy_file(pinned, &dest)?;
        return Ok(BridgeOrigin::Pinned(pinned.clone()));
    }

    if let Some((local, built_at)) = source.local_build_dir.as_deref().and_then(newest_jar) {
        let cached_at = source.cache_path.as_deref().and_then(modified);
        if cached_at.map_or(true, |cached| built_at > cached) {
            filesystem::copy_file(&local, &dest)?;
            return Ok(BridgeOrigin::LocalBuild(local));
        }
        tracing::debug!(
            "Local bridge build {} is older than the cached copy",
            local.display()
        );
    }

    let resolved = resolver.resolve_spec(spec, plugins_dir).await?;
    // Sibling tasks may refresh the same cache concurrently
    if let Some(cache) = &source.cache_path {
        if let Err(e) = filesystem::copy_file_atomic(&resolved.local_path, cache) {
            tracing::warn!("Could not cache runtime bridge: {e}");
        }
    }
    Ok(BridgeOrigin::Upstream)
}

fn validate_pinned(path: &Path) -> Result<(), TaskError> {
    let invalid = |reason: &str| TaskError::InvalidBridgeOverride {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if !path.exists() {
        return Err(invalid("path does not exist"));
    }
    if !path.is_file() {
        return Err(invalid("not a file"));
    }
    if !is_jar(path) {
        return Err(invalid("not a .jar file"));
    }
    Ok(())
}

fn is_jar(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Most recently modified jar in `dir`, ignoring source and doc bundles
fn newest_jar(dir: &Path) -> Option<(PathBuf, SystemTime)> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_jar(p))
        .filter(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            !name.ends_with("-sources.jar") && !name.ends_with("-javadoc.jar")
        })
        .filter_map(|p| modified(&p).map(|t| (p, t)))
        .max_by_key(|(_, t)| *t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::{ArtifactCatalog, Endpoints};
    use std::time::Duration;
    use tempfile::TempDir;

    fn offline_resolver() -> ArtifactResolver {
        ArtifactResolver::new(ArtifactCatalog::standard(&Endpoints::all("http://127.0.0.1:9")))
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    #[tokio::test]
    async fn test_pinned_bridge_wins() {
        let temp = TempDir::new().unwrap();
        let pinned = temp.path().join("engine.jar");
        std::fs::write(&pinned, b"pinned").unwrap();
        let build_dir = temp.path().join("build");
        std::fs::create_dir_all(&build_dir).unwrap();
        std::fs::write(build_dir.join("fresh.jar"), b"fresh").unwrap();

        let plugins = temp.path().join("plugins");
        let source = BridgeSource {
            pinned: Some(pinned.clone()),
            local_build_dir: Some(build_dir),
            cache_path: None,
        };

        let origin = acquire_bridge(&source, &offline_resolver(), &plugins).await.unwrap();
        assert_eq!(origin, BridgeOrigin::Pinned(pinned));
        assert_eq!(std::fs::read(plugins.join("local-engine.jar")).unwrap(), b"pinned");
    }

    #[tokio::test]
    async fn test_pinned_bridge_must_be_jar() {
        let temp = TempDir::new().unwrap();
        let pinned = temp.path().join("engine.zip");
        std::fs::write(&pinned, b"zip").unwrap();
        let source = BridgeSource {
            pinned: Some(pinned),
            ..BridgeSource::default()
        };

        let err = acquire_bridge(&source, &offline_resolver(), temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidBridgeOverride { .. }));
    }

    #[tokio::test]
    async fn test_missing_pinned_bridge() {
        let temp = TempDir::new().unwrap();
        let source = BridgeSource {
            pinned: Some(temp.path().join("missing.jar")),
            ..BridgeSource::default()
        };
        let err = acquire_bridge(&source, &offline_resolver(), temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidBridgeOverride { ref reason, .. } if reason.contains("exist")));
    }

    #[tokio::test]
    async fn test_local_build_newer_than_cache() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("build");
        std::fs::create_dir_all(&build_dir).unwrap();
        let old = build_dir.join("engine-1.0.jar");
        let new = build_dir.join("engine-1.1.jar");
        std::fs::write(&old, b"old").unwrap();
        std::fs::write(&new, b"new").unwrap();
        std::fs::write(build_dir.join("engine-1.1-sources.jar"), b"src").unwrap();

        let cache = temp.path().join("cache.jar");
        std::fs::write(&cache, b"cached").unwrap();

        let now = SystemTime::now();
        set_mtime(&cache, now - Duration::from_secs(600));
        set_mtime(&old, now - Duration::from_secs(900));
        set_mtime(&new, now);

        let plugins = temp.path().join("plugins");
        let source = BridgeSource {
            pinned: None,
            local_build_dir: Some(build_dir),
            cache_path: Some(cache),
        };

        let origin = acquire_bridge(&source, &offline_resolver(), &plugins).await.unwrap();
        assert_eq!(origin, BridgeOrigin::LocalBuild(new));
        assert_eq!(std::fs::read(plugins.join("local-engine.jar")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_stale_local_build_falls_through_to_upstream() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("build");
        std::fs::create_dir_all(&build_dir).unwrap();
        let stale = build_dir.join("engine.jar");
        std::fs::write(&stale, b"stale").unwrap();
        let cache = temp.path().join("cache.jar");
        std::fs::write(&cache, b"cached").unwrap();

        let now = SystemTime::now();
        set_mtime(&stale, now - Duration::from_secs(900));
        set_mtime(&cache, now);

        let source = BridgeSource {
            pinned: None,
            local_build_dir: Some(build_dir),
            cache_path: Some(cache),
        };

        let err = acquire_bridge(&source, &offline_resolver(), &temp.path().join("plugins"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::ArtifactUnresolvable(_)));
    }

    #[tokio::test]
    async fn test_concurrent_upstream_tasks_share_cache() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = vec![0x42u8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/repos/Plexverse/local-engine/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v1",
                "assets": [{
                    "name": "local-engine.jar",
                    "browser_download_url": format!("{}/download/local-engine.jar", server.uri())
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/download/local-engine.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        let cache = cache_dir.join("local-engine.jar");
        let source = BridgeSource {
            pinned: None,
            local_build_dir: None,
            cache_path: Some(cache.clone()),
        };
        let resolver =
            ArtifactResolver::new(ArtifactCatalog::standard(&Endpoints::all(&server.uri())));

        let plugin_dirs: Vec<PathBuf> = (0..4).map(|i| temp.path().join(format!("task{i}"))).collect();
        let origins = futures::future::join_all(
            plugin_dirs
                .iter()
                .map(|dir| acquire_bridge(&source, &resolver, dir)),
        )
        .await;

        for (origin, dir) in origins.into_iter().zip(&plugin_dirs) {
            assert_eq!(origin.unwrap(), BridgeOrigin::Upstream);
            assert_eq!(std::fs::read(dir.join("local-engine.jar")).unwrap(), body);
        }
        assert_eq!(std::fs::read(&cache).unwrap(), body);
        let leftovers = std::fs::read_dir(&cache_dir).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(BridgeOrigin::Upstream.to_string(), "upstream release");
    }
}
