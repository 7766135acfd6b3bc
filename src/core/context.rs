//! Build context assembly
//!
//! Fills a scratch workspace with everything an image needs: dependency
//! plugins, project-supplied plugins, static trees, the proxy trust
//! fragment and the identity marker.

use serde_yml::{Mapping, Value};
use std::path::{Path, PathBuf};

use crate::core::artifact::Requirement;
use crate::core::descriptor::ProjectDescriptor;
use crate::core::resolver::{ArtifactResolver, ResolvedArtifact};
use crate::error::{FilesystemError, ResolveError, TaskError};
use crate::infra::filesystem;

/// Plugins directory inside the workspace
pub const PLUGINS_DIR: &str = "plugins";

/// Project-supplied plugins directory inside a project
pub const AUX_PLUGINS_DIR: &str = "external-plugins";

/// Trees copied verbatim from the project when present
pub const STATIC_TREES: &[&str] = &["assets", "config"];

/// Server directory inside the workspace
pub const SERVER_DIR: &str = "server";

/// Identity marker read by the runtime at startup
pub const IDENTITY_MARKER: &str = ".mineplex-common-name";

/// Proxy trust fragment, relative to the workspace
pub const PROXY_CONFIG: &str = "config/paper-global.yml";

/// Resolve every declared library of a project into `plugins_dir`.
///
/// Optional libraries that cannot be resolved are skipped. A mandatory one
/// fails the task unless the project ships a fallback in its
/// `external-plugins` directory.
pub async fn resolve_dependencies(
    resolver: &ArtifactResolver,
    descriptor: &ProjectDescriptor,
    plugins_dir: &Path,
) -> Result<Vec<ResolvedArtifact>, TaskError> {
    let mut resolved = Vec::new();

    for library in &descriptor.libraries {
        let Some(spec) = resolver.catalog().get(&library.id) else {
            let err = ResolveError::UnknownLibrary {
                library: library.id.clone(),
            };
            if library.required == Some(true) {
                require_fallback(&descriptor.source_dir, &library.id, err)?;
            } else {
                tracing::warn!("Skipping unknown library {}", library.id);
            }
            continue;
        };

        let requirement = library
            .required
            .map_or(spec.requirement, Requirement::from_flag);

        match resolver.resolve_spec(spec, plugins_dir).await {
            Ok(artifact) => resolved.push(artifact),
            Err(err) if requirement == Requirement::Mandatory => {
                require_fallback(&descriptor.source_dir, &spec.id, err)?;
            }
            Err(err) => tracing::warn!("Skipping optional library: {err}"),
        }
    }

    Ok(resolved)
}

fn require_fallback(project_dir: &Path, library_id: &str, err: ResolveError) -> Result<(), TaskError> {
    match find_fallback(project_dir, library_id) {
        Some(fallback) => {
            tracing::warn!(
                "{err}; using project-supplied {}",
                fallback.display()
            );
            Ok(())
        }
        None => Err(TaskError::ArtifactUnresolvable(err)),
    }
}

/// Project-supplied jar whose name mentions `library_id`
pub fn find_fallback(project_dir: &Path, library_id: &str) -> Option<PathBuf> {
    let needle = library_id.to_ascii_lowercase();
    jar_files(&project_dir.join(AUX_PLUGINS_DIR))
        .into_iter()
        .find(|p| file_name_lower(p).contains(&needle))
}

/// Copy project-supplied plugins, skipping any that collide with the bridge.
///
/// Returns the names of the copied files.
pub fn merge_aux_plugins(
    project_dir: &Path,
    plugins_dir: &Path,
    bridge_file_name: &str,
) -> Result<Vec<String>, FilesystemError> {
    let bridge_name = bridge_file_name.to_ascii_lowercase();
    let bridge_stem = bridge_name.trim_end_matches(".jar").to_string();

    let mut copied = Vec::new();
    for jar in jar_files(&project_dir.join(AUX_PLUGINS_DIR)) {
        let lower = file_name_lower(&jar);
        if lower == bridge_name || lower.starts_with(&bridge_stem) {
            tracing::info!("Skipping {lower}: runtime bridge already provided");
            continue;
        }
        let Some(name) = jar.file_name() else {
            continue;
        };
        filesystem::copy_file(&jar, &plugins_dir.join(name))?;
        copied.push(name.to_string_lossy().into_owned());
    }
    Ok(copied)
}

/// Copy the static trees present in the project.
///
/// Returns the trees that were copied.
pub fn copy_static_trees(
    project_dir: &Path,
    workspace: &Path,
) -> Result<Vec<&'static str>, FilesystemError> {
    let mut copied = Vec::new();
    for tree in STATIC_TREES {
        let source = project_dir.join(tree);
        if source.is_dir() {
            let files = filesystem::copy_tree(&source, &workspace.join(tree))?;
            tracing::debug!("Copied {tree}/ ({files} files)");
            copied.push(*tree);
        }
    }
    Ok(copied)
}

/// Merge the proxy trust settings into the workspace's fragment.
///
/// Unrelated fields of an existing fragment are kept.
pub fn merge_proxy_config(workspace: &Path, secret: &str) -> Result<PathBuf, TaskError> {
    let path = workspace.join(PROXY_CONFIG);
    let config_err = |error: String| TaskError::ProxyConfig {
        path: path.clone(),
        error,
    };

    let mut root = if path.exists() {
        let content = filesystem::read_file(&path)?;
        match serde_yml::from_str::<Value>(&content).map_err(|e| config_err(e.to_string()))? {
            Value::Null => Mapping::new(),
            Value::Mapping(map) => map,
            _ => return Err(config_err("top level is not a mapping".to_string())),
        }
    } else {
        Mapping::new()
    };

    let velocity = child_mapping(&mut root, "proxies")
        .and_then(|proxies| child_mapping(proxies, "velocity"))
        .ok_or_else(|| config_err("unexpected document structure".to_string()))?;
    velocity.insert(Value::from("enabled"), Value::Bool(true));
    velocity.insert(Value::from("online-mode"), Value::Bool(true));
    velocity.insert(Value::from("secret"), Value::from(secret));

    let content =
        serde_yml::to_string(&Value::Mapping(root)).map_err(|e| config_err(e.to_string()))?;
    filesystem::write_file(&path, &content)?;
    Ok(path)
}

fn child_mapping<'a>(map: &'a mut Mapping, key: &str) -> Option<&'a mut Mapping> {
    if !map.get(key).is_some_and(Value::is_mapping) {
        map.insert(Value::from(key), Value::Mapping(Mapping::new()));
    }
    map.get_mut(key).and_then(Value::as_mapping_mut)
}

/// Write the single-line identity marker
pub fn write_identity_marker(workspace: &Path, container_name: &str) -> Result<PathBuf, FilesystemError> {
    let path = workspace.join(SERVER_DIR).join(IDENTITY_MARKER);
    filesystem::write_file(&path, container_name)?;
    Ok(path)
}

fn jar_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut jars: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
        })
        .collect();
    jars.sort();
    jars
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::{ArtifactCatalog, Endpoints};
    use crate::core::descriptor::DeclaredLibrary;
    use tempfile::TempDir;

    fn offline_resolver() -> ArtifactResolver {
        ArtifactResolver::new(ArtifactCatalog::standard(&Endpoints::all("http://127.0.0.1:9")))
    }

    fn project_with_aux(temp: &TempDir, jars: &[&str]) -> PathBuf {
        let project = temp.path().join("project");
        let aux = project.join(AUX_PLUGINS_DIR);
        std::fs::create_dir_all(&aux).unwrap();
        for jar in jars {
            std::fs::write(aux.join(jar), b"jar").unwrap();
        }
        project
    }

    #[test]
    fn test_merge_aux_plugins_skips_bridge_collisions() {
        let temp = TempDir::new().unwrap();
        let project = project_with_aux(
            &temp,
            &["Local-Engine.jar", "local-engine-1.2.jar", "Extra.jar", "notes.txt"],
        );
        let plugins = temp.path().join("plugins");

        let copied = merge_aux_plugins(&project, &plugins, "local-engine.jar").unwrap();
        assert_eq!(copied, vec!["Extra.jar"]);
        assert!(plugins.join("Extra.jar").exists());
        assert!(!plugins.join("Local-Engine.jar").exists());
    }

    #[test]
    fn test_merge_aux_plugins_without_directory() {
        let temp = TempDir::new().unwrap();
        let copied = merge_aux_plugins(temp.path(), &temp.path().join("p"), "local-engine.jar").unwrap();
        assert!(copied.is_empty());
    }

    #[test]
    fn test_copy_static_trees() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        std::fs::create_dir_all(project.join("config")).unwrap();
        std::fs::write(project.join("config/game-properties.yaml"), "projectId: x").unwrap();

        let workspace = temp.path().join("ws");
        let copied = copy_static_trees(&project, &workspace).unwrap();
        assert_eq!(copied, vec!["config"]);
        assert!(workspace.join("config/game-properties.yaml").exists());
        assert!(!workspace.join("assets").exists());
    }

    #[test]
    fn test_merge_proxy_config_keeps_unrelated_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(PROXY_CONFIG);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "chunk-loading:\n  max-concurrent-sends: 2\nproxies:\n  velocity:\n    enabled: false\n    secret: old\n  bungee-cord:\n    online-mode: false\n",
        )
        .unwrap();

        merge_proxy_config(temp.path(), "s3cret").unwrap();

        let merged: Value = serde_yml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(merged["chunk-loading"]["max-concurrent-sends"], Value::from(2));
        assert_eq!(merged["proxies"]["bungee-cord"]["online-mode"], Value::Bool(false));
        assert_eq!(merged["proxies"]["velocity"]["enabled"], Value::Bool(true));
        assert_eq!(merged["proxies"]["velocity"]["online-mode"], Value::Bool(true));
        assert_eq!(merged["proxies"]["velocity"]["secret"], Value::from("s3cret"));
    }

    #[test]
    fn test_merge_proxy_config_creates_fragment() {
        let temp = TempDir::new().unwrap();
        let path = merge_proxy_config(temp.path(), "s").unwrap();
        let merged: Value = serde_yml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(merged["proxies"]["velocity"]["secret"], Value::from("s"));
    }

    #[test]
    fn test_merge_proxy_config_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(PROXY_CONFIG);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "- just\n- a list\n").unwrap();
        assert!(matches!(
            merge_proxy_config(temp.path(), "s"),
            Err(TaskError::ProxyConfig { .. })
        ));
    }

    #[test]
    fn test_identity_marker() {
        let temp = TempDir::new().unwrap();
        let path = write_identity_marker(temp.path(), "SkyWars-1").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "SkyWars-1");
    }

    #[tokio::test]
    async fn test_unknown_optional_library_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut descriptor = ProjectDescriptor::new("alpha", temp.path());
        descriptor.libraries = vec![DeclaredLibrary::new("NOT_IN_CATALOG")];

        let resolved = resolve_dependencies(&offline_resolver(), &descriptor, temp.path())
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_mandatory_library_fails() {
        let temp = TempDir::new().unwrap();
        let mut descriptor = ProjectDescriptor::new("alpha", temp.path());
        descriptor.libraries = vec![DeclaredLibrary::new("GEYSER")];

        let err = resolve_dependencies(&offline_resolver(), &descriptor, &temp.path().join("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::ArtifactUnresolvable(_)));
    }

    #[tokio::test]
    async fn test_mandatory_library_with_fallback_passes() {
        let temp = TempDir::new().unwrap();
        let project = project_with_aux(&temp, &["Geyser-Spigot.jar"]);
        let mut descriptor = ProjectDescriptor::new("alpha", &project);
        descriptor.libraries = vec![DeclaredLibrary::new("GEYSER")];

        let resolved = resolve_dependencies(&offline_resolver(), &descriptor, &temp.path().join("p"))
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_required_flag_downgrades_mandatory() {
        let temp = TempDir::new().unwrap();
        let mut descriptor = ProjectDescriptor::new("alpha", temp.path());
        descriptor.libraries = vec![DeclaredLibrary {
            id: "FLOODGATE".to_string(),
            required: Some(false),
        }];

        assert!(resolve_dependencies(&offline_resolver(), &descriptor, &temp.path().join("p"))
            .await
            .is_ok());
    }
}
