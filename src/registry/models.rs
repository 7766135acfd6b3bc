//! Registry response models and candidate selection

use serde::Deserialize;

/// One published version in a version listing
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RegistryVersion {
    /// Version number as published
    #[serde(default)]
    pub version_number: Option<String>,
    /// Game versions this build supports
    #[serde(default)]
    pub game_versions: Vec<String>,
    /// Files attached to the version
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

/// A downloadable file of a [`RegistryVersion`]
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VersionFile {
    /// Download URL
    pub url: String,
    /// File name
    #[serde(default)]
    pub filename: String,
    /// Whether the registry marks this as the primary file
    #[serde(default)]
    pub primary: bool,
}

/// A release from a release feed
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Release {
    /// Release tag
    #[serde(default)]
    pub tag_name: Option<String>,
    /// Attached assets
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A release asset
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReleaseAsset {
    /// Asset file name
    pub name: String,
    /// Direct download URL
    pub browser_download_url: String,
}

/// Whether a published game version satisfies the compatibility tag.
///
/// `1.21` accepts `1.21` and `1.21.x`, but not `1.210`.
pub fn is_compatible(game_version: &str, compat_tag: &str) -> bool {
    game_version == compat_tag
        || game_version
            .strip_prefix(compat_tag)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Pick the download file from the first compatible version.
///
/// When a version offers several files, the first whose name matches one of
/// `platform_patterns` wins, then the primary file, then the first file.
pub fn select_version_file<'a>(
    versions: &'a [RegistryVersion],
    compat_tag: &str,
    platform_patterns: &[String],
) -> Option<&'a VersionFile> {
    let version = versions.iter().find(|v| {
        !v.files.is_empty() && v.game_versions.iter().any(|gv| is_compatible(gv, compat_tag))
    })?;

    if version.files.len() == 1 {
        return version.files.first();
    }

    version
        .files
        .iter()
        .find(|f| {
            let name = f.filename.to_ascii_lowercase();
            platform_patterns
                .iter()
                .any(|p| name.contains(&p.to_ascii_lowercase()))
        })
        .or_else(|| version.files.iter().find(|f| f.primary))
        .or_else(|| version.files.first())
}

/// Pick the binary jar asset of a release, skipping source and doc bundles
pub fn select_release_asset(release: &Release) -> Option<&ReleaseAsset> {
    release.assets.iter().find(|a| {
        let name = a.name.to_ascii_lowercase();
        name.ends_with(".jar") && !name.contains("sources") && !name.contains("javadoc")
    })
}
