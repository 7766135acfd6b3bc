//! Registry and release feed URLs

/// Curated plugin registry API base URL
pub const MODRINTH_API: &str = "https://api.modrinth.com/v2";

/// Community plugin registry API base URL
pub const SPIGET_API: &str = "https://api.spiget.org/v2";

/// GitHub API base URL (release feeds)
pub const GITHUB_API: &str = "https://api.github.com";

/// GitHub web base URL (static release downloads)
pub const GITHUB: &str = "https://github.com";

/// Repository publishing the runtime bridge
pub const BRIDGE_REPOSITORY: &str = "Plexverse/local-engine";

/// GeyserMC download API base URL
pub const GEYSER_DOWNLOADS: &str = "https://download.geysermc.org/v2/projects";
