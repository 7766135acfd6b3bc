//! Image build descriptor generation

use std::fmt::Write;
use std::path::Path;

use crate::config::defaults;
use crate::core::context::{PLUGINS_DIR, SERVER_DIR};

/// Descriptor file name inside the workspace
pub const DOCKERFILE: &str = "Dockerfile";

/// Owner of every copied tree inside the image
const CHOWN: &str = "1000:1000";

/// A tree copied into the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyInstruction {
    /// Directory relative to the workspace
    pub source: String,
    /// Destination inside the image
    pub target: String,
}

/// Declarative image build script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecipe {
    /// Base runtime image
    pub base_image: String,
    /// Environment defaults
    pub env: Vec<(String, String)>,
    /// Trees to copy, in order
    pub copies: Vec<CopyInstruction>,
    /// Exposed container ports
    pub expose: Vec<u16>,
}

impl ImageRecipe {
    /// Recipe for whatever trees exist in `workspace`
    pub fn for_workspace(workspace: &Path) -> Self {
        let candidates = [
            (PLUGINS_DIR, "/data/plugins/"),
            ("assets", "/data/assets/"),
            ("config", "/data/config/"),
            (SERVER_DIR, "/server/"),
        ];

        let copies = candidates
            .iter()
            .filter(|(dir, _)| workspace.join(dir).is_dir())
            .map(|(dir, target)| CopyInstruction {
                source: format!("{dir}/"),
                target: (*target).to_string(),
            })
            .collect();

        Self {
            base_image: defaults::BASE_IMAGE.to_string(),
            env: defaults::RUNTIME_ENV
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            copies,
            expose: vec![defaults::CONTAINER_GAME_PORT, defaults::CONTAINER_DEBUG_PORT],
        }
    }

    /// Render the script
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "FROM {}\n", self.base_image);

        for (key, value) in &self.env {
            let _ = writeln!(out, "ENV {key}={value}");
        }
        out.push('\n');

        for copy in &self.copies {
            let _ = writeln!(out, "COPY --chown={CHOWN} {} {}", copy.source, copy.target);
        }
        if self.copies.iter().any(|c| c.target == "/data/plugins/") {
            out.push_str("\nRUN chmod -R 755 /data/plugins && chmod -R 755 /data/config || true\n");
        }
        out.push('\n');

        for port in &self.expose {
            let _ = writeln!(out, "EXPOSE {port}");
        }
        out
    }
}
