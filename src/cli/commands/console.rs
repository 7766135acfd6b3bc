//! Console command implementation
//!
//! Implements `gamestack command` to run a console command on a running
//! game server.

use anyhow::{Context, Result};

use crate::cli::output::{status, OutputConfig};
use crate::error::ConsoleError;
use crate::infra::docker::{select_server, ConsoleReply, ContainerRuntime, ServerConsole};

/// Execute the console command
pub async fn execute(service: &str, command: &[String]) -> Result<()> {
    let output = OutputConfig::global();
    let runtime = ContainerRuntime::detect()
        .context("No container runtime found. Install docker or podman.")?;
    let console = ServerConsole::new(runtime);

    let servers = console.running().await?;
    let server = match select_server(&servers, service) {
        Ok(server) => server,
        Err(ConsoleError::NotFound { query, available }) => {
            if !output.quiet && !output.json {
                if available.is_empty() {
                    eprintln!("{} No game servers are running", status::INFO);
                } else {
                    eprintln!("Running servers:");
                    for project_id in &available {
                        eprintln!("  - {project_id}");
                    }
                }
            }
            return Err(ConsoleError::NotFound { query, available }.into());
        }
        Err(e) => return Err(e.into()),
    };

    let line = command.join(" ");
    if output.interactive() {
        println!("{} Running '{line}' on {}", status::INFO, server.project_id);
    }
    let reply = console.send(&server.container, &line).await?;

    if output.json {
        let (queued, text) = match &reply {
            ConsoleReply::Output(text) => (false, Some(text.as_str())),
            ConsoleReply::Queued => (true, None),
        };
        let report = serde_json::json!({
            "server": server,
            "command": line,
            "queued": queued,
            "output": text,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match reply {
        ConsoleReply::Output(text) if !text.is_empty() => println!("{text}"),
        ConsoleReply::Output(_) => {}
        ConsoleReply::Queued => {
            if !output.quiet {
                println!("{} Command queued through the server command file", status::INFO);
            }
        }
    }
    Ok(())
}
