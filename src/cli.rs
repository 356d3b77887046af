//! Command-line front end
//!
//! Issues one machine operation per invocation and prints the decoded reply.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use gravokit_communication::{Actions, Gravotech};
use gravokit_core::LoadMode;
use gravokit_settings::Config;
use std::path::PathBuf;

/// Control a Gravotech marking machine over TCP
#[derive(Debug, Parser)]
#[command(name = "gravokit", version, about)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Machine hostname or IP address
    #[arg(long)]
    pub host: Option<String>,

    /// Machine TCP port
    #[arg(long)]
    pub port: Option<u16>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: MachineCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    Master,
    Slave,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum MachineCommand {
    /// Query the machine status
    Status,
    /// Acknowledge the current fault
    Ack,
    /// Stop the marking in progress
    Stop,
    /// Start marking and wait for the cycle to end
    Go,
    /// Query the connection role
    Role,
    /// Load a marking file
    Load {
        name: String,
        /// Number of markings, 0 for unlimited
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// N (normal), S (simulation) or A (autonomous)
        #[arg(long, default_value = "N")]
        mode: LoadMode,
    },
    /// List stored files
    List { mask: Option<String> },
    /// Upload a local file
    Push {
        /// Name to store the file under
        name: String,
        /// Local file to read
        path: PathBuf,
    },
    /// Delete stored files
    Remove { mask: Option<String> },
    /// Take or release the master role
    SetRole { role: Role },
    /// Read a variable
    GetVar { index: u8 },
    /// Assign a variable
    SetVar { index: u8, text: String },
}

impl Cli {
    /// Resolve the configuration: file, then environment, then flags
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref()).context("loading configuration")?;
        if let Some(host) = &self.host {
            config.machine.host = host.clone();
        }
        if let Some(port) = self.port {
            config.machine.port = port;
        }
        config.validate()?;
        Ok(config)
    }

    /// Default log level for the verbosity flag
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

/// Run one operation against an already connected machine
pub async fn execute(actions: &Actions, command: &MachineCommand) -> Result<String> {
    let reply = match command {
        MachineCommand::Status => actions.status().await?,
        MachineCommand::Ack => actions.acknowledge_fault().await?,
        MachineCommand::Stop => actions.stop_marking().await?,
        MachineCommand::Go => actions.start_marking().await?.to_string(),
        MachineCommand::Role => actions.connection_role().await?,
        MachineCommand::Load { name, count, mode } => {
            actions.load_file(name, *count, *mode).await?
        }
        MachineCommand::List { mask } => actions.list_files(mask.as_deref()).await?,
        MachineCommand::Push { name, path } => {
            let data = std::fs::read(path)
                .with_context(|| format!("reading {}", path.display()))?;
            actions.push_file(name, &data).await?
        }
        MachineCommand::Remove { mask } => actions.remove_files(mask.as_deref()).await?,
        MachineCommand::SetRole { role } => actions.set_role(*role == Role::Master).await?,
        MachineCommand::GetVar { index } => actions.get_variable(*index).await?,
        MachineCommand::SetVar { index, text } => actions.set_variable(*index, text).await?,
    };
    Ok(reply)
}

/// Connect, run the requested operation, and close
pub async fn run(cli: &Cli) -> Result<String> {
    let config = cli.load_config()?;
    let machine = Gravotech::new(config.connection_settings());
    machine.connect().await?;

    let result = execute(machine.actions(), &cli.command).await;
    machine.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load() {
        let cli = Cli::try_parse_from([
            "gravokit", "--host", "10.0.0.2", "load", "logo.t2l", "--count", "0", "--mode", "S",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(
            cli.command,
            MachineCommand::Load {
                name: "logo.t2l".to_string(),
                count: 0,
                mode: LoadMode::Simulation,
            }
        );
    }

    #[test]
    fn test_parse_role_and_variables() {
        let cli = Cli::try_parse_from(["gravokit", "set-role", "master"]).unwrap();
        assert_eq!(cli.command, MachineCommand::SetRole { role: Role::Master });

        let cli = Cli::try_parse_from(["gravokit", "-vv", "set-var", "3", "SN 1"]).unwrap();
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);
        assert_eq!(
            cli.command,
            MachineCommand::SetVar {
                index: 3,
                text: "SN 1".to_string()
            }
        );

        assert!(Cli::try_parse_from(["gravokit", "get-var", "300"]).is_err());
        assert!(Cli::try_parse_from(["gravokit", "load", "x", "--mode", "Q"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "gravokit",
            "--config",
            "/nonexistent/gravokit.toml",
            "status",
        ])
        .unwrap();
        assert!(cli.load_config().is_err());

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gravokit.toml");
        std::fs::write(&path, "[machine]\nhost = \"from-file\"\nport = 4000\n").unwrap();

        let path = path.to_str().unwrap();
        let cli =
            Cli::try_parse_from(["gravokit", "--config", path, "--port", "4001", "list"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.machine.port, 4001);
        assert_eq!(cli.command, MachineCommand::List { mask: None });
    }
}
