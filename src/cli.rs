use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "proxgate", about = "Chat-command control for whitelisted Proxmox VMs")]
pub struct Cli {
    /// Path to config file (default: ./proxgate.toml, then ~/.config/proxgate/proxgate.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one `vm` interaction and print the reply
    Vm {
        #[command(subcommand)]
        action: VmAction,

        /// User name recorded in logs
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Print VM suggestions for a partially typed name or id
    Suggest {
        /// Fragment typed so far
        #[arg(default_value = "")]
        fragment: String,
    },

    /// Read JSON interactions from stdin, write JSON replies to stdout
    Serve,

    /// Print the `vm` command definition as JSON
    Commands,
}

#[derive(Subcommand, Debug)]
pub enum VmAction {
    /// List all allowed VMs
    List,
    /// Show the status of a VM
    Status {
        /// VM name or ID
        vm: String,
    },
    /// Start a VM
    Start {
        /// VM name or ID
        vm: String,
    },
    /// Shut down a VM
    Stop {
        /// VM name or ID
        vm: String,

        /// Power off immediately instead of a guest shutdown
        #[arg(long)]
        force: bool,
    },
}

impl VmAction {
    /// Sub-action name and VM option as the chat platform would send them.
    pub fn as_parts(&self) -> (&'static str, &str, bool) {
        match self {
            VmAction::List => ("list", "", false),
            VmAction::Status { vm } => ("status", vm, false),
            VmAction::Start { vm } => ("start", vm, false),
            VmAction::Stop { vm, force } => ("stop", vm, *force),
        }
    }
}
