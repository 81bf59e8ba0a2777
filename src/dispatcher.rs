//! Turns one interaction into at most one reply.
//!
//! Flow per interaction: parse into a `VmCommand`, resolve the VM reference
//! to an id (names cost one inventory fetch), run the matching client call,
//! format. A failure at any step short-circuits into a failure reply.

use tracing::Instrument;

use crate::command::{Interaction, VmCommand, VmRef};
use crate::error::GateError;
use crate::proxmox::{PowerAction, VmApi};
use crate::reply::{self, Reply, Suggestion};

/// Autocomplete responses are capped by the chat platform.
pub const MAX_SUGGESTIONS: usize = 25;

pub struct Dispatcher<A> {
    api: A,
}

impl<A: VmApi> Dispatcher<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Handle a command interaction. Returns `None` for commands this bot
    /// does not own.
    pub async fn handle(&self, interaction: &Interaction) -> Option<Reply> {
        if !interaction.is_for_us() {
            tracing::debug!(command = %interaction.command, "ignoring foreign command");
            return None;
        }

        let span = tracing::info_span!(
            "interaction",
            id = %interaction.id,
            user = %interaction.user,
            action = %interaction.action,
        );

        let reply = async {
            match VmCommand::from_interaction(interaction) {
                Ok(cmd) => self.execute(cmd).await,
                Err(e @ GateError::UnknownCommand { .. }) => {
                    tracing::info!(error = %e, "unknown sub-command");
                    Reply::error(&"Unknown command")
                }
                Err(e) => Reply::error(&e),
            }
        }
        .instrument(span)
        .await;

        Some(reply)
    }

    /// Run an already-parsed command.
    pub async fn execute(&self, cmd: VmCommand) -> Reply {
        let target = match cmd.target() {
            Some(target) => match self.resolve(target).await {
                Ok(vmid) => Some(vmid),
                Err(e) => return Reply::error(&e),
            },
            None => None,
        };

        match (cmd, target) {
            (VmCommand::List, _) => match self.api.list_vms().await {
                Ok(vms) => reply::list(&vms),
                Err(e) => Reply::failed("Failed to fetch VMs", &e),
            },
            (VmCommand::Status(_), Some(vmid)) => match self.api.status(vmid).await {
                Ok(status) => reply::status(&status),
                Err(e) => Reply::failed(format_args!("Failed to fetch status of VM {vmid}"), &e),
            },
            (VmCommand::Start(_), Some(vmid)) => {
                match self.api.power(vmid, PowerAction::Start).await {
                    Ok(()) => reply::started(vmid),
                    Err(e) => Reply::failed(format_args!("Failed to start VM {vmid}"), &e),
                }
            }
            (VmCommand::Stop { force, .. }, Some(vmid)) => {
                let action = if force {
                    PowerAction::Stop
                } else {
                    PowerAction::Shutdown
                };
                match self.api.power(vmid, action).await {
                    Ok(()) => reply::stopping(vmid, force),
                    Err(e) => Reply::failed(format_args!("Failed to stop VM {vmid}"), &e),
                }
            }
            // Targeted commands always resolve above.
            (_, None) => Reply::error(&"Unknown command"),
        }
    }

    /// Resolve what the user typed into a VM id.
    ///
    /// Ids pass through without a remote call; whitelist enforcement happens
    /// in the client when the id is used.
    pub async fn resolve(&self, target: &VmRef) -> Result<u32, GateError> {
        match target {
            VmRef::Id(id) => Ok(*id),
            VmRef::Name(name) => {
                let vm = self.api.find_vm_by_name(name).await?;
                tracing::debug!(name = %name, vmid = vm.vmid, "resolved VM name");
                Ok(vm.vmid)
            }
        }
    }

    /// Suggestions for the VM option while the user is typing.
    ///
    /// Matches the fragment against names (case-insensitive) and ids. An
    /// inventory failure yields no suggestions.
    pub async fn suggest(&self, fragment: &str) -> Vec<Suggestion> {
        let vms = match self.api.list_vms().await {
            Ok(vms) => vms,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch VMs for suggestions");
                return Vec::new();
            }
        };

        let fragment = fragment.trim();
        let lower = fragment.to_lowercase();
        vms.iter()
            .filter(|vm| {
                fragment.is_empty()
                    || vm.name.to_lowercase().contains(&lower)
                    || vm.vmid.to_string().contains(fragment)
            })
            .take(MAX_SUGGESTIONS)
            .map(Suggestion::for_vm)
            .collect()
    }

    /// Autocomplete entry point: same shape as a command interaction.
    pub async fn suggest_for(&self, interaction: &Interaction) -> Vec<Suggestion> {
        if !interaction.is_for_us() {
            return Vec::new();
        }
        self.suggest(&interaction.value).await
    }
}
