//! The `vm` command as the chat platform expects it at registration time.
//!
//! Option `type` codes follow the platform's application-command schema:
//! 1 = sub-command, 3 = string, 5 = boolean.

use facet::Facet;

use crate::command::COMMAND_NAME;
use crate::error::GateError;

pub const OPTION_SUB_COMMAND: u8 = 1;
pub const OPTION_STRING: u8 = 3;
pub const OPTION_BOOLEAN: u8 = 5;

/// Name of the free-text VM option on targeted sub-commands.
pub const VM_OPTION: &str = "vm";
pub const FORCE_OPTION: &str = "force";

#[derive(Debug, Clone, Facet)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    pub options: Vec<SubCommand>,
}

#[derive(Debug, Clone, Facet)]
pub struct SubCommand {
    #[facet(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    pub options: Vec<OptionDef>,
}

#[derive(Debug, Clone, Facet)]
pub struct OptionDef {
    #[facet(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    pub required: bool,
    pub autocomplete: bool,
}

fn vm_option(description: &str) -> OptionDef {
    OptionDef {
        kind: OPTION_STRING,
        name: VM_OPTION.into(),
        description: description.into(),
        required: true,
        autocomplete: true,
    }
}

fn sub_command(name: &str, description: &str, options: Vec<OptionDef>) -> SubCommand {
    SubCommand {
        kind: OPTION_SUB_COMMAND,
        name: name.into(),
        description: description.into(),
        options,
    }
}

pub fn vm_command() -> CommandDefinition {
    CommandDefinition {
        name: COMMAND_NAME.into(),
        description: "Manage Proxmox virtual machines".into(),
        options: vec![
            sub_command("start", "Start a VM", vec![vm_option("Name or ID of the VM to start")]),
            sub_command(
                "stop",
                "Shut down a VM",
                vec![
                    vm_option("Name or ID of the VM to stop"),
                    OptionDef {
                        kind: OPTION_BOOLEAN,
                        name: FORCE_OPTION.into(),
                        description: "Power off immediately instead of a guest shutdown".into(),
                        required: false,
                        autocomplete: false,
                    },
                ],
            ),
            sub_command(
                "status",
                "Show the status of a VM",
                vec![vm_option("Name or ID of the VM")],
            ),
            sub_command("list", "List all allowed VMs", Vec::new()),
        ],
    }
}

pub fn vm_command_json() -> Result<String, GateError> {
    facet_json::to_string(&vm_command()).map_err(|e| GateError::Encode {
        what: "command definition".into(),
        message: e.to_string(),
    })
}
