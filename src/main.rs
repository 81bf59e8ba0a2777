use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;

use proxgate::cli::{Cli, Command};
use proxgate::command::{COMMAND_NAME, Interaction};
use proxgate::config;
use proxgate::definition;
use proxgate::dispatcher::Dispatcher;
use proxgate::logging;
use proxgate::proxmox::ProxmoxClient;
use proxgate::serve;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let log_file = logging::init(cli.verbose);

    // The command definition is static; no config needed
    if matches!(cli.command, Command::Commands) {
        println!("{}", definition::vm_command_json()?);
        return Ok(());
    }

    let settings = config::load_config(cli.config.as_deref())?;

    if let Some(path) = &settings.log_file
        && let Err(e) = log_file.set_file(path)
    {
        tracing::warn!(path = %path.display(), error = %e, "could not open log file");
    }

    tracing::info!(
        config = ?settings.config_path,
        url = %settings.proxmox.url,
        node = %settings.proxmox.node,
        allowed_vms = %settings.whitelist,
        "configuration loaded"
    );
    if settings.whitelist.is_empty() {
        tracing::warn!("no VMs are allowed; every targeted action will be refused");
    }

    let client = ProxmoxClient::new(&settings.proxmox, settings.whitelist.clone())?;
    let dispatcher = Dispatcher::new(client);

    match cli.command {
        Command::Commands => unreachable!(),
        Command::Vm { action, user } => {
            let (name, value, force) = action.as_parts();
            let interaction = Interaction {
                id: "cli".into(),
                user,
                command: COMMAND_NAME.into(),
                action: name.into(),
                value: value.into(),
                force,
                autocomplete: false,
            };
            if let Some(reply) = dispatcher.handle(&interaction).await {
                println!("{}", reply.text);
                if reply.is_failure() {
                    std::process::exit(1);
                }
            }
        }
        Command::Suggest { fragment } => {
            for s in dispatcher.suggest(&fragment).await {
                println!("{}\t{}", s.label, s.value);
            }
        }
        Command::Serve => {
            tracing::info!("serving interactions on stdin");
            serve::run(
                Arc::new(dispatcher),
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await?;
        }
    }

    Ok(())
}
