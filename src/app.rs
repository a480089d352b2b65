use anyhow::Result;

use crate::cli::{parse_cli_args, usage_text, version_text, CliCommand};
use crate::command_handlers::{
    handle_ack, handle_alerts, handle_approve, handle_check, handle_devices, handle_import,
    handle_maintenance, handle_report, handle_resolve, handle_reveal, handle_set,
};

/// Run the app by parsing CLI-style args and dispatching the command.
pub fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let command = parse_cli_args(args)?;
    execute_command(command)
}

/// Execute a pre-parsed command. This is reusable for non-CLI entrypoints.
pub fn execute_command(command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Help => {
            println!("{}", usage_text());
            Ok(())
        }
        CliCommand::Version => {
            println!("{}", version_text());
            Ok(())
        }
        CliCommand::Import {
            file,
            workspace,
            network,
            source,
            db,
        } => handle_import(&file, workspace, network, &source, db),
        CliCommand::Check {
            workspace,
            network,
            db,
        } => handle_check(workspace, network, db),
        CliCommand::Devices {
            workspace,
            network,
            status,
            db,
        } => handle_devices(workspace, network, status, db),
        CliCommand::Alerts {
            workspace,
            network,
            status,
            db,
        } => handle_alerts(workspace, network, status, db),
        CliCommand::Approve {
            device_id,
            revoke,
            db,
        } => handle_approve(device_id, revoke, db),
        CliCommand::Set {
            device_id,
            update,
            db,
        } => handle_set(device_id, update, db),
        CliCommand::Ack { alert_id, db } => handle_ack(alert_id, db),
        CliCommand::Resolve {
            alert_id,
            notes,
            db,
        } => handle_resolve(alert_id, notes, db),
        CliCommand::Reveal {
            device_id,
            reason,
            db,
        } => handle_reveal(device_id, &reason, db),
        CliCommand::Maintenance {
            workspace,
            network,
            start,
            end,
            suppress,
            reason,
            db,
        } => handle_maintenance(workspace, network, start, end, &suppress, &reason, db),
        CliCommand::Report {
            workspace,
            output,
            db,
        } => handle_report(workspace, output, db),
    }
}
