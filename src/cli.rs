use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::database::{AlertStatus, AlertType, Criticality, DeviceStatus, DeviceUpdate};

const COMMANDS: &[&str] = &[
    "import",
    "check",
    "devices",
    "alerts",
    "approve",
    "set",
    "ack",
    "resolve",
    "reveal",
    "maintenance",
    "report",
];

#[derive(Debug, PartialEq)]
pub enum CliCommand {
    Import {
        file: PathBuf,
        workspace: i64,
        network: i64,
        source: String,
        db: Option<PathBuf>,
    },
    Check {
        workspace: i64,
        network: i64,
        db: Option<PathBuf>,
    },
    Devices {
        workspace: i64,
        network: i64,
        status: Option<DeviceStatus>,
        db: Option<PathBuf>,
    },
    Alerts {
        workspace: i64,
        network: Option<i64>,
        status: Option<AlertStatus>,
        db: Option<PathBuf>,
    },
    Approve {
        device_id: i64,
        revoke: bool,
        db: Option<PathBuf>,
    },
    Set {
        device_id: i64,
        update: DeviceUpdate,
        db: Option<PathBuf>,
    },
    Ack {
        alert_id: i64,
        db: Option<PathBuf>,
    },
    Resolve {
        alert_id: i64,
        notes: Option<String>,
        db: Option<PathBuf>,
    },
    Reveal {
        device_id: i64,
        reason: String,
        db: Option<PathBuf>,
    },
    Maintenance {
        workspace: i64,
        network: Option<i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        suppress: Vec<AlertType>,
        reason: String,
        db: Option<PathBuf>,
    },
    Report {
        workspace: i64,
        output: Option<PathBuf>,
        db: Option<PathBuf>,
    },
    Help,
    Version,
}

pub fn version_text() -> String {
    format!("netroster {}", env!("CARGO_PKG_VERSION"))
}

pub fn usage_text() -> String {
    format!(
        "{version}
netroster — privacy-preserving device inventory

Usage:
  netroster import <FILE> --workspace <ID> --network <ID> [--source <NAME>]
  netroster check --workspace <ID> --network <ID>
  netroster devices --workspace <ID> --network <ID> [--status <active|inactive>]
  netroster alerts --workspace <ID> [--network <ID>] [--status <open|ack|resolved>]
  netroster approve <DEVICE_ID> [--revoke]
  netroster set <DEVICE_ID> [--label <TEXT>] [--tags <T1,T2>] [--category <NAME>]
                            [--owner <NAME>] [--criticality <low|med|high>] [--notes <TEXT>]
  netroster ack <ALERT_ID>
  netroster resolve <ALERT_ID> [--notes <TEXT>]
  netroster reveal <DEVICE_ID> --reason <TEXT>
  netroster maintenance --workspace <ID> [--network <ID>] --start <ISO> --end <ISO>
                        [--suppress <T1,T2>] [--reason <TEXT>]
  netroster report --workspace <ID> [--output <FILE>]
  netroster --help
  netroster --version

Options:
  -w, --workspace <ID>    Workspace scope (integer id)
  -n, --network <ID>      Network scope (integer id)
      --source <NAME>     Import source label (default: manual)
      --status <S>        Filter devices or alerts by status
      --db <PATH>         Database file (default: platform data dir)
  -h, --help              Show this help text
  -V, --version           Show version",
        version = version_text()
    )
}

fn parse_i64_arg(flag: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>().ok().filter(|v| *v >= 0).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid value for {}: '{}'. Expected a non-negative integer.\n\n{}",
            flag,
            raw,
            usage_text()
        )
    })
}

fn parse_datetime_arg(flag: &str, raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(anyhow::anyhow!(
        "Invalid value for {}: '{}'. Expected an ISO datetime (e.g. 2025-03-14T22:00:00Z).\n\n{}",
        flag,
        raw,
        usage_text()
    ))
}

fn parse_suppress_arg(raw: &str) -> Result<Vec<AlertType>> {
    let mut types = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alert_type = name.parse::<AlertType>().map_err(|e| {
            anyhow::anyhow!("Invalid value for --suppress: {}\n\n{}", e, usage_text())
        })?;
        types.push(alert_type);
    }
    Ok(types)
}

/// Reject flags that do not belong to the selected command.
fn ensure_allowed(command: &str, provided: &[&'static str], allowed: &[&'static str]) -> Result<()> {
    for flag in provided {
        if !allowed.contains(flag) {
            return Err(anyhow::anyhow!(
                "{} is not valid with {}.\n\n{}",
                flag,
                command,
                usage_text()
            ));
        }
    }
    Ok(())
}

fn require_i64(value: Option<i64>, flag: &str, command: &str) -> Result<i64> {
    value.ok_or_else(|| {
        anyhow::anyhow!("{} is required for {}.\n\n{}", flag, command, usage_text())
    })
}

pub fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut positional: Option<String> = None;
    let mut provided: Vec<&'static str> = Vec::new();

    let mut workspace: Option<i64> = None;
    let mut network: Option<i64> = None;
    let mut source: Option<String> = None;
    let mut status: Option<String> = None;
    let mut db: Option<PathBuf> = None;
    let mut revoke = false;
    let mut label: Option<String> = None;
    let mut tags: Option<String> = None;
    let mut category: Option<String> = None;
    let mut owner: Option<String> = None;
    let mut criticality: Option<String> = None;
    let mut notes: Option<String> = None;
    let mut reason: Option<String> = None;
    let mut start: Option<String> = None;
    let mut end: Option<String> = None;
    let mut suppress: Option<String> = None;
    let mut output: Option<PathBuf> = None;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            _ => {}
        }

        // Support both `--flag value` and `--flag=value` forms.
        let (flag, inline): (String, Option<String>) = match arg.split_once('=') {
            Some((name, value)) if name.starts_with("--") => {
                (name.to_string(), Some(value.to_string()))
            }
            _ => (arg.to_string(), None),
        };

        let mut take_value = |flag_name: &str, inline: Option<String>| -> Result<String> {
            if let Some(value) = inline {
                if value.is_empty() {
                    return Err(anyhow::anyhow!(
                        "Missing value for {}.\n\n{}",
                        flag_name,
                        usage_text()
                    ));
                }
                return Ok(value);
            }
            iter.next()
                .map(|value| value.as_ref().to_string())
                .ok_or_else(|| {
                    anyhow::anyhow!("Missing value for {}.\n\n{}", flag_name, usage_text())
                })
        };

        match flag.as_str() {
            "-w" | "--workspace" => {
                workspace = Some(parse_i64_arg(
                    "--workspace",
                    &take_value("--workspace", inline)?,
                )?);
                provided.push("--workspace");
            }
            "-n" | "--network" => {
                network = Some(parse_i64_arg("--network", &take_value("--network", inline)?)?);
                provided.push("--network");
            }
            "--source" => {
                source = Some(take_value("--source", inline)?);
                provided.push("--source");
            }
            "--status" => {
                status = Some(take_value("--status", inline)?);
                provided.push("--status");
            }
            "--db" => {
                db = Some(PathBuf::from(take_value("--db", inline)?));
                provided.push("--db");
            }
            "--revoke" => {
                revoke = true;
                provided.push("--revoke");
            }
            "--label" => {
                label = Some(take_value("--label", inline)?);
                provided.push("--label");
            }
            "--tags" => {
                tags = Some(take_value("--tags", inline)?);
                provided.push("--tags");
            }
            "--category" => {
                category = Some(take_value("--category", inline)?);
                provided.push("--category");
            }
            "--owner" => {
                owner = Some(take_value("--owner", inline)?);
                provided.push("--owner");
            }
            "--criticality" => {
                criticality = Some(take_value("--criticality", inline)?);
                provided.push("--criticality");
            }
            "--notes" => {
                notes = Some(take_value("--notes", inline)?);
                provided.push("--notes");
            }
            "--reason" => {
                reason = Some(take_value("--reason", inline)?);
                provided.push("--reason");
            }
            "--start" => {
                start = Some(take_value("--start", inline)?);
                provided.push("--start");
            }
            "--end" => {
                end = Some(take_value("--end", inline)?);
                provided.push("--end");
            }
            "--suppress" => {
                suppress = Some(take_value("--suppress", inline)?);
                provided.push("--suppress");
            }
            "--output" => {
                output = Some(PathBuf::from(take_value("--output", inline)?));
                provided.push("--output");
            }
            _ if flag.starts_with('-') => {
                return Err(anyhow::anyhow!(
                    "Unknown argument: {arg}\n\n{}",
                    usage_text()
                ));
            }
            _ => {
                if command.is_none() {
                    if !COMMANDS.contains(&flag.as_str()) {
                        return Err(anyhow::anyhow!(
                            "Unknown command: {arg}\n\n{}",
                            usage_text()
                        ));
                    }
                    command = Some(flag);
                } else if positional.is_none() {
                    positional = Some(flag);
                } else {
                    return Err(anyhow::anyhow!(
                        "Unexpected argument: {arg}\n\n{}",
                        usage_text()
                    ));
                }
            }
        }
    }

    let Some(command) = command else {
        return Err(anyhow::anyhow!(
            "No command provided.\n\n{}",
            usage_text()
        ));
    };

    let require_positional = |name: &str| -> Result<String> {
        positional.clone().ok_or_else(|| {
            anyhow::anyhow!("Missing <{}> for {}.\n\n{}", name, command, usage_text())
        })
    };

    match command.as_str() {
        "import" => {
            ensure_allowed(
                "import",
                &provided,
                &["--workspace", "--network", "--source", "--db"],
            )?;
            Ok(CliCommand::Import {
                file: PathBuf::from(require_positional("FILE")?),
                workspace: require_i64(workspace, "--workspace", "import")?,
                network: require_i64(network, "--network", "import")?,
                source: source.unwrap_or_else(|| "manual".to_string()),
                db,
            })
        }
        "check" => {
            ensure_allowed("check", &provided, &["--workspace", "--network", "--db"])?;
            Ok(CliCommand::Check {
                workspace: require_i64(workspace, "--workspace", "check")?,
                network: require_i64(network, "--network", "check")?,
                db,
            })
        }
        "devices" => {
            ensure_allowed(
                "devices",
                &provided,
                &["--workspace", "--network", "--status", "--db"],
            )?;
            let status = status
                .map(|raw| {
                    raw.parse::<DeviceStatus>().map_err(|e| {
                        anyhow::anyhow!("Invalid value for --status: {}\n\n{}", e, usage_text())
                    })
                })
                .transpose()?;
            Ok(CliCommand::Devices {
                workspace: require_i64(workspace, "--workspace", "devices")?,
                network: require_i64(network, "--network", "devices")?,
                status,
                db,
            })
        }
        "alerts" => {
            ensure_allowed(
                "alerts",
                &provided,
                &["--workspace", "--network", "--status", "--db"],
            )?;
            let status = status
                .map(|raw| {
                    raw.parse::<AlertStatus>().map_err(|e| {
                        anyhow::anyhow!("Invalid value for --status: {}\n\n{}", e, usage_text())
                    })
                })
                .transpose()?;
            Ok(CliCommand::Alerts {
                workspace: require_i64(workspace, "--workspace", "alerts")?,
                network,
                status,
                db,
            })
        }
        "approve" => {
            ensure_allowed("approve", &provided, &["--revoke", "--db"])?;
            Ok(CliCommand::Approve {
                device_id: parse_i64_arg("<DEVICE_ID>", &require_positional("DEVICE_ID")?)?,
                revoke,
                db,
            })
        }
        "set" => {
            ensure_allowed(
                "set",
                &provided,
                &[
                    "--label",
                    "--tags",
                    "--category",
                    "--owner",
                    "--criticality",
                    "--notes",
                    "--db",
                ],
            )?;
            let criticality = criticality
                .map(|raw| {
                    raw.parse::<Criticality>().map_err(|e| {
                        anyhow::anyhow!(
                            "Invalid value for --criticality: {}\n\n{}",
                            e,
                            usage_text()
                        )
                    })
                })
                .transpose()?;
            let update = DeviceUpdate {
                label,
                tags: tags.map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                        .collect()
                }),
                category,
                owner,
                criticality,
                notes,
            };
            if update.is_empty() {
                return Err(anyhow::anyhow!(
                    "No valid fields to update.\n\n{}",
                    usage_text()
                ));
            }
            Ok(CliCommand::Set {
                device_id: parse_i64_arg("<DEVICE_ID>", &require_positional("DEVICE_ID")?)?,
                update,
                db,
            })
        }
        "ack" => {
            ensure_allowed("ack", &provided, &["--db"])?;
            Ok(CliCommand::Ack {
                alert_id: parse_i64_arg("<ALERT_ID>", &require_positional("ALERT_ID")?)?,
                db,
            })
        }
        "resolve" => {
            ensure_allowed("resolve", &provided, &["--notes", "--db"])?;
            Ok(CliCommand::Resolve {
                alert_id: parse_i64_arg("<ALERT_ID>", &require_positional("ALERT_ID")?)?,
                notes,
                db,
            })
        }
        "reveal" => {
            ensure_allowed("reveal", &provided, &["--reason", "--db"])?;
            let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
            let Some(reason) = reason else {
                return Err(anyhow::anyhow!(
                    "A --reason is required for revealing sensitive identifiers.\n\n{}",
                    usage_text()
                ));
            };
            Ok(CliCommand::Reveal {
                device_id: parse_i64_arg("<DEVICE_ID>", &require_positional("DEVICE_ID")?)?,
                reason,
                db,
            })
        }
        "maintenance" => {
            ensure_allowed(
                "maintenance",
                &provided,
                &[
                    "--workspace",
                    "--network",
                    "--start",
                    "--end",
                    "--suppress",
                    "--reason",
                    "--db",
                ],
            )?;
            let start_raw = start.ok_or_else(|| {
                anyhow::anyhow!("--start is required for maintenance.\n\n{}", usage_text())
            })?;
            let end_raw = end.ok_or_else(|| {
                anyhow::anyhow!("--end is required for maintenance.\n\n{}", usage_text())
            })?;
            let start = parse_datetime_arg("--start", &start_raw)?;
            let end = parse_datetime_arg("--end", &end_raw)?;
            if end <= start {
                return Err(anyhow::anyhow!(
                    "--end must be after --start.\n\n{}",
                    usage_text()
                ));
            }
            Ok(CliCommand::Maintenance {
                workspace: require_i64(workspace, "--workspace", "maintenance")?,
                network,
                start,
                end,
                suppress: suppress.as_deref().map(parse_suppress_arg).transpose()?.unwrap_or_default(),
                reason: reason.unwrap_or_default(),
                db,
            })
        }
        "report" => {
            ensure_allowed("report", &provided, &["--workspace", "--output", "--db"])?;
            Ok(CliCommand::Report {
                workspace: require_i64(workspace, "--workspace", "report")?,
                output,
                db,
            })
        }
        _ => unreachable!(),
    }
}
