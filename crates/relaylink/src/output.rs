use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use relaylink_session::CircuitStatus;
use relaylink_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Which board a result came from.
#[derive(Clone, Debug, Serialize)]
pub struct BoardRef {
    pub port: String,
    pub address: u8,
    pub circuits: u8,
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    board: &'a BoardRef,
    command: &'a str,
    bits: String,
    mask: u32,
    open: Vec<u8>,
    timestamp: String,
}

pub fn print_status(board: &BoardRef, command: &str, status: &CircuitStatus, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatusOutput {
                board,
                command,
                bits: status.to_string(),
                mask: status.mask(),
                open: status.open_circuits(),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CIRCUIT", "STATE"]);
            for (circuit, open) in status.iter() {
                table.add_row(vec![circuit.to_string(), state_name(open).to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} address={} {command}: {} open={:?}",
                board.port,
                board.address,
                status,
                status.open_circuits()
            );
        }
    }
}

#[derive(Serialize)]
struct CircuitOutput<'a> {
    board: &'a BoardRef,
    command: &'a str,
    circuit: u8,
    /// `None` when the command was sent without waiting for a reply.
    open: Option<bool>,
    timestamp: String,
}

pub fn print_circuit(
    board: &BoardRef,
    command: &str,
    circuit: u8,
    open: Option<bool>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = CircuitOutput {
                board,
                command,
                circuit,
                open,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "CIRCUIT", "STATE"])
                .add_row(vec![
                    command.to_string(),
                    circuit.to_string(),
                    open.map_or("sent", state_name).to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} address={} {command} circuit={circuit} state={}",
                board.port,
                board.address,
                open.map_or("sent", state_name)
            );
        }
    }
}

/// Acknowledge a no-reply command that affects many circuits.
pub fn print_sent(board: &BoardRef, command: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct SentOutput<'a> {
                board: &'a BoardRef,
                command: &'a str,
                sent: bool,
                timestamp: String,
            }
            print_json(&SentOutput {
                board,
                command,
                sent: true,
                timestamp: now_unix_seconds(),
            });
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{} address={} {command}: sent", board.port, board.address);
        }
    }
}

#[derive(Serialize)]
struct ChangeOutput<'a> {
    board: &'a BoardRef,
    circuit: u8,
    open: bool,
    timestamp: String,
}

/// One line per circuit that changed between polls.
pub fn print_changes(
    board: &BoardRef,
    previous: &CircuitStatus,
    current: &CircuitStatus,
    format: OutputFormat,
) {
    for circuit in current.changed_since(previous) {
        let open = current.is_open(circuit);
        match format {
            OutputFormat::Json => print_json(&ChangeOutput {
                board,
                circuit,
                open,
                timestamp: now_unix_seconds(),
            }),
            OutputFormat::Table | OutputFormat::Pretty => {
                println!(
                    "{} address={} circuit={circuit} {} -> {}",
                    board.port,
                    board.address,
                    state_name(!open),
                    state_name(open)
                );
            }
        }
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    description: Option<&'a str>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<_> = ports
                .iter()
                .map(|port| PortOutput {
                    name: &port.name,
                    kind: port.kind,
                    description: port.description.as_deref(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in ports {
                match &port.description {
                    Some(description) => println!("{} ({}, {description})", port.name, port.kind),
                    None => println!("{} ({})", port.name, port.kind),
                }
            }
        }
    }
}

pub fn state_name(open: bool) -> &'static str {
    if open {
        "open"
    } else {
        "closed"
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
