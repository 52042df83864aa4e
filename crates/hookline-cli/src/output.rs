//! Output formatting for hookline (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use hookline_client::{DeviceId, DeviceInfo, MailboxItem, ProviderInfo};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    println!("{}", Table::new(data));
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => print_csv(data, true),
        }
    }

    /// Print one captured packet as it arrives
    ///
    /// Tables print one line per packet; CSV prints its header before the
    /// first packet only.
    pub fn print_packet(&self, row: &PacketRow, first: bool) {
        match self.format {
            OutputFormat::Table => println!(
                "{:>6} {:>10} {} [{}] {}",
                row.seq.to_string().bold(),
                row.time,
                row.id.cyan(),
                row.data,
                row.decoded
            ),
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(row) {
                    println!("{}", json);
                }
            }
            OutputFormat::Csv => print_csv(std::slice::from_ref(row), first),
        }
    }
}

/// Print data as CSV
fn print_csv<T: Serialize>(data: &[T], header: bool) {
    let Some(serde_json::Value::Object(first)) = data.first().and_then(|d| serde_json::to_value(d).ok()) else {
        return;
    };
    let headers: Vec<&str> = first.keys().map(|s| s.as_str()).collect();
    if header {
        println!("{}", headers.join(","));
    }

    for item in data {
        if let Ok(serde_json::Value::Object(row)) = serde_json::to_value(item) {
            let values: Vec<String> = headers
                .iter()
                .map(|h| {
                    row.get(*h)
                        .map(|v| match v {
                            serde_json::Value::String(s) => escape_csv(s),
                            other => escape_csv(&other.to_string()),
                        })
                        .unwrap_or_default()
                })
                .collect();
            println!("{}", values.join(","));
        }
    }
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Provider display for providers command
#[derive(Debug, Tabled, Serialize)]
pub struct ProviderRow {
    #[tabled(rename = "Address")]
    pub address: String,
    #[tabled(rename = "Description")]
    pub description: String,
    #[tabled(rename = "Connected")]
    pub connected: String,
}

impl From<ProviderInfo> for ProviderRow {
    fn from(info: ProviderInfo) -> Self {
        Self {
            address: info.address,
            description: info.description,
            connected: if info.connected { "yes" } else { "no" }.to_string(),
        }
    }
}

/// Device display for devices command
#[derive(Debug, Tabled, Serialize)]
pub struct DeviceRow {
    #[tabled(rename = "Domain")]
    pub domain: String,
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Class")]
    pub class: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "CAN ID")]
    pub can_id: String,
    #[tabled(rename = "Firmware")]
    pub firmware: String,
    #[tabled(rename = "Supported")]
    pub supported: String,
}

impl DeviceRow {
    pub fn new(domain: &str, id: DeviceId, info: &DeviceInfo, class: &str, supported: bool) -> Self {
        Self {
            domain: domain.to_string(),
            id: id.to_string(),
            class: class.to_string(),
            name: info.display_name(),
            can_id: info.device_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            firmware: info.firmware_version.clone().unwrap_or_else(|| "-".into()),
            supported: if supported { "yes" } else { "no" }.to_string(),
        }
    }
}

/// Captured packet display for capture command
#[derive(Debug, Tabled, Serialize)]
pub struct PacketRow {
    #[tabled(rename = "Seq")]
    pub seq: u64,
    #[tabled(rename = "Time")]
    pub time: u32,
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Data")]
    pub data: String,
    #[tabled(rename = "Decoded")]
    pub decoded: String,
}

impl From<&MailboxItem> for PacketRow {
    fn from(item: &MailboxItem) -> Self {
        Self {
            seq: item.seq,
            time: item.raw.timestamp,
            id: item.raw.id.to_string(),
            data: item.raw.data_hex(),
            decoded: item.decoded.as_ref().map(|v| v.to_string()).unwrap_or_default(),
        }
    }
}
