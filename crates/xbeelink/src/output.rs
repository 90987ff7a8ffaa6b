use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use xbeelink_dispatch::RadioEvent;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_table(header: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Uppercase hex without separators, e.g. `1234AB`.
pub fn hex(data: &[u8]) -> String {
    data.iter().fold(String::with_capacity(data.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02X}");
        out
    })
}

pub fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("<binary {} bytes: {}>", payload.len(), hex(payload)),
    }
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[derive(Serialize)]
struct EventOutput {
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    analog: Option<[i32; 4]>,
    timestamp: String,
}

impl EventOutput {
    fn from_event(event: &RadioEvent) -> Self {
        let mut out = Self {
            event: event.name(),
            source: None,
            detail: String::new(),
            analog: None,
            timestamp: now_unix_seconds(),
        };
        match event {
            RadioEvent::DigitalStatus(value) => out.detail = format!("0x{value:02X}"),
            RadioEvent::AnalogStatus(sample) => {
                out.detail = sample
                    .to_raw()
                    .iter()
                    .map(i32::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                out.analog = Some(sample.to_raw());
            }
            RadioEvent::DataReceived(packet) => {
                out.source = Some(format!("{}/{}", packet.source64, packet.source16));
                out.detail = payload_preview(&packet.data);
            }
            RadioEvent::ModemStatus(status) => out.detail = format!("{status:?}"),
            RadioEvent::TransmitStatus(status) => {
                out.source = Some(status.destination16.to_string());
                out.detail = format!(
                    "frame_id={} delivery={:?} retries={}",
                    status.frame_id, status.delivery, status.retries
                );
            }
        }
        out
    }
}

pub fn print_event(event: &RadioEvent, format: OutputFormat) {
    let out = EventOutput::from_event(event);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["EVENT", "SOURCE", "DETAIL"],
            vec![vec![
                out.event.to_string(),
                out.source.unwrap_or_default(),
                out.detail,
            ]],
        ),
        OutputFormat::Pretty => match out.source {
            Some(source) => println!("{} from {source}: {}", out.event, out.detail),
            None => println!("{}: {}", out.event, out.detail),
        },
        OutputFormat::Raw => {
            if let RadioEvent::DataReceived(packet) = event {
                print_raw(&packet.data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use xbeelink_dispatch::{AnalogSample, ModemStatus};

    use super::*;

    #[test]
    fn hex_is_uppercase_without_separators() {
        assert_eq!(hex(&[0x00, 0x1F, 0xAB]), "001FAB");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn preview_falls_back_to_hex_for_binary() {
        assert_eq!(payload_preview(b"temp=21"), "temp=21");
        assert_eq!(payload_preview(&[0xFF, 0x00]), "<binary 2 bytes: FF00>");
    }

    #[test]
    fn analog_event_reports_sentinels() {
        let mut sample = AnalogSample::default();
        sample.channels[1] = Some(512);
        let out = EventOutput::from_event(&RadioEvent::AnalogStatus(sample));

        assert_eq!(out.event, "analog_status");
        assert_eq!(out.detail, "-1,512,-1,-1");
        assert_eq!(out.analog, Some([-1, 512, -1, -1]));
    }

    #[test]
    fn modem_event_serializes_without_source() {
        let out = EventOutput::from_event(&RadioEvent::ModemStatus(ModemStatus::Associated));
        let json = serde_json::to_string(&out).unwrap();

        assert!(json.contains("\"event\":\"modem_status\""));
        assert!(json.contains("\"detail\":\"Associated\""));
        assert!(!json.contains("source"));
    }
}
