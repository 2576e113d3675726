use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use paychannel_channel::Notification;
use serde::Serialize;
use serde_json::{Map, Value};

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

#[derive(Serialize)]
struct NotificationOutput<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    internal: &'a Map<String, Value>,
    data: &'a Map<String, Value>,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_notification(notification: &Notification<'_>, format: OutputFormat) {
    let event = notification.event().as_str();
    let payload = notification.payload();

    match format {
        OutputFormat::Json => {
            let out = NotificationOutput {
                event,
                internal: notification.internal(),
                data: notification.data(),
                payload_size: payload.len(),
                payload: payload_preview(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "SIZE", "DATA", "PAYLOAD"])
                .add_row(vec![
                    event.to_string(),
                    payload.len().to_string(),
                    object_text(notification.data()),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "event={} size={} data={} payload={}",
                event,
                payload.len(),
                object_text(notification.data()),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn is_empty(object: &&Map<String, Value>) -> bool {
    object.is_empty()
}

fn object_text(object: &Map<String, Value>) -> String {
    serde_json::to_string(object).unwrap_or_else(|_| "{}".to_string())
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
