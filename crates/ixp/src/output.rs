use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ixp::mux::Dispatch;
use ixp::Exchange;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
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
struct ResponseOutput<'a> {
    address: &'a str,
    request_type: u8,
    response_type: u8,
    dispatch: &'a str,
    body_size: usize,
    body: String,
    timestamp: String,
}

pub fn print_response(
    address: &str,
    exchange: &Exchange,
    dispatch: Dispatch,
    body: &[u8],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                address,
                request_type: exchange.request_type,
                response_type: exchange.response_type,
                dispatch: dispatch_name(dispatch),
                body_size: body.len(),
                body: body_preview(body),
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
                .set_header(vec!["TYPE", "DISPATCH", "SIZE", "ADDRESS", "BODY"])
                .add_row(vec![
                    exchange.response_type.to_string(),
                    dispatch_name(dispatch).to_string(),
                    body.len().to_string(),
                    address.to_string(),
                    body_preview(body),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} dispatch={} size={} address={} body={}",
                exchange.response_type,
                dispatch_name(dispatch),
                body.len(),
                address,
                body_preview(body)
            );
        }
        OutputFormat::Raw => {
            print_raw(body);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn dispatch_name(dispatch: Dispatch) -> &'static str {
    match dispatch {
        Dispatch::Tagged => "tagged",
        Dispatch::Sequential => "sequential",
    }
}

/// Text bodies print as-is; anything else as hex.
fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => body.iter().map(|b| format!("{b:02x}")).collect(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
