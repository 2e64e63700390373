use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use drbwire_marshal::Value;
use drbwire_session::Reply;
use serde::Serialize;
use serde_json::json;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    inspect: String,
    len: usize,
    hex: &'a str,
}

#[derive(Serialize)]
struct DecodedOutput {
    kind: &'static str,
    inspect: String,
    value: serde_json::Value,
}

#[derive(Serialize)]
struct ReplyOutput {
    success: bool,
    kind: &'static str,
    inspect: String,
    value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_hex: Option<String>,
}

#[derive(Serialize)]
struct ListeningOutput<'a> {
    event: &'static str,
    uri: &'a str,
}

pub fn print_encoded(value: &Value, bytes: &[u8], format: OutputFormat) {
    let hex = to_hex(bytes);
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            inspect: value.to_string(),
            len: bytes.len(),
            hex: &hex,
        }),
        OutputFormat::Table => print_table(vec![
            ["VALUE".to_string(), value.to_string()],
            ["LEN".to_string(), bytes.len().to_string()],
            ["HEX".to_string(), hex],
        ]),
        OutputFormat::Pretty => println!("{hex}"),
    }
}

pub fn print_decoded(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&DecodedOutput {
            kind: value.kind(),
            inspect: value.to_string(),
            value: value_to_json(value),
        }),
        OutputFormat::Table => print_table(vec![
            ["KIND".to_string(), value.kind().to_string()],
            ["VALUE".to_string(), value.to_string()],
        ]),
        OutputFormat::Pretty => println!("{value}"),
    }
}

pub fn print_reply(reply: &Reply, format: OutputFormat) {
    let raw_hex = reply.raw_result.as_deref().map(to_hex);
    match format {
        OutputFormat::Json => print_json(&ReplyOutput {
            success: reply.success,
            kind: reply.result.kind(),
            inspect: reply.result.to_string(),
            value: value_to_json(&reply.result),
            raw_hex,
        }),
        OutputFormat::Table => {
            let mut rows = vec![
                ["SUCCESS".to_string(), reply.success.to_string()],
                ["KIND".to_string(), reply.result.kind().to_string()],
                ["RESULT".to_string(), reply.result.to_string()],
            ];
            if let Some(hex) = raw_hex {
                rows.push(["RAW".to_string(), hex]);
            }
            print_table(rows);
        }
        OutputFormat::Pretty => {
            let status = if reply.success { "ok" } else { "failed" };
            match raw_hex {
                Some(hex) => println!("{status} {} (raw {hex})", reply.result),
                None => println!("{status} {}", reply.result),
            }
        }
    }
}

pub fn print_listening(uri: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ListeningOutput {
            event: "listening",
            uri,
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("{uri}"),
    }
    let _ = std::io::stdout().flush();
}

/// JSON rendering of a value for machine consumers.
///
/// Strings that are not flagged UTF-8 (or not valid UTF-8) and user-defined
/// payloads are rendered as hex so no byte is lost.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Nil => serde_json::Value::Null,
        Value::Bool(flag) => json!(flag),
        Value::Integer(n) => json!(n),
        Value::Symbol(name) => json!({ "symbol": String::from_utf8_lossy(name) }),
        Value::String { bytes, is_utf8 } => match std::str::from_utf8(bytes) {
            Ok(text) if *is_utf8 => json!(text),
            _ => json!({ "bytes_hex": to_hex(bytes), "utf8": is_utf8 }),
        },
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::UserDefined {
            tag,
            decoded,
            raw_payload,
        } => json!({
            "user_defined": String::from_utf8_lossy(tag),
            "payload_hex": to_hex(raw_payload),
            "decoded": decoded.as_deref().map(value_to_json),
        }),
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Parse hex input, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = input.trim();
    let digits: String = trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    hex::decode(digits)
}

fn print_json<T: Serialize>(out: &T) {
    println!(
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_table(rows: Vec<[String; 2]>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for row in rows {
        table.add_row(row.to_vec());
    }
    println!("{table}");
}
