use std::time::Duration;

use clap::{Args, Subcommand};
use drbwire_frame::FrameConfig;
use drbwire_marshal::{Value, INTEGER_MAX, INTEGER_MIN};
use drbwire_transport::DrbUri;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod decode;
pub mod encode;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a literal and print the bytes as hex.
    Encode(EncodeArgs),
    /// Decode hex bytes and print the value.
    Decode(DecodeArgs),
    /// Call a method on a dRuby server.
    Call(CallArgs),
    /// Run an echo server replying with `[method, *args]`.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Literal to encode: nil, true, false, an integer, :symbol or a string.
    /// Several literals are encoded as one array.
    #[arg(required = true, allow_negative_numbers = true)]
    pub values: Vec<String>,
    /// Omit the 04 08 version header.
    #[arg(long)]
    pub no_version: bool,
    /// Use the raw form (integers without tag, strings without encoding ivar).
    #[arg(long, conflicts_with = "no_version")]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex-encoded bytes (whitespace ignored).
    pub hex: String,
    /// Input has no 04 08 version header.
    #[arg(long)]
    pub no_version: bool,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Server URI (druby://host:port or drbunix:/path).
    #[arg(env = "DRBWIRE_URI")]
    pub uri: DrbUri,
    /// Method name.
    pub method: String,
    /// Argument literals.
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,
    /// Target object id literal. Default: nil (the front object).
    #[arg(long, default_value = "nil", allow_negative_numbers = true)]
    pub object_id: String,
    /// Also print the raw result payload as hex.
    #[arg(long)]
    pub raw: bool,
    #[command(flatten)]
    pub timeouts: TimeoutArgs,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// URI to bind (druby://host:port or drbunix:/path). Port 0 picks a free port.
    pub uri: DrbUri,
    #[command(flatten)]
    pub timeouts: TimeoutArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct TimeoutArgs {
    /// Bound on each read attempt for a piece length (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub length_timeout: String,
    /// Bound on each read attempt for a piece payload (e.g. 4s, 500ms).
    #[arg(long, default_value = "4s")]
    pub payload_timeout: String,
}

impl TimeoutArgs {
    pub fn frame_config(&self) -> CliResult<FrameConfig> {
        Ok(FrameConfig {
            length_timeout: Some(parse_duration(&self.length_timeout)?),
            payload_timeout: Some(parse_duration(&self.payload_timeout)?),
            ..FrameConfig::default()
        })
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

/// Parse a command-line literal into a value.
///
/// `nil`, `true`, `false`, integers and `:symbol` are recognized; a literal
/// wrapped in double quotes is always a string; anything else is a string.
pub fn parse_literal(input: &str) -> CliResult<Value> {
    match input {
        "nil" => return Ok(Value::Nil),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    if input.len() >= 2 && input.starts_with('"') && input.ends_with('"') {
        return Ok(Value::string(&input[1..input.len() - 1]));
    }

    if let Some(name) = input.strip_prefix(':') {
        if !name.is_empty() {
            return Ok(Value::symbol(name));
        }
    }

    if looks_numeric(input) {
        let n: i64 = input
            .parse()
            .map_err(|_| CliError::new(USAGE, format!("invalid integer literal: {input}")))?;
        if !(INTEGER_MIN..=INTEGER_MAX).contains(&n) {
            return Err(CliError::new(
                USAGE,
                format!("integer {n} outside encodable range [{INTEGER_MIN}, {INTEGER_MAX}]"),
            ));
        }
        return Ok(Value::Integer(n as i32));
    }

    Ok(Value::string(input))
}

fn looks_numeric(input: &str) -> bool {
    let digits = input.strip_prefix('-').unwrap_or(input);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
