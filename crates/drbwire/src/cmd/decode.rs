use drbwire_marshal::decode;

use crate::cmd::DecodeArgs;
use crate::exit::{marshal_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{parse_hex, print_decoded, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)
        .map_err(|err| CliError::new(USAGE, format!("invalid hex input: {err}")))?;
    let value =
        decode(&bytes, !args.no_version).map_err(|err| marshal_error("decode failed", err))?;

    print_decoded(&value, format);
    Ok(SUCCESS)
}
