use drbwire_session::{Call, Connection};
use tracing::debug;

use crate::cmd::{parse_literal, CallArgs};
use crate::exit::{session_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let call = build_call(&args)?;
    let config = args.timeouts.frame_config()?;

    let mut conn = Connection::connect(&args.uri, config)
        .map_err(|err| session_error("connect failed", err))?;
    debug!(uri = %args.uri, method = %args.method, "connected");

    let reply = if args.raw {
        conn.call_with_raw(&call)
    } else {
        conn.call(&call)
    }
    .map_err(|err| session_error("call failed", err))?;

    print_reply(&reply, format);
    Ok(if reply.success { SUCCESS } else { FAILURE })
}

fn build_call(args: &CallArgs) -> CliResult<Call> {
    let args_values = args
        .args
        .iter()
        .map(|literal| parse_literal(literal))
        .collect::<CliResult<Vec<_>>>()?;

    Ok(Call::new(args.method.as_str())
        .on(parse_literal(&args.object_id)?)
        .args(args_values))
}
