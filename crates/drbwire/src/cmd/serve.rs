use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use drbwire_marshal::Value;
use drbwire_session::{HandlerError, Listener, Outcome, Request};
use drbwire_transport::{DrbStream, DrbUri};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.timeouts.frame_config()?;
    let listener = Listener::bind_with_config(&args.uri, config)
        .map_err(|err| session_error("bind failed", err))?;
    let local = listener
        .local_uri()
        .map_err(|err| session_error("bind failed", err))?;

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone(), local.clone())?;

    print_listening(&local.to_string(), format);
    listener
        .serve_until(&stop, || echo)
        .map_err(|err| session_error("serve failed", err))?;

    info!("echo server stopped");
    Ok(SUCCESS)
}

/// Reply with the method name followed by the arguments.
fn echo(request: &Request) -> Result<Outcome, HandlerError> {
    let mut items = Vec::with_capacity(request.args.len() + 1);
    items.push(request.method.value.clone());
    items.extend(request.arg_values().cloned());

    info!(
        method = %request.method.value,
        args = request.args.len(),
        "echoing request"
    );
    Ok(Outcome::success(Value::Array(items)))
}

/// On Ctrl-C, raise the stop flag and wake the accept loop with a throwaway
/// connection so the listener is dropped and a drbunix socket file removed.
fn install_ctrlc_handler(stop: Arc<AtomicBool>, local: DrbUri) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
        let _ = DrbStream::connect(&local);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use drbwire_frame::RawPiece;

    use super::*;

    fn piece(value: Value) -> RawPiece {
        RawPiece {
            raw: drbwire_marshal::encode(&value).unwrap(),
            value,
        }
    }

    #[test]
    fn echo_returns_method_and_args() {
        let request = Request {
            object_id: piece(Value::Nil),
            method: piece(Value::string("greet")),
            args: vec![piece(Value::Integer(1)), piece(Value::symbol("x"))],
            block: piece(Value::Nil),
        };
        let outcome = echo(&request).unwrap();
        assert!(outcome.success);
        assert!(!outcome.close);
        assert_eq!(
            outcome.result,
            drbwire_frame::PieceBody::Value(Value::Array(vec![
                Value::string("greet"),
                Value::Integer(1),
                Value::symbol("x"),
            ]))
        );
    }
}
