use std::io::{Read, Write};

use bytes::Bytes;
use drbwire_frame::{PieceReader, PieceWriter};
use drbwire_marshal::{decode, Value};
use drbwire_transport::StreamControl;
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::request::{write_request, Call};

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Whether the remote call succeeded.
    pub success: bool,
    /// The return value on success, the failure description otherwise.
    pub result: Value,
    /// Result payload as received; present for raw exchanges only.
    pub raw_result: Option<Bytes>,
}

/// Send a call and wait for its reply.
pub fn send_request<R, W>(
    reader: &mut PieceReader<R>,
    writer: &mut PieceWriter<W>,
    call: &Call,
) -> Result<Reply>
where
    R: Read + StreamControl,
    W: Write,
{
    exchange(reader, writer, call, false)
}

/// Send a call and wait for its reply, keeping the raw result payload.
pub fn send_request_with_raw<R, W>(
    reader: &mut PieceReader<R>,
    writer: &mut PieceWriter<W>,
    call: &Call,
) -> Result<Reply>
where
    R: Read + StreamControl,
    W: Write,
{
    exchange(reader, writer, call, true)
}

fn exchange<R, W>(
    reader: &mut PieceReader<R>,
    writer: &mut PieceWriter<W>,
    call: &Call,
    include_raw: bool,
) -> Result<Reply>
where
    R: Read + StreamControl,
    W: Write,
{
    debug!(method = %call.method, args = call.args.len(), "sending request");
    write_request(writer, call)?;
    read_reply(reader, include_raw)
}

/// Read the two pieces of a reply.
///
/// Both pieces are consumed before anything is validated, so the stream is
/// positioned at the next message even when the reply is rejected.
pub fn read_reply<R: Read + StreamControl>(
    reader: &mut PieceReader<R>,
    include_raw: bool,
) -> Result<Reply> {
    let flag = reader.read_piece_bytes()?;
    let raw = reader.read_piece_bytes()?;

    let success = match decode(&flag, true) {
        Ok(Value::Bool(flag)) => flag,
        Ok(other) => return Err(SessionError::InvalidBoolean(other.to_string())),
        Err(source) => return Err(SessionError::UndecodableFlag { raw: flag, source }),
    };

    let result = match decode(&raw, true) {
        Ok(value) => value,
        Err(source) => {
            return Err(SessionError::UndecodableResult {
                success,
                raw,
                source,
            })
        }
    };

    debug!(success, "received reply");
    Ok(Reply {
        success,
        result,
        raw_result: include_raw.then_some(raw),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::thread;

    use drbwire_frame::PieceBody;
    use drbwire_marshal::{Construct, MarshalError};

    use super::*;
    use crate::request::{make_reply, read_request};

    fn pair() -> (
        (PieceReader<UnixStream>, PieceWriter<UnixStream>),
        (PieceReader<UnixStream>, PieceWriter<UnixStream>),
    ) {
        let (left, right) = UnixStream::pair().unwrap();
        let left_reader = left.try_clone().unwrap();
        let right_reader = right.try_clone().unwrap();
        (
            (PieceReader::new(left_reader), PieceWriter::new(left)),
            (PieceReader::new(right_reader), PieceWriter::new(right)),
        )
    }

    /// Answer one request with pre-built reply bytes.
    fn answer_once(
        (mut reader, mut writer): (PieceReader<UnixStream>, PieceWriter<UnixStream>),
        reply: Bytes,
    ) -> thread::JoinHandle<Option<crate::request::Request>> {
        thread::spawn(move || {
            let request = read_request(&mut reader).unwrap();
            writer.get_mut().write_all(&reply).unwrap();
            request
        })
    }

    #[test]
    fn successful_call() {
        let ((mut reader, mut writer), server) = pair();
        let handle = answer_once(
            server,
            make_reply(&true.into(), &PieceBody::Value(Value::string("hello world"))).unwrap(),
        );

        let call = Call::new("greet").arg("world");
        let reply = send_request(&mut reader, &mut writer, &call).unwrap();
        assert!(reply.success);
        assert_eq!(reply.result, Value::string("hello world"));
        assert_eq!(reply.raw_result, None);

        let request = handle.join().unwrap().unwrap();
        assert_eq!(request.method_name(), Some(&b"greet"[..]));
        assert_eq!(request.args.len(), 1);
    }

    #[test]
    fn raw_call_keeps_result_bytes() {
        let ((mut reader, mut writer), server) = pair();
        let handle = answer_once(
            server,
            make_reply(&false.into(), &PieceBody::Value(Value::string("boom"))).unwrap(),
        );

        let reply = send_request_with_raw(&mut reader, &mut writer, &Call::new("x")).unwrap();
        assert!(!reply.success);
        assert_eq!(reply.result, Value::string("boom"));
        let raw = reply.raw_result.unwrap();
        assert_eq!(decode(&raw, true).unwrap(), Value::string("boom"));
        handle.join().unwrap();
    }

    #[test]
    fn non_boolean_success_rejected() {
        let ((mut reader, mut writer), server) = pair();
        let mut reply = drbwire_frame::encode_piece(&Value::Integer(1)).unwrap().to_vec();
        reply.extend_from_slice(&drbwire_frame::encode_piece(&Value::Nil).unwrap());
        let handle = answer_once(server, Bytes::from(reply));

        let err = send_request(&mut reader, &mut writer, &Call::new("x")).unwrap_err();
        assert!(matches!(err, SessionError::InvalidBoolean(ref got) if got == "1"));
        handle.join().unwrap();
    }

    #[test]
    fn undecodable_result_keeps_raw_bytes() {
        let ((mut reader, mut writer), server) = pair();
        let float = Bytes::from_static(&[0x04, 0x08, b'f', 0x08, b'1', b'.', b'5']);
        let handle = answer_once(server, make_reply(&true.into(), &PieceBody::Raw(float.clone())).unwrap());

        let err = send_request(&mut reader, &mut writer, &Call::new("x")).unwrap_err();
        match err {
            SessionError::UndecodableResult {
                success,
                raw,
                source,
            } => {
                assert!(success);
                assert_eq!(raw, float);
                assert_eq!(source, MarshalError::Unsupported(Construct::Float));
            }
            other => panic!("unexpected error: {other}"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn undecodable_flag_consumes_whole_reply() {
        let ((mut reader, mut writer), server) = pair();
        let float = Bytes::from_static(&[0x04, 0x08, b'f', 0x06, b'1']);
        let mut replies = make_reply(&PieceBody::Raw(float.clone()), &Value::Nil.into())
            .unwrap()
            .to_vec();
        replies.extend_from_slice(&make_reply(&true.into(), &Value::Integer(7).into()).unwrap());
        let handle = answer_once(server, Bytes::from(replies));

        let err = send_request(&mut reader, &mut writer, &Call::new("x")).unwrap_err();
        match err {
            SessionError::UndecodableFlag { raw, source } => {
                assert_eq!(raw, float);
                assert_eq!(source, MarshalError::Unsupported(Construct::Float));
            }
            other => panic!("unexpected error: {other}"),
        }

        let next = read_reply(&mut reader, false).unwrap();
        assert!(next.success);
        assert_eq!(next.result, Value::Integer(7));
        handle.join().unwrap();
    }

    #[test]
    fn peer_hangup_before_reply() {
        let ((mut reader, mut writer), (mut server_reader, server_writer)) = pair();
        let handle = thread::spawn(move || {
            let _ = read_request(&mut server_reader).unwrap();
            drop(server_writer);
            drop(server_reader);
        });

        let err = send_request(&mut reader, &mut writer, &Call::new("x")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(drbwire_frame::FrameError::ConnectionClosed)
        ));
        handle.join().unwrap();
    }
}
