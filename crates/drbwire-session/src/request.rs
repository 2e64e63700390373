use std::io::{Read, Write};
use std::iter;

use bytes::{Bytes, BytesMut};
use drbwire_frame::{
    put_piece, FrameError, Piece, PieceBody, PieceReader, PieceWriter, RawPiece,
    DEFAULT_MAX_PAYLOAD,
};
use drbwire_marshal::{MarshalError, Value};
use drbwire_transport::StreamControl;
use tracing::warn;

use crate::error::Result;

/// Upper bound on argument slots reserved up front from a peer-declared count.
const MAX_PREALLOCATED_ARGS: usize = 64;

/// A method call to send: the five request pieces before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Target object; `nil` addresses the server's front object.
    pub object_id: Value,
    pub method: Value,
    pub args: Vec<Value>,
    pub block: Value,
}

impl Call {
    /// Call `method` on the front object with no arguments and no block.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            object_id: Value::Nil,
            method: Value::string(method),
            args: Vec::new(),
            block: Value::Nil,
        }
    }

    /// Address a specific remote object.
    pub fn on(mut self, object_id: impl Into<Value>) -> Self {
        self.object_id = object_id.into();
        self
    }

    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn block(mut self, block: impl Into<Value>) -> Self {
        self.block = block.into();
        self
    }

    fn arg_count(&self) -> std::result::Result<Value, MarshalError> {
        i32::try_from(self.args.len())
            .map(Value::Integer)
            .map_err(|_| MarshalError::IntegerOutOfRange(self.args.len() as i64))
    }

    fn pieces<'a>(&'a self, arg_count: &'a Value) -> impl Iterator<Item = Piece<'a>> {
        iter::once(Piece::Value(&self.object_id))
            .chain(iter::once(Piece::Value(&self.method)))
            .chain(iter::once(Piece::Value(arg_count)))
            .chain(self.args.iter().map(Piece::Value))
            .chain(iter::once(Piece::Value(&self.block)))
    }
}

/// A received request, each piece kept with the payload bytes it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub object_id: RawPiece,
    pub method: RawPiece,
    pub args: Vec<RawPiece>,
    pub block: RawPiece,
}

impl Request {
    /// Method name bytes, when the method piece is a string or symbol.
    pub fn method_name(&self) -> Option<&[u8]> {
        match &self.method.value {
            Value::String { bytes, .. } | Value::Symbol(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Decoded argument values in order.
    pub fn arg_values(&self) -> impl Iterator<Item = &Value> {
        self.args.iter().map(|piece| &piece.value)
    }
}

/// Build the complete wire bytes of a request.
pub fn make_request(call: &Call) -> Result<Bytes> {
    let arg_count = call.arg_count()?;
    let mut dst = BytesMut::new();
    for piece in call.pieces(&arg_count) {
        put_piece(&mut dst, piece, DEFAULT_MAX_PAYLOAD)?;
    }
    Ok(dst.freeze())
}

/// Build the complete wire bytes of a reply.
///
/// Either piece may be a value or a payload forwarded verbatim, so a reply
/// with a flag that is not a boolean can be produced on purpose.
pub fn make_reply(success: &PieceBody, result: &PieceBody) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    put_piece(&mut dst, success.as_piece(), DEFAULT_MAX_PAYLOAD)?;
    put_piece(&mut dst, result.as_piece(), DEFAULT_MAX_PAYLOAD)?;
    Ok(dst.freeze())
}

/// Write a request as a single message.
pub fn write_request<W: Write>(writer: &mut PieceWriter<W>, call: &Call) -> Result<()> {
    let arg_count = call.arg_count()?;
    writer.write_pieces(call.pieces(&arg_count))?;
    Ok(())
}

/// Write a reply as a single message.
pub fn write_reply<W: Write>(
    writer: &mut PieceWriter<W>,
    success: &PieceBody,
    result: &PieceBody,
) -> std::result::Result<(), FrameError> {
    writer.write_pieces([success.as_piece(), result.as_piece()])
}

/// Read the five pieces of a request.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly before the
/// first piece. A close anywhere later is an error. An argument count that is
/// not a non-negative integer is read as zero arguments.
pub fn read_request<R: Read + StreamControl>(
    reader: &mut PieceReader<R>,
) -> std::result::Result<Option<Request>, FrameError> {
    let object_id = match reader.read_piece_with_raw() {
        Ok(piece) => piece,
        Err(FrameError::ConnectionClosed) => return Ok(None),
        Err(err) => return Err(err),
    };
    let method = reader.read_piece_with_raw()?;
    let count = reader.read_piece_with_raw()?;

    let arg_count = match count.value {
        Value::Integer(n) if n >= 0 => n as usize,
        ref other => {
            warn!(count = %other, "request argument count is not a non-negative integer; reading no arguments");
            0
        }
    };

    let mut args = Vec::with_capacity(arg_count.min(MAX_PREALLOCATED_ARGS));
    for _ in 0..arg_count {
        args.push(reader.read_piece_with_raw()?);
    }
    let block = reader.read_piece_with_raw()?;

    Ok(Some(Request {
        object_id,
        method,
        args,
        block,
    }))
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::time::Duration;

    use drbwire_frame::encode_piece;

    use super::*;

    /// In-memory stream for reading back generated bytes.
    struct Wire(Cursor<Vec<u8>>);

    impl Read for Wire {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl StreamControl for Wire {
        fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn set_write_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn shutdown(&self) -> io::Result<()> {
            Ok(())
        }
    }

    fn reader(bytes: impl Into<Vec<u8>>) -> PieceReader<Wire> {
        PieceReader::new(Wire(Cursor::new(bytes.into())))
    }

    #[test]
    fn call_builder_defaults() {
        let call = Call::new("size");
        assert_eq!(call.object_id, Value::Nil);
        assert_eq!(call.method, Value::string("size"));
        assert!(call.args.is_empty());
        assert_eq!(call.block, Value::Nil);
    }

    #[test]
    fn request_bytes_layout() {
        let call = Call::new("greet").on(8).arg("world");
        let bytes = make_request(&call).unwrap();

        let expected: Vec<u8> = [
            encode_piece(&Value::Integer(8)).unwrap(),
            encode_piece(&Value::string("greet")).unwrap(),
            encode_piece(&Value::Integer(1)).unwrap(),
            encode_piece(&Value::string("world")).unwrap(),
            encode_piece(&Value::Nil).unwrap(),
        ]
        .concat();
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn request_without_args_has_four_pieces() {
        let bytes = make_request(&Call::new("ping")).unwrap();
        let mut reader = reader(bytes.to_vec());
        for _ in 0..4 {
            reader.read_piece().unwrap();
        }
        assert!(reader.read_piece().unwrap_err().is_clean_close());
    }

    #[test]
    fn reply_bytes_layout() {
        let bytes = make_reply(&true.into(), &PieceBody::Value(Value::Integer(3))).unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0, 0, 0, 3, 0x04, 0x08, b'T', 0, 0, 0, 4, 0x04, 0x08, b'i', 0x08]
        );
    }

    #[test]
    fn reply_with_raw_result_is_forwarded_verbatim() {
        let raw = Bytes::from_static(&[0x04, 0x08, b'u', b':', 0x06, b'X', 0x06, 0xff]);
        let bytes = make_reply(&false.into(), &PieceBody::Raw(raw.clone())).unwrap();
        assert_eq!(&bytes[7..11], &[0, 0, 0, 8]);
        assert_eq!(&bytes[11..], raw.as_ref());
    }

    #[test]
    fn reply_with_raw_success_flag() {
        let flag = Bytes::from_static(&[0x04, 0x08, b'i', 0x06]);
        let bytes = make_reply(&PieceBody::Raw(flag.clone()), &Value::Nil.into()).unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 4]);
        assert_eq!(&bytes[4..8], flag.as_ref());
        assert_eq!(&bytes[8..], &[0, 0, 0, 3, 0x04, 0x08, b'0']);
    }

    #[test]
    fn read_request_roundtrip() {
        let call = Call::new("concat")
            .on(Value::Nil)
            .args(["a", "b"])
            .block(Value::Nil);
        let mut reader = reader(make_request(&call).unwrap().to_vec());

        let request = read_request(&mut reader).unwrap().unwrap();
        assert_eq!(request.method_name(), Some(&b"concat"[..]));
        assert_eq!(
            request.arg_values().cloned().collect::<Vec<_>>(),
            vec![Value::string("a"), Value::string("b")]
        );
        assert_eq!(request.block.value, Value::Nil);
        assert_eq!(
            request.args[0].raw.as_ref(),
            &encode_piece(&Value::string("a")).unwrap()[4..]
        );
    }

    #[test]
    fn non_integer_arg_count_reads_no_arguments() {
        let wire: Vec<u8> = [
            encode_piece(&Value::Nil).unwrap(),
            encode_piece(&Value::symbol("m")).unwrap(),
            encode_piece(&Value::string("two")).unwrap(),
            encode_piece(&Value::Nil).unwrap(),
        ]
        .concat();
        let request = read_request(&mut reader(wire)).unwrap().unwrap();
        assert!(request.args.is_empty());
        assert_eq!(request.method_name(), Some(&b"m"[..]));
    }

    #[test]
    fn negative_arg_count_reads_no_arguments() {
        let wire: Vec<u8> = [
            encode_piece(&Value::Nil).unwrap(),
            encode_piece(&Value::symbol("m")).unwrap(),
            encode_piece(&Value::Integer(-2)).unwrap(),
            encode_piece(&Value::Bool(true)).unwrap(),
        ]
        .concat();
        let request = read_request(&mut reader(wire)).unwrap().unwrap();
        assert!(request.args.is_empty());
        assert_eq!(request.block.value, Value::Bool(true));
    }

    #[test]
    fn empty_stream_reads_no_request() {
        assert!(read_request(&mut reader(Vec::new())).unwrap().is_none());
    }

    #[test]
    fn close_between_pieces_is_an_error() {
        let wire: Vec<u8> = [
            encode_piece(&Value::Nil).unwrap(),
            encode_piece(&Value::symbol("m")).unwrap(),
        ]
        .concat();
        let err = read_request(&mut reader(wire)).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn write_request_matches_make_request() {
        let call = Call::new("x").arg(1).arg(true);
        let mut writer = PieceWriter::new(Vec::new());
        write_request(&mut writer, &call).unwrap();
        assert_eq!(writer.into_inner(), make_request(&call).unwrap().to_vec());
    }
}
