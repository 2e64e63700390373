//! Piece framing for dRuby messages.
//!
//! Every value on a dRuby connection travels as a *piece*:
//!
//! ```text
//! +----------------+--------------------------------+
//! | length (4B BE) | payload: 04 08 + encoded value |
//! +----------------+--------------------------------+
//! ```
//!
//! A request is five consecutive pieces and a reply two. [`PieceReader`]
//! handles partial reads and bounds each read attempt with a per-phase
//! timeout; [`PieceWriter`] writes whole messages in one pass.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_length, encode_piece, put_piece, put_raw_piece, FrameConfig, Piece, PieceBody,
    RawPiece, DEFAULT_LENGTH_TIMEOUT, DEFAULT_MAX_PAYLOAD, DEFAULT_PAYLOAD_TIMEOUT,
    LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, Phase, Result};
pub use reader::PieceReader;
pub use writer::PieceWriter;
