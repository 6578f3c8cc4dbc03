//! Line framing codec for the stdio wire.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a configurable maximum line
//! length so an unterminated or runaway-length input line cannot exhaust
//! memory. Use [`RpcCodec`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`] over the server's input stream.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Default maximum accepted line length: 1 MiB.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited framing for inbound protocol lines.
///
/// Each `\n`-terminated UTF-8 string is one complete wire message. Lines
/// longer than the configured limit cause [`RpcCodec::decode`] to return
/// `AppError::Codec("line too long: …")` rather than allocating without
/// bound; once framing is lost the stream cannot be resynchronized, so the
/// ingress loop reports the oversized frame and shuts down in order.
#[derive(Debug)]
pub struct RpcCodec {
    inner: LinesCodec,
    max_line_bytes: usize,
}

impl RpcCodec {
    /// Create a codec enforcing the given maximum line length.
    #[must_use]
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_line_bytes),
            max_line_bytes,
        }
    }
}

impl Default for RpcCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl Decoder for RpcCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next newline-terminated line from `src`.
    ///
    /// Returns `Ok(None)` when `src` holds no complete line yet (buffering).
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.inner
            .decode(src)
            .map_err(|err| map_codec_error(err, self.max_line_bytes))
    }

    /// Decode the final, possibly unterminated line at end of stream.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.inner
            .decode_eof(src)
            .map_err(|err| map_codec_error(err, self.max_line_bytes))
    }
}

/// Map a [`LinesCodecError`] to an [`AppError`].
fn map_codec_error(err: LinesCodecError, max_line_bytes: usize) -> AppError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Codec(format!("line too long: exceeded {max_line_bytes} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
