// src/core/protocol/line_codec.rs

//! Implements a `tokio_util::codec` `Encoder` and `Decoder` for newline-delimited
//! text in the session's encoding.

use crate::core::ClientError;
use crate::core::encoding::TextEncoding;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Upper bound on a single received line. A peer that streams more than this
/// without a newline is treated as broken rather than buffered forever.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Capacity of each socket read performed while waiting for a line.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Splits the byte stream on `\n`, drops an optional preceding `\r`, and decodes
/// each line with the session encoding. Encoding appends the newline.
#[derive(Debug, Clone)]
pub struct LineCodec {
    encoding: TextEncoding,
    // Index up to which the buffer is known to contain no newline.
    next_index: usize,
}

impl LineCodec {
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            next_index: 0,
        }
    }

    fn decode_line(&self, mut line: &[u8]) -> Result<String, ClientError> {
        if let [head @ .., b'\r'] = line {
            line = head;
        }
        Ok(self.encoding.decode(line)?.into_owned())
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let read_to = src.len();
        let newline = src[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n');

        match newline {
            Some(offset) => {
                let newline_index = self.next_index + offset;
                self.next_index = 0;
                let line = src.split_to(newline_index + 1);
                self.decode_line(&line[..newline_index]).map(Some)
            }
            None if read_to > MAX_LINE_LENGTH => {
                // Discard the oversized fragment so a caller that keeps reading
                // does not trip over it again.
                src.clear();
                self.next_index = 0;
                Err(ClientError::LineTooLong(MAX_LINE_LENGTH))
            }
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    /// A peer may write its last line and close without a trailing newline;
    /// that fragment is still delivered as a line.
    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        self.next_index = 0;
        let rest = buf.split();
        self.decode_line(&rest).map(Some)
    }
}

impl Encoder<&str> for LineCodec {
    type Error = ClientError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = self.encoding.encode(item);
        dst.reserve(bytes.len() + 1);
        dst.put_slice(&bytes);
        dst.put_u8(b'\n');
        Ok(())
    }
}
