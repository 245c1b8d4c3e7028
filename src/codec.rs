//! Framing codec for the bloomd newline-delimited text protocol.
//!
//! The decoder reassembles protocol frames from arbitrary byte chunks: a
//! frame is either a single response line or the interior lines of a block
//! bounded by literal `START` and `END` markers. Incoming line terminators
//! may be `\r\n`, `\r`, or `\n`; requests are always terminated with `\n`.
//!
//! Interior block lines are consumed from the read buffer as they arrive, so
//! a large block trickling in over many small reads costs linear time rather
//! than rescanning from `START` on every chunk.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// First line of a block response.
pub const BLOCK_START: &str = "START";

/// Last line of a block response.
pub const BLOCK_END: &str = "END";

/// One unit of protocol output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A single response line, terminator stripped.
    Line(String),
    /// The interior lines of a `START`/`END` block, markers stripped.
    Block(Vec<String>),
}

/// Codec pairing the frame reassembler with the request-line encoder.
///
/// # Examples
///
/// ```
/// use bloomd_client::codec::{BloomCodec, Frame};
/// use bytes::BytesMut;
/// use tokio_util::codec::Decoder;
///
/// let mut codec = BloomCodec::new();
/// let mut buf = BytesMut::from("Yes\nSTART\na 1\nEND\n");
/// assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Line("Yes".into())));
/// assert_eq!(
///     codec.decode(&mut buf).unwrap(),
///     Some(Frame::Block(vec!["a 1".into()]))
/// );
/// assert_eq!(codec.decode(&mut buf).unwrap(), None);
/// ```
#[derive(Debug, Default)]
pub struct BloomCodec {
    /// Interior lines of the block currently being assembled, when the
    /// decoder is between `START` and `END`.
    block: Option<Vec<String>>,
}

impl BloomCodec {
    /// Create a codec with no partial state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split the next complete line off the front of `src`.
    ///
    /// Returns `Ok(None)` when no full line is buffered. A lone `\r` at the
    /// end of the buffer waits for the next chunk unless `eof` is set: the
    /// paired `\n` may still be in flight.
    fn take_line(src: &mut BytesMut, eof: bool) -> Result<Option<String>, io::Error> {
        let Some(at) = src.iter().position(|b| *b == b'\r' || *b == b'\n') else {
            return Ok(None);
        };
        if src[at] == b'\r' && at + 1 == src.len() && !eof {
            return Ok(None);
        }
        let terminator = if src[at] == b'\r' && src.get(at + 1) == Some(&b'\n') {
            2
        } else {
            1
        };
        let raw = src.split_to(at);
        src.advance(terminator);
        let line = std::str::from_utf8(&raw)
            .map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "response line is not valid UTF-8")
            })?
            .to_string();
        Ok(Some(line))
    }

    fn parse(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<Frame>, io::Error> {
        while let Some(line) = Self::take_line(src, eof)? {
            match &mut self.block {
                Some(lines) => {
                    if line == BLOCK_END {
                        let block = std::mem::take(lines);
                        self.block = None;
                        return Ok(Some(Frame::Block(block)));
                    }
                    lines.push(line);
                }
                None if line == BLOCK_START => self.block = Some(Vec::new()),
                None => return Ok(Some(Frame::Line(line))),
            }
        }
        Ok(None)
    }
}

impl Decoder for BloomCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        self.parse(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        let frame = self.parse(src, true)?;
        if frame.is_none() {
            // A truncated line or unterminated block cannot complete once
            // the peer has closed; the disconnection path fails whichever
            // command was waiting on it.
            src.clear();
            self.block = None;
        }
        Ok(frame)
    }
}

impl Encoder<String> for BloomCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
