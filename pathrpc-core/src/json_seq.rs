//! JSON text sequence framing.
//!
//! Each record is written as:
//!
//! ```text
//! 0x1E <compact JSON> 0x0A
//! ```
//!
//! A stream may end with a pagination record `{"$prev": .., "$next": ..}`,
//! or with an error record `{"$error": ..}` when the producer failed after
//! the response head was sent.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::FrameError;

/// ASCII record separator that starts every frame.
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// Content type of a json-seq response.
///
/// `application/json-seq` is avoided since few clients stream it.
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub const PREV_KEY: &str = "$prev";
pub const NEXT_KEY: &str = "$next";
pub const ERROR_KEY: &str = "$error";

/// Encode one value as a frame.
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, serde_json::Error> {
    let mut frame = BytesMut::new().writer();
    frame.get_mut().put_u8(RECORD_SEPARATOR);
    serde_json::to_writer(&mut frame, value)?;
    let mut frame = frame.into_inner();
    frame.put_u8(b'\n');
    Ok(frame.freeze())
}

/// Encode the trailing pagination frame.
pub fn pagination_frame(prev: Option<&str>, next: Option<&str>) -> Bytes {
    #[derive(Serialize)]
    struct Links<'a> {
        #[serde(rename = "$prev")]
        prev: Option<&'a str>,
        #[serde(rename = "$next")]
        next: Option<&'a str>,
    }
    frame_of(&Links { prev, next })
}

/// Encode an error frame.
pub fn error_frame(error: serde_json::Value) -> Bytes {
    let mut body = serde_json::Map::new();
    body.insert(ERROR_KEY.to_string(), error);
    frame_of(&serde_json::Value::Object(body))
}

fn frame_of<T: Serialize>(value: &T) -> Bytes {
    // Only called with string-keyed values, which always serialize.
    encode_frame(value).unwrap_or_else(|_| Bytes::from_static(b"\x1enull\n"))
}

/// A decoded record.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Value(serde_json::Value),
    Links {
        prev: Option<String>,
        next: Option<String>,
    },
    Error(serde_json::Value),
}

impl Frame {
    fn classify(value: serde_json::Value) -> Frame {
        let serde_json::Value::Object(mut map) = value else {
            return Frame::Value(value);
        };
        if map.len() == 2 && map.contains_key(PREV_KEY) && map.contains_key(NEXT_KEY) {
            let link = |value: Option<serde_json::Value>| match value {
                Some(serde_json::Value::String(url)) => Some(url),
                _ => None,
            };
            return Frame::Links {
                prev: link(map.remove(PREV_KEY)),
                next: link(map.remove(NEXT_KEY)),
            };
        }
        if map.len() == 1 {
            if let Some(error) = map.remove(ERROR_KEY) {
                return Frame::Error(error);
            }
        }
        Frame::Value(serde_json::Value::Object(map))
    }
}

/// Incremental decoder: feed it chunks, take frames out as they complete.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Bytes consumed so far, for error positions.
    offset: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Take the next complete frame, if the buffer holds one.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        self.skip_whitespace();
        if self.buffer.is_empty() {
            return Ok(None);
        }
        if self.buffer[0] != RECORD_SEPARATOR {
            return Err(FrameError::MissingSeparator(self.offset));
        }
        let Some(end) = self.buffer.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let record = self.buffer.split_to(end + 1);
        self.offset += record.len();
        let value = serde_json::from_slice(&record[1..end])?;
        Ok(Some(Frame::classify(value)))
    }

    /// Flush a final frame that was not newline terminated.
    pub fn finish(&mut self) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.next_frame()? {
            return Ok(Some(frame));
        }
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let record = self.buffer.split();
        self.offset += record.len();
        let value = serde_json::from_slice(&record[1..])?;
        Ok(Some(Frame::classify(value)))
    }

    /// Bytes buffered but not yet decoded.
    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }

    fn skip_whitespace(&mut self) {
        let skip = self
            .buffer
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.buffer.advance(skip);
        self.offset += skip;
    }
}
