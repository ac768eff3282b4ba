//! Line codec for IRC client links.
//!
//! XDCC bots are not consistent about encodings, so lines are decoded
//! lossily rather than rejected. A line longer than `max_len` is dropped
//! whole and decoding resumes at the next newline.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use xdcc_proto::Message;

use crate::error::SessionError;

/// Generous upper bound; servers with IRCv3 tags send well past 512 bytes.
const DEFAULT_MAX_LEN: usize = 8192;

pub struct IrcCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
    /// Currently skipping an oversized line.
    discarding: bool,
}

impl IrcCodec {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Default for IrcCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcCodec {
    type Item = String;
    type Error = SessionError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, SessionError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    // Keep nothing of an oversized line; wait for its newline.
                    src.clear();
                    self.discarding = true;
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_len {
                continue;
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                continue;
            }
            return Ok(Some(text.to_string()));
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = SessionError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), SessionError> {
        let line = msg.to_string();
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
