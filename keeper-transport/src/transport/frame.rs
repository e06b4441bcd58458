//! Incremental reassembly of length-prefixed frames.
//!
//! ```text
//!        length buffer full,           body buffer full,
//!        0 < len < max                 frame emitted
//! ┌────────────────┐ ───────────► ┌──────────────┐
//! │ AwaitingLength │              │ AwaitingBody │
//! └────────────────┘ ◄─────────── └──────────────┘
//!     │  len < 0 or len >= max
//!     ▼
//!  FramingError
//! ```
//!
//! Exactly one buffer is current at any time. Callers read straight into
//! [`FrameReader::buffer_mut`] and report how many bytes landed with
//! [`FrameReader::advance`].

use bytes::{Bytes, BytesMut};

use super::error::FramingError;
use crate::wire::LENGTH_PREFIX_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingLength { filled: usize },
    AwaitingBody { len: usize, filled: usize },
}

/// Two-state frame reassembler.
#[derive(Debug)]
pub struct FrameReader {
    state: State,
    length: [u8; LENGTH_PREFIX_SIZE],
    body: BytesMut,
    max_len: usize,
}

impl FrameReader {
    /// Create a reader rejecting lengths of `max_len` or more.
    pub fn new(max_len: usize, initial_capacity: usize) -> Self {
        Self {
            state: State::AwaitingLength { filled: 0 },
            length: [0; LENGTH_PREFIX_SIZE],
            body: BytesMut::with_capacity(initial_capacity),
            max_len,
        }
    }

    /// The unfilled part of the current buffer. Never empty.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        match self.state {
            State::AwaitingLength { filled } => &mut self.length[filled..],
            State::AwaitingBody { len, filled } => &mut self.body[filled..len],
        }
    }

    /// Account for `n` bytes written into [`Self::buffer_mut`].
    ///
    /// Returns the frame body once complete.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::PacketLength`] for a negative or oversized
    /// length; the reader is reset.
    pub fn advance(&mut self, n: usize) -> Result<Option<Bytes>, FramingError> {
        match self.state {
            State::AwaitingLength { filled } => {
                let filled = filled + n;
                if filled < LENGTH_PREFIX_SIZE {
                    self.state = State::AwaitingLength { filled };
                    return Ok(None);
                }
                let len = i32::from_be_bytes(self.length);
                if len < 0 || len as usize >= self.max_len {
                    self.reset();
                    return Err(FramingError::PacketLength {
                        len,
                        max: self.max_len,
                    });
                }
                if len == 0 {
                    self.state = State::AwaitingLength { filled: 0 };
                    return Ok(Some(Bytes::new()));
                }
                let len = len as usize;
                self.body.clear();
                self.body.resize(len, 0);
                self.state = State::AwaitingBody { len, filled: 0 };
                Ok(None)
            }
            State::AwaitingBody { len, filled } => {
                let filled = filled + n;
                if filled < len {
                    self.state = State::AwaitingBody { len, filled };
                    return Ok(None);
                }
                self.state = State::AwaitingLength { filled: 0 };
                Ok(Some(self.body.split_to(len).freeze()))
            }
        }
    }

    /// Whether no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.state == State::AwaitingLength { filled: 0 }
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.state = State::AwaitingLength { filled: 0 };
        self.body.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    /// Feed `data` in chunks of at most `chunk` bytes, collecting frames.
    fn feed(reader: &mut FrameReader, data: &[u8], chunk: usize) -> Result<Vec<Bytes>, FramingError> {
        let mut frames = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let buf = reader.buffer_mut();
            let n = buf.len().min(chunk).min(rest.len());
            buf[..n].copy_from_slice(&rest[..n]);
            rest = &rest[n..];
            if let Some(frame) = reader.advance(n)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as i32).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_partial_reads_reassemble_identically() {
        let mut data = framed(b"first body");
        data.extend(framed(b"second"));

        let whole = feed(&mut FrameReader::new(MAX, 16), &data, usize::MAX).expect("whole");
        let split = feed(&mut FrameReader::new(MAX, 16), &data, 3).expect("split");
        let bytewise = feed(&mut FrameReader::new(MAX, 16), &data, 1).expect("bytewise");

        assert_eq!(whole, vec![Bytes::from_static(b"first body"), Bytes::from_static(b"second")]);
        assert_eq!(split, whole);
        assert_eq!(bytewise, whole);
    }

    #[test]
    fn test_rejects_negative_length() {
        let mut reader = FrameReader::new(MAX, 16);
        let err = feed(&mut reader, &(-1i32).to_be_bytes(), 4).expect_err("negative");
        assert_eq!(err, FramingError::PacketLength { len: -1, max: MAX });
        assert!(reader.is_idle());
    }

    #[test]
    fn test_rejects_length_at_max() {
        let mut reader = FrameReader::new(MAX, 16);
        let err = feed(&mut reader, &(MAX as i32).to_be_bytes(), 4).expect_err("too long");
        assert_eq!(
            err,
            FramingError::PacketLength {
                len: MAX as i32,
                max: MAX
            }
        );

        let below = framed(&vec![7u8; MAX - 1]);
        let frames = feed(&mut reader, &below, 100).expect("just below max");
        assert_eq!(frames[0].len(), MAX - 1);
    }

    #[test]
    fn test_empty_body() {
        let mut reader = FrameReader::new(MAX, 16);
        let frames = feed(&mut reader, &framed(b""), 4).expect("empty");
        assert_eq!(frames, vec![Bytes::new()]);
        assert!(reader.is_idle());
    }

    #[test]
    fn test_length_split_across_reads() {
        let mut reader = FrameReader::new(MAX, 16);
        let data = framed(b"xy");
        assert!(reader.advance(0).expect("no-op").is_none());
        reader.buffer_mut()[..2].copy_from_slice(&data[..2]);
        assert!(reader.advance(2).expect("half length").is_none());
        assert_eq!(reader.buffer_mut().len(), 2);
        assert!(!reader.is_idle());
        let frames = feed(&mut reader, &data[2..], 8).expect("rest");
        assert_eq!(frames, vec![Bytes::from_static(b"xy")]);
    }
}
