//! Splitting back-to-back frames out of a byte stream.
//!
//! Frames carry no length prefix that decoding trusts, so a reader that gets
//! two frames in one read cannot use [`Message::decode`] on the whole buffer.
//! [`FrameSplitter`] accepts reads of any size and yields every complete
//! document, keeping an incomplete tail for the next read.

use crate::{
    Message,
    errors::{CodecError, Result},
    message::MAX_FRAME_SIZE,
};

/// Incremental decoder for a stream of concatenated frames.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    pending: Vec<u8>,
}

impl FrameSplitter {
    /// Create an empty splitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the bytes of one read and take every frame they complete.
    ///
    /// # Errors
    ///
    /// - `CodecError::Malformed` if the bytes cannot be the start of a frame
    /// - `CodecError::FrameTooLarge` if an incomplete frame has grown past
    ///   [`MAX_FRAME_SIZE`]
    ///
    /// The splitter is unusable after an error; the stream is out of sync.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Message>> {
        self.pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut documents =
            serde_json::Deserializer::from_slice(&self.pending).into_iter::<Message>();
        let mut consumed = 0;

        loop {
            match documents.next() {
                Some(Ok(message)) => {
                    consumed = documents.byte_offset();
                    frames.push(message);
                },
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => return Err(CodecError::Malformed(e.to_string())),
                None => {
                    consumed = documents.byte_offset();
                    break;
                },
            }
        }

        self.pending.drain(..consumed);

        if self.pending.len() > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge { size: self.pending.len(), max: MAX_FRAME_SIZE });
        }

        Ok(frames)
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
