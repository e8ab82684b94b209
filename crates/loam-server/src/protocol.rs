//! Length-prefixed framing shared by the server and its clients.
//!
//! Every frame is a 4-byte big-endian length followed by a MessagePack
//! encoded [`Request`] or [`Response`]. Command documents travel inside
//! as raw BSON bytes so no BSON type is lost in transit.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    RunCommand { database: String, command: Vec<u8> },
}

#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Reply(Vec<u8>),
    Error { code: i32, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },
}

pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), FrameError> {
    let bytes = rmp_serde::to_vec(message)?;
    let len = u32::try_from(bytes.len()).map_err(|_| FrameError::TooLarge {
        len: bytes.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame. `Ok(None)` means the peer closed the stream cleanly
/// before a new frame started.
pub fn read_frame<R: Read, T: DeserializeOwned>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<T>, FrameError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf)?;
    Ok(Some(rmp_serde::from_slice(&msg_buf)?))
}
