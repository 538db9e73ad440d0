//! Frame codec shared by the handshake and the PEX channel.
//!
//! A frame is a `u32` big-endian payload length followed by the bincode
//! payload.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::WireError;

/// Default limit for one frame's payload.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode `message` and write it as one frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T, max: usize) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let payload = bincode::serialize(message).map_err(|e| WireError::Encode(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len as usize <= max)
        .ok_or(WireError::FrameTooLarge {
            len: payload.len(),
            max,
        })?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and decode it.
///
/// A clean end of stream before the length prefix is `WireError::Closed`.
///
/// # Security
/// The announced length is checked against `max` before allocating.
pub async fn read_frame<R, T>(reader: &mut R, max: usize) -> Result<T, WireError>
where
    R: AsyncRead + Unpin + ?Sized,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(WireError::Closed),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > max {
        return Err(WireError::FrameTooLarge { len, max });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload).map_err(|e| WireError::Decode(e.to_string()))
}
