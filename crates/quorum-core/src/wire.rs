//! Framed stream codec.
//!
//! One frame = 4-byte big-endian payload length + that many payload bytes.
//! A write is atomic from the reader's point of view regardless of how the
//! underlying transport chunks it: the reader loops until the declared
//! length is fully consumed or the stream errors out.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix preceding every frame.
pub const LENGTH_PREFIX: usize = 4;

/// Write one framed payload to the stream.
///
/// `max_frame` is the same plausibility cap the reader enforces; writing a
/// payload the peer would reject is refused locally instead.
pub async fn write_frame<S>(stream: &mut S, payload: &[u8], max_frame: usize) -> Result<(), WireError>
where
    S: AsyncWrite + Unpin,
{
    if payload.len() > max_frame {
        return Err(WireError::FrameTooLarge {
            declared: payload.len(),
            max: max_frame,
        });
    }
    stream.write_u32(payload.len() as u32).await.map_err(map_io)?;
    stream.write_all(payload).await.map_err(map_io)?;
    stream.flush().await.map_err(map_io)?;
    Ok(())
}

/// Read one framed payload from the stream.
///
/// A declared length above `max_frame` fails before any payload allocation —
/// a corrupt or malicious peer must not be able to make us reserve gigabytes.
pub async fn read_frame<S>(stream: &mut S, max_frame: usize) -> Result<Vec<u8>, WireError>
where
    S: AsyncRead + Unpin,
{
    let declared = stream.read_u32().await.map_err(map_io)? as usize;
    if declared > max_frame {
        return Err(WireError::FrameTooLarge {
            declared,
            max: max_frame,
        });
    }
    let mut payload = vec![0u8; declared];
    stream.read_exact(&mut payload).await.map_err(map_io)?;
    Ok(payload)
}

fn map_io(e: std::io::Error) -> WireError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        WireError::Truncated
    } else {
        WireError::Io(e)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise reading or writing framed data.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("stream i/o: {0}")]
    Io(#[source] std::io::Error),

    #[error("declared frame length {declared} exceeds maximum {max}")]
    FrameTooLarge { declared: usize, max: usize },

    #[error("stream closed before a full frame was read")]
    Truncated,

    #[error("envelope codec: {0}")]
    Codec(#[from] serde_json::Error),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
