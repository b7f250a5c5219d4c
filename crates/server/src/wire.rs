//! DBGp frame codec.
//!
//! # Wire format
//!
//! ```text
//! ENGINE -> CLIENT:  [ascii decimal length] 0x00 [length bytes: XML] 0x00
//! CLIENT -> ENGINE:  [command line] 0x00
//! ```
//!
//! Frame bodies are decoded as Latin-1. Engines base64-encode anything
//! outside ASCII inside the XML, so no multi-byte text crosses the socket.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ConnectionError;

/// Largest frame body accepted from an engine (64 MiB).
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Reads one frame and returns its body.
///
/// The length prefix is read byte by byte, so `reader` should be buffered.
/// End of stream anywhere inside a frame is [`ConnectionError::Closed`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, ConnectionError> {
    let mut length: usize = 0;
    loop {
        let byte = read_byte(reader).await?;
        match byte {
            0 => break,
            b'0'..=b'9' => {
                length = length
                    .checked_mul(10)
                    .and_then(|l| l.checked_add(usize::from(byte - b'0')))
                    .filter(|&l| l <= MAX_FRAME_LEN)
                    .ok_or_else(|| {
                        ConnectionError::Protocol(format!(
                            "frame longer than {MAX_FRAME_LEN} bytes"
                        ))
                    })?;
            }
            other => {
                return Err(ConnectionError::Protocol(format!(
                    "unexpected byte 0x{other:02x} in frame length"
                )));
            }
        }
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.map_err(eof_as_closed)?;

    let terminator = read_byte(reader).await?;
    if terminator != 0 {
        return Err(ConnectionError::Protocol(format!(
            "expected NUL after {length}-byte frame, got 0x{terminator:02x}"
        )));
    }

    Ok(latin1(&body))
}

/// Writes a NUL-terminated command line.
pub async fn write_command<W: AsyncWrite + Unpin>(
    writer: &mut W,
    line: &str,
) -> Result<(), ConnectionError> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_u8(0).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_byte<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u8, ConnectionError> {
    reader.read_u8().await.map_err(eof_as_closed)
}

fn eof_as_closed(e: std::io::Error) -> ConnectionError {
    if e.kind() == ErrorKind::UnexpectedEof {
        ConnectionError::Closed
    } else {
        ConnectionError::Io(e)
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
