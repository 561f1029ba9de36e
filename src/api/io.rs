use std::io;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Failures that end a connection's read loop.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("connection closed mid-request")]
    UnexpectedEof,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reads one line and strips its `\n` or `\r\n` terminator. Returns `None` on
/// a clean end of stream. Never buffers much more than `max` bytes.
pub async fn read_capped_line<R>(reader: &mut R, max: usize) -> Result<Option<Vec<u8>>, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let (found, used) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if line.is_empty() {
                    return Ok(None);
                }
                return Err(ReadError::UnexpectedEof);
            }

            match available.iter().position(|b| *b == b'\n') {
                Some(end) => {
                    line.extend_from_slice(&available[..end]);
                    (true, end + 1)
                }
                None => {
                    line.extend_from_slice(available);
                    (false, available.len())
                }
            }
        };
        reader.consume(used);

        if found {
            break;
        }
        // A trailing `\r` may still belong to the terminator.
        if line.len() > max + 1 {
            return Err(ReadError::LineTooLong(max));
        }
    }

    if line.last() == Some(&b'\r') {
        line.pop();
    }
    if line.len() > max {
        return Err(ReadError::LineTooLong(max));
    }

    Ok(Some(line))
}

#[derive(Debug, PartialEq, Eq)]
pub enum Body {
    Complete(Bytes),
    /// The body was not followed directly by CRLF. The rest of that line has
    /// been consumed.
    MissingCrlf,
}

/// Reads exactly `len` raw body bytes followed by an empty line.
pub async fn read_body<R>(reader: &mut R, len: usize, max_line: usize) -> Result<Body, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = BytesMut::zeroed(len);
    reader.read_exact(&mut body).await.map_err(eof_as_closed)?;

    match read_capped_line(reader, max_line).await? {
        Some(rest) if rest.is_empty() => Ok(Body::Complete(body.freeze())),
        Some(_) => Ok(Body::MissingCrlf),
        None => Err(ReadError::UnexpectedEof),
    }
}

/// Skips `len` body bytes and the line that follows them.
pub async fn discard_body<R>(reader: &mut R, len: u64, max_line: usize) -> Result<(), ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let skipped = tokio::io::copy(&mut (&mut *reader).take(len), &mut tokio::io::sink()).await?;
    if skipped < len {
        return Err(ReadError::UnexpectedEof);
    }

    match read_capped_line(reader, max_line).await? {
        Some(_) => Ok(()),
        None => Err(ReadError::UnexpectedEof),
    }
}

fn eof_as_closed(err: io::Error) -> ReadError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ReadError::UnexpectedEof
    } else {
        ReadError::Io(err)
    }
}
