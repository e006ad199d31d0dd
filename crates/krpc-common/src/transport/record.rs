//! Record marking over a byte stream.
//!
//! Each record is sent as one or more fragments:
//!
//! ```text
//! [4-byte header: last-fragment bit | fragment length as u32 big-endian] [fragment]
//! ```
//!
//! Receivers reassemble fragments until the last-fragment bit is seen and
//! refuse records larger than the caller's limit before allocating for them.

use std::io::{Read, Write};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::error::{KrpcError, Result};

/// Set in a fragment header when the fragment ends the record.
pub const LAST_FRAGMENT: u32 = 0x8000_0000;

/// Largest length a single fragment header can express.
pub const MAX_FRAGMENT_LEN: usize = 0x7FFF_FFFF;

fn fragment_headers(data: &[u8]) -> impl Iterator<Item = ([u8; 4], &[u8])> {
    let mut chunks: Vec<&[u8]> = data.chunks(MAX_FRAGMENT_LEN).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    let last = chunks.len() - 1;
    chunks.into_iter().enumerate().map(move |(index, chunk)| {
        let mut header = chunk.len() as u32;
        if index == last {
            header |= LAST_FRAGMENT;
        }
        (header.to_be_bytes(), chunk)
    })
}

fn check_record_len(total: usize, fragment: usize, max_len: usize) -> Result<usize> {
    let new_total = total + fragment;
    if new_total > max_len {
        return Err(KrpcError::Transport(format!(
            "Message too large: {} bytes (max {} bytes)",
            new_total, max_len
        )));
    }
    Ok(new_total)
}

/// Writes `data` as one record.
pub fn write_record<W: Write>(writer: &mut W, data: &[u8]) -> std::io::Result<()> {
    for (header, chunk) in fragment_headers(data) {
        writer.write_all(&header)?;
        writer.write_all(chunk)?;
    }
    writer.flush()
}

/// Reads one record of at most `max_len` bytes.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between records.
pub fn read_record<R: Read>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>> {
    let mut record = Vec::new();
    loop {
        let mut header = [0u8; 4];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && record.is_empty() => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let header = u32::from_be_bytes(header);
        let len = (header & !LAST_FRAGMENT) as usize;
        let start = record.len();
        let total = check_record_len(start, len, max_len)?;

        record.try_reserve_exact(len)?;
        record.resize(total, 0);
        reader.read_exact(&mut record[start..])?;

        if header & LAST_FRAGMENT != 0 {
            return Ok(Some(record));
        }
    }
}

/// Async version of [`write_record`].
pub async fn write_record_async<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> std::io::Result<()> {
    for (header, chunk) in fragment_headers(data) {
        writer.write_all(&header).await?;
        writer.write_all(chunk).await?;
    }
    writer.flush().await
}

/// Async version of [`read_record`].
pub async fn read_record_async<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Vec<u8>>> {
    let mut record = Vec::new();
    loop {
        let mut header = [0u8; 4];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && record.is_empty() => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let header = u32::from_be_bytes(header);
        let len = (header & !LAST_FRAGMENT) as usize;
        let start = record.len();
        let total = check_record_len(start, len, max_len)?;

        record.try_reserve_exact(len)?;
        record.resize(total, 0);
        reader.read_exact(&mut record[start..]).await?;

        if header & LAST_FRAGMENT != 0 {
            return Ok(Some(record));
        }
    }
}
