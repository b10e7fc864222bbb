//! Bounds-checked big-endian reads over an in-memory archive and append-only
//! writes into an output sink.
//!
//! Sources are plain byte slices (usually a memory map). Sinks are anything
//! implementing [`Write`]: nothing already written is ever revisited, so every
//! length-dependent field has to be known before the bytes it governs go out.

use std::io::{self, Read, Write};

use winnow::Parser;
use winnow::binary::{be_u16, be_u32};
use winnow::error::ContextError;

use crate::error::{ArchiveError, IResult};

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

/// Round `n` up to the next multiple of 0x20. Both archive formats align
/// their header regions this way.
pub fn align_32(n: usize) -> usize {
    n.next_multiple_of(0x20)
}

/// Borrow `length` bytes of `source` starting at `offset`.
pub fn slice(source: &[u8], offset: usize, length: usize) -> IResult<&[u8]> {
    offset
        .checked_add(length)
        .filter(|end| *end <= source.len())
        .map(|end| &source[offset..end])
        .ok_or_else(|| ArchiveError::out_of_range(offset, length, source.len()))
}

pub fn read_u16_be(source: &[u8], offset: usize) -> IResult<u16> {
    let input = &mut slice(source, offset, 2)?;
    let value: WResult<u16> = be_u16.parse_next(input);
    value.map_err(|_| ArchiveError::out_of_range(offset, 2, source.len()))
}

pub fn read_u32_be(source: &[u8], offset: usize) -> IResult<u32> {
    let input = &mut slice(source, offset, 4)?;
    let value: WResult<u32> = be_u32.parse_next(input);
    value.map_err(|_| ArchiveError::out_of_range(offset, 4, source.len()))
}

/// Scan a null-terminated string starting at `offset`.
///
/// Returns the stored bytes (terminator excluded) and the number of bytes
/// scanned, which includes the terminator when one was found before the end
/// of `source`. Callers advance by the scanned length to reach the next name.
pub fn read_null_terminated(source: &[u8], offset: usize) -> IResult<(&[u8], usize)> {
    if offset > source.len() {
        return Err(ArchiveError::out_of_range(offset, 1, source.len()));
    }

    let remaining = &source[offset..];
    Ok(match remaining.iter().position(|&b| b == 0) {
        Some(end) => (&remaining[..end], end + 1),
        None => (remaining, remaining.len()),
    })
}

/// Copy `length` bytes of `source` at `offset` verbatim into `sink`.
pub fn copy_range<W: Write + ?Sized>(
    source: &[u8],
    sink: &mut W,
    offset: usize,
    length: usize,
) -> IResult<()> {
    sink.write_all(slice(source, offset, length)?)?;
    Ok(())
}

pub fn write_u16_be<W: Write + ?Sized>(sink: &mut W, value: u16) -> IResult<()> {
    sink.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn write_u32_be<W: Write + ?Sized>(sink: &mut W, value: u32) -> IResult<()> {
    sink.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn write_zeroes<W: Write + ?Sized>(sink: &mut W, count: usize) -> IResult<()> {
    io::copy(&mut io::repeat(0).take(count as u64), sink)?;
    Ok(())
}

/// Write the `00 01 02 ..` fill used to pad texture archive headers.
pub fn write_incrementing<W: Write + ?Sized>(sink: &mut W, count: usize) -> IResult<()> {
    let pattern: Vec<u8> = (0..count).map(|i| i as u8).collect();
    sink.write_all(&pattern)?;
    Ok(())
}

/// Convert a computed position into a 32-bit on-disk field.
pub fn to_u32(value: usize) -> IResult<u32> {
    u32::try_from(value).map_err(|_| ArchiveError::out_of_range(value, 4, u32::MAX as usize))
}
