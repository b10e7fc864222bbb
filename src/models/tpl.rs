//! Reader for `.tpl` texture archives.
//!
//! Layout (all integers big-endian):
//! - `0x00` slot count (including empty slots)
//! - `0x04` texture records, 0x10 bytes each: format (4), data offset (4,
//!   absolute, `0` marks an empty slot), trailer (8)
//! - the header region is padded to a multiple of 0x20 with `00 01 02 ..`
//!
//! A texture's data runs from its offset to the next non-empty texture's
//! offset, or to end of file.

use std::io::Write;

use tracing::trace;
use winnow::Parser;
use winnow::binary::be_u32;
use winnow::combinator::repeat;
use winnow::token::take;

use crate::data::Span;
use crate::data::cursor::{self, WResult, align_32, read_u32_be, write_incrementing, write_u32_be};
use crate::error::{ArchiveError, IResult};

/// `data_offset` value marking an empty slot.
pub const EMPTY_TEXTURE_OFFSET: u32 = 0;
pub const RECORD_TABLE_OFFSET: usize = 0x04;
pub const RECORD_SIZE: usize = 0x10;

/// One fixed-size texture record.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TextureRecord {
    pub format: [u8; 4],
    /// `None` for an empty slot.
    pub data_offset: Option<u32>,
    pub trailer: [u8; 8],
}

impl TextureRecord {
    pub fn is_present(&self) -> bool {
        self.data_offset.is_some()
    }

    /// Write this record with its data offset replaced by `data_offset`.
    pub fn write_with_offset<W: Write + ?Sized>(
        &self,
        sink: &mut W,
        data_offset: Option<u32>,
    ) -> IResult<()> {
        sink.write_all(&self.format)?;
        write_u32_be(sink, data_offset.unwrap_or(EMPTY_TEXTURE_OFFSET))?;
        sink.write_all(&self.trailer)?;
        Ok(())
    }
}

fn parse_record(input: &mut &[u8]) -> WResult<TextureRecord> {
    let format = take(4usize).parse_next(input)?;
    let data_offset = be_u32.parse_next(input)?;
    let trailer = take(8usize).parse_next(input)?;

    let mut record = TextureRecord {
        format: [0; 4],
        data_offset: (data_offset != EMPTY_TEXTURE_OFFSET).then_some(data_offset),
        trailer: [0; 8],
    };
    record.format.copy_from_slice(format);
    record.trailer.copy_from_slice(trailer);
    Ok(record)
}

/// Padded header length for a texture archive holding `count` records.
pub fn header_len_for(count: usize) -> usize {
    align_32(RECORD_TABLE_OFFSET + RECORD_SIZE * count)
}

/// Write a texture archive header: count, each record with its new data
/// offset, then the incrementing fill up to the aligned length.
pub fn write_header<'r, W, I>(sink: &mut W, records: I) -> IResult<usize>
where
    W: Write + ?Sized,
    I: ExactSizeIterator<Item = (&'r TextureRecord, Option<u32>)>,
{
    let count = records.len();
    let header_len = header_len_for(count);

    write_u32_be(sink, cursor::to_u32(count)?)?;
    for (record, data_offset) in records {
        record.write_with_offset(sink, data_offset)?;
    }
    write_incrementing(sink, header_len - (RECORD_TABLE_OFFSET + RECORD_SIZE * count))?;

    Ok(header_len)
}

/// A parsed view over a `.tpl` archive.
#[derive(Debug)]
pub struct TplArchive<'a> {
    data: &'a [u8],
    records: Vec<TextureRecord>,
}

impl<'a> TplArchive<'a> {
    pub fn parse(data: &'a [u8]) -> IResult<Self> {
        let count = read_u32_be(data, 0x00)? as usize;
        let table_len = count.checked_mul(RECORD_SIZE).ok_or_else(|| {
            ArchiveError::out_of_range(RECORD_TABLE_OFFSET, usize::MAX, data.len())
        })?;

        let input = &mut cursor::slice(data, RECORD_TABLE_OFFSET, table_len)?;
        let records: WResult<Vec<TextureRecord>> = repeat(count, parse_record).parse_next(input);
        let records = records
            .map_err(|_| ArchiveError::out_of_range(RECORD_TABLE_OFFSET, table_len, data.len()))?;

        trace!(texture_count = count, "parsed tpl records");

        Ok(TplArchive { data, records })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn texture_count(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[TextureRecord] {
        &self.records
    }

    pub fn record(&self, slot: usize) -> IResult<&TextureRecord> {
        self.records
            .get(slot)
            .ok_or_else(|| ArchiveError::IndexOutOfRange {
                index: slot,
                count: self.records.len(),
            })
    }

    /// Padded length of this archive's header region.
    pub fn header_len(&self) -> usize {
        header_len_for(self.records.len())
    }

    /// Length of the texture data following the header.
    pub fn data_len(&self) -> usize {
        self.data.len().saturating_sub(self.header_len())
    }

    /// Number of slots to advance from `slot` to reach the next non-empty one.
    /// Returns 1 when the following slot is already non-empty; when nothing
    /// non-empty follows, the distance to one past the last slot.
    pub fn skip_count(&self, slot: usize) -> usize {
        let following = self.records.get(slot + 1..).unwrap_or(&[]);
        following
            .iter()
            .position(TextureRecord::is_present)
            .map(|position| position + 1)
            .unwrap_or(self.records.len().saturating_sub(slot))
    }

    /// Byte range of the texture in `slot`.
    pub fn texture_data_span(&self, slot: usize) -> IResult<Span> {
        let start = self
            .record(slot)?
            .data_offset
            .ok_or_else(|| ArchiveError::IndexOutOfRange {
                index: slot,
                count: self.records.len(),
            })? as usize;

        let end = self
            .records
            .get(slot + self.skip_count(slot))
            .and_then(|next| next.data_offset)
            .map(|offset| offset as usize)
            .unwrap_or(self.data.len());

        if start > end || end > self.data.len() {
            return Err(ArchiveError::out_of_range(
                start,
                end.saturating_sub(start),
                self.data.len(),
            ));
        }

        Ok(Span::new(start, end))
    }
}
