//! Reader for `.gma` model archives.
//!
//! Layout (all integers big-endian):
//! - `0x00` slot count (including empty slots)
//! - `0x04` header length, a multiple of 0x20
//! - `0x08` slot table: `(data_offset, name_offset)` per slot, 8 bytes each.
//!   An empty slot has `data_offset == 0xFFFFFFFF`.
//! - name list: null-terminated names for each non-empty slot, in slot order
//! - zero padding up to the header length, then model data
//!
//! A model begins at `header_length + data_offset` with a 0x40-byte model
//! header, followed by its 0x20-byte material records and then mesh data. It
//! ends where the next non-empty slot's data begins, or at end of file.

use std::borrow::Cow;
use std::fmt;
use std::io::Write;

use itertools::Itertools;
use tracing::trace;
use winnow::Parser;
use winnow::binary::be_u32;
use winnow::combinator::repeat;

use crate::data::Span;
use crate::data::cursor::{
    self, WResult, align_32, read_null_terminated, read_u16_be, read_u32_be, write_u32_be,
    write_zeroes,
};
use crate::error::{ArchiveError, IResult};

/// `data_offset` value marking an empty slot.
pub const EMPTY_MODEL_OFFSET: u32 = 0xFFFF_FFFF;
/// Offset of the slot table within the archive.
pub const SLOT_TABLE_OFFSET: usize = 0x08;
pub const SLOT_SIZE: usize = 0x08;
/// Size of the fixed model header preceding the material table.
pub const MODEL_HEADER_SIZE: usize = 0x40;
/// Offset of the u16 material count within the model header.
pub const MATERIAL_COUNT_OFFSET: usize = 0x18;
pub const MATERIAL_SIZE: usize = 0x20;
/// Offset of the u16 texture index within a material record.
pub const MATERIAL_TEXTURE_INDEX_OFFSET: usize = 0x04;

/// One entry of the slot table.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ModelSlot {
    Empty,
    Present {
        /// Relative to the end of the header.
        data_offset: u32,
        /// Relative to the start of the name list.
        name_offset: u32,
    },
}

impl ModelSlot {
    pub fn from_raw(data_offset: u32, name_offset: u32) -> ModelSlot {
        if data_offset == EMPTY_MODEL_OFFSET {
            ModelSlot::Empty
        } else {
            ModelSlot::Present {
                data_offset,
                name_offset,
            }
        }
    }

    pub fn to_raw(self) -> (u32, u32) {
        match self {
            ModelSlot::Empty => (EMPTY_MODEL_OFFSET, 0),
            ModelSlot::Present {
                data_offset,
                name_offset,
            } => (data_offset, name_offset),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, ModelSlot::Present { .. })
    }

    pub fn data_offset(&self) -> Option<u32> {
        match self {
            ModelSlot::Empty => None,
            ModelSlot::Present { data_offset, .. } => Some(*data_offset),
        }
    }

    pub fn name_offset(&self) -> Option<u32> {
        match self {
            ModelSlot::Empty => None,
            ModelSlot::Present { name_offset, .. } => Some(*name_offset),
        }
    }

    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> IResult<()> {
        let (data_offset, name_offset) = self.to_raw();
        write_u32_be(sink, data_offset)?;
        write_u32_be(sink, name_offset)
    }
}

/// A name from the name list, borrowed exactly as stored.
///
/// Names are not guaranteed to be UTF-8. Writers copy [`ModelName::as_bytes`];
/// the lossy decoding is only for display and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelName<'a>(&'a [u8]);

impl<'a> ModelName<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    pub fn to_string_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.0)
    }
}

impl<'a> From<&'a [u8]> for ModelName<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        ModelName(bytes)
    }
}

impl<'a> From<&'a str> for ModelName<'a> {
    fn from(name: &'a str) -> Self {
        ModelName(name.as_bytes())
    }
}

impl PartialEq<&str> for ModelName<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl fmt::Display for ModelName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

fn parse_slot(input: &mut &[u8]) -> WResult<ModelSlot> {
    let data_offset = be_u32.parse_next(input)?;
    let name_offset = be_u32.parse_next(input)?;
    Ok(ModelSlot::from_raw(data_offset, name_offset))
}

/// Where the pieces of one model live within its archive.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ModelLayout {
    pub span: Span,
    pub material_count: u16,
}

impl ModelLayout {
    pub fn header_start(&self) -> usize {
        self.span.start
    }

    /// Absolute offset of material record `index`.
    pub fn material_offset(&self, index: usize) -> usize {
        self.span.start + MODEL_HEADER_SIZE + MATERIAL_SIZE * index
    }

    pub fn mesh_start(&self) -> usize {
        self.material_offset(self.material_count as usize)
    }

    pub fn mesh_len(&self) -> usize {
        self.span.end - self.mesh_start()
    }
}

/// A parsed view over a `.gma` archive.
#[derive(Debug)]
pub struct GmaArchive<'a> {
    data: &'a [u8],
    header_len: u32,
    slots: Vec<ModelSlot>,
}

impl<'a> GmaArchive<'a> {
    pub fn parse(data: &'a [u8]) -> IResult<Self> {
        let slot_count = read_u32_be(data, 0x00)? as usize;
        let header_len = read_u32_be(data, 0x04)?;

        let table_len = slot_count
            .checked_mul(SLOT_SIZE)
            .ok_or_else(|| ArchiveError::out_of_range(SLOT_TABLE_OFFSET, usize::MAX, data.len()))?;
        let input = &mut cursor::slice(data, SLOT_TABLE_OFFSET, table_len)?;
        let slots: WResult<Vec<ModelSlot>> = repeat(slot_count, parse_slot).parse_next(input);
        let slots = slots
            .map_err(|_| ArchiveError::out_of_range(SLOT_TABLE_OFFSET, table_len, data.len()))?;

        trace!(slot_count, header_len, "parsed gma slot table");

        Ok(GmaArchive {
            data,
            header_len,
            slots,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn header_len(&self) -> usize {
        self.header_len as usize
    }

    pub fn slots(&self) -> &[ModelSlot] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots holding a model. This is also the number of names in
    /// the name list.
    pub fn non_empty_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_present()).count()
    }

    /// The slot table exactly as stored, including whatever name offsets
    /// empty slots carry.
    pub fn slot_table_bytes(&self) -> IResult<&'a [u8]> {
        cursor::slice(self.data, SLOT_TABLE_OFFSET, SLOT_SIZE * self.slots.len())
    }

    /// Absolute offset of the start of the name list.
    pub fn name_list_start(&self) -> usize {
        SLOT_TABLE_OFFSET + SLOT_SIZE * self.slots.len()
    }

    /// Length of the model data following the header.
    pub fn data_len(&self) -> usize {
        self.data.len().saturating_sub(self.header_len())
    }

    /// Map a position among non-empty slots to its position in the slot table.
    pub fn logical_to_physical(&self, logical: usize) -> IResult<usize> {
        self.slots
            .iter()
            .positions(ModelSlot::is_present)
            .nth(logical)
            .ok_or_else(|| ArchiveError::IndexOutOfRange {
                index: logical,
                count: self.non_empty_count(),
            })
    }

    /// Read the name at absolute `offset`, returning it along with the number
    /// of bytes scanned (terminator included).
    pub fn read_name(&self, offset: usize) -> IResult<(ModelName<'a>, usize)> {
        let (name, scanned) = read_null_terminated(self.data, offset)?;
        Ok((ModelName(name), scanned))
    }

    /// Iterate over the name list, one name per non-empty slot.
    pub fn names(&self) -> ModelNames<'_, 'a> {
        ModelNames {
            archive: self,
            position: self.name_list_start(),
            remaining: self.non_empty_count(),
        }
    }

    /// Find the logical index of the model called exactly `name`, along with
    /// its stored name.
    pub fn find_model(&self, name: &str) -> IResult<Option<(usize, ModelName<'a>)>> {
        for (logical, candidate) in self.names().enumerate() {
            let candidate = candidate?;
            if candidate.to_string_lossy() == name {
                return Ok(Some((logical, candidate)));
            }
        }
        Ok(None)
    }

    /// Byte length of the name list: from its start to the end of the name
    /// belonging to the highest-index non-empty slot, terminator included.
    pub fn name_list_len(&self) -> IResult<usize> {
        let Some(last) = self.slots.iter().rev().find_map(ModelSlot::name_offset) else {
            return Ok(0);
        };
        let (_, scanned) = self.read_name(self.name_list_start() + last as usize)?;
        Ok(last as usize + scanned)
    }

    /// Byte range of the model in physical slot `physical`.
    pub fn model_data_span(&self, physical: usize) -> IResult<Span> {
        let data_offset = self.present_data_offset(physical)?;
        let start = self.header_len() + data_offset as usize;
        let end = self.slots[physical + 1..]
            .iter()
            .find_map(ModelSlot::data_offset)
            .map(|next| self.header_len() + next as usize)
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

    pub fn material_count(&self, physical: usize) -> IResult<u16> {
        let span = self.model_data_span(physical)?;
        read_u16_be(self.data, span.start + MATERIAL_COUNT_OFFSET)
    }

    /// Split the model in `physical` into header, material table and mesh data.
    pub fn model_layout(&self, physical: usize) -> IResult<ModelLayout> {
        let span = self.model_data_span(physical)?;
        let material_count = self.material_count(physical)?;
        let layout = ModelLayout {
            span,
            material_count,
        };

        if layout.mesh_start() > span.end {
            return Err(ArchiveError::out_of_range(
                span.start,
                layout.mesh_start() - span.start,
                span.end,
            ));
        }

        Ok(layout)
    }

    /// Texture index referenced by material `index` of a model.
    pub fn material_texture_index(&self, layout: &ModelLayout, index: usize) -> IResult<u16> {
        read_u16_be(
            self.data,
            layout.material_offset(index) + MATERIAL_TEXTURE_INDEX_OFFSET,
        )
    }

    fn present_data_offset(&self, physical: usize) -> IResult<u32> {
        match self.slots.get(physical) {
            Some(ModelSlot::Present { data_offset, .. }) => Ok(*data_offset),
            _ => Err(ArchiveError::IndexOutOfRange {
                index: physical,
                count: self.slots.len(),
            }),
        }
    }
}

/// Lazy, single-pass iterator over a model archive's name list.
pub struct ModelNames<'g, 'a> {
    archive: &'g GmaArchive<'a>,
    position: usize,
    remaining: usize,
}

impl<'a> Iterator for ModelNames<'_, 'a> {
    type Item = IResult<ModelName<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        match self.archive.read_name(self.position) {
            Ok((name, scanned)) => {
                self.position += scanned;
                Some(Ok(name))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// A model archive header waiting to be written: a slot table and the name
/// list segments that follow it.
#[derive(Debug)]
pub struct GmaHeader<'n> {
    /// Slot table bytes copied as stored, ahead of `slots`. Must be a whole
    /// number of slots.
    pub verbatim_slots: &'n [u8],
    pub slots: Vec<ModelSlot>,
    pub name_list: Vec<&'n [u8]>,
}

impl GmaHeader<'_> {
    pub fn slot_count(&self) -> usize {
        self.verbatim_slots.len() / SLOT_SIZE + self.slots.len()
    }

    /// Padded header length, known before anything is written.
    pub fn header_len(&self) -> usize {
        let name_list_len: usize = self.name_list.iter().map(|segment| segment.len()).sum();
        align_32(SLOT_TABLE_OFFSET + SLOT_SIZE * self.slot_count() + name_list_len)
    }

    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> IResult<usize> {
        let header_len = self.header_len();
        write_u32_be(sink, cursor::to_u32(self.slot_count())?)?;
        write_u32_be(sink, cursor::to_u32(header_len)?)?;

        sink.write_all(self.verbatim_slots)?;
        let mut written = SLOT_TABLE_OFFSET + self.verbatim_slots.len();
        for slot in &self.slots {
            slot.write_to(sink)?;
            written += SLOT_SIZE;
        }
        for segment in &self.name_list {
            sink.write_all(segment)?;
            written += segment.len();
        }
        write_zeroes(sink, header_len - written)?;

        Ok(header_len)
    }
}
