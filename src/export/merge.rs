//! Concatenate two `.gma`/`.tpl` pairs into one.
//!
//! The first pair keeps its relative layout: its slots, name list, model data
//! and texture data all come first. Everything in the second pair that depends
//! on the size or count of what now precedes it is shifted:
//! - slot data offsets by the first archive's model data length
//! - slot name offsets by the first archive's name list length
//! - material texture indices by the first archive's texture count
//! - texture data offsets by the header length change plus the first
//!   archive's texture data length

use std::io::Write;

use rootcause::Report;
use tracing::debug;

use crate::data::cursor::{self, copy_range, slice, write_u16_be};
use crate::error::{ArchiveError, IResult};
use crate::models::ArchivePair;
use crate::models::gma::{
    GmaArchive, GmaHeader, MATERIAL_SIZE, MATERIAL_TEXTURE_INDEX_OFFSET, MODEL_HEADER_SIZE,
    ModelLayout, ModelSlot,
};
use crate::models::tpl::{self, TextureRecord, header_len_for};

const MATERIAL_TRAILER_SIZE: usize = MATERIAL_SIZE - MATERIAL_TEXTURE_INDEX_OFFSET - 2;

/// Counts describing a merged pair.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MergeSummary {
    pub model_slot_count: usize,
    pub texture_count: usize,
    pub gma_header_len: usize,
    pub tpl_header_len: usize,
}

/// `value + shift`, failing if the result no longer fits its 32-bit field.
fn shifted(value: u32, shift: usize) -> IResult<u32> {
    cursor::to_u32(value as usize + shift)
}

/// Move an absolute texture offset from a header of `old_header_len` bytes to
/// one of `new_header_len` bytes, `preceding` bytes of data further along.
fn rebased(
    offset: u32,
    old_header_len: usize,
    new_header_len: usize,
    preceding: usize,
) -> IResult<u32> {
    let relative = (offset as usize)
        .checked_sub(old_header_len)
        .ok_or_else(|| ArchiveError::out_of_range(offset as usize, 0, old_header_len))?;
    cursor::to_u32(relative + preceding + new_header_len)
}

/// Slot table for the second archive, moved past the first archive's data and
/// name list.
fn shifted_slots(
    b: &GmaArchive<'_>,
    data_len_a: usize,
    name_list_len_a: usize,
) -> IResult<Vec<ModelSlot>> {
    b.slots()
        .iter()
        .map(|slot| match *slot {
            ModelSlot::Empty => Ok(ModelSlot::Empty),
            ModelSlot::Present {
                data_offset,
                name_offset,
            } => Ok(ModelSlot::Present {
                data_offset: shifted(data_offset, data_len_a)?,
                name_offset: shifted(name_offset, name_list_len_a)?,
            }),
        })
        .collect()
}

/// Texture indices of one model from the second archive, moved past the first
/// archive's textures.
fn shifted_texture_indices(
    gma: &GmaArchive<'_>,
    layout: &ModelLayout,
    texture_shift: usize,
) -> IResult<Vec<u16>> {
    (0..layout.material_count as usize)
        .map(|material| {
            let texture = gma.material_texture_index(layout, material)? as usize + texture_shift;
            u16::try_from(texture).map_err(|_| {
                ArchiveError::out_of_range(
                    layout.material_offset(material) + MATERIAL_TEXTURE_INDEX_OFFSET,
                    2,
                    u16::MAX as usize,
                )
            })
        })
        .collect()
}

/// Write one model from the second archive with its material texture indices
/// replaced by `textures`.
fn write_shifted_model<W: Write + ?Sized>(
    gma: &GmaArchive<'_>,
    layout: &ModelLayout,
    textures: &[u16],
    sink: &mut W,
) -> IResult<()> {
    let data = gma.data();
    copy_range(data, sink, layout.header_start(), MODEL_HEADER_SIZE)?;

    for (material, texture) in textures.iter().enumerate() {
        let record = layout.material_offset(material);
        copy_range(data, sink, record, MATERIAL_TEXTURE_INDEX_OFFSET)?;
        write_u16_be(sink, *texture)?;
        copy_range(
            data,
            sink,
            record + MATERIAL_TEXTURE_INDEX_OFFSET + 2,
            MATERIAL_TRAILER_SIZE,
        )?;
    }

    copy_range(data, sink, layout.mesh_start(), layout.mesh_len())
}

/// Merge pair `b` after pair `a`, writing the combined model archive to
/// `gma_out` and the combined texture archive to `tpl_out`.
pub fn merge_archives<G, T>(
    a: &ArchivePair<'_>,
    b: &ArchivePair<'_>,
    gma_out: &mut G,
    tpl_out: &mut T,
) -> Result<MergeSummary, Report<ArchiveError>>
where
    G: Write + ?Sized,
    T: Write + ?Sized,
{
    // Measure everything up front; nothing below can be patched once written.
    let name_list_len_a = a.gma.name_list_len()?;
    let name_list_len_b = b.gma.name_list_len()?;
    let data_len_a = a.gma.data_len();

    let texture_count_a = a.tpl.texture_count();
    let texture_count_b = b.tpl.texture_count();
    // An archive without textures contributes no texture data.
    let texture_data_len_a = if texture_count_a > 0 {
        a.tpl.data_len()
    } else {
        0
    };

    let header = GmaHeader {
        verbatim_slots: a.gma.slot_table_bytes()?,
        slots: shifted_slots(&b.gma, data_len_a, name_list_len_a)?,
        name_list: vec![
            slice(a.gma.data(), a.gma.name_list_start(), name_list_len_a)?,
            slice(b.gma.data(), b.gma.name_list_start(), name_list_len_b)?,
        ],
    };

    let layouts_b = b
        .gma
        .slots()
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_present())
        .map(|(physical, _)| {
            let layout = b.gma.model_layout(physical)?;
            let textures = shifted_texture_indices(&b.gma, &layout, texture_count_a)?;
            Ok((layout, textures))
        })
        .collect::<IResult<Vec<_>>>()?;

    let tpl_header_len = header_len_for(texture_count_a + texture_count_b);
    let mut texture_entries: Vec<(&TextureRecord, Option<u32>)> =
        Vec::with_capacity(texture_count_a + texture_count_b);
    for record in a.tpl.records() {
        let offset = record
            .data_offset
            .map(|offset| rebased(offset, a.tpl.header_len(), tpl_header_len, 0))
            .transpose()?;
        texture_entries.push((record, offset));
    }
    for record in b.tpl.records() {
        let offset = record
            .data_offset
            .map(|offset| {
                rebased(
                    offset,
                    b.tpl.header_len(),
                    tpl_header_len,
                    texture_data_len_a,
                )
            })
            .transpose()?;
        texture_entries.push((record, offset));
    }

    debug!(
        models_a = a.gma.slot_count(),
        models_b = b.gma.slot_count(),
        textures_a = texture_count_a,
        textures_b = texture_count_b,
        "merging archives"
    );

    let gma_header_len = header.write_to(gma_out)?;
    copy_range(a.gma.data(), gma_out, a.gma.header_len(), data_len_a)?;
    for (layout, textures) in &layouts_b {
        write_shifted_model(&b.gma, layout, textures, gma_out)?;
    }

    tpl::write_header(tpl_out, texture_entries.into_iter())?;
    if texture_count_a > 0 {
        copy_range(a.tpl.data(), tpl_out, a.tpl.header_len(), a.tpl.data_len())?;
    }
    if texture_count_b > 0 {
        copy_range(b.tpl.data(), tpl_out, b.tpl.header_len(), b.tpl.data_len())?;
    }

    Ok(MergeSummary {
        model_slot_count: header.slot_count(),
        texture_count: texture_count_a + texture_count_b,
        gma_header_len,
        tpl_header_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cursor::{align_32, read_u32_be};
    use crate::models::gma::{EMPTY_MODEL_OFFSET, ModelName};
    use crate::models::tpl::TplArchive;
    use crate::test_utils::{GmaBuilder, TestModel, TplBuilder, slot_name};

    struct Merged {
        gma: Vec<u8>,
        tpl: Vec<u8>,
        summary: MergeSummary,
    }

    fn merge(gma_a: &[u8], tpl_a: &[u8], gma_b: &[u8], tpl_b: &[u8]) -> Merged {
        let a = ArchivePair::parse(gma_a, tpl_a).unwrap();
        let b = ArchivePair::parse(gma_b, tpl_b).unwrap();
        let mut gma = Vec::new();
        let mut tpl = Vec::new();
        let summary = merge_archives(&a, &b, &mut gma, &mut tpl).unwrap();
        Merged { gma, tpl, summary }
    }

    fn pair_a() -> (Vec<u8>, Vec<u8>) {
        let gma = GmaBuilder::new()
            .model(TestModel::new("FLOOR").materials(&[0]).mesh(0x40))
            .model(TestModel::new("GOAL_B").materials(&[0, 0]).mesh(0x18))
            .build();
        let tpl = TplBuilder::new().texture(0x60).build();
        (gma, tpl)
    }

    fn pair_b() -> (Vec<u8>, Vec<u8>) {
        let gma = GmaBuilder::new()
            .model(TestModel::new("BUTTON_P").materials(&[1, 0]).mesh(0x22))
            .build();
        let tpl = TplBuilder::new().texture(0x20).texture(0x40).build();
        (gma, tpl)
    }

    #[test]
    fn counts_add_up() {
        let (gma_a, tpl_a) = pair_a();
        let (gma_b, tpl_b) = pair_b();
        let merged = merge(&gma_a, &tpl_a, &gma_b, &tpl_b);

        let new = ArchivePair::parse(&merged.gma, &merged.tpl).unwrap();
        assert_eq!(new.gma.slot_count(), 3);
        assert_eq!(new.tpl.texture_count(), 3);
        assert_eq!(merged.summary.model_slot_count, 3);
        assert_eq!(merged.summary.texture_count, 3);

        let names: Vec<ModelName> = new.gma.names().collect::<IResult<_>>().unwrap();
        assert_eq!(names, ["FLOOR", "GOAL_B", "BUTTON_P"]);
        assert_eq!(slot_name(&new.gma, 2), "BUTTON_P");
    }

    #[test]
    fn headers_stay_aligned() {
        let (gma_a, tpl_a) = pair_a();
        let (gma_b, tpl_b) = pair_b();
        let merged = merge(&gma_a, &tpl_a, &gma_b, &tpl_b);

        let name_lists = "FLOOR\0GOAL_B\0".len() + "BUTTON_P\0".len();
        let expected = align_32(8 + 8 * 3 + name_lists);
        assert_eq!(read_u32_be(&merged.gma, 4).unwrap() as usize, expected);
        assert_eq!(merged.summary.gma_header_len, expected);
        assert_eq!(merged.summary.tpl_header_len % 0x20, 0);
        assert_eq!(merged.summary.tpl_header_len, 0x40);
    }

    #[test]
    fn second_textures_shift_past_first_texture_data() {
        let (gma_a, tpl_a) = pair_a();
        let (gma_b, tpl_b) = pair_b();
        let merged = merge(&gma_a, &tpl_a, &gma_b, &tpl_b);

        let old_a = TplArchive::parse(&tpl_a).unwrap();
        let old_b = TplArchive::parse(&tpl_b).unwrap();
        let new = TplArchive::parse(&merged.tpl).unwrap();
        let new_header = new.header_len();
        let data_len_a = tpl_a.len() - old_a.header_len();

        for slot in 0..2 {
            let old_offset = old_b.records()[slot].data_offset.unwrap() as usize;
            let new_offset = new.records()[slot + 1].data_offset.unwrap() as usize;
            assert_eq!(
                new_offset,
                old_offset - old_b.header_len() + data_len_a + new_header
            );
        }

        let first = new.texture_data_span(0).unwrap();
        assert_eq!(first.start, new_header);
        assert_eq!(&merged.tpl[first.start..first.end], &tpl_a[0x20..]);
        for slot in 0..2 {
            let old_span = old_b.texture_data_span(slot).unwrap();
            let new_span = new.texture_data_span(slot + 1).unwrap();
            assert_eq!(
                &merged.tpl[new_span.start..new_span.end],
                &tpl_b[old_span.start..old_span.end]
            );
        }
        assert_eq!(merged.tpl.len(), new_header + 0x60 + 0x60);
    }

    #[test]
    fn second_models_reference_shifted_textures() {
        let (gma_a, tpl_a) = pair_a();
        let (gma_b, tpl_b) = pair_b();
        let merged = merge(&gma_a, &tpl_a, &gma_b, &tpl_b);

        let new = ArchivePair::parse(&merged.gma, &merged.tpl).unwrap();
        let floor = new.gma.model_layout(0).unwrap();
        assert_eq!(new.gma.material_texture_index(&floor, 0).unwrap(), 0);

        let button = new.gma.model_layout(2).unwrap();
        let indices: Vec<u16> = (0..button.material_count as usize)
            .map(|m| new.gma.material_texture_index(&button, m).unwrap())
            .collect();
        assert_eq!(indices, [2, 1]);
        assert_eq!(button.mesh_len(), 0x22);
        assert_eq!(button.span.end, merged.gma.len());

        // First archive's model data is copied untouched.
        let old_a = GmaArchive::parse(&gma_a).unwrap();
        let start = new.gma.header_len();
        assert_eq!(
            &merged.gma[start..start + old_a.data_len()],
            &gma_a[old_a.header_len()..]
        );
    }

    #[test]
    fn spans_are_monotonic() {
        let (gma_a, tpl_a) = pair_a();
        let gma_b = GmaBuilder::new()
            .model(TestModel::new("X").materials(&[0]).mesh(0x10))
            .empty()
            .model(TestModel::new("Y").mesh(0x08))
            .build();
        let tpl_b = TplBuilder::new().texture(0x10).empty().texture(0x30).build();
        let merged = merge(&gma_a, &tpl_a, &gma_b, &tpl_b);
        let new = ArchivePair::parse(&merged.gma, &merged.tpl).unwrap();

        let model_spans: Vec<_> = (0..new.gma.slot_count())
            .filter(|&p| new.gma.slots()[p].is_present())
            .map(|p| new.gma.model_data_span(p).unwrap())
            .collect();
        assert!(model_spans.windows(2).all(|w| w[0].end <= w[1].start));

        let texture_spans: Vec<_> = (0..new.tpl.texture_count())
            .filter(|&t| new.tpl.records()[t].is_present())
            .map(|t| new.tpl.texture_data_span(t).unwrap())
            .collect();
        assert_eq!(texture_spans.len(), 3);
        assert!(texture_spans.windows(2).all(|w| w[0].end <= w[1].start));
    }

    #[test]
    fn empty_slots_are_preserved() {
        let gma_a = GmaBuilder::new()
            .empty()
            .model(TestModel::new("A").materials(&[1]).mesh(4))
            .build();
        let tpl_a = TplBuilder::new().empty().texture(0x20).build();
        let gma_b = GmaBuilder::new()
            .model(TestModel::new("B").mesh(4))
            .empty()
            .build();
        let tpl_b = TplBuilder::new().texture(0x20).empty().build();
        let merged = merge(&gma_a, &tpl_a, &gma_b, &tpl_b);
        let new = ArchivePair::parse(&merged.gma, &merged.tpl).unwrap();

        let present: Vec<bool> = new.gma.slots().iter().map(ModelSlot::is_present).collect();
        assert_eq!(present, [false, true, true, false]);
        for empty in [0usize, 3] {
            let at = 8 + 8 * empty;
            assert_eq!(read_u32_be(&merged.gma, at).unwrap(), EMPTY_MODEL_OFFSET);
            assert_eq!(read_u32_be(&merged.gma, at + 4).unwrap(), 0);
        }

        let present: Vec<bool> = new.tpl.records().iter().map(TextureRecord::is_present).collect();
        assert_eq!(present, [false, true, true, false]);
        assert_eq!(read_u32_be(&merged.tpl, 0x08).unwrap(), 0);
        assert_eq!(read_u32_be(&merged.tpl, 0x38).unwrap(), 0);

        // The final model runs to end of file past the trailing empty slot.
        assert_eq!(new.gma.model_data_span(2).unwrap().end, merged.gma.len());
        assert_eq!(slot_name(&new.gma, 2), "B");
    }

    #[test]
    fn first_slot_table_is_copied_as_stored() {
        let mut gma_a = GmaBuilder::new()
            .model(TestModel::new("A").mesh(4))
            .empty()
            .build();
        // Stray name offset left behind in the empty slot.
        gma_a[0x14..0x18].copy_from_slice(&7u32.to_be_bytes());
        let tpl_a = TplBuilder::new().build();
        let (gma_b, tpl_b) = pair_b();
        let merged = merge(&gma_a, &tpl_a, &gma_b, &tpl_b);

        assert_eq!(&merged.gma[0x08..0x18], &gma_a[0x08..0x18]);
        assert_eq!(&merged.gma[0x10..0x18], &[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 7]);
        assert_eq!(merged.summary.model_slot_count, 3);
    }

    #[test]
    fn first_pair_without_textures_contributes_no_texture_data() {
        let gma_a = GmaBuilder::new().model(TestModel::new("A").mesh(4)).build();
        let tpl_a = TplBuilder::new().build();
        let (gma_b, tpl_b) = pair_b();
        let merged = merge(&gma_a, &tpl_a, &gma_b, &tpl_b);
        let new = ArchivePair::parse(&merged.gma, &merged.tpl).unwrap();

        assert_eq!(new.tpl.texture_count(), 2);
        assert_eq!(new.tpl.texture_data_span(0).unwrap().start, new.tpl.header_len());
        assert_eq!(merged.tpl.len(), new.tpl.header_len() + 0x60);

        let button = new.gma.model_layout(1).unwrap();
        assert_eq!(new.gma.material_texture_index(&button, 0).unwrap(), 1);
    }
}
