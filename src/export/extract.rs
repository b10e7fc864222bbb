//! Extract one model, and only the textures its materials reference, into a
//! new standalone `.gma`/`.tpl` pair.

use std::collections::HashMap;
use std::io::Write;

use rootcause::Report;
use tracing::debug;

use crate::data::Span;
use crate::data::cursor::{copy_range, to_u32, write_u16_be};
use crate::error::{ArchiveError, IResult};
use crate::models::ArchivePair;
use crate::models::gma::{
    GmaHeader, MATERIAL_SIZE, MATERIAL_TEXTURE_INDEX_OFFSET, MODEL_HEADER_SIZE, ModelName,
    ModelSlot,
};
use crate::models::tpl::{self, header_len_for};

/// Bytes following the texture index in a material record.
const MATERIAL_TRAILER_SIZE: usize = MATERIAL_SIZE - MATERIAL_TEXTURE_INDEX_OFFSET - 2;

/// Ordered, deduplicating mapping from texture indices in the source archive
/// to indices in the extracted one. Local indices are handed out in
/// first-seen order.
#[derive(Debug, Default)]
pub struct LocalTextureTable {
    order: Vec<u16>,
    lookup: HashMap<u16, u16>,
}

impl LocalTextureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local index for `source`, allocating the next one if it is new.
    pub fn insert(&mut self, source: u16) -> u16 {
        // At most 0x10000 distinct sources, so the last local index is 0xFFFF.
        let next = self.order.len() as u16;
        *self.lookup.entry(source).or_insert_with(|| {
            self.order.push(source);
            next
        })
    }

    /// Source texture indices, in local index order.
    pub fn source_indices(&self) -> &[u16] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// What an extraction produced.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtractSummary {
    pub model_name: String,
    pub physical_index: usize,
    pub texture_count: usize,
    pub gma_len: usize,
    pub tpl_len: usize,
}

/// Extract the model at logical index `logical` from `pair`, writing the new
/// model archive to `gma_out` and the new texture archive to `tpl_out`.
///
/// `name` becomes the only entry of the new name list, written byte for byte
/// as stored. Every texture index
/// and data offset is resolved before the first byte is written, so a
/// malformed source fails without touching either sink.
pub fn extract_model<G, T>(
    pair: &ArchivePair<'_>,
    logical: usize,
    name: ModelName<'_>,
    gma_out: &mut G,
    tpl_out: &mut T,
) -> Result<ExtractSummary, Report<ArchiveError>>
where
    G: Write + ?Sized,
    T: Write + ?Sized,
{
    let gma = &pair.gma;
    let tpl = &pair.tpl;

    let physical = gma.logical_to_physical(logical)?;
    let layout = gma.model_layout(physical)?;

    let mut table = LocalTextureTable::new();
    let local_indices = (0..layout.material_count as usize)
        .map(|material| {
            gma.material_texture_index(&layout, material)
                .map(|source| table.insert(source))
        })
        .collect::<IResult<Vec<u16>>>()?;

    let records = table
        .source_indices()
        .iter()
        .map(|&source| tpl.record(source as usize))
        .collect::<IResult<Vec<_>>>()?;
    let spans = table
        .source_indices()
        .iter()
        .map(|&source| tpl.texture_data_span(source as usize))
        .collect::<IResult<Vec<Span>>>()?;

    let tpl_header_len = header_len_for(table.len());
    let mut running = tpl_header_len;
    let mut offsets = Vec::with_capacity(spans.len());
    for span in &spans {
        offsets.push(Some(to_u32(running)?));
        running += span.len();
    }

    debug!(
        model = %name,
        physical,
        materials = layout.material_count,
        textures = table.len(),
        "extracting model"
    );

    let header = GmaHeader {
        verbatim_slots: &[],
        slots: vec![ModelSlot::Present {
            data_offset: 0,
            name_offset: 0,
        }],
        name_list: vec![name.as_bytes(), b"\0".as_slice()],
    };
    let gma_header_len = header.write_to(gma_out)?;

    let data = gma.data();
    copy_range(data, gma_out, layout.header_start(), MODEL_HEADER_SIZE)?;
    for (material, local) in local_indices.iter().enumerate() {
        let record = layout.material_offset(material);
        copy_range(data, gma_out, record, MATERIAL_TEXTURE_INDEX_OFFSET)?;
        write_u16_be(gma_out, *local)?;
        copy_range(
            data,
            gma_out,
            record + MATERIAL_TEXTURE_INDEX_OFFSET + 2,
            MATERIAL_TRAILER_SIZE,
        )?;
    }
    copy_range(data, gma_out, layout.mesh_start(), layout.mesh_len())?;

    tpl::write_header(tpl_out, records.into_iter().zip(offsets))?;
    for span in &spans {
        copy_range(tpl.data(), tpl_out, span.start, span.len())?;
    }

    Ok(ExtractSummary {
        model_name: name.to_string(),
        physical_index: physical,
        texture_count: table.len(),
        gma_len: gma_header_len + layout.span.len(),
        tpl_len: running,
    })
}

/// Extract the model called exactly `name`.
pub fn extract_by_name<G, T>(
    pair: &ArchivePair<'_>,
    name: &str,
    gma_out: &mut G,
    tpl_out: &mut T,
) -> Result<ExtractSummary, Report<ArchiveError>>
where
    G: Write + ?Sized,
    T: Write + ?Sized,
{
    let (logical, stored) = pair
        .gma
        .find_model(name)?
        .ok_or_else(|| ArchiveError::ModelNotFound(name.to_string()))?;
    extract_model(pair, logical, stored, gma_out, tpl_out)
}
