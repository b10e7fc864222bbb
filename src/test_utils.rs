//! Builders for synthetic archive pairs used across the unit tests.

use crate::data::cursor::align_32;
use crate::models::gma::{
    GmaArchive, MATERIAL_COUNT_OFFSET, MATERIAL_SIZE, MODEL_HEADER_SIZE, ModelName,
};
use crate::models::tpl::header_len_for;

#[derive(Debug, Clone)]
pub struct TestModel {
    pub name: Vec<u8>,
    pub materials: Vec<u16>,
    pub mesh_len: usize,
}

impl TestModel {
    pub fn new(name: &str) -> Self {
        Self::with_raw_name(name.as_bytes())
    }

    /// A model whose stored name need not be UTF-8.
    pub fn with_raw_name(name: &[u8]) -> Self {
        TestModel {
            name: name.to_vec(),
            materials: Vec::new(),
            mesh_len: 0,
        }
    }

    pub fn materials(mut self, texture_indices: &[u16]) -> Self {
        self.materials = texture_indices.to_vec();
        self
    }

    pub fn mesh(mut self, len: usize) -> Self {
        self.mesh_len = len;
        self
    }

    /// Model header, material records and mesh data. Every byte other than
    /// the material count and texture indices is derived from the name so
    /// that verbatim copies can be checked.
    pub fn bytes(&self) -> Vec<u8> {
        let seed = self.name.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));

        let mut header: Vec<u8> = (0..MODEL_HEADER_SIZE)
            .map(|i| seed.wrapping_add(i as u8))
            .collect();
        header[MATERIAL_COUNT_OFFSET..MATERIAL_COUNT_OFFSET + 2]
            .copy_from_slice(&(self.materials.len() as u16).to_be_bytes());

        let mut out = header;
        for (m, texture) in self.materials.iter().enumerate() {
            let mut record: Vec<u8> = (0..MATERIAL_SIZE)
                .map(|i| seed.wrapping_mul(3).wrapping_add((m * MATERIAL_SIZE + i) as u8))
                .collect();
            record[4..6].copy_from_slice(&texture.to_be_bytes());
            out.extend_from_slice(&record);
        }
        out.extend((0..self.mesh_len).map(|i| seed ^ (i as u8)));
        out
    }
}

#[derive(Debug, Default)]
pub struct GmaBuilder {
    slots: Vec<Option<TestModel>>,
}

impl GmaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: TestModel) -> Self {
        self.slots.push(Some(model));
        self
    }

    pub fn empty(mut self) -> Self {
        self.slots.push(None);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut table = Vec::new();
        let mut names = Vec::new();
        let mut body = Vec::new();

        for slot in &self.slots {
            match slot {
                Some(model) => {
                    table.extend_from_slice(&(body.len() as u32).to_be_bytes());
                    table.extend_from_slice(&(names.len() as u32).to_be_bytes());
                    names.extend_from_slice(&model.name);
                    names.push(0);
                    body.extend(model.bytes());
                }
                None => {
                    table.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes());
                    table.extend_from_slice(&0u32.to_be_bytes());
                }
            }
        }

        let header_len = align_32(8 + table.len() + names.len());
        let mut out = Vec::new();
        out.extend_from_slice(&(self.slots.len() as u32).to_be_bytes());
        out.extend_from_slice(&(header_len as u32).to_be_bytes());
        out.extend(table);
        out.extend(names);
        out.resize(header_len, 0);
        out.extend(body);
        out
    }
}

#[derive(Debug, Default)]
pub struct TplBuilder {
    slots: Vec<Option<usize>>,
}

impl TplBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(mut self, len: usize) -> Self {
        self.slots.push(Some(len));
        self
    }

    pub fn empty(mut self) -> Self {
        self.slots.push(None);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let header_len = header_len_for(self.slots.len());
        let mut out = Vec::new();
        let mut body = Vec::new();

        out.extend_from_slice(&(self.slots.len() as u32).to_be_bytes());
        for (index, slot) in self.slots.iter().enumerate() {
            out.extend_from_slice(&[0, 0, 0, index as u8 + 1]);
            match slot {
                Some(len) => {
                    out.extend_from_slice(&((header_len + body.len()) as u32).to_be_bytes());
                    body.extend(std::iter::repeat_n(0x80 | index as u8, *len));
                }
                None => out.extend_from_slice(&0u32.to_be_bytes()),
            }
            out.extend_from_slice(&[index as u8; 8]);
        }

        let fill = header_len - out.len();
        out.extend((0..fill).map(|i| i as u8));
        out.extend(body);
        out
    }
}

/// Name of the model in physical slot `physical`, located through its slot's
/// name offset rather than by walking the name list.
pub fn slot_name<'a>(gma: &GmaArchive<'a>, physical: usize) -> ModelName<'a> {
    let name_offset = gma.slots()[physical].name_offset().unwrap();
    let (name, _) = gma
        .read_name(gma.name_list_start() + name_offset as usize)
        .unwrap();
    name
}
