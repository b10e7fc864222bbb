/// `.gma` model archives
pub mod gma;
/// `.tpl` texture archives
pub mod tpl;

use crate::error::IResult;
use gma::GmaArchive;
use tpl::TplArchive;

/// A model archive together with the texture archive its materials index into.
#[derive(Debug)]
pub struct ArchivePair<'a> {
    pub gma: GmaArchive<'a>,
    pub tpl: TplArchive<'a>,
}

impl<'a> ArchivePair<'a> {
    pub fn parse(gma: &'a [u8], tpl: &'a [u8]) -> IResult<Self> {
        Ok(ArchivePair {
            gma: GmaArchive::parse(gma)?,
            tpl: TplArchive::parse(tpl)?,
        })
    }
}
