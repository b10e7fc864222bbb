use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unable to read {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Read of {width} byte(s) at 0x{offset:X} extends beyond source (length 0x{len:X})")]
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },
    #[error("The model {0} wasn't found")]
    ModelNotFound(String),
    #[error("No {0} found")]
    NoMatchingEntry(String),
    #[error("Index {index} out of range for {count} entries")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("Unable to write output: {0}")]
    SinkUnwritable(#[from] io::Error),
}

impl ArchiveError {
    pub fn out_of_range(offset: usize, width: usize, len: usize) -> Self {
        ArchiveError::OutOfRange { offset, width, len }
    }
}

pub type IResult<T> = Result<T, ArchiveError>;
