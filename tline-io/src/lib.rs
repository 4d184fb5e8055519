use std::path::{Path, PathBuf};

use thiserror::Error;
use tline_core::units::UnitSystem;

pub mod codec;
pub mod document_xml;
pub mod gateway;
pub mod paths;
pub mod snapshot;
pub mod xml;

pub use codec::CodecError;
pub use document_xml::{DocumentData, DocumentLoad, DocumentParts};
pub use gateway::{LoadStatus, Loaded};
pub use snapshot::{LinesSnapshot, SharedDataLookup, SnapshotCodec, SnapshotError};
pub use xml::{XmlError, XmlNode};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("file {0:?} does not exist")]
    NotFound(PathBuf),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid xml in {path:?}: {source}")]
    InvalidXml {
        path: PathBuf,
        #[source]
        source: XmlError,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<DocumentLoad, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, parts: DocumentParts<'_>, path: &Path) -> Result<(), IoError>;
}

/// 文档文件的读写入口，携带应用当前的单位制。
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFacade {
    units: UnitSystem,
}

impl XmlFacade {
    pub fn new(units: UnitSystem) -> Self {
        Self { units }
    }
}

impl DocumentLoader for XmlFacade {
    fn load(&self, path: &Path) -> Result<DocumentLoad, IoError> {
        document_xml::read_document(path, self.units)
    }
}

impl DocumentSaver for XmlFacade {
    fn save(&self, parts: DocumentParts<'_>, path: &Path) -> Result<(), IoError> {
        document_xml::write_document(path, parts, self.units)
    }
}
