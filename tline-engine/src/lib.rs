pub mod command;
pub mod document;

pub mod errors {
    use std::path::PathBuf;

    use thiserror::Error;
    use tline_io::{IoError, SnapshotError};

    #[derive(Debug, Error)]
    pub enum DocumentError {
        #[error("index {index} is out of range for {collection} (len {len})")]
        InvalidIndex {
            collection: &'static str,
            index: usize,
            len: usize,
        },
        #[error("file path {0:?} already exists")]
        DuplicateFilePath(PathBuf),
        #[error("weather case description `{0}` is not unique")]
        DuplicateDescription(String),
        #[error("{collection} entry {index} is referenced by a transmission line")]
        Referenced {
            collection: &'static str,
            index: usize,
        },
        #[error("transmission lines could not be rebuilt: {0}")]
        Snapshot(#[from] SnapshotError),
        #[error(transparent)]
        Io(#[from] IoError),
    }

    #[derive(Debug, Error)]
    pub enum CommandError {
        #[error("`{command}` failed: {source}")]
        Document {
            command: &'static str,
            #[source]
            source: DocumentError,
        },
        #[error("`{command}` cannot target line {index}")]
        InvalidIndex { command: &'static str, index: usize },
        #[error("`{0}` has no captured state to revert")]
        NotApplied(&'static str),
        #[error("nothing to undo")]
        NothingToUndo,
        #[error("nothing to redo")]
        NothingToRedo,
    }
}
