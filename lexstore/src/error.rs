//! Error types for lexstore operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::parse::ParseError;

#[derive(Error, Debug)]
pub enum LexError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("store is closed")]
    Closed,

    #[error("cannot change {0} while open")]
    AlreadyOpen(&'static str),

    #[error("no content files resolved in {0:?}")]
    NoContentFound(PathBuf),

    #[error("snapshot not loaded into memory")]
    NotLoaded,

    #[error("unresolved cross-reference: {0}")]
    UnresolvedReference(String),

    #[error("invalid snapshot image: {0}")]
    ImageFormat(String),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, LexError>;
