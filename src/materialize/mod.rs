//! File materialisation
//!
//! [`path`] decides where an artifact goes; [`writer`] puts it there.

pub mod path;
pub mod writer;

pub use path::{resolve_join_path, resolve_path, ArtifactKind};
pub use writer::{
    materialize, FailedFile, MaterializationResult, Materializer, PendingFile, SkippedFile,
    WriteOptions, WrittenFile,
};
