//! Opaque file identifiers issued by the upload engine.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Identifier the upload engine assigns to every file it tracks.
///
/// All per-file state kept by this crate family is indexed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(u64);

impl FileId {
    /// Wraps a raw engine id.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw engine id.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}
