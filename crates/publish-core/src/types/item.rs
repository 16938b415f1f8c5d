//! Work item references.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::{DeleteItemId, FileItemId};

/// The two kinds of work item a job owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Content to publish.
    File,
    /// A URI to retract.
    Delete,
}

impl ItemKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference to exactly one work item.
///
/// Completion acknowledgements carry either a file id or a delete id on the
/// wire; this sum type is what they are converted into, so "both" and
/// "neither" cannot be represented past the parsing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ItemRef {
    /// A file item.
    File(FileItemId),
    /// A delete item.
    Delete(DeleteItemId),
}

impl ItemRef {
    /// Which kind of item this refers to.
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::File(_) => ItemKind::File,
            Self::Delete(_) => ItemKind::Delete,
        }
    }

    /// The raw store id.
    pub fn raw_id(&self) -> i64 {
        match self {
            Self::File(id) => id.get(),
            Self::Delete(id) => id.get(),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind(), self.raw_id())
    }
}
