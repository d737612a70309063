/// Caller intent for a single operation. Immutable once submitted.
use super::volume::Volume;
use serde::{Deserialize, Serialize};

/// What the tool should do with the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Report the current on-disk order without touching it.
    List,
    /// Reorder entries, then list the result.
    Sort,
}

/// How directories and files are interleaved after sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    DirectoriesFirst,
    FilesFirst,
    Mixed,
}

impl SortOrder {
    pub const ALL: [SortOrder; 3] = [Self::DirectoriesFirst, Self::FilesFirst, Self::Mixed];

    /// Value the tool expects after `-o`.
    pub fn flag_value(self) -> &'static str {
        match self {
            Self::DirectoriesFirst => "d",
            Self::FilesFirst => "f",
            Self::Mixed => "a",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::DirectoriesFirst => "Directories first",
            Self::FilesFirst => "Files first",
            Self::Mixed => "Mixed",
        }
    }
}

/// Sort-mode knobs forwarded to the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SortOptions {
    pub order: Option<SortOrder>,
    pub reverse: bool,
    pub ignore_case: bool,
    pub natural: bool,
    /// Sort by last modification time instead of name.
    pub by_modification: bool,
}

impl SortOptions {
    pub fn with_order(order: SortOrder) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }
}

/// A complete request: target, mode, and optional scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRequest {
    pub volume: Volume,
    pub mode: Mode,
    /// Directory to restrict sorting to, relative to the volume root.
    pub scope: Option<String>,
    pub options: SortOptions,
}

impl OperationRequest {
    /// List-only request.
    pub fn list(volume: Volume) -> Self {
        Self {
            volume,
            mode: Mode::List,
            scope: None,
            options: SortOptions::default(),
        }
    }

    /// Reorder request.
    pub fn sort(volume: Volume, options: SortOptions) -> Self {
        Self {
            volume,
            mode: Mode::Sort,
            scope: None,
            options,
        }
    }

    /// Restrict the sort to a subdirectory. Leading and trailing slashes are
    /// dropped; an empty path clears the scope.
    pub fn with_scope(mut self, scope: impl AsRef<str>) -> Self {
        self.scope = normalize_scope(scope.as_ref());
        self
    }
}

fn normalize_scope(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
