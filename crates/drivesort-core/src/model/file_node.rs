/// One entry of the on-disk hierarchy produced by a listing.
///
/// Trees are built fresh for every listing and handed to the caller whole;
/// nothing mutates a tree once the parser has returned it.
use compact_str::CompactString;
use serde::Serialize;

/// Name of the root node of every tree.
pub const ROOT_NAME: &str = "/";

/// A directory or plain file, with its children in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNode {
    /// Entry name only, never a path.
    pub name: CompactString,

    /// `true` once some listing block named this node as a directory.
    /// An entry that never got its own block stays a file even if the tool
    /// simply omitted an empty directory.
    pub is_dir: bool,

    /// Children in the order the tool reported them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    /// A leaf entry.
    pub fn new_file(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            children: Vec::new(),
        }
    }

    /// A directory entry with no children yet.
    pub fn new_dir(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            children: Vec::new(),
        }
    }

    /// The empty root node, named `/`.
    pub fn root() -> Self {
        Self::new_dir(ROOT_NAME)
    }

    /// Builder helper used by tests and renderers.
    pub fn with_children(mut self, children: Vec<FileNode>) -> Self {
        self.is_dir = true;
        self.children = children;
        self
    }

    /// Direct child with the given name, if any.
    pub fn child(&self, name: &str) -> Option<&FileNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Resolve a `/`-separated path relative to this node.
    /// Empty components are ignored, so `"a/b"`, `"/a/b/"` and `"a//b"` agree.
    pub fn find(&self, path: &str) -> Option<&FileNode> {
        path.split('/')
            .filter(|c| !c.is_empty())
            .try_fold(self, |node, component| node.child(component))
    }

    /// Number of nodes below this one (the node itself excluded).
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }

    /// Child names in order, handy for assertions and compact display.
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }
}

impl Default for FileNode {
    fn default() -> Self {
        Self::root()
    }
}
