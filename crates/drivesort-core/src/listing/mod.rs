/// Conversion between the tool's textual listing and a [`FileNode`] tree.
///
/// The listing is a banner followed by blocks separated by blank lines.
/// Each block starts with a directory path and continues with the names
/// of the entries directly inside it, in on-disk order:
///
/// ```text
/// File system: exFAT.
///
/// /
/// a
/// b
///
/// /a/
/// 1.mp3
/// ```
///
/// Anything whose path contains a component starting with `.` is treated
/// as hidden and left out of the tree.
use crate::model::FileNode;

/// Parse a listing into a tree rooted at `/`.
///
/// Never fails: an empty or banner-only listing yields an empty root.
pub fn parse(text: &str) -> FileNode {
    let mut root = FileNode::root();

    let mut lines = text.lines().skip_while(|line| !line.starts_with('/'));
    loop {
        let Some(header) = lines.by_ref().find(|line| !line.is_empty()) else {
            break;
        };
        let entries = lines.by_ref().take_while(|line| !line.is_empty());
        apply_block(&mut root, header, entries);
    }

    root
}

/// Parse raw tool output, replacing invalid UTF-8 sequences.
pub fn parse_bytes(bytes: &[u8]) -> FileNode {
    parse(&String::from_utf8_lossy(bytes))
}

fn apply_block<'a>(root: &mut FileNode, header: &str, entries: impl Iterator<Item = &'a str>) {
    let components: Vec<&str> = header.split('/').filter(|c| !c.is_empty()).collect();
    if components.iter().any(|c| is_hidden(c)) {
        // Drain so the caller's iterator resumes at the next block.
        entries.for_each(drop);
        return;
    }

    let dir = resolve_dir(root, &components);
    dir.children.extend(
        entries
            .filter(|name| !is_hidden(name))
            .map(FileNode::new_file),
    );
}

/// Walk from `root` along `components`, reusing existing children and
/// creating missing directories as it goes.
fn resolve_dir<'t>(root: &'t mut FileNode, components: &[&str]) -> &'t mut FileNode {
    let mut node = root;
    for &component in components {
        let idx = match node.children.iter().position(|c| c.name == component) {
            Some(idx) => idx,
            None => {
                node.children.push(FileNode::new_dir(component));
                node.children.len() - 1
            }
        };
        node = &mut node.children[idx];
        node.is_dir = true;
    }
    node
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Serialise a tree back into the block format (without a banner).
///
/// Directories are listed as entries of their parent and then get their own
/// block, depth first, the way the tool prints them.
pub fn render(root: &FileNode) -> String {
    let mut blocks = Vec::new();
    collect_blocks(root, String::from("/"), &mut blocks);
    blocks.join("\n")
}

fn collect_blocks(dir: &FileNode, path: String, blocks: &mut Vec<String>) {
    let mut block = path.clone();
    block.push('\n');
    for child in &dir.children {
        block.push_str(&child.name);
        block.push('\n');
    }
    blocks.push(block);

    for child in dir.children.iter().filter(|c| c.is_dir) {
        collect_blocks(child, format!("{path}{}/", child.name), blocks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let tree = parse("");
        assert_eq!(tree.name, "/");
        assert!(tree.children.is_empty());
    }

    #[test]
    fn test_banner_only() {
        assert!(parse("File system: FAT32.\n\n").children.is_empty());
    }

    #[test]
    fn test_example_listing() {
        let tree = parse("File system: exFAT.\n\n/\na\nb\n\n/a/\n1.mp3\n");
        assert_eq!(tree.child_names(), ["a", "b"]);
        let a = tree.child("a").unwrap();
        assert!(a.is_dir);
        assert_eq!(a.child_names(), ["1.mp3"]);
        let b = tree.child("b").unwrap();
        assert!(!b.is_dir);
        assert!(b.children.is_empty());
    }

    #[test]
    fn test_hidden_blocks_and_entries_dropped() {
        let tree = parse("/\n.Trashes\na\n\n/.Trashes/\nfoo\n");
        assert_eq!(tree.child_names(), ["a"]);
        assert!(!tree.child("a").unwrap().is_dir);
    }

    #[test]
    fn test_hidden_ancestor_drops_nested_block() {
        let tree = parse("/\nx\n\n/.Spotlight-V100/Store-V2/\ndata\n\n/x/\ny\n");
        assert_eq!(tree.child_names(), ["x"]);
        assert_eq!(tree.child("x").unwrap().child_names(), ["y"]);
    }

    #[test]
    fn test_repeated_block_merges() {
        let tree = parse("/\nd\n\n/d/\n1\n\n/d/\n2\n");
        assert_eq!(tree.child_names(), ["d"]);
        assert_eq!(tree.child("d").unwrap().child_names(), ["1", "2"]);
    }

    #[test]
    fn test_block_before_parent_creates_ancestors() {
        let tree = parse("/a/b/\nc\n\n/\na\n");
        // `a` is created by the walk and the later root entry is appended as-is.
        assert_eq!(tree.child_names(), ["a", "a"]);
        assert_eq!(tree.find("a/b/c").map(|n| n.is_dir), Some(false));
    }

    #[test]
    fn test_extra_blank_lines_and_crlf() {
        let tree = parse("banner\r\n\r\n/\r\nA B\r\n\r\n\r\n/A B/\r\nsong.mp3\r\n");
        assert_eq!(tree.child_names(), ["A B"]);
        assert_eq!(tree.child("A B").unwrap().child_names(), ["song.mp3"]);
    }

    #[test]
    fn test_empty_directory_block_marks_dir() {
        let tree = parse("/\nempty\n\n/empty/\n");
        let empty = tree.child("empty").unwrap();
        assert!(empty.is_dir);
        assert!(empty.children.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let tree = parse_bytes(b"/\ncaf\xe9.mp3\n");
        assert_eq!(tree.child_names(), ["caf\u{fffd}.mp3"]);
    }

    #[test]
    fn test_render_layout() {
        let tree = parse("/\na\nb\n\n/a/\n1.mp3\n");
        assert_eq!(render(&tree), "/\na\nb\n\n/a/\n1.mp3\n");
    }
}
