/// Terminal rendering of listed trees.
use drivesort_core::model::FileNode;
use std::fmt::Write;

const INDENT: &str = "  ";

/// Indented outline, two spaces per level, directories marked with a
/// trailing `/`. The root prints as `/`.
pub fn format_tree(root: &FileNode) -> String {
    let mut out = String::from("/\n");
    for child in &root.children {
        write_node(&mut out, child, 1);
    }
    out
}

fn write_node(out: &mut String, node: &FileNode, depth: usize) {
    let marker = if node.is_dir { "/" } else { "" };
    let _ = writeln!(out, "{}{}{marker}", INDENT.repeat(depth), node.name);
    for child in &node.children {
        write_node(out, child, depth + 1);
    }
}

/// One-line summary such as `3 directories, 12 files`.
pub fn summary(root: &FileNode) -> String {
    let (dirs, files) = tally(root);
    format!(
        "{dirs} {}, {files} {}",
        if dirs == 1 { "directory" } else { "directories" },
        if files == 1 { "file" } else { "files" }
    )
}

fn tally(node: &FileNode) -> (usize, usize) {
    node.children.iter().fold((0, 0), |(dirs, files), child| {
        let (d, f) = tally(child);
        if child.is_dir {
            (dirs + d + 1, files + f)
        } else {
            (dirs + d, files + f + 1)
        }
    })
}
