/// End-to-end tests for listing parsing and rendering.
///
/// These feed realistic multi-block tool output through the public
/// `listing` API and check the resulting tree as a frontend would see it,
/// including its JSON form.
use drivesort_core::listing::{parse, parse_bytes, render};
use drivesort_core::model::FileNode;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// A small music player volume:
///
/// ```text
/// /
///   Music/
///     Album A/
///       01.mp3
///       02.mp3
///     Album B/
///   Podcasts/
///     ep1.mp3
///   readme.txt
/// ```
fn player_tree() -> FileNode {
    FileNode::root().with_children(vec![
        FileNode::new_dir("Music").with_children(vec![
            FileNode::new_dir("Album A").with_children(vec![
                FileNode::new_file("01.mp3"),
                FileNode::new_file("02.mp3"),
            ]),
            FileNode::new_dir("Album B"),
        ]),
        FileNode::new_dir("Podcasts").with_children(vec![FileNode::new_file("ep1.mp3")]),
        FileNode::new_file("readme.txt"),
    ])
}

const PLAYER_LISTING: &str = "\
File system: FAT32.

/
Music
Podcasts
readme.txt
.Trashes
._readme.txt

/Music/
Album A
Album B

/Music/Album A/
01.mp3
02.mp3

/Music/Album B/

/Podcasts/
ep1.mp3

/.Trashes/
501

/.Trashes/501/
deleted.mp3
";

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn realistic_listing_builds_expected_tree() {
    assert_eq!(parse(PLAYER_LISTING), player_tree());
}

#[test]
fn rendered_tree_parses_back_to_itself() {
    let tree = player_tree();
    let text = render(&tree);
    assert_eq!(parse(&text), tree);
}

#[test]
fn hidden_entries_never_reach_the_tree() {
    let tree = parse(PLAYER_LISTING);
    assert!(tree.find(".Trashes").is_none());
    assert!(tree.find("._readme.txt").is_none());
    assert_eq!(tree.descendant_count(), 8);
}

#[test]
fn paths_resolve_through_nested_blocks() {
    let tree = parse(PLAYER_LISTING);
    let album = tree.find("Music/Album A").expect("album directory");
    assert!(album.is_dir);
    assert_eq!(album.child_names(), ["01.mp3", "02.mp3"]);

    let empty = tree.find("Music/Album B").expect("empty album");
    assert!(empty.is_dir);
    assert!(empty.children.is_empty());
}

#[test]
fn output_without_any_block_is_an_empty_root() {
    for text in ["", "\n\n", "File system: exFAT.\n", "fatsort: nothing to do\n\n"] {
        let tree = parse(text);
        assert_eq!(tree.name, "/");
        assert!(tree.children.is_empty(), "input {text:?}");
    }
}

#[test]
fn raw_bytes_with_windows_line_endings() {
    let raw = PLAYER_LISTING.replace('\n', "\r\n");
    assert_eq!(parse_bytes(raw.as_bytes()), player_tree());
}

#[test]
fn tree_serializes_without_empty_children() {
    let tree = parse("/\na\nb\n\n/a/\n1.mp3\n");
    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "name": "/",
            "is_dir": true,
            "children": [
                {
                    "name": "a",
                    "is_dir": true,
                    "children": [{ "name": "1.mp3", "is_dir": false }]
                },
                { "name": "b", "is_dir": false }
            ]
        })
    );
}
