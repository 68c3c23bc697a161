//! Local directory-tree enumeration (C11).
//!
//! Stands in for the external `get_local_dirtree`/`free_local_dirtree`
//! contract (§1): a concrete, recursive walk over `std::fs::read_dir`.
//! There is no explicit "free" counterpart here — ownership of the
//! resulting [`crate::codec::DirTree`] is an ordinary Rust value, released
//! by `Drop` once the server has encoded and sent it.

use crate::codec::DirTree;
use std::path::Path;

/// Recursively walks `path`, producing a [`DirTree`] rooted at its final
/// path component. Entries are visited in the order the OS returns them
/// from `read_dir`, matching §8's literal end-to-end scenario.
pub fn read_dir_tree(path: &Path) -> std::io::Result<DirTree> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    build_node(path, name)
}

fn build_node(path: &Path, name: String) -> std::io::Result<DirTree> {
    let metadata = std::fs::symlink_metadata(path)?;
    if !metadata.is_dir() {
        return Ok(DirTree { name, children: vec![] });
    }
    let mut children = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let child_name = entry.file_name().to_string_lossy().into_owned();
        children.push(build_node(&entry.path(), child_name)?);
    }
    Ok(DirTree { name, children })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_a_nested_directory() {
        let dir = std::env::temp_dir().join(format!("fsrpc-dirtree-test-{}", std::process::id()));
        let sub = dir.join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(dir.join("a.txt"), b"hi").unwrap();
        std::fs::write(sub.join("x"), b"").unwrap();

        let tree = read_dir_tree(&dir).unwrap();
        assert_eq!(tree.children.len(), 2);
        let names: Vec<&str> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"a.txt"));
        assert!(names.contains(&"sub"));
        let sub_node = tree.children.iter().find(|c| c.name == "sub").unwrap();
        assert_eq!(sub_node.children.len(), 1);
        assert_eq!(sub_node.children[0].name, "x");
        assert!(sub_node.children[0].children.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn leaf_file_has_no_children() {
        let path = std::env::temp_dir().join(format!("fsrpc-dirtree-leaf-{}", std::process::id()));
        std::fs::write(&path, b"content").unwrap();
        let tree = read_dir_tree(&path).unwrap();
        assert!(tree.children.is_empty());
        std::fs::remove_file(&path).unwrap();
    }
}
