// src/core/output_tree.rs

use crate::core::paths;
use std::collections::BTreeMap;

/// A directory level of the tree; leaves are nodes without children.
#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<String, Node>,
}

/// Formats `files` as an ASCII tree relative to `cwd`, directories
/// marked with a trailing `/`. Sibling order is alphabetical.
pub fn format_output_tree<S: AsRef<str>>(cwd: &str, files: &[S]) -> String {
    // 1. Build the directory map
    let mut root = Node::default();
    for file in files {
        let relative = paths::relative(cwd, file.as_ref());
        let mut node = &mut root;
        for segment in paths::split(&relative) {
            node = node.children.entry(segment).or_default();
        }
    }

    // 2. Print from the top level down
    let mut lines = Vec::new();
    let count = root.children.len();
    for (i, (name, child)) in root.children.iter().enumerate() {
        print_node(name, child, "", i + 1 == count, &mut lines);
    }
    lines.join("\n")
}

/// Recursive function to print a tree node and its descendants.
fn print_node(name: &str, node: &Node, prefix: &str, is_last: bool, lines: &mut Vec<String>) {
    let connector = if is_last { "└─" } else { "├─" };
    let marker = if node.children.is_empty() { "" } else { "/" };
    lines.push(format!("{prefix}{connector} {name}{marker}"));

    let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
    let count = node.children.len();
    for (i, (child_name, child)) in node.children.iter().enumerate() {
        print_node(child_name, child, &child_prefix, i + 1 == count, lines);
    }
}
