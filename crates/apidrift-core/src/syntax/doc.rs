//! Doc-comment association.
//!
//! tree-sitter keeps comments as ordinary sibling nodes, so a declaration's
//! documentation is the run of comment siblings that ends on the line right
//! above it.

use tree_sitter::Node;

/// Text of the comment block immediately above `node`, cleaned and trimmed.
///
/// Returns an empty string when there is no such block. A comment that
/// trails code on its own line belongs to that code and stops the search.
pub fn leading(node: Node<'_>, src: &[u8]) -> String {
    let mut blocks = Vec::new();
    let mut next_row = node.start_position().row;
    let mut cursor = node.prev_sibling();

    while let Some(comment) = cursor {
        if comment.kind() != "comment" || comment.end_position().row + 1 != next_row {
            break;
        }
        // newline terminators are anonymous and end on the comment's row
        if let Some(before) = comment.prev_sibling()
            && before.is_named()
            && before.kind() != "comment"
            && before.end_position().row == comment.start_position().row
        {
            break;
        }
        blocks.push(comment.utf8_text(src).unwrap_or_default());
        next_row = comment.start_position().row;
        cursor = comment.prev_sibling();
    }

    blocks.reverse();
    clean(&blocks)
}

/// Text of a comment that starts on the same line `node` ends on.
pub fn trailing(node: Node<'_>, src: &[u8]) -> String {
    match node.next_sibling() {
        Some(next)
            if next.kind() == "comment"
                && next.start_position().row == node.end_position().row =>
        {
            clean(&[next.utf8_text(src).unwrap_or_default()])
        }
        _ => String::new(),
    }
}

/// `leading`, falling back to `trailing`.
pub fn attached(node: Node<'_>, src: &[u8]) -> String {
    let doc = leading(node, src);
    if doc.is_empty() { trailing(node, src) } else { doc }
}

/// Strip comment markers and tool directives, then join and trim.
fn clean(blocks: &[&str]) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for block in blocks {
        if let Some(line) = block.strip_prefix("//") {
            if is_directive(line) {
                continue;
            }
            lines.push(line.strip_prefix(' ').unwrap_or(line));
        } else if let Some(body) = block
            .strip_prefix("/*")
            .map(|b| b.strip_suffix("*/").unwrap_or(b))
        {
            lines.extend(body.lines().map(str::trim));
        }
    }
    lines.join("\n").trim().to_string()
}

fn is_directive(line: &str) -> bool {
    line.starts_with("go:") || line.starts_with("line ") || line.starts_with("nolint")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_markers() {
        assert_eq!(
            clean(&["// Writer writes.", "//", "// More detail."]),
            "Writer writes.\n\nMore detail."
        );
    }

    #[test]
    fn clean_handles_block_comments() {
        assert_eq!(clean(&["/* Block\n   comment */"]), "Block\ncomment");
    }

    #[test]
    fn clean_drops_directives() {
        assert_eq!(clean(&["// Doc.", "//go:generate stringer"]), "Doc.");
    }
}
