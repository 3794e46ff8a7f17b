use crate::error::{Error, Result};
use tree_sitter::{Node, Parser};

/// Check that `code` parses as Python.
///
/// Reports the first error or missing node tree-sitter finds.
pub fn check_python(code: &str) -> Result<()> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .expect("Failed to load Python grammar");

    let Some(tree) = parser.parse(code, None) else {
        return Err(Error::InvalidScript { line: 1, col: 1, excerpt: String::new() });
    };

    let root = tree.root_node();
    if !root.has_error() {
        return Ok(());
    }

    let node = first_error(root).unwrap_or(root);
    let position = node.start_position();
    let excerpt = code
        .lines()
        .nth(position.row)
        .map(|line| line.trim().to_string())
        .unwrap_or_default();

    Err(Error::InvalidScript {
        line: position.row + 1,
        col: position.column + 1,
        excerpt,
    })
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_python() {
        check_python("x = {\"a\": [True, None, 1.0]}\nprint(f\"{x}\")\n").unwrap();
    }

    #[test]
    fn test_broken_string_is_reported() {
        let err = check_python("ok = 1\nname = \"unterminated\n").unwrap_err();
        assert!(matches!(err, Error::InvalidScript { line, .. } if line >= 1));
    }

    #[test]
    fn test_trailing_comma_in_call_is_valid() {
        check_python("f(\n    a=\"1\",\n    **kw,\n)\n").unwrap();
    }
}
