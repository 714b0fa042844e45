// The `<<...>>` include directive and the `add_include` public operation
// (§4.7, §6, and the Open Question in §9 -- resolved against
// `original_source/src/blocks.c`'s `cmark_add_to_head`/`cmark_add_to_head`
// pairing: a paragraph-finalize-time directive and a public API call both
// funnel through the same "ensure head, append Include" routine).

use std::cell::RefCell;

use typed_arena::Arena;

use crate::error::BlockTreeError;
use crate::node::{Ast, AstNode, NodeValue};

/// Attempt to parse one `<<filename>>`-style directive from the front of
/// `text`. The grammar is intentionally permissive (§9's "pluggable
/// directive recognizer"): `<<`, then any bytes up to the first `>>` or
/// end of line, then an optional trailing `>>`. Returns `(filename,
/// bytes_consumed)`.
pub fn parse_one(text: &str) -> Option<(String, usize)> {
    let rest = text.strip_prefix("<<")?;
    let end = rest.find(">>").unwrap_or_else(|| rest.find('\n').unwrap_or(rest.len()));
    let filename = rest[..end].trim().to_string();
    if filename.is_empty() {
        return None;
    }
    let mut consumed = 2 + end;
    if rest[end..].starts_with(">>") {
        consumed += 2;
    }
    if text[consumed..].starts_with('\n') {
        consumed += 1;
    }
    Some((filename, consumed))
}

/// Ensure `root`'s first child is a `Head` node (synthesizing one at the
/// current line if absent), then append an `Include(filename)` child to
/// it. `root` must be a `Document`; any other node kind is a structural
/// misuse error per §7.
pub fn add_include<'a>(
    arena: &'a Arena<AstNode<'a>>,
    root: &'a AstNode<'a>,
    filename: &str,
    line: usize,
) -> Result<(), BlockTreeError> {
    if !matches!(root.data.borrow().value, NodeValue::Document) {
        return Err(BlockTreeError::StructuralMisuse(
            "add_include called on a non-Document node".to_string(),
        ));
    }

    let head = match root.first_child.get() {
        Some(first) if matches!(first.data.borrow().value, NodeValue::Head) => first,
        _ => {
            let head = arena.alloc(AstNode::new(RefCell::new(Ast::new(NodeValue::Head, line))));
            prepend_child(root, head);
            head
        }
    };

    let include = arena.alloc(AstNode::new(RefCell::new(Ast::new(
        NodeValue::Include(filename.to_string()),
        line,
    ))));
    head.append(include);
    Ok(())
}

fn prepend_child<'a>(parent: &'a AstNode<'a>, child: &'a AstNode<'a>) {
    child.parent.set(Some(parent));
    match parent.first_child.get() {
        Some(old_first) => {
            child.next.set(Some(old_first));
            old_first.prev.set(Some(child));
            parent.first_child.set(Some(child));
        }
        None => {
            parent.first_child.set(Some(child));
            parent.last_child.set(Some(child));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_test_parse_one_with_closing_marker() {
        let (name, consumed) = parse_one("<<chapter1.md>>\nrest").unwrap();
        assert_eq!(name, "chapter1.md");
        assert_eq!(&"<<chapter1.md>>\nrest"[consumed..], "rest");
    }

    #[test]
    fn smoke_test_parse_one_without_closing_marker() {
        let (name, _) = parse_one("<<chapter1.md\n").unwrap();
        assert_eq!(name, "chapter1.md");
    }

    #[test]
    fn smoke_test_add_include_synthesizes_head_once() {
        let arena: Arena<AstNode> = Arena::new();
        let root = arena.alloc(AstNode::new(RefCell::new(Ast::new(NodeValue::Document, 1))));
        add_include(&arena, root, "a.md", 1).unwrap();
        add_include(&arena, root, "b.md", 2).unwrap();

        let head = root.first_child.get().unwrap();
        assert!(matches!(head.data.borrow().value, NodeValue::Head));
        assert_eq!(head.children().count(), 2);
    }

    #[test]
    fn smoke_test_add_include_rejects_non_document() {
        let arena: Arena<AstNode> = Arena::new();
        let para = arena.alloc(AstNode::new(RefCell::new(Ast::new(NodeValue::Paragraph, 1))));
        assert!(add_include(&arena, para, "a.md", 1).is_err());
    }
}
