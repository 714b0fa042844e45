// Head/body rewrite (§4.7): if the document's first child is a `Head`,
// unlink it, retag the original root to `Body`, and wrap both under a
// freshly allocated `Document` root.

use std::cell::RefCell;

use typed_arena::Arena;

use crate::node::{Ast, AstNode, NodeValue};

pub fn rewrite<'a>(
    arena: &'a Arena<AstNode<'a>>,
    root: &'a AstNode<'a>,
    end_line: usize,
) -> &'a AstNode<'a> {
    let has_head = matches!(
        root.first_child.get().map(|c| c.data.borrow().value.clone()),
        Some(NodeValue::Head)
    );
    if !has_head {
        return root;
    }

    let head = root.first_child.get().expect("checked above");
    unlink(head);

    root.data.borrow_mut().value = NodeValue::Body;

    let new_root = arena.alloc(AstNode::new(RefCell::new(Ast::new(
        NodeValue::Document,
        1,
    ))));
    new_root.data.borrow_mut().range = root.data.borrow().range;
    new_root.data.borrow_mut().range.end.line = end_line;

    new_root.append(root);
    prepend(new_root, head);
    new_root
}

fn unlink<'a>(node: &'a AstNode<'a>) {
    let parent = node.parent.get();
    let prev = node.prev.get();
    let next = node.next.get();
    match prev {
        Some(p) => p.next.set(next),
        None => {
            if let Some(par) = parent {
                par.first_child.set(next);
            }
        }
    }
    match next {
        Some(n) => n.prev.set(prev),
        None => {
            if let Some(par) = parent {
                par.last_child.set(prev);
            }
        }
    }
    node.parent.set(None);
    node.prev.set(None);
    node.next.set(None);
}

fn prepend<'a>(parent: &'a AstNode<'a>, child: &'a AstNode<'a>) {
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
    fn smoke_test_rewrite_noop_without_head() {
        let arena: Arena<AstNode> = Arena::new();
        let root = arena.alloc(AstNode::new(RefCell::new(Ast::new(NodeValue::Document, 1))));
        let rewritten = rewrite(&arena, root, 1);
        assert!(std::ptr::eq(rewritten, root));
    }

    #[test]
    fn smoke_test_rewrite_wraps_head_and_body() {
        let arena: Arena<AstNode> = Arena::new();
        let root = arena.alloc(AstNode::new(RefCell::new(Ast::new(NodeValue::Document, 1))));
        let head = arena.alloc(AstNode::new(RefCell::new(Ast::new(NodeValue::Head, 1))));
        root.append(head);
        let para = arena.alloc(AstNode::new(RefCell::new(Ast::new(NodeValue::Paragraph, 2))));
        root.append(para);

        let new_root = rewrite(&arena, root, 3);
        assert!(matches!(new_root.data.borrow().value, NodeValue::Document));
        let children: Vec<_> = new_root.children().collect();
        assert_eq!(children.len(), 2);
        assert!(matches!(children[0].data.borrow().value, NodeValue::Head));
        assert!(matches!(children[1].data.borrow().value, NodeValue::Body));
        assert!(std::ptr::eq(children[1], root));
        assert_eq!(root.children().count(), 1);
    }
}
