// Integration coverage for the concrete scenarios in spec section 8 plus
// property tests for the invariants listed alongside them.

use blocktree::{parse_document, node::NodeValue, AstNode, ParserOptions};
use typed_arena::Arena;

fn render(node: &AstNode<'_>, depth: usize) -> String {
    let ast = node.data.borrow();
    let mut out = format!("{}{:?}", "  ".repeat(depth), ast.value);
    if matches!(ast.value, NodeValue::Paragraph | NodeValue::Header(_)) {
        out.push_str(&format!(" {:?}", ast.string_content));
    }
    out.push('\n');
    drop(ast);
    for child in node.children() {
        out.push_str(&render(child, depth + 1));
    }
    out
}

fn all_open_closed(node: &AstNode<'_>) -> bool {
    !node.is_open() && node.children().all(all_open_closed)
}

fn can_contain_closure(node: &AstNode<'_>) -> bool {
    node.children().all(|c| {
        blocktree::node::can_contain(&node.data.borrow().value, &c.data.borrow().value)
            && can_contain_closure(c)
    })
}

fn range_monotonic(node: &AstNode<'_>) -> bool {
    let r = node.data.borrow().range;
    r.start.line <= r.end.line
        && node.children().all(|c| {
            let cr = c.data.borrow().range;
            cr.start.line >= r.start.line && cr.end.line <= r.end.line && range_monotonic(c)
        })
}

#[test]
fn blockquote_paragraph_joins_across_lines() {
    let arena: Arena<AstNode> = Arena::new();
    let root = parse_document(&arena, b"> a\n> b\n", ParserOptions::default());
    let bq = root.first_child.get().expect("blockquote");
    assert!(matches!(bq.data.borrow().value, NodeValue::BlockQuote));
    let para = bq.first_child.get().expect("paragraph");
    assert!(matches!(para.data.borrow().value, NodeValue::Paragraph));
    assert_eq!(para.data.borrow().string_content, "a\nb");
}

#[test]
fn loose_list_with_blank_between_items() {
    let arena: Arena<AstNode> = Arena::new();
    let root = parse_document(&arena, b"- a\n- b\n\n- c\n", ParserOptions::default());
    let list = root.first_child.get().expect("list");
    match &list.data.borrow().value {
        NodeValue::List(l) => assert!(!l.tight, "list with a blank between items is loose"),
        other => panic!("expected list, got {:?}", other),
    }
    let items: Vec<_> = list.children().collect();
    assert_eq!(items.len(), 3);
    for (item, text) in items.iter().zip(["a", "b", "c"]) {
        let para = item.first_child.get().expect("item paragraph");
        assert_eq!(para.data.borrow().string_content, text);
    }
}

#[test]
fn fenced_code_block_captures_info_and_literal() {
    let arena: Arena<AstNode> = Arena::new();
    let root = parse_document(&arena, b"```rust\ncode\n```\n", ParserOptions::default());
    let block = root.first_child.get().expect("code block");
    match &block.data.borrow().value {
        NodeValue::CodeBlock(cb) => {
            assert!(cb.fenced);
            assert_eq!(cb.info, "rust");
            assert_eq!(cb.literal, "code\n");
        }
        other => panic!("expected code block, got {:?}", other),
    }
}

#[test]
fn setext_heading_level_one() {
    let arena: Arena<AstNode> = Arena::new();
    let root = parse_document(&arena, b"Header\n======\n", ParserOptions::default());
    let header = root.first_child.get().expect("header");
    match &header.data.borrow().value {
        NodeValue::Header(h) => {
            assert_eq!(h.level, 1);
            assert!(h.setext);
        }
        other => panic!("expected header, got {:?}", other),
    }
    assert_eq!(header.data.borrow().string_content, "Header");
}

#[test]
fn plain_paragraph_joins_two_lines() {
    let arena: Arena<AstNode> = Arena::new();
    let root = parse_document(&arena, b"a\nb\n", ParserOptions::default());
    let para = root.first_child.get().expect("paragraph");
    assert!(matches!(para.data.borrow().value, NodeValue::Paragraph));
    assert_eq!(para.data.borrow().string_content, "a\nb");
}

#[test]
fn reference_definition_vanishes_and_populates_refmap() {
    let arena: Arena<AstNode> = Arena::new();
    let mut parser = blocktree::BlockParser::new(&arena, ParserOptions::default());
    parser.feed(b"[x]: url\n");
    parser.feed(b"see [x]\n");
    let root = parser.finish();

    let children: Vec<_> = root.children().collect();
    assert_eq!(children.len(), 1, "the definition line must not become its own paragraph");
    assert_eq!(children[0].data.borrow().string_content, "see [x]");
}

#[test]
fn totality_over_assorted_inputs() {
    let inputs = [
        "",
        "\n",
        "\t\n",
        "> \n> \n",
        "- \n",
        "```\n",
        "# \n",
        "***\n",
        "<div>\n\n</div>\n",
        "[a]: \nb\n",
        "<<missing.md\n",
    ];
    for input in inputs {
        let arena: Arena<AstNode> = Arena::new();
        let root = parse_document(&arena, input.as_bytes(), ParserOptions::default());
        assert!(all_open_closed(root), "input {:?} left a node open", input);
        assert!(can_contain_closure(root), "input {:?} violated can_contain", input);
        assert!(range_monotonic(root), "input {:?} violated range monotonicity", input);
    }
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn markdownish_line() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-zA-Z0-9 ]{0,12}",
            Just("> quoted".to_string()),
            Just("- item".to_string()),
            Just("# heading".to_string()),
            Just("```".to_string()),
            Just("---".to_string()),
        ]
    }

    fn document() -> impl Strategy<Value = String> {
        proptest::collection::vec(markdownish_line(), 0..12)
            .prop_map(|lines| lines.into_iter().map(|l| format!("{}\n", l)).collect())
    }

    proptest! {
        #[test]
        fn totality_is_universal(doc in document()) {
            let arena: Arena<AstNode> = Arena::new();
            let root = parse_document(&arena, doc.as_bytes(), ParserOptions::default());
            prop_assert!(all_open_closed(root));
            prop_assert!(can_contain_closure(root));
            prop_assert!(range_monotonic(root));
        }

        #[test]
        fn idempotent_under_arbitrary_chunking(doc in document(), split_points in proptest::collection::vec(0usize..40, 0..5)) {
            let whole_arena: Arena<AstNode> = Arena::new();
            let whole = parse_document(&whole_arena, doc.as_bytes(), ParserOptions::default());
            let whole_rendered = render(whole, 0);

            let chunked_arena: Arena<AstNode> = Arena::new();
            let mut parser = blocktree::BlockParser::new(&chunked_arena, ParserOptions::default());
            let bytes = doc.as_bytes();
            let mut cuts: Vec<usize> = split_points.into_iter().map(|p| p.min(bytes.len())).collect();
            cuts.sort_unstable();
            cuts.push(bytes.len());
            let mut start = 0;
            for cut in cuts {
                if cut > start {
                    parser.feed(&bytes[start..cut]);
                    start = cut;
                }
            }
            let chunked_root = parser.finish();
            let chunked_rendered = render(chunked_root, 0);
            prop_assert_eq!(whole_rendered, chunked_rendered);
        }
    }
}
