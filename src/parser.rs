// The streaming block-tree driver: continuation matcher (§4.3), opener
// (§4.4), leaf appender and lazy-continuation (§4.5), and finalizer
// (§4.6), wired together by `feed`/`finish` (§5, §6).

use std::cell::{Cell, RefCell};

use typed_arena::Arena;

use crate::error::BlockTreeError;
use crate::headbody;
use crate::include;
use crate::inlines;
use crate::linebuffer::LineBuffer;
use crate::node::{
    can_contain, Ast, AstNode, ListDelimiter, ListType, NodeCodeBlock, NodeHeader, NodeList,
    NodeValue,
};
use crate::options::ParserOptions;
use crate::position::Position;
use crate::prepare::prepare_line;
use crate::refmap::RefMap;
use crate::scanners::{self, MarkerKind};

/// The streaming block parser. Owns no tree storage itself -- nodes are
/// allocated out of the caller-provided `arena`, the same ownership split
/// the wider ecosystem uses for arena-backed trees, so the returned root
/// can outlive the parser value.
pub struct BlockParser<'a> {
    arena: &'a Arena<AstNode<'a>>,
    root: &'a AstNode<'a>,
    current: Cell<&'a AstNode<'a>>,
    refmap: RefCell<RefMap>,
    options: ParserOptions,
    linebuf: LineBuffer,
    line_number: usize,
    /// Length (excluding the trailing `\n`) of the line just processed, and
    /// of the one before it -- §4.2's `parser.last_line_length`, kept one
    /// line deep so the finalizer can set a real `end_column` whether a
    /// node closes on the current line or on the previous one.
    last_line_length: usize,
    prev_line_length: usize,
}

impl<'a> BlockParser<'a> {
    pub fn new(arena: &'a Arena<AstNode<'a>>, options: ParserOptions) -> Self {
        let root = arena.alloc(AstNode::new(RefCell::new(Ast::new(NodeValue::Document, 1))));
        BlockParser {
            arena,
            root,
            current: Cell::new(root),
            refmap: RefCell::new(RefMap::new()),
            options,
            linebuf: LineBuffer::new(),
            line_number: 0,
            last_line_length: 0,
            prev_line_length: 0,
        }
    }

    pub fn refmap(&self) -> std::cell::Ref<'_, RefMap> {
        self.refmap.borrow()
    }

    /// Register an include directive directly, bypassing the `<<...>>`
    /// paragraph grammar (§6 `add_include`).
    pub fn add_include(&self, filename: &str) -> Result<(), BlockTreeError> {
        include::add_include(self.arena, self.root, filename, self.line_number.max(1))
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        let lines = self.linebuf.feed(bytes);
        for raw in lines {
            self.process_raw_line(&raw);
        }
    }

    pub fn finish(mut self) -> &'a AstNode<'a> {
        if let Some(raw) = self.linebuf.finish() {
            self.process_raw_line(&raw);
        }
        self.finalize_document();
        self.expand_inlines();
        if self.options.debug_nodes {
            self.check_invariants();
        }
        headbody::rewrite(self.arena, self.root, self.line_number.max(1))
    }

    fn process_raw_line(&mut self, raw: &[u8]) {
        self.line_number += 1;
        let line_no = self.line_number;
        let prepared = prepare_line(raw);
        self.prev_line_length = self.last_line_length;
        self.last_line_length = prepared.len().saturating_sub(1);
        let line = String::from_utf8_lossy(&prepared).into_owned();
        self.process_line(&line, line_no);
        log::trace!("processed line {}: {:?}", line_no, line.trim_end());
    }

    // ---- continuation matcher + opener + leaf appender -----------------

    fn process_line(&mut self, line: &str, line_no: usize) {
        let spine = self.spine();
        let prev_current = self.current.get();
        let maybe_lazy = matches!(prev_current.data.borrow().value, NodeValue::Paragraph);

        let (mut matched_idx, mut offset, fence_closed_at) = self.match_continuations(line, &spine);

        if let Some(node) = fence_closed_at {
            self.finalize(node, line_no, self.last_line_length);
            self.current.set(node.parent.get().unwrap_or(self.root));
            return;
        }

        let (bl_first_nonspace, _bl_indent, blank) = scan(line, offset);
        let last_matched = spine[matched_idx - 1];

        // Second-blank-in-list break-out (§4.3).
        if blank && last_matched.data.borrow().last_line_blank {
            if let Some(list_idx) = spine[..matched_idx]
                .iter()
                .position(|n| matches!(n.data.borrow().value, NodeValue::List(_)))
            {
                for node in spine[list_idx..matched_idx].iter().rev() {
                    self.finalize(node, line_no.saturating_sub(1).max(1), self.prev_line_length);
                }
                matched_idx = list_idx;
                offset = bl_first_nonspace;
            }
        }
        let last_matched = spine[matched_idx - 1];
        let all_matched = matched_idx == spine.len();

        let container = self.open_containers(line, last_matched, offset, all_matched, maybe_lazy, line_no);
        let container = match container {
            OpenOutcome::ClosedSetextOrHRule => {
                return;
            }
            OpenOutcome::Container(c, new_offset) => {
                offset = new_offset;
                c
            }
        };

        self.append_leaf(
            line,
            line_no,
            offset,
            &spine,
            matched_idx,
            prev_current,
            all_matched,
            container,
        );
    }

    fn spine(&self) -> Vec<&'a AstNode<'a>> {
        let mut v = vec![self.root];
        let mut cur = self.root;
        while let Some(next) = cur.last_child.get() {
            if !next.is_open() {
                break;
            }
            v.push(next);
            cur = next;
        }
        v
    }

    /// Returns `(matched_count, offset, fence_closed_node)`. `fence_closed_node`
    /// is `Some` when the line was entirely consumed by a fenced code
    /// closure short-circuit (§4.3).
    fn match_continuations(
        &self,
        line: &str,
        spine: &[&'a AstNode<'a>],
    ) -> (usize, usize, Option<&'a AstNode<'a>>) {
        let mut offset = 0usize;
        let mut matched = 1usize; // root always matches

        for container in spine.iter().skip(1) {
            let (first_nonspace, indent, blank) = scan(line, offset);
            let value = container.data.borrow().value.clone();
            let advance: Option<usize> = match &value {
                NodeValue::BlockQuote => {
                    if indent <= 3 && line.as_bytes().get(first_nonspace) == Some(&b'>') {
                        let mut new_offset = first_nonspace + 1;
                        if line.as_bytes().get(new_offset) == Some(&b' ') {
                            new_offset += 1;
                        }
                        Some(new_offset)
                    } else {
                        None
                    }
                }
                NodeValue::Item(list) => {
                    if blank {
                        Some(first_nonspace)
                    } else if indent >= list.marker_offset + list.padding {
                        Some(offset + list.marker_offset + list.padding)
                    } else {
                        None
                    }
                }
                NodeValue::List(_) => Some(offset),
                NodeValue::CodeBlock(cb) if !cb.fenced => {
                    if blank {
                        Some(first_nonspace)
                    } else if indent >= 4 {
                        Some(offset + 4)
                    } else {
                        None
                    }
                }
                NodeValue::CodeBlock(cb) => {
                    // fenced
                    let candidate = &line[first_nonspace..];
                    if indent <= 3 && scanners::fence_close(candidate, cb.fence_char, cb.fence_length)
                    {
                        return (matched + 1, first_nonspace, Some(container));
                    }
                    let strip = cb.fence_offset.min(indent);
                    Some(offset + strip)
                }
                NodeValue::Header(_) => None,
                NodeValue::Html(_) | NodeValue::Paragraph => {
                    if blank {
                        None
                    } else {
                        Some(offset)
                    }
                }
                _ => Some(offset),
            };
            match advance {
                Some(new_offset) => {
                    offset = new_offset;
                    matched += 1;
                }
                None => break,
            }
        }
        (matched, offset, None)
    }

    #[allow(clippy::too_many_arguments)]
    fn open_containers(
        &self,
        line: &str,
        start: &'a AstNode<'a>,
        mut offset: usize,
        all_matched: bool,
        maybe_lazy: bool,
        line_no: usize,
    ) -> OpenOutcome<'a> {
        let mut container = start;
        loop {
            let (first_nonspace, indent, blank) = scan(line, offset);
            let rest = &line[first_nonspace..];

            // `maybe_lazy` is the opener-wide snapshot of "was the current
            // leaf a paragraph before this line's opening pass began" (§9);
            // it gates the indented-code opener on its own, not combined
            // with whether the continuation matcher fully matched.
            if indent >= 4 && !maybe_lazy && !blank {
                let node = self.add_child(
                    container,
                    NodeValue::CodeBlock(NodeCodeBlock::default()),
                    line_no,
                    offset + 4 + 1,
                );
                offset += 4;
                return OpenOutcome::Container(node, offset);
            }

            if indent <= 3 && line.as_bytes().get(first_nonspace) == Some(&b'>') {
                let mut new_offset = first_nonspace + 1;
                if line.as_bytes().get(new_offset) == Some(&b' ') {
                    new_offset += 1;
                }
                container = self.add_child(container, NodeValue::BlockQuote, line_no, first_nonspace + 1);
                offset = new_offset;
                continue;
            }

            if indent <= 3 {
                if let Some((level, rest_text)) = scanners::atx_heading(rest) {
                    let consumed = rest.len() - rest_text.len();
                    let node = self.add_child(
                        container,
                        NodeValue::Header(NodeHeader { level, setext: false }),
                        line_no,
                        first_nonspace + 1,
                    );
                    return OpenOutcome::Container(node, first_nonspace + consumed);
                }
            }

            if indent <= 3 {
                if let Some((fence_char, fence_length, info)) = scanners::fence_open(rest) {
                    let node = self.add_child(
                        container,
                        NodeValue::CodeBlock(NodeCodeBlock {
                            fenced: true,
                            fence_char,
                            fence_length,
                            fence_offset: indent,
                            info,
                            literal: String::new(),
                        }),
                        line_no,
                        first_nonspace + 1,
                    );
                    return OpenOutcome::Container(node, line.len());
                }
            }

            if indent <= 3 && scanners::html_block_start(rest) {
                let node = self.add_child(container, NodeValue::Html(String::new()), line_no, first_nonspace + 1);
                return OpenOutcome::Container(node, first_nonspace);
            }

            if all_matched {
                if matches!(container.data.borrow().value, NodeValue::Paragraph)
                    && !container.data.borrow().string_content.contains('\n')
                {
                    if let Some(level) = scanners::setext_underline(rest) {
                        container.data.borrow_mut().value =
                            NodeValue::Header(NodeHeader { level, setext: true });
                        self.finalize(container, line_no, self.last_line_length);
                        self.current.set(container.parent.get().unwrap_or(self.root));
                        return OpenOutcome::ClosedSetextOrHRule;
                    }
                }
            }

            let lazy_guard = matches!(container.data.borrow().value, NodeValue::Paragraph) && !all_matched;
            if indent <= 3 && !lazy_guard && scanners::thematic_break(rest) {
                let node = self.add_child(container, NodeValue::HRule, line_no, first_nonspace + 1);
                self.finalize(node, line_no, self.last_line_length);
                self.current.set(node.parent.get().unwrap_or(self.root));
                return OpenOutcome::ClosedSetextOrHRule;
            }

            if indent <= 3 {
                if let Some((marker, matched_width)) = scanners::list_marker(rest) {
                    let after_marker = &rest[matched_width..];
                    let spaces = scanners::spaces_after_marker(after_marker);
                    let rest_blank = after_marker.trim_start_matches(' ').starts_with('\n');
                    let padding = if spaces == 0 || spaces >= 5 || rest_blank {
                        matched_width + 1
                    } else {
                        matched_width + spaces
                    };
                    let (list_type, bullet_char, delimiter, start_num) = match marker {
                        MarkerKind::Bullet(c) => (ListType::Bullet, c, ListDelimiter::Period, 1),
                        MarkerKind::Ordered { start, delimiter } => (
                            ListType::Ordered,
                            0,
                            if delimiter == b')' {
                                ListDelimiter::Paren
                            } else {
                                ListDelimiter::Period
                            },
                            start,
                        ),
                    };
                    let new_list = NodeList {
                        list_type,
                        bullet_char,
                        delimiter,
                        start: start_num,
                        tight: true,
                        marker_offset: indent,
                        padding,
                    };

                    let needs_new_list = match &container.data.borrow().value {
                        NodeValue::List(existing) => !existing.matches(&new_list),
                        _ => true,
                    };
                    if needs_new_list {
                        container = self.add_child(container, NodeValue::List(new_list), line_no, first_nonspace + 1);
                    }
                    let item = self.add_child(container, NodeValue::Item(new_list), line_no, first_nonspace + 1);
                    container = item;
                    offset = first_nonspace + padding;
                    continue;
                }
            }

            break;
        }
        OpenOutcome::Container(container, offset)
    }

    #[allow(clippy::too_many_arguments)]
    fn append_leaf(
        &mut self,
        line: &str,
        line_no: usize,
        offset: usize,
        old_spine: &[&'a AstNode<'a>],
        matched_idx: usize,
        prev_current: &'a AstNode<'a>,
        all_matched: bool,
        container: &'a AstNode<'a>,
    ) {
        if offset >= line.len() {
            // The opener consumed the whole line itself (a fence-open marker
            // line contributes no content of its own).
            self.current.set(container);
            return;
        }

        let (first_nonspace, _indent, blank) = scan(line, offset);

        if blank {
            if let Some(last_child) = container.last_child.get() {
                last_child.data.borrow_mut().last_line_blank = true;
            }
        }
        let becomes_blank = blank
            && !matches!(container.data.borrow().value, NodeValue::BlockQuote)
            && !matches!(container.data.borrow().value, NodeValue::Header(_))
            && !matches!(
                &container.data.borrow().value,
                NodeValue::CodeBlock(cb) if cb.fenced
            );
        container.data.borrow_mut().last_line_blank = becomes_blank;
        let mut ancestor = container.parent.get();
        while let Some(a) = ancestor {
            a.data.borrow_mut().last_line_blank = false;
            ancestor = a.parent.get();
        }

        let is_lazy = matches!(prev_current.data.borrow().value, NodeValue::Paragraph)
            && !all_matched
            && std::ptr::eq(container, old_spine[matched_idx - 1])
            && !blank
            && !prev_current.data.borrow().string_content.is_empty();

        if is_lazy {
            append_text(prev_current, &line[offset..line.len().saturating_sub(1)]);
            self.current.set(prev_current);
            return;
        }

        for node in old_spine[matched_idx..].iter().rev() {
            if node.is_open() {
                self.finalize(node, line_no.saturating_sub(1).max(1), self.prev_line_length);
            }
        }

        let is_fenced = matches!(&container.data.borrow().value, NodeValue::CodeBlock(cb) if cb.fenced);
        let is_html = matches!(container.data.borrow().value, NodeValue::Html(_));
        let is_indented_code =
            matches!(&container.data.borrow().value, NodeValue::CodeBlock(cb) if !cb.fenced);
        let is_header = matches!(container.data.borrow().value, NodeValue::Header(h) if !h.setext);
        let is_paragraph = matches!(container.data.borrow().value, NodeValue::Paragraph);

        if is_fenced || is_html || is_indented_code {
            let text = &line[offset..line.len().saturating_sub(1)];
            append_text(container, text);
            self.current.set(container);
        } else if blank {
            self.current.set(container);
        } else if is_header {
            let text = strip_trailing_hashtags(&line[first_nonspace..line.len().saturating_sub(1)]);
            append_text(container, &text);
            self.finalize(container, line_no, self.last_line_length);
            self.current.set(container.parent.get().unwrap_or(self.root));
        } else if is_paragraph {
            let text = &line[first_nonspace..line.len().saturating_sub(1)];
            append_text(container, text);
            self.current.set(container);
        } else {
            let node = self.add_child(container, NodeValue::Paragraph, line_no, first_nonspace + 1);
            let text = &line[first_nonspace..line.len().saturating_sub(1)];
            append_text(node, text);
            self.current.set(node);
        }
    }

    fn add_child(
        &self,
        mut parent: &'a AstNode<'a>,
        value: NodeValue,
        line_no: usize,
        start_column: usize,
    ) -> &'a AstNode<'a> {
        while !can_contain(&parent.data.borrow().value, &value) {
            parent = self.finalize(parent, line_no.saturating_sub(1).max(1), self.prev_line_length);
        }
        let node = self
            .arena
            .alloc(AstNode::new(RefCell::new(Ast::new_at(value, line_no, start_column))));
        parent.append(node);
        node
    }

    // ---- finalizer (§4.6) ----------------------------------------------

    fn finalize(&self, node: &'a AstNode<'a>, end_line: usize, end_column: usize) -> &'a AstNode<'a> {
        let parent = node.parent.get().unwrap_or(self.root);
        {
            let mut ast = node.data.borrow_mut();
            ast.open = false;
            let line = end_line.max(ast.range.start.line);
            let column = if line == ast.range.start.line {
                end_column.max(ast.range.start.column)
            } else {
                end_column.max(1)
            };
            ast.range.end = Position::new(line, column);
        }

        let value_snapshot = node.data.borrow().value.clone();
        match value_snapshot {
            NodeValue::Paragraph => self.finalize_paragraph(node, end_line),
            NodeValue::CodeBlock(ref cb) if !cb.fenced => {
                let mut ast = node.data.borrow_mut();
                let trimmed = ast.string_content.trim_end_matches('\n').to_string();
                if let NodeValue::CodeBlock(ref mut cb) = ast.value {
                    cb.literal = if trimmed.is_empty() {
                        String::new()
                    } else {
                        format!("{}\n", trimmed)
                    };
                }
            }
            NodeValue::CodeBlock(ref cb) if cb.fenced => {
                let mut ast = node.data.borrow_mut();
                let content = ast.string_content.clone();
                if let NodeValue::CodeBlock(ref mut cb) = ast.value {
                    cb.literal = if content.is_empty() {
                        String::new()
                    } else {
                        format!("{}\n", content)
                    };
                }
            }
            NodeValue::Html(_) => {
                let mut ast = node.data.borrow_mut();
                let content = ast.string_content.clone();
                let literal = if content.is_empty() {
                    String::new()
                } else {
                    format!("{}\n", content)
                };
                ast.value = NodeValue::Html(literal);
            }
            NodeValue::List(_) => {
                let mut tight = true;
                let items: Vec<_> = node.children().collect();
                for (i, item) in items.iter().enumerate() {
                    let is_last = i + 1 == items.len();
                    if !is_last && (item.data.borrow().last_line_blank || item.ends_with_blank_line())
                    {
                        tight = false;
                        break;
                    }
                }
                let mut ast = node.data.borrow_mut();
                if let NodeValue::List(ref mut l) = ast.value {
                    l.tight = tight;
                }
            }
            _ => {}
        }

        parent
    }

    fn finalize_paragraph(&self, node: &'a AstNode<'a>, end_line: usize) {
        let mut content = node.data.borrow().string_content.clone();

        // Which drain loop runs is decided once, from the paragraph's
        // original leading byte, not recomputed after each strip -- the
        // original only ever tries one of the two prefixes per paragraph.
        let original = content.trim_start();
        let starts_as_reference = original.starts_with('[');
        let starts_as_include = !starts_as_reference && original.starts_with("<<");

        if starts_as_reference {
            loop {
                let trimmed = content.trim_start();
                if !trimmed.starts_with('[') {
                    break;
                }
                match crate::refmap::parse_one(trimmed) {
                    Some((label, reference, consumed)) => {
                        self.refmap.borrow_mut().insert(&label, reference);
                        content = trimmed[consumed..].to_string();
                    }
                    None => break,
                }
            }
        } else if starts_as_include {
            loop {
                let trimmed = content.trim_start();
                if !trimmed.starts_with("<<") {
                    break;
                }
                match include::parse_one(trimmed) {
                    Some((filename, consumed)) => {
                        let _ = include::add_include(self.arena, self.root, &filename, end_line);
                        content = trimmed[consumed..].to_string();
                    }
                    None => break,
                }
            }
        }

        if content.trim().is_empty() {
            unlink(node);
        } else {
            node.data.borrow_mut().string_content = content;
        }
    }

    fn finalize_document(&mut self) {
        let spine = self.spine();
        for node in spine.iter().rev() {
            if node.is_open() {
                self.finalize(node, self.line_number.max(1), self.last_line_length);
            }
        }
    }

    /// Invoke the inline pass (§2 "invoke inline parser") over every
    /// text-bearing leaf, coalescing adjacent text inlines when
    /// `options.normalize` is set (§6 `Normalize`).
    fn expand_inlines(&self) {
        fn walk(node: &AstNode, normalize: bool) {
            {
                let mut ast = node.data.borrow_mut();
                if matches!(ast.value, NodeValue::Paragraph | NodeValue::Header(_)) {
                    let expanded = inlines::expand(&ast.string_content);
                    ast.inlines = if normalize { inlines::coalesce(expanded) } else { expanded };
                }
            }
            for child in node.children() {
                walk(child, normalize);
            }
        }
        walk(self.root, self.options.normalize);
    }

    /// §7: a `debug_nodes`-only structural check. A violation indicates a
    /// bug in this crate, not in the input document, so it aborts rather
    /// than being absorbed the way ordinary parse "errors" are.
    fn check_invariants(&self) {
        fn walk(node: &AstNode, violations: &mut Vec<String>) {
            if node.is_open() {
                violations.push("node left open after finish".to_string());
            }
            for child in node.children() {
                if !can_contain(&node.data.borrow().value, &child.data.borrow().value) {
                    violations.push("can_contain failed for a parent/child edge".to_string());
                }
                walk(child, violations);
            }
        }
        let mut violations = Vec::new();
        walk(self.root, &mut violations);
        if let Some(first) = violations.into_iter().next() {
            let err = BlockTreeError::InvariantViolation(first);
            log::error!("{}", err);
            panic!("{}", err);
        }
    }
}

enum OpenOutcome<'a> {
    Container(&'a AstNode<'a>, usize),
    ClosedSetextOrHRule,
}

fn scan(line: &str, offset: usize) -> (usize, usize, bool) {
    let bytes = line.as_bytes();
    let mut i = offset.min(bytes.len());
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }
    let indent = i - offset;
    let blank = bytes.get(i) == Some(&b'\n');
    (i, indent, blank)
}

fn append_text<'a>(node: &'a AstNode<'a>, text: &str) {
    let mut ast = node.data.borrow_mut();
    if !ast.string_content.is_empty() {
        ast.string_content.push('\n');
    }
    ast.string_content.push_str(text);
}

fn strip_trailing_hashtags(text: &str) -> String {
    let trimmed = text.trim_end();
    if let Some(pos) = trimmed.rfind(|c: char| c != '#') {
        if trimmed[pos + 1..].starts_with('#') && trimmed[..=pos].ends_with(' ') {
            return trimmed[..=pos].trim_end().to_string();
        }
    } else if trimmed.chars().all(|c| c == '#') {
        return String::new();
    }
    trimmed.to_string()
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

/// Convenience one-shot parse (§6 `parse_document`).
pub fn parse_document<'a>(
    arena: &'a Arena<AstNode<'a>>,
    bytes: &[u8],
    options: ParserOptions,
) -> &'a AstNode<'a> {
    let mut parser = BlockParser::new(arena, options);
    parser.feed(bytes);
    parser.finish()
}

/// Convenience one-shot parse over a `Read` stream (§6 `parse_file`),
/// reading in 4 KiB chunks.
pub fn parse_file<'a, R: std::io::Read>(
    arena: &'a Arena<AstNode<'a>>,
    stream: &mut R,
    options: ParserOptions,
) -> std::io::Result<&'a AstNode<'a>> {
    let mut parser = BlockParser::new(arena, options);
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        parser.feed(&buf[..n]);
    }
    Ok(parser.finish())
}
