//! Owned, mutable HTML document.
//!
//! Email HTML is routinely malformed: unclosed cells, stray `</div>`s, bodies
//! without `<html>`. Parsing goes through html5ever's HTML5 tree builder, which
//! never fails and always produces `html`/`head`/`body`, so every caller gets a
//! well-formed tree to work with.
//!
//! The tree is an [`RcDom`]: nodes are reference-counted with interior
//! mutability, so the adapter can rewrite text, attributes, and siblings in
//! place while holding plain [`Handle`]s handed out by the detector.
//!
//! Helpers here are free functions over [`Handle`] so detector predicates can
//! be plain `fn(&Handle) -> bool` values.

use html5ever::parse_document;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use markup5ever::Attribute;
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::Rc;

/// A parsed document owned by a single adapt call.
pub struct Document {
    dom: RcDom,
}

impl Document {
    /// Parse leniently. Never fails.
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        Self { dom }
    }

    pub fn root(&self) -> &Handle {
        &self.dom.document
    }

    /// The `<body>` element. The HTML5 tree builder always creates one.
    pub fn body(&self) -> Option<Handle> {
        self.elements().into_iter().find(|n| is_tag(n, "body"))
    }

    /// Every element in document order.
    pub fn elements(&self) -> Vec<Handle> {
        descendants(&self.dom.document)
    }

    /// Remove every comment node in the document.
    pub fn strip_comments(&self) {
        strip_comments(&self.dom.document);
    }

    /// Serialize the whole document, doctype included.
    pub fn to_html(&self) -> String {
        write_node(&self.dom.document, TraversalScope::ChildrenOnly(None))
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// All element descendants of `node` in document (pre-)order.
pub fn descendants(node: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    collect_elements(node, &mut out);
    out
}

fn collect_elements(node: &Handle, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if matches!(child.data, NodeData::Element { .. }) {
            out.push(child.clone());
        }
        collect_elements(child, out);
    }
}

/// Direct element children, skipping text and comments.
pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|c| matches!(c.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take()?;
    let parent = weak.upgrade();
    node.parent.set(Some(weak));
    parent
}

/// Up to `levels` ancestors, nearest first.
pub fn ancestors(node: &Handle, levels: usize) -> Vec<Handle> {
    let mut out = Vec::with_capacity(levels);
    let mut current = parent(node);
    while let Some(p) = current {
        if out.len() == levels {
            break;
        }
        current = parent(&p);
        out.push(p);
    }
    out
}

/// Whether any ancestor of `node` satisfies `predicate`.
pub fn has_ancestor(node: &Handle, predicate: impl Fn(&Handle) -> bool) -> bool {
    let mut current = parent(node);
    while let Some(p) = current {
        if predicate(&p) {
            return true;
        }
        current = parent(&p);
    }
    false
}

// ============================================================================
// Element accessors
// ============================================================================

/// Local tag name, as parsed (html5ever lower-cases HTML tag names).
pub fn tag_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

pub fn is_tag(node: &Handle, tag: &str) -> bool {
    tag_name(node).is_some_and(|t| t.eq_ignore_ascii_case(tag))
}

fn find_attr<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attrs.iter().find(|a| a.name.local.as_ref() == name)
}

pub fn attr(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            find_attr(&attrs.borrow(), name).map(|a| a.value.to_string())
        }
        _ => None,
    }
}

/// Overwrite an existing attribute. Returns `false` if the node has no such
/// attribute (or is not an element).
pub fn set_attr(node: &Handle, name: &str, value: &str) -> bool {
    let NodeData::Element { attrs, .. } = &node.data else {
        return false;
    };
    let mut attrs = attrs.borrow_mut();
    match attrs.iter_mut().find(|a| a.name.local.as_ref() == name) {
        Some(a) => {
            a.value = StrTendril::from_slice(value);
            true
        }
        None => false,
    }
}

/// Concatenated text of all descendant text nodes.
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text(node: &Handle, out: &mut String) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => collect_text(child, out),
            _ => {}
        }
    }
}

/// Replace all children with a single text node.
pub fn set_text(node: &Handle, text: &str) {
    let fresh = text_node(text);
    for old in node.children.borrow().iter() {
        old.parent.set(None);
    }
    fresh.parent.set(Some(Rc::downgrade(node)));
    *node.children.borrow_mut() = vec![fresh];
}

// ============================================================================
// Tree mutation
// ============================================================================

pub fn text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// Parse a snippet and return its first top-level element, detached and
/// ready to be inserted into another document.
pub fn element_from_html(html: &str) -> Option<Handle> {
    let scratch = Document::parse(html);
    let body = scratch.body()?;
    let first = element_children(&body).into_iter().next()?;
    detach(&first);
    Some(first)
}

pub fn detach(node: &Handle) {
    if let Some(p) = parent(node) {
        p.children.borrow_mut().retain(|c| !Rc::ptr_eq(c, node));
    }
    node.parent.set(None);
}

pub fn prepend_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().insert(0, child);
}

/// Insert `new` as a sibling immediately before (`after == false`) or after
/// `anchor`. No-op when `anchor` is detached.
fn insert_sibling(anchor: &Handle, new: Handle, after: bool) {
    let Some(p) = parent(anchor) else {
        return;
    };
    let mut children = p.children.borrow_mut();
    let Some(pos) = children.iter().position(|c| Rc::ptr_eq(c, anchor)) else {
        return;
    };
    new.parent.set(Some(Rc::downgrade(&p)));
    children.insert(if after { pos + 1 } else { pos }, new);
}

pub fn insert_before(anchor: &Handle, new: Handle) {
    insert_sibling(anchor, new, false);
}

pub fn insert_after(anchor: &Handle, new: Handle) {
    insert_sibling(anchor, new, true);
}

fn strip_comments(node: &Handle) {
    node.children
        .borrow_mut()
        .retain(|c| !matches!(c.data, NodeData::Comment { .. }));
    for child in node.children.borrow().iter() {
        strip_comments(child);
    }
}

/// Replace every literal occurrence of `find` in text nodes and attribute
/// values under `node`. Returns the number of occurrences replaced.
pub fn replace_literal(node: &Handle, find: &str, replace: &str) -> usize {
    if find.is_empty() {
        return 0;
    }
    let mut count = 0;
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => {
                let hits = contents.borrow().matches(find).count();
                if hits > 0 {
                    let updated = contents.borrow().replace(find, replace);
                    *contents.borrow_mut() = StrTendril::from(updated);
                    count += hits;
                }
            }
            NodeData::Element { attrs, .. } => {
                for a in attrs.borrow_mut().iter_mut() {
                    let hits = a.value.matches(find).count();
                    if hits > 0 {
                        a.value = StrTendril::from(a.value.replace(find, replace));
                        count += hits;
                    }
                }
                count += replace_literal(child, find, replace);
            }
            _ => {}
        }
    }
    count
}

// ============================================================================
// Serialization
// ============================================================================

pub fn outer_html(node: &Handle) -> String {
    write_node(node, TraversalScope::IncludeNode)
}

pub fn inner_html(node: &Handle) -> String {
    write_node(node, TraversalScope::ChildrenOnly(None))
}

fn write_node(node: &Handle, scope: TraversalScope) -> String {
    let mut bytes = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };
    if let Err(e) = serialize(&mut bytes, &handle, opts) {
        tracing::warn!(error = %e, "failed to serialize node");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
