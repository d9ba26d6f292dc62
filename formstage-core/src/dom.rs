//! Arena-backed virtual DOM shared by the editor preview and the renderer.
//!
//! Nodes are addressed by [`NodeId`]; detached or removed nodes stay in the
//! arena so stale ids resolve to "gone" instead of dangling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element { tag: String },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub attrs: BTreeMap<String, String>,
    /// Live `value` property of form controls.
    pub value: Option<String>,
    /// Live `checked` property of checkboxes and radios.
    pub checked: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    removed: bool,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            attrs: BTreeMap::new(),
            value: None,
            checked: false,
            parent: None,
            children: Vec::new(),
            removed: false,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }
}

/// Declarative element description, materialized by [`Dom::create`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeConfig>,
}

impl NodeConfig {
    pub fn new(tag: impl Into<String>) -> Self {
        NodeConfig {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, child: NodeConfig) -> Self {
        self.children.push(child);
        self
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Deferred DOM mutation fired by [`Dom::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum TimerAction {
    RemoveClass { node: NodeId, class: String },
    AddClass { node: NodeId, class: String },
    SetAttr { node: NodeId, name: String, value: String },
    RemoveAttr { node: NodeId, name: String },
}

impl TimerAction {
    fn node(&self) -> NodeId {
        match self {
            TimerAction::RemoveClass { node, .. }
            | TimerAction::AddClass { node, .. }
            | TimerAction::SetAttr { node, .. }
            | TimerAction::RemoveAttr { node, .. } => *node,
        }
    }
}

#[derive(Debug, Clone)]
struct Timer {
    due: u64,
    action: TimerAction,
}

#[derive(Debug, Clone, Default)]
pub struct Dom {
    nodes: Vec<Node>,
    timers: Vec<Timer>,
    now: u64,
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).filter(|n| !n.removed)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).filter(|n| !n.removed)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::new(NodeKind::Element {
            tag: tag.to_string(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(Node::new(NodeKind::Text(text.to_string())))
    }

    /// Build a detached subtree from `config`.
    pub fn create(&mut self, config: &NodeConfig) -> NodeId {
        let id = self.create_element(&config.tag);
        for (k, v) in &config.attrs {
            self.set_attr(id, k, v);
        }
        if let Some(text) = &config.text {
            let t = self.create_text(text);
            self.append_child(id, t);
        }
        for child in &config.children {
            let c = self.create(child);
            self.append_child(id, c);
        }
        id
    }

    /// Build `config` and append it to `parent`.
    pub fn render(&mut self, config: &NodeConfig, parent: NodeId) -> NodeId {
        let id = self.create(config);
        self.append_child(parent, id);
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_child(parent, child, usize::MAX);
    }

    /// Insert `child` under `parent` at `index` (clamped), detaching it first.
    pub fn insert_child(&mut self, parent: NodeId, child: NodeId, index: usize) {
        if self.node(parent).is_none() || self.node(child).is_none() || parent == child {
            return;
        }
        self.detach(child);
        if let Some(p) = self.node_mut(parent) {
            let at = index.min(p.children.len());
            p.children.insert(at, child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Unlink `node` from its parent, keeping it alive.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
    }

    /// Detach `node` and mark its whole subtree as gone.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
        for id in self.descendants(node) {
            if let Some(n) = self.nodes.get_mut(id.0) {
                n.removed = true;
            }
        }
    }

    pub fn exists(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Element children only, skipping text nodes.
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|c| self.tag(*c).is_some())
            .collect()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.node(node)?.tag()
    }

    /// `node` followed by all its descendants, depth first.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(n) = self.node(id) else { continue };
            out.push(id);
            stack.extend(n.children.iter().rev().copied());
        }
        out
    }

    /// `node` and its ancestors, innermost first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = Some(node);
        while let Some(id) = cur {
            if !self.exists(id) {
                break;
            }
            out.push(id);
            cur = self.parent(id);
        }
        out
    }

    pub fn contains(&self, root: NodeId, node: NodeId) -> bool {
        self.ancestors(node).contains(&root)
    }

    pub fn get_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    // ─── Attributes and properties ───────────────────────────────────

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)?.attrs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(n) = self.node_mut(node) else { return };
        match name {
            "value" => n.value = Some(value.to_string()),
            "checked" => n.checked = true,
            _ => {}
        }
        n.attrs.insert(name.to_string(), value.to_string());
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(n) = self.node_mut(node) {
            n.attrs.remove(name);
        }
    }

    pub fn attrs(&self, node: NodeId) -> Option<&BTreeMap<String, String>> {
        self.node(node).map(|n| &n.attrs)
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .is_some_and(|c| c.split_whitespace().any(|x| x == class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) || !self.exists(node) {
            return;
        }
        let next = match self.attr(node, "class") {
            Some(c) if !c.is_empty() => format!("{} {}", c, class),
            _ => class.to_string(),
        };
        self.set_attr(node, "class", &next);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let Some(current) = self.attr(node, "class") else { return };
        let next: Vec<&str> = current.split_whitespace().filter(|c| *c != class).collect();
        let next = next.join(" ");
        if next.is_empty() {
            self.remove_attr(node, "class");
        } else {
            self.set_attr(node, "class", &next);
        }
    }

    /// Live value, falling back to the `value` attribute.
    pub fn value(&self, node: NodeId) -> Option<&str> {
        let n = self.node(node)?;
        n.value.as_deref().or_else(|| n.attrs.get("value").map(String::as_str))
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) {
        if let Some(n) = self.node_mut(node) {
            n.value = Some(value.to_string());
        }
    }

    pub fn checked(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|n| n.checked)
    }

    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        if let Some(n) = self.node_mut(node) {
            n.checked = checked;
        }
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.descendants(node)
            .into_iter()
            .filter_map(|id| match &self.node(id)?.kind {
                NodeKind::Text(t) => Some(t.as_str()),
                NodeKind::Element { .. } => None,
            })
            .collect()
    }

    /// Copy `node`'s subtree. Properties are copied along with attributes.
    pub fn deep_clone(&mut self, node: NodeId) -> Option<NodeId> {
        let source = self.node(node)?.clone();
        let copy = self.push(Node {
            parent: None,
            children: Vec::new(),
            ..source.clone()
        });
        for child in source.children {
            if let Some(c) = self.deep_clone(child) {
                self.append_child(copy, c);
            }
        }
        Some(copy)
    }

    // ─── Timers ──────────────────────────────────────────────────────

    /// Queue `action` to run `delay_ms` from now.
    pub fn schedule(&mut self, delay_ms: u64, action: TimerAction) {
        self.timers.push(Timer {
            due: self.now + delay_ms,
            action,
        });
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Move the clock forward and fire every due timer.
    ///
    /// A timer whose node has been removed is dropped without effect.
    pub fn advance(&mut self, ms: u64) -> usize {
        self.now += ms;
        let now = self.now;
        let (due, pending): (Vec<Timer>, Vec<Timer>) =
            std::mem::take(&mut self.timers).into_iter().partition(|t| t.due <= now);
        self.timers = pending;
        let mut fired = 0;
        for timer in due {
            if !self.exists(timer.action.node()) {
                continue;
            }
            match timer.action {
                TimerAction::RemoveClass { node, class } => self.remove_class(node, &class),
                TimerAction::AddClass { node, class } => self.add_class(node, &class),
                TimerAction::SetAttr { node, name, value } => self.set_attr(node, &name, &value),
                TimerAction::RemoveAttr { node, name } => self.remove_attr(node, &name),
            }
            fired += 1;
        }
        fired
    }
}
