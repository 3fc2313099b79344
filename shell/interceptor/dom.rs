/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Minimal page document and pointer-event model.
//!
//! Only what link resolution needs: a parent-linked element arena with
//! attributes, the document URL for resolving relative destinations, and the
//! per-dispatch flow flags handlers use to cancel or stop an event.

use std::collections::BTreeMap;
use std::time::Instant;

use url::Url;

/// SPA convention: a non-anchor element whose destination lives here.
pub const DATA_HREF_ATTRIBUTE: &str = "data-href";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    parent: Option<NodeId>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn is_anchor(&self) -> bool {
        self.tag.eq_ignore_ascii_case("a")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Anchor,
    DataHref,
}

/// The nearest link found above an event target, destination resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub node: NodeId,
    pub kind: LinkKind,
    pub destination: Url,
    pub target: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    url: Url,
    nodes: Vec<Element>,
}

impl Document {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            nodes: vec![Element {
                tag: "body".to_string(),
                attributes: BTreeMap::new(),
                parent: None,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Append a child element. Unknown parents fall back to the root.
    pub fn append(&mut self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let parent = if parent.0 < self.nodes.len() {
            parent
        } else {
            log::debug!("dom: unknown parent {parent:?}; appending under root");
            NodeId::ROOT
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(Element {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            parent: Some(parent),
        });
        id
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0)
    }

    /// `node` followed by each of its ancestors up to the root.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = (NodeId, &Element)> + '_ {
        let mut next = self.element(node).map(|_| node);
        std::iter::from_fn(move || {
            let id = next?;
            let element = self.element(id)?;
            next = element.parent;
            Some((id, element))
        })
    }

    /// Nearest anchor or `data-href` element at or above `node` whose
    /// destination resolves against the document URL.
    pub fn closest_link(&self, node: NodeId) -> Option<LinkTarget> {
        self.ancestors(node).find_map(|(id, element)| {
            let (kind, raw) = if element.is_anchor() {
                (LinkKind::Anchor, element.attribute("href"))
            } else {
                (LinkKind::DataHref, element.attribute(DATA_HREF_ATTRIBUTE))
            };
            let destination = self.url.join(raw?.trim()).ok()?;
            Some(LinkTarget {
                node: id,
                kind,
                destination,
                target: element.attribute("target").map(str::to_owned),
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PointerDown,
    MouseDown,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Auxiliary,
    Secondary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        meta: false,
        shift: false,
    };

    /// Any modifier the browser maps to new-tab or new-window.
    pub fn any_held(self) -> bool {
        self.ctrl || self.meta || self.shift
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DomEvent {
    pub kind: EventKind,
    pub target: NodeId,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    pub time_stamp: Instant,
}

/// Cancellation state of one event dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFlow {
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
}

impl EventFlow {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Also skips listeners registered later on the same target.
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped
    }
}
