// The element-tree capability that extraction runs against.

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Rect::new(x, y, right - x, bottom - y)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        !self.is_empty()
            && x >= self.x
            && x <= self.x + self.width
            && y >= self.y
            && y <= self.y + self.height
    }

    /// Gap between the closest edges; 0 when the boxes touch or overlap.
    pub fn distance_to(&self, other: &Rect) -> f64 {
        let dx = (other.x - (self.x + self.width)).max(self.x - (other.x + other.width)).max(0.0);
        let dy = (other.y - (self.y + self.height)).max(self.y - (other.y + other.height)).max(0.0);
        dx.hypot(dy)
    }
}

/// Element content in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Element(NodeId),
}

/// A tree of elements exposing what the price heuristics need: visibility,
/// geometry, computed font size, text and ancestry.
pub trait PageView {
    fn root(&self) -> NodeId;
    fn tag(&self, node: NodeId) -> &str;
    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> &[NodeId];
    fn segments(&self, node: NodeId) -> &[Segment];
    /// Hidden by this element's own attributes or style, ignoring ancestors.
    fn is_self_hidden(&self, node: NodeId) -> bool;
    fn bounding_box(&self, node: NodeId) -> Rect;
    fn font_size(&self, node: NodeId) -> f64;

    fn own_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        for segment in self.segments(node) {
            if let Segment::Text(t) = segment {
                out.push_str(t);
            }
        }
        collapse_whitespace(&out)
    }

    /// Text of the element and all its descendants, whitespace collapsed.
    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        collect_text(self, node, &mut out);
        collapse_whitespace(&out)
    }

    fn is_visible(&self, node: NodeId) -> bool {
        if self.bounding_box(node).is_empty() {
            return false;
        }
        let mut current = Some(node);
        while let Some(n) = current {
            if self.is_self_hidden(n) {
                return false;
            }
            current = self.parent(n);
        }
        true
    }

    /// Ancestors nearest first, not including `node`.
    fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(node);
        while let Some(n) = current {
            out.push(n);
            current = self.parent(n);
        }
        out
    }

    /// First of `node` and its ancestors matching `pred`.
    fn closest(&self, node: NodeId, pred: &dyn Fn(NodeId) -> bool) -> Option<NodeId> {
        if pred(node) {
            return Some(node);
        }
        self.ancestors(node).into_iter().find(|&n| pred(n))
    }

    /// Descendants in document order, not including `node`.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .map(|c| c.split_whitespace().any(|c| c.eq_ignore_ascii_case(class)))
            .unwrap_or(false)
    }

    /// Case-insensitive substring match on the `class` and `id` attributes.
    fn class_or_id_contains(&self, node: NodeId, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        ["class", "id"].iter().any(|name| {
            self.attr(node, name)
                .map(|v| v.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
    }

    /// Deepest visible element whose box contains the point.
    fn element_at(&self, x: f64, y: f64) -> Option<NodeId> {
        let root = self.root();
        let mut hit = None;
        for node in std::iter::once(root).chain(self.descendants(root)) {
            if self.bounding_box(node).contains(x, y) && self.is_visible(node) {
                hit = Some(node);
            }
        }
        hit
    }
}

fn collect_text<V: PageView + ?Sized>(view: &V, node: NodeId, out: &mut String) {
    for segment in view.segments(node) {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Element(child) => {
                out.push(' ');
                collect_text(view, *child, out);
                out.push(' ');
            }
        }
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
