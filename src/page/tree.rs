// Arena-backed element tree, built from HTML or by hand in tests.
use super::view::{NodeId, PageView, Rect, Segment};

pub const BASE_FONT_SIZE: f64 = 16.0;

#[derive(Debug, Clone)]
pub struct PageElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub segments: Vec<Segment>,
    pub rect: Rect,
    pub font_size: f64,
    pub hidden: bool,
}

#[derive(Debug, Clone)]
pub struct PageTree {
    nodes: Vec<PageElement>,
}

/// Builder for one element.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    tag: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    rect: Rect,
    font_size: Option<f64>,
    hidden: bool,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self { tag: tag.to_ascii_lowercase(), ..Default::default() }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        match self.attrs.iter_mut().find(|(k, _)| k == "class") {
            Some((_, v)) => {
                v.push(' ');
                v.push_str(class);
            }
            None => self.attrs.push(("class".into(), class.to_string())),
        }
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn font_size(mut self, px: f64) -> Self {
        self.font_size = Some(px);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

impl PageTree {
    /// Creates a tree whose root is described by `root`.
    pub fn new(root: ElementSpec) -> Self {
        let font_size = root.font_size.unwrap_or(BASE_FONT_SIZE);
        let segments = root.text.map(Segment::Text).into_iter().collect();
        Self {
            nodes: vec![PageElement {
                tag: root.tag,
                attrs: root.attrs,
                parent: None,
                children: Vec::new(),
                segments,
                rect: root.rect,
                font_size,
                hidden: root.hidden,
            }],
        }
    }

    /// Appends an element as the last child of `parent`. The font size is
    /// inherited when the spec leaves it unset.
    pub fn append(&mut self, parent: NodeId, spec: ElementSpec) -> NodeId {
        let id = self.nodes.len();
        let font_size = spec.font_size.unwrap_or(self.nodes[parent].font_size);
        let segments = spec.text.map(Segment::Text).into_iter().collect();
        self.nodes.push(PageElement {
            tag: spec.tag,
            attrs: spec.attrs,
            parent: Some(parent),
            children: Vec::new(),
            segments,
            rect: spec.rect,
            font_size,
            hidden: spec.hidden,
        });
        self.nodes[parent].children.push(id);
        self.nodes[parent].segments.push(Segment::Element(id));
        id
    }

    pub fn push_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node].segments.push(Segment::Text(text.to_string()));
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.nodes[node].rect = rect;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl PageView for PageTree {
    fn root(&self) -> NodeId {
        0
    }

    fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node].tag
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node]
            .attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    fn segments(&self, node: NodeId) -> &[Segment] {
        &self.nodes[node].segments
    }

    fn is_self_hidden(&self, node: NodeId) -> bool {
        self.nodes[node].hidden
    }

    fn bounding_box(&self, node: NodeId) -> Rect {
        self.nodes[node].rect
    }

    fn font_size(&self, node: NodeId) -> f64 {
        self.nodes[node].font_size
    }
}
