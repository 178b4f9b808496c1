// Static HTML -> PageTree with synthesized layout
use super::tree::{BASE_FONT_SIZE, ElementSpec, PageTree};
use super::view::{NodeId, PageView, Rect};
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;

/// Elements that never render but are kept for metadata lookups.
const NON_RENDERED: &[&str] = &[
    "head", "script", "style", "noscript", "template", "meta", "link", "title", "svg",
];

const LINE_GAP: f64 = 4.0;
const CHAR_WIDTH_RATIO: f64 = 0.55;
const LINE_HEIGHT_RATIO: f64 = 1.2;

static FONT_SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)font-size\s*:\s*([\d.]+)\s*(px|rem|em|pt)").unwrap()
});

static HIDDEN_STYLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)display\s*:\s*none|visibility\s*:\s*hidden|opacity\s*:\s*0(?:\.0+)?\s*(?:;|$)")
        .unwrap()
});

impl PageTree {
    /// Parses a document and lays it out as a single column: every element
    /// with its own text takes one line, containers span their children.
    pub fn from_html(html: &str) -> PageTree {
        let document = Html::parse_document(html);
        let root_el = document.root_element();

        let mut tree = PageTree::new(element_spec(root_el, BASE_FONT_SIZE));
        append_content(&mut tree, 0, root_el);

        let mut cursor_y = 0.0;
        layout(&mut tree, 0, &mut cursor_y);
        tree
    }
}

fn element_spec(el: ElementRef, inherited_font: f64) -> ElementSpec {
    let value = el.value();
    let tag = value.name();
    let mut spec = ElementSpec::new(tag);
    for (name, attr) in value.attrs() {
        spec = spec.attr(name, attr);
    }

    let style = value.attr("style").unwrap_or("");
    let hidden = NON_RENDERED.contains(&tag)
        || value.attr("hidden").is_some()
        || value.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
        || HIDDEN_STYLE_REGEX.is_match(style);
    if hidden {
        spec = spec.hidden();
    }

    spec.font_size(font_size_for(tag, style, inherited_font))
}

fn font_size_for(tag: &str, style: &str, inherited: f64) -> f64 {
    if let Some(caps) = FONT_SIZE_REGEX.captures(style) {
        if let Ok(n) = caps[1].parse::<f64>() {
            return match caps[2].to_ascii_lowercase().as_str() {
                "px" => n,
                "em" => n * inherited,
                "rem" => n * BASE_FONT_SIZE,
                _ => n * 4.0 / 3.0,
            };
        }
    }
    match tag {
        "h1" => 32.0,
        "h2" => 24.0,
        "h3" => 18.72,
        "small" => inherited * 0.833,
        _ => inherited,
    }
}

fn append_content(tree: &mut PageTree, parent: NodeId, el: ElementRef) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => tree.push_text(parent, text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    let spec = element_spec(child_el, tree.font_size(parent));
                    let id = tree.append(parent, spec);
                    append_content(tree, id, child_el);
                }
            }
            _ => {}
        }
    }
}

fn layout(tree: &mut PageTree, node: NodeId, cursor_y: &mut f64) -> Rect {
    if tree.is_self_hidden(node) {
        return Rect::default();
    }

    let own = tree.own_text(node);
    let mut rect = if own.is_empty() {
        Rect::default()
    } else {
        let font = tree.font_size(node);
        let height = font * LINE_HEIGHT_RATIO;
        let width = own.chars().count() as f64 * font * CHAR_WIDTH_RATIO;
        let line = Rect::new(0.0, *cursor_y, width, height);
        *cursor_y += height + LINE_GAP;
        line
    };

    let children = tree.children(node).to_vec();
    for child in children {
        let child_rect = layout(tree, child, cursor_y);
        rect = rect.union(&child_rect);
    }

    tree.set_rect(node, rect);
    rect
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>Shop</title>
          <meta property="product:price:amount" content="499.00">
        </head>
        <body>
          <h1>Wool sweater</h1>
          <div class="price-box"><span class="price">1 299</span> <span>kr</span></div>
          <p style="font-size: 10px">Fri frakt</p>
          <div style="display:none"><span>99 kr</span></div>
          <input type="hidden" value="1">
        </body></html>
    "#;

    fn find(tree: &PageTree, pred: impl Fn(NodeId) -> bool) -> NodeId {
        std::iter::once(0)
            .chain(tree.descendants(0))
            .find(|&n| pred(n))
            .expect("node not found")
    }

    #[test]
    fn test_builds_tags_and_text() {
        let tree = PageTree::from_html(PAGE);
        assert_eq!(tree.tag(0), "html");
        let h1 = find(&tree, |n| tree.tag(n) == "h1");
        assert_eq!(tree.text_content(h1), "Wool sweater");
        let price_box = find(&tree, |n| tree.has_class(n, "price-box"));
        assert_eq!(tree.text_content(price_box), "1 299 kr");
    }

    #[test]
    fn test_font_sizes() {
        let tree = PageTree::from_html(PAGE);
        let h1 = find(&tree, |n| tree.tag(n) == "h1");
        let p = find(&tree, |n| tree.tag(n) == "p");
        let span = find(&tree, |n| tree.has_class(n, "price"));
        assert_eq!(tree.font_size(h1), 32.0);
        assert_eq!(tree.font_size(p), 10.0);
        assert_eq!(tree.font_size(span), BASE_FONT_SIZE);
    }

    #[test]
    fn test_hidden_elements_are_invisible_but_kept() {
        let tree = PageTree::from_html(PAGE);
        let meta = find(&tree, |n| tree.tag(n) == "meta");
        assert_eq!(tree.attr(meta, "content"), Some("499.00"));
        assert!(!tree.is_visible(meta));

        let hidden_span = find(&tree, |n| tree.tag(n) == "span" && tree.own_text(n) == "99 kr");
        assert!(!tree.is_visible(hidden_span));
    }

    #[test]
    fn test_layout_is_single_column_in_document_order() {
        let tree = PageTree::from_html(PAGE);
        let h1 = find(&tree, |n| tree.tag(n) == "h1");
        let price = find(&tree, |n| tree.has_class(n, "price"));
        let price_box = find(&tree, |n| tree.has_class(n, "price-box"));

        let h1_box = tree.bounding_box(h1);
        let price_rect = tree.bounding_box(price);
        assert!(tree.is_visible(h1) && tree.is_visible(price));
        assert!(price_rect.y > h1_box.y);
        assert!(tree.bounding_box(price_box).contains(1.0, price_rect.y + 1.0));
    }

    #[test]
    fn test_font_size_units() {
        assert_eq!(font_size_for("div", "font-size: 2em", 10.0), 20.0);
        assert_eq!(font_size_for("div", "font-size:1.5rem", 10.0), 24.0);
        assert_eq!(font_size_for("div", "color: red", 14.0), 14.0);
    }
}
