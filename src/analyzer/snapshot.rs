// Lightweight product snapshot: title, category, material and weight guesses.
use super::extract::find_title_anchor;
use crate::model::{Category, Confidence, IdentityError, ProductSnapshot};
use crate::normalizer::{canonical_url, product_id_from_canonical};
use crate::page::{NodeId, PageView};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Footwear,
        &["shoe", "shoes", "sneakers", "boots", "sandals", "sko", "skor", "sneaker", "stövlar", "kängor"],
    ),
    (
        Category::Clothing,
        &[
            "shirt", "t-shirt", "sweater", "jacket", "dress", "jeans", "trousers", "hoodie", "coat",
            "tröja", "jacka", "klänning", "byxor", "skjorta", "kofta", "rock",
        ],
    ),
    (
        Category::Electronics,
        &[
            "laptop", "phone", "headphones", "tv", "monitor", "camera", "tablet", "speaker",
            "dator", "mobil", "hörlurar", "skärm", "kamera", "högtalare",
        ],
    ),
    (
        Category::Furniture,
        &["sofa", "chair", "table", "bed", "shelf", "desk", "soffa", "stol", "bord", "säng", "hylla", "skrivbord"],
    ),
    (
        Category::Home,
        &["lamp", "pan", "pot", "mug", "towel", "rug", "lampa", "stekpanna", "kastrull", "mugg", "handduk", "matta"],
    ),
];

/// Keyword -> canonical material name.
const MATERIAL_KEYWORDS: &[(&str, &str)] = &[
    ("merino", "wool"),
    ("wool", "wool"),
    ("ull", "wool"),
    ("cotton", "cotton"),
    ("bomull", "cotton"),
    ("denim", "cotton"),
    ("polyester", "polyester"),
    ("nylon", "nylon"),
    ("linen", "linen"),
    ("linne", "linen"),
    ("silk", "silk"),
    ("siden", "silk"),
    ("leather", "leather"),
    ("läder", "leather"),
    ("skinn", "leather"),
    ("stainless steel", "steel"),
    ("steel", "steel"),
    ("stål", "steel"),
    ("aluminium", "aluminium"),
    ("aluminum", "aluminium"),
    ("plastic", "plastic"),
    ("plast", "plastic"),
    ("oak", "wood"),
    ("ek", "wood"),
    ("wood", "wood"),
    ("trä", "wood"),
    ("glass", "glass"),
    ("glas", "glass"),
    ("ceramic", "ceramic"),
    ("keramik", "ceramic"),
    ("porslin", "ceramic"),
];

/// A bare uppercase "G" needs a space before it, so "4G" and "5G" are not grams.
static WEIGHT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)(?:(?P<kg>\s*(?i:kg))|\s*g|\s+G)\b").unwrap()
});

fn default_material(category: Category) -> &'static str {
    match category {
        Category::Clothing => "cotton",
        Category::Footwear => "leather",
        Category::Electronics => "aluminium",
        Category::Furniture => "wood",
        Category::Home | Category::Other => "plastic",
    }
}

fn default_weight_kg(category: Category) -> f64 {
    match category {
        Category::Clothing => 0.5,
        Category::Footwear => 1.0,
        Category::Electronics => 1.5,
        Category::Furniture => 15.0,
        Category::Home | Category::Other => 1.0,
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .any(|token| token == word)
        || (word.contains(' ') && haystack.contains(word))
}

pub fn guess_category(text: &str) -> Category {
    let text = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| contains_word(&text, w)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

pub fn detect_material(text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    MATERIAL_KEYWORDS
        .iter()
        .find(|(keyword, _)| contains_word(&text, keyword))
        .map(|(_, material)| *material)
}

pub fn detect_weight_kg(text: &str) -> Option<f64> {
    let caps = WEIGHT_REGEX.captures(text)?;
    let value: f64 = caps[1].replace(',', ".").parse().ok()?;
    if value <= 0.0 {
        return None;
    }
    if caps.name("kg").is_some() { Some(value) } else { Some(value / 1000.0) }
}

fn meta_content<V: PageView>(view: &V, nodes: &[NodeId], key: &str) -> Option<String> {
    nodes.iter().find_map(|&n| {
        let matches = ["property", "name"]
            .iter()
            .any(|a| view.attr(n, a).is_some_and(|v| v.eq_ignore_ascii_case(key)));
        if matches { view.attr(n, "content").map(str::to_string) } else { None }
    })
}

pub fn page_title<V: PageView>(view: &V) -> String {
    let root = view.root();
    let nodes: Vec<NodeId> = std::iter::once(root).chain(view.descendants(root)).collect();
    find_title_anchor(view)
        .map(|n| view.text_content(n))
        .or_else(|| meta_content(view, &nodes, "og:title"))
        .or_else(|| {
            nodes
                .iter()
                .find(|&&n| view.tag(n) == "title")
                .map(|&n| view.text_content(n))
        })
        .unwrap_or_default()
}

/// Builds the snapshot for the page currently shown at `url`.
pub fn build_snapshot<V: PageView>(
    view: &V,
    url: &str,
    now: DateTime<Utc>,
) -> Result<ProductSnapshot, IdentityError> {
    let canonical = canonical_url(url)?;
    let product_id = product_id_from_canonical(&canonical);

    let root = view.root();
    let nodes: Vec<NodeId> = std::iter::once(root).chain(view.descendants(root)).collect();
    let title = page_title(view);
    let description = meta_content(view, &nodes, "description")
        .or_else(|| meta_content(view, &nodes, "og:description"))
        .unwrap_or_default();
    let breadcrumbs: Vec<String> = nodes
        .iter()
        .filter(|&&n| {
            view.class_or_id_contains(n, "breadcrumb")
                || view.attr(n, "aria-label").is_some_and(|l| l.to_lowercase().contains("breadcrumb"))
        })
        .map(|&n| view.text_content(n))
        .collect();

    let classification_text = format!("{} {} {}", title, breadcrumbs.join(" "), description);
    let category = guess_category(&classification_text);

    let body = nodes.iter().copied().find(|&n| view.tag(n) == "body").unwrap_or(root);
    let body_text = view.text_content(body);
    let detected = detect_material(&classification_text).or_else(|| detect_material(&body_text));
    let material = detected.unwrap_or_else(|| default_material(category)).to_string();

    let weight_kg = detect_weight_kg(&classification_text)
        .or_else(|| detect_weight_kg(&body_text))
        .unwrap_or_else(|| default_weight_kg(category));

    Ok(ProductSnapshot {
        title,
        url: url.to_string(),
        canonical_url: canonical,
        product_id,
        category,
        material,
        material_detected: detected.is_some(),
        weight_kg,
        confidence: if detected.is_some() { Confidence::Medium } else { Confidence::Low },
        updated_at: now.timestamp_millis(),
    })
}
