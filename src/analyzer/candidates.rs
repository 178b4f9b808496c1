// Candidate collection and scoring: picks "the price a human would see" on a page.
use crate::model::PriceCandidate;
use crate::page::{NodeId, PageView, Rect};
use crate::parser::{has_currency_marker, parse_price};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;
use tracing::debug;

/// Longest element text still treated as a single price.
pub const MAX_PRICE_TEXT_LEN: usize = 80;
/// Parent text up to this length is read as a label attached to the price.
const MAX_LABEL_LEN: usize = 24;

const TESTING_HOOK_ATTRS: &[&str] = &["data-testid", "data-test", "data-test-id", "data-qa", "data-automation"];
const GENERIC_TAGS: &[&str] = &["span", "div", "p", "strong", "b", "em", "ins", "bdi", "dd", "td", "data"];
const BANNED_TAGS: &[&str] = &["nav", "header", "footer", "aside", "dialog"];
const BANNED_ROLES: &[&str] = &["navigation", "banner", "contentinfo", "complementary", "dialog", "alertdialog"];

/// Additive weights used by the scorer. Each signal is independent so it can
/// be tuned and tested on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Bonus for touching the title anchor; decays with pixel distance.
    pub anchor_proximity: f64,
    /// Distance at which the proximity bonus has halved.
    pub proximity_half_distance: f64,
    /// Bonus at or above `font_size_ceiling`, scaled linearly from `font_size_floor`.
    pub font_size: f64,
    pub font_size_floor: f64,
    pub font_size_ceiling: f64,
    /// Sale/discount wording on or around the element.
    pub sale_language: f64,
    /// Inside `main`, `article` or a product-ish container.
    pub product_container: f64,
    /// Applied below `min_plausible_value`; small figures tend to be fees.
    pub small_value_penalty: f64,
    pub min_plausible_value: f64,
    pub testing_hook: f64,
    pub itemprop: f64,
    pub price_class: f64,
}

pub const DEFAULT_WEIGHTS: ScoreWeights = ScoreWeights {
    anchor_proximity: 40.0,
    proximity_half_distance: 150.0,
    font_size: 20.0,
    font_size_floor: 12.0,
    font_size_ceiling: 36.0,
    sale_language: 10.0,
    product_container: 15.0,
    small_value_penalty: 30.0,
    min_plausible_value: 20.0,
    testing_hook: 12.0,
    itemprop: 10.0,
    price_class: 5.0,
};

impl Default for ScoreWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

/// Which selector class surfaced an element, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SelectorClass {
    TestingHook,
    Itemprop,
    PriceClass,
    Generic,
}

impl SelectorClass {
    fn bonus(&self, weights: &ScoreWeights) -> f64 {
        match self {
            SelectorClass::TestingHook => weights.testing_hook,
            SelectorClass::Itemprop => weights.itemprop,
            SelectorClass::PriceClass => weights.price_class,
            SelectorClass::Generic => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub node: NodeId,
    pub candidate: PriceCandidate,
    pub score: f64,
    pub class: SelectorClass,
}

/// Removed before matching so "inkl. moms" next to a real price doesn't disqualify it.
static INCLUDED_TAX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:inkl|incl|inc|including|inclusive)\.?\s*(?:moms|vat|tax|mva)\b").unwrap()
});

static INSTALLMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)/\s*(?:mån|mnd|mo|month)\b|\bper\s+(?:månad|mån|month)\b|\bmånad|\bmonthly\b|\binstall?ments?\b|\bdelbetal|\bavbetalning|\bräntefri|\bfinancing\b|\bx\s*\d+\s*(?:mån|months?)\b",
    )
    .unwrap()
});

static FEE_OR_TOTAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bfrakt|\bshipping\b|\bdelivery\b|\bleverans|\bporto\b|\bfees?\b|\bavgift|\bsubtotal\b|\btotalt?\b|\bdelsumma\b|\bsumma\b|\btax\b|\bvat\b|\bmoms\b",
    )
    .unwrap()
});

static SALE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:sale|rea|reapris|kampanj|kampanjpris|erbjudande|deal|save|spara|nu|now|discount|rabatt)\b|-\s*\d+\s*%",
    )
    .unwrap()
});

const SALE_CLASS_HINTS: &[&str] = &["sale", "discount", "campaign", "special", "offer", "reduced"];

/// Installment, shipping/fee or tax/total language.
pub fn is_bad_context(text: &str) -> bool {
    let stripped = INCLUDED_TAX_REGEX.replace_all(text, " ");
    INSTALLMENT_REGEX.is_match(&stripped) || FEE_OR_TOTAL_REGEX.is_match(&stripped)
}

fn classify<V: PageView>(view: &V, node: NodeId) -> Option<SelectorClass> {
    let hooked = TESTING_HOOK_ATTRS.iter().any(|a| {
        view.attr(node, a).is_some_and(|v| v.to_ascii_lowercase().contains("price"))
    });
    if hooked {
        return Some(SelectorClass::TestingHook);
    }
    if view.attr(node, "itemprop").is_some_and(|v| v.eq_ignore_ascii_case("price")) {
        return Some(SelectorClass::Itemprop);
    }
    if view.class_or_id_contains(node, "price") {
        return Some(SelectorClass::PriceClass);
    }
    if GENERIC_TAGS.contains(&view.tag(node)) {
        return Some(SelectorClass::Generic);
    }
    None
}

/// Elements under `root` that may hold a price, in document order.
pub fn gather_elements<V: PageView>(view: &V, root: NodeId) -> Vec<(NodeId, SelectorClass)> {
    std::iter::once(root)
        .chain(view.descendants(root))
        .filter_map(|n| classify(view, n).map(|c| (n, c)))
        .collect()
}

pub fn in_banned_region<V: PageView>(view: &V, node: NodeId) -> bool {
    view.closest(node, &|n| {
        BANNED_TAGS.contains(&view.tag(n))
            || view
                .attr(n, "role")
                .is_some_and(|r| BANNED_ROLES.contains(&r.to_ascii_lowercase().as_str()))
            || view.attr(n, "aria-modal").is_some_and(|v| v == "true")
            || view.class_or_id_contains(n, "modal")
    })
    .is_some()
}

fn in_product_container<V: PageView>(view: &V, node: NodeId) -> bool {
    view.closest(node, &|n| {
        matches!(view.tag(n), "main" | "article")
            || view.attr(n, "role").is_some_and(|r| r.eq_ignore_ascii_case("main"))
            || view.attr(n, "itemtype").is_some_and(|t| t.contains("Product"))
            || view.class_or_id_contains(n, "product")
    })
    .is_some()
}

/// Short digit-free parent text reads as a label on this price, e.g. "/mån".
fn attached_label<V: PageView>(view: &V, node: NodeId, text: &str) -> Option<String> {
    let parent = view.parent(node)?;
    let parent_text = view.text_content(parent);
    let rest = parent_text.replacen(text, "", 1);
    let rest = rest.trim();
    let is_label = !rest.is_empty()
        && rest.chars().count() <= MAX_LABEL_LEN
        && !rest.chars().any(|c| c.is_ascii_digit());
    is_label.then(|| rest.to_string())
}

fn sale_nearby<V: PageView>(view: &V, node: NodeId, text: &str, label: Option<&str>) -> bool {
    if SALE_REGEX.is_match(text) || label.is_some_and(|l| SALE_REGEX.is_match(l)) {
        return true;
    }
    std::iter::once(node)
        .chain(view.parent(node))
        .any(|n| SALE_CLASS_HINTS.iter().any(|hint| view.class_or_id_contains(n, hint)))
}

fn proximity_score(weights: &ScoreWeights, anchor: Option<Rect>, rect: &Rect) -> f64 {
    match anchor {
        Some(anchor) => {
            let distance = anchor.distance_to(rect);
            weights.anchor_proximity * weights.proximity_half_distance
                / (weights.proximity_half_distance + distance)
        }
        None => 0.0,
    }
}

fn font_score(weights: &ScoreWeights, font_size: f64) -> f64 {
    let span = weights.font_size_ceiling - weights.font_size_floor;
    if span <= 0.0 {
        return 0.0;
    }
    weights.font_size * ((font_size - weights.font_size_floor) / span).clamp(0.0, 1.0)
}

fn evaluate<V: PageView>(
    view: &V,
    node: NodeId,
    class: SelectorClass,
    anchor: Option<Rect>,
    weights: &ScoreWeights,
) -> Option<ScoredCandidate> {
    if !view.is_visible(node) || in_banned_region(view, node) {
        return None;
    }

    let text = view.text_content(node);
    if text.is_empty() || text.chars().count() > MAX_PRICE_TEXT_LEN || !has_currency_marker(&text) {
        return None;
    }
    if is_bad_context(&text) {
        debug!("Rejected '{}': bad context", text);
        return None;
    }
    let label = attached_label(view, node, &text);
    if label.as_deref().is_some_and(is_bad_context) {
        debug!("Rejected '{}': bad context label {:?}", text, label);
        return None;
    }

    let candidate = parse_price(&text)?;
    let rect = view.bounding_box(node);

    let mut score = class.bonus(weights);
    score += proximity_score(weights, anchor, &rect);
    score += font_score(weights, view.font_size(node));
    if sale_nearby(view, node, &text, label.as_deref()) {
        score += weights.sale_language;
    }
    if in_product_container(view, node) {
        score += weights.product_container;
    }
    if candidate.value < weights.min_plausible_value {
        score -= weights.small_value_penalty;
    }

    debug!("Candidate '{}' -> {:.1} ({:?}) score {:.2}", text, candidate.value, class, score);
    Some(ScoredCandidate { node, candidate, score, class })
}

/// Scores every surviving candidate under `root`. Generic containers are only
/// consulted when no price-specific element survives.
pub fn collect_candidates<V: PageView>(
    view: &V,
    root: NodeId,
    anchor: Option<NodeId>,
    weights: &ScoreWeights,
) -> Vec<ScoredCandidate> {
    let anchor_rect = anchor.map(|a| view.bounding_box(a)).filter(|r| !r.is_empty());
    let gathered = gather_elements(view, root);

    let specific: Vec<ScoredCandidate> = gathered
        .iter()
        .filter(|(_, class)| *class != SelectorClass::Generic)
        .filter_map(|&(node, class)| evaluate(view, node, class, anchor_rect, weights))
        .collect();
    if !specific.is_empty() {
        return specific;
    }

    gathered
        .iter()
        .filter(|(_, class)| *class == SelectorClass::Generic)
        .filter_map(|&(node, class)| evaluate(view, node, class, anchor_rect, weights))
        .collect()
}

/// Highest score wins; equal scores prefer the larger figure.
pub fn select_best(candidates: Vec<ScoredCandidate>) -> Option<ScoredCandidate> {
    candidates.into_iter().max_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                a.candidate
                    .value
                    .partial_cmp(&b.candidate.value)
                    .unwrap_or(Ordering::Equal)
            })
    })
}

pub fn best_candidate<V: PageView>(
    view: &V,
    root: NodeId,
    anchor: Option<NodeId>,
    weights: &ScoreWeights,
) -> Option<ScoredCandidate> {
    select_best(collect_candidates(view, root, anchor, weights))
}
