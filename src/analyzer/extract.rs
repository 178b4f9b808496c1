// Full extraction pipeline: scored DOM candidates, structured metadata, body text fallback.
use super::candidates::{MAX_PRICE_TEXT_LEN, ScoreWeights, best_candidate, in_banned_region, is_bad_context};
use crate::model::{Currency, PriceCandidate};
use crate::page::{NodeId, PageView};
use crate::parser::structured::{MetadataPrice, MetadataSource};
use crate::parser::{ParseOptions, extract_metadata_price, parse_price_with};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Relative gap above which DOM and metadata are considered to disagree.
pub const METADATA_DISAGREEMENT_RATIO: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtractionSource {
    #[serde(rename = "dom")]
    Dom,
    #[serde(rename = "dom+metadata")]
    DomWithMetadata,
    #[serde(rename = "json-ld")]
    JsonLd,
    #[serde(rename = "meta")]
    MetaTag,
    #[serde(rename = "body-text")]
    BodyText,
    #[serde(rename = "manual")]
    Manual,
}

impl ExtractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionSource::Dom => "dom",
            ExtractionSource::DomWithMetadata => "dom+metadata",
            ExtractionSource::JsonLd => "json-ld",
            ExtractionSource::MetaTag => "meta",
            ExtractionSource::BodyText => "body-text",
            ExtractionSource::Manual => "manual",
        }
    }
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extraction {
    pub candidate: PriceCandidate,
    pub source: ExtractionSource,
}

fn all_nodes<V: PageView>(view: &V) -> Vec<NodeId> {
    let root = view.root();
    std::iter::once(root).chain(view.descendants(root)).collect()
}

/// The product title element used as the spatial reference for scoring.
pub fn find_title_anchor<V: PageView>(view: &V) -> Option<NodeId> {
    let nodes = all_nodes(view);
    let usable = |n: NodeId| {
        view.is_visible(n) && !in_banned_region(view, n) && !view.text_content(n).is_empty()
    };

    nodes
        .iter()
        .copied()
        .find(|&n| view.attr(n, "itemprop").is_some_and(|v| v.eq_ignore_ascii_case("name")) && usable(n))
        .or_else(|| nodes.iter().copied().find(|&n| view.tag(n) == "h1" && usable(n)))
        .or_else(|| {
            nodes.iter().copied().find(|&n| {
                ["data-testid", "data-test", "data-qa"].iter().any(|a| {
                    view.attr(n, a).is_some_and(|v| {
                        let v = v.to_ascii_lowercase();
                        v.contains("title") || v.contains("product-name")
                    })
                }) && usable(n)
            })
        })
}

pub fn relative_difference(a: f64, b: f64) -> f64 {
    let larger = a.abs().max(b.abs());
    if larger == 0.0 { 0.0 } else { (a - b).abs() / larger }
}

/// DOM wins whenever it produced something: on disagreement because it is what
/// the user sees, on agreement for stability.
pub fn reconcile(dom: Option<PriceCandidate>, metadata: Option<MetadataPrice>) -> Option<Extraction> {
    match (dom, metadata) {
        (Some(dom), Some(meta)) => {
            let diff = relative_difference(dom.value, meta.candidate.value);
            if diff > METADATA_DISAGREEMENT_RATIO {
                debug!(
                    "DOM price {:.2} and metadata price {:.2} disagree by {:.0}%, keeping DOM",
                    dom.value,
                    meta.candidate.value,
                    diff * 100.0
                );
                return Some(Extraction { candidate: dom, source: ExtractionSource::Dom });
            }
            let currency = if dom.currency == Currency::Unknown {
                meta.candidate.currency
            } else {
                dom.currency
            };
            Some(Extraction {
                candidate: PriceCandidate { value: dom.value, currency },
                source: ExtractionSource::DomWithMetadata,
            })
        }
        (Some(dom), None) => Some(Extraction { candidate: dom, source: ExtractionSource::Dom }),
        (None, Some(meta)) => Some(Extraction {
            candidate: meta.candidate,
            source: match meta.source {
                MetadataSource::JsonLd => ExtractionSource::JsonLd,
                MetadataSource::MetaTag => ExtractionSource::MetaTag,
            },
        }),
        (None, None) => None,
    }
}

/// First currency-bearing visible text block on the page.
pub fn body_text_price<V: PageView>(view: &V) -> Option<PriceCandidate> {
    let root = all_nodes(view)
        .into_iter()
        .find(|&n| view.tag(n) == "body")
        .unwrap_or(view.root());

    std::iter::once(root).chain(view.descendants(root)).find_map(|n| {
        if !view.is_visible(n) {
            return None;
        }
        let text = view.text_content(n);
        if text.chars().count() > MAX_PRICE_TEXT_LEN || is_bad_context(&text) {
            return None;
        }
        parse_price_with(&text, ParseOptions::requiring_currency())
    })
}

pub fn extract_price<V: PageView>(view: &V, weights: &ScoreWeights) -> Option<Extraction> {
    let anchor = find_title_anchor(view);
    let dom = best_candidate(view, view.root(), anchor, weights).map(|s| s.candidate);
    let metadata = extract_metadata_price(view);

    let extraction = reconcile(dom, metadata).or_else(|| {
        body_text_price(view).map(|candidate| Extraction { candidate, source: ExtractionSource::BodyText })
    });

    match &extraction {
        Some(e) => info!(
            "💰 Extracted {:.2} {} via {}",
            e.candidate.value, e.candidate.currency, e.source
        ),
        None => info!("No price found on page"),
    }
    extraction
}
