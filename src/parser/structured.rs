// Structured product metadata: JSON-LD offers and price meta tags
use super::price_text::{ParseOptions, parse_price_with};
use crate::model::{Currency, PriceCandidate};
use crate::page::{NodeId, PageView};
use serde_json::{Map, Value};
use tracing::debug;

const PRICE_META_KEYS: &[&str] = &["product:price:amount", "og:price:amount"];
const CURRENCY_META_KEYS: &[&str] = &["product:price:currency", "og:price:currency"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    JsonLd,
    MetaTag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataPrice {
    pub candidate: PriceCandidate,
    pub source: MetadataSource,
}

/// JSON-LD `Product.offers` first, then price meta tags.
pub fn extract_metadata_price<V: PageView>(view: &V) -> Option<MetadataPrice> {
    if let Some(candidate) = json_ld_price(view) {
        return Some(MetadataPrice { candidate, source: MetadataSource::JsonLd });
    }
    meta_tag_price(view).map(|candidate| MetadataPrice { candidate, source: MetadataSource::MetaTag })
}

fn all_nodes<V: PageView>(view: &V) -> impl Iterator<Item = NodeId> {
    let root = view.root();
    std::iter::once(root).chain(view.descendants(root))
}

fn json_ld_price<V: PageView>(view: &V) -> Option<PriceCandidate> {
    all_nodes(view)
        .filter(|&n| {
            view.tag(n) == "script"
                && view.attr(n, "type").is_some_and(|t| t.to_ascii_lowercase().contains("ld+json"))
        })
        .find_map(|n| {
            let raw = view.text_content(n);
            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => find_product_price(&value),
                Err(e) => {
                    debug!("Skipping unparseable JSON-LD block: {}", e);
                    None
                }
            }
        })
}

fn find_product_price(value: &Value) -> Option<PriceCandidate> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product_price),
        Value::Object(map) => {
            if let Some(found) = map.get("@graph").and_then(find_product_price) {
                return Some(found);
            }
            if is_product(map) {
                return map.get("offers").and_then(offer_price);
            }
            None
        }
        _ => None,
    }
}

fn is_product(map: &Map<String, Value>) -> bool {
    match map.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case("Product"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|t| t.eq_ignore_ascii_case("Product"))),
        _ => false,
    }
}

fn offer_price(offers: &Value) -> Option<PriceCandidate> {
    match offers {
        Value::Array(items) => items.iter().find_map(offer_price),
        Value::Object(offer) => {
            let currency = offer
                .get("priceCurrency")
                .and_then(Value::as_str)
                .map(Currency::from_code)
                .unwrap_or(Currency::Unknown);

            offer
                .get("price")
                .or_else(|| offer.get("lowPrice"))
                .and_then(|v| value_to_candidate(v, currency))
                .or_else(|| offer.get("priceSpecification").and_then(offer_price))
        }
        _ => None,
    }
}

fn value_to_candidate(value: &Value, currency: Currency) -> Option<PriceCandidate> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|value| PriceCandidate { value, currency }),
        Value::String(s) => parse_price_with(s, ParseOptions::with_default(currency)),
        _ => None,
    }
}

fn meta_key<V: PageView>(view: &V, node: NodeId) -> Option<String> {
    ["property", "name", "itemprop"]
        .iter()
        .find_map(|a| view.attr(node, a))
        .map(|k| k.to_ascii_lowercase())
}

fn meta_tag_price<V: PageView>(view: &V) -> Option<PriceCandidate> {
    let mut amount: Option<&str> = None;
    let mut currency = Currency::Unknown;

    for node in all_nodes(view) {
        let Some(content) = view.attr(node, "content") else {
            continue;
        };
        let Some(key) = meta_key(view, node) else {
            continue;
        };

        if amount.is_none() && (PRICE_META_KEYS.contains(&key.as_str()) || key == "price") {
            amount = Some(content);
        } else if CURRENCY_META_KEYS.contains(&key.as_str()) || key == "pricecurrency" {
            currency = Currency::from_code(content);
        }
    }

    parse_price_with(amount?, ParseOptions::with_default(currency))
}
