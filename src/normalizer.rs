// Product identity: canonical URLs and ProductId keys
use crate::model::{IdentityError, ProductId};
use url::{Url, form_urlencoded};

/// Exact query keys dropped from product URLs, besides every `utm_*` key.
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "msclkid", "yclid", "ttclid"];

pub fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

fn normalize_host(host: &str) -> String {
    let host = host.to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// Origin + path + query without tracking parameters. The order and encoding
/// of the remaining parameters is kept as-is; the fragment is dropped.
pub fn canonical_url(raw: &str) -> Result<String, IdentityError> {
    let url = Url::parse(raw.trim()).map_err(|e| IdentityError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(IdentityError::UnsupportedScheme(url.scheme().to_string()));
    }

    let mut canonical = format!("{}{}", url.origin().ascii_serialization(), url.path());

    if let Some(query) = url.query() {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = form_urlencoded::parse(pair.as_bytes())
                    .next()
                    .map(|(k, _)| k.into_owned())
                    .unwrap_or_default();
                !is_tracking_param(&key)
            })
            .collect();
        if !kept.is_empty() {
            canonical.push('?');
            canonical.push_str(&kept.join("&"));
        }
    }

    Ok(canonical)
}

pub fn product_id_from_canonical(canonical: &str) -> ProductId {
    let host = Url::parse(canonical)
        .ok()
        .and_then(|u| u.host_str().map(normalize_host))
        .unwrap_or_default();
    ProductId(format!("{}|{}", host, canonical))
}

/// `{host}|{canonicalUrl}` for any observation of a product page.
pub fn resolve_product_id(raw: &str) -> Result<ProductId, IdentityError> {
    let canonical = canonical_url(raw)?;
    Ok(product_id_from_canonical(&canonical))
}
