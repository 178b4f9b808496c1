// Parser module: price text and structured product metadata.

pub mod price_text;
pub mod structured;

pub use price_text::{ParseOptions, has_currency_marker, parse_price, parse_price_with};
pub use structured::extract_metadata_price;
