// Page module: the element-tree capability, its arena implementation and page loading.

pub mod fetcher;
pub mod html;
pub mod tree;
pub mod view;

pub use fetcher::{HttpFetcher, PageFetcher};
pub use tree::{ElementSpec, PageTree};
pub use view::{NodeId, PageView, Rect};
