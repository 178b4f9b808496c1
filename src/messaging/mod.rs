// Messaging module: request/response contract, the page controller and its event sources.

pub mod handler;
pub mod listener;
pub mod navigation;
pub mod protocol;

pub use handler::PageController;
pub use listener::listen_for_messages;
pub use navigation::spawn_navigation_watcher;
pub use protocol::{PageEvent, Request, Response};
