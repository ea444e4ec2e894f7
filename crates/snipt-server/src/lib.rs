//! Line-delimited JSON server driving the snippet tree UI.
//!
//! The UI sends one [`protocol::Command`] per line on stdin. Each is handled
//! in its own local task against a shared [`Session`], and responses and
//! notifications are written back as [`Outbound`] lines on stdout.

mod client;
mod handlers;
mod logging;
pub mod protocol;
mod prompts;
mod server;
mod session;
mod watcher;

pub use client::write_outbound;
pub use client::Client;
pub use handlers::HandlerError;
pub use logging::init_tracing;
pub use logging::ClientLayer;
pub use prompts::ClientPrompts;
pub use prompts::Confirm;
pub use protocol::Outbound;
pub use server::serve;
pub use server::SniptServer;
pub use session::to_roots;
pub use session::Session;
pub use watcher::RootsWatcher;
