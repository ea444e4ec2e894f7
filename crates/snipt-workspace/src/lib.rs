//! Virtual filesystem for the snippet tree.
//!
//! Several physical root folders are presented as one namespace of
//! [`VirtualPath`]s. [`Store`] performs storage operations on virtual paths
//! over a [`FileSystem`] backend, [`Mutator`] runs the guarded structural
//! mutations, and [`ActiveDocumentTracker`] keeps the open document in step
//! with them through the [`ChangeListener`] interface.

mod error;
mod events;
mod mutation;
mod paths;
mod snippet;
mod store;
mod system;
mod tracker;

pub use error::ConflictError;
pub use error::EntryKind;
pub use error::Error;
pub use error::PathResolutionError;
pub use error::Result;
pub use error::ValidationError;
pub use events::ChangeListener;
pub use events::MutationEvent;
pub use mutation::CopyRequest;
pub use mutation::DestinationStatus;
pub use mutation::MoveRequest;
pub use mutation::Mutator;
pub use mutation::PendingRemove;
pub use mutation::TransferRequest;
pub use paths::normalize_physical;
pub use paths::PathResolver;
pub use paths::Root;
pub use paths::VirtualPath;
pub use snippet::SnippetDocument;
pub use snippet::SnippetEntry;
pub use snippet::SNIPPET_EXTENSION;
pub use store::Node;
pub use store::Store;
pub use system::FileSystem;
pub use system::InMemoryFileSystem;
pub use system::Metadata;
pub use system::OsFileSystem;
pub use tracker::ActiveDocument;
pub use tracker::ActiveDocumentTracker;
pub use tracker::ReloadChoice;
pub use tracker::TrackerSignal;
