//! Mutation events and the listener interface they are published to.

use serde::Serialize;

use crate::paths::VirtualPath;

/// Outcome of one successful structural change.
///
/// Every mutation produces exactly one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MutationEvent {
    /// `replaced` is set when an existing entry at `to` was deleted first.
    Moved {
        from: VirtualPath,
        to: VirtualPath,
        is_dir: bool,
        replaced: bool,
    },
    Renamed {
        from: VirtualPath,
        to: VirtualPath,
        is_dir: bool,
    },
    Copied {
        from: VirtualPath,
        to: VirtualPath,
        is_dir: bool,
    },
    Overwritten {
        path: VirtualPath,
        is_dir: bool,
    },
    Removed {
        path: VirtualPath,
        is_dir: bool,
    },
    Created {
        path: VirtualPath,
        is_dir: bool,
    },
}

impl MutationEvent {
    /// Deliver this event to a listener.
    pub fn notify(&self, listener: &mut dyn ChangeListener) {
        match self {
            MutationEvent::Moved {
                from,
                to,
                is_dir,
                replaced,
            } => {
                if *replaced {
                    listener.on_overwrite(to, *is_dir);
                }
                listener.on_moved(from, to, *is_dir);
            }
            MutationEvent::Renamed { from, to, is_dir } => listener.on_renamed(from, to, *is_dir),
            MutationEvent::Overwritten { path, is_dir } => listener.on_overwrite(path, *is_dir),
            MutationEvent::Removed { path, is_dir } => listener.on_removed(path, *is_dir),
            MutationEvent::Copied { .. } | MutationEvent::Created { .. } => {}
        }
    }

    /// Paths whose containing folders need a refresh in the tree view.
    #[must_use]
    pub fn affected_paths(&self) -> Vec<&VirtualPath> {
        match self {
            MutationEvent::Moved { from, to, .. }
            | MutationEvent::Renamed { from, to, .. }
            | MutationEvent::Copied { from, to, .. } => vec![from, to],
            MutationEvent::Overwritten { path, .. }
            | MutationEvent::Removed { path, .. }
            | MutationEvent::Created { path, .. } => vec![path],
        }
    }
}

/// Subscriber to structural changes in the tree.
///
/// `is_dir` describes the entry that changed, so a listener can decide
/// whether descendants of the path are affected too.
pub trait ChangeListener {
    fn on_renamed(&mut self, from: &VirtualPath, to: &VirtualPath, is_dir: bool);
    fn on_moved(&mut self, from: &VirtualPath, to: &VirtualPath, is_dir: bool);
    fn on_removed(&mut self, path: &VirtualPath, is_dir: bool);
    fn on_overwrite(&mut self, path: &VirtualPath, is_dir: bool);
}

/// Listener that ignores everything.
impl ChangeListener for () {
    fn on_renamed(&mut self, _: &VirtualPath, _: &VirtualPath, _: bool) {}
    fn on_moved(&mut self, _: &VirtualPath, _: &VirtualPath, _: bool) {}
    fn on_removed(&mut self, _: &VirtualPath, _: bool) {}
    fn on_overwrite(&mut self, _: &VirtualPath, _: bool) {}
}
