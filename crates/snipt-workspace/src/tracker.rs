//! Tracking of the single open document across tree mutations.

use std::mem;
use std::sync::Arc;

use crate::error::Result;
use crate::events::ChangeListener;
use crate::paths::VirtualPath;
use crate::store::Store;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveDocument {
    pub path: VirtualPath,
    /// Content as last read from storage; may be stale after an overwrite
    /// the user chose to keep.
    pub content: String,
}

/// What the session should tell the user about the open document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerSignal {
    /// The document moved; it stays open under its new identity.
    Retargeted { from: VirtualPath, to: VirtualPath },
    /// The document is gone and was closed.
    ForceClosed { path: VirtualPath, reason: String },
    /// The document was replaced on disk; ask whether to reload it.
    ReloadPrompt { path: VirtualPath },
    Reloaded { path: VirtualPath },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReloadChoice {
    Reload,
    Keep,
}

/// Owner of the active document reference.
///
/// The reference only changes through [`open`](Self::open),
/// [`close`](Self::close), [`resolve_reload`](Self::resolve_reload) and the
/// [`ChangeListener`] callbacks.
pub struct ActiveDocumentTracker {
    store: Arc<Store>,
    active: Option<ActiveDocument>,
    pending_reload: Option<VirtualPath>,
    signals: Vec<TrackerSignal>,
}

impl ActiveDocumentTracker {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            active: None,
            pending_reload: None,
            signals: Vec::new(),
        }
    }

    /// Make `path` the active document, replacing any previous one.
    pub fn open(&mut self, path: VirtualPath) -> Result<&ActiveDocument> {
        let content = self.store.read_to_string(&path)?;
        Ok(self.activate(path, content))
    }

    /// Like [`open`](Self::open), for content the caller already read.
    pub fn activate(&mut self, path: VirtualPath, content: String) -> &ActiveDocument {
        self.pending_reload = None;
        tracing::debug!("active document is now {path}");
        self.active.insert(ActiveDocument { path, content })
    }

    pub fn close(&mut self) -> Option<ActiveDocument> {
        self.pending_reload = None;
        self.active.take()
    }

    #[must_use]
    pub fn active(&self) -> Option<&ActiveDocument> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn active_path(&self) -> Option<&VirtualPath> {
        self.active.as_ref().map(|document| &document.path)
    }

    #[must_use]
    pub fn pending_reload(&self) -> Option<&VirtualPath> {
        self.pending_reload.as_ref()
    }

    /// Answer an outstanding reload prompt.
    ///
    /// Without a pending prompt this does nothing. A failed reload leaves
    /// the stale content in place and returns the error.
    pub fn resolve_reload(&mut self, choice: ReloadChoice) -> Result<()> {
        let Some(path) = self.pending_reload.take() else {
            return Ok(());
        };

        match choice {
            ReloadChoice::Keep => {
                tracing::debug!("keeping stale content of {path}");
                Ok(())
            }
            ReloadChoice::Reload => {
                let content = self.store.read_to_string(&path).inspect_err(|err| {
                    tracing::warn!("reloading {path} failed, keeping stale content: {err}");
                })?;
                if let Some(active) = self.active.as_mut().filter(|a| a.path == path) {
                    active.content = content;
                    self.signals.push(TrackerSignal::Reloaded { path });
                }
                Ok(())
            }
        }
    }

    pub fn drain_signals(&mut self) -> Vec<TrackerSignal> {
        mem::take(&mut self.signals)
    }

    fn affects(&self, path: &VirtualPath, is_dir: bool) -> bool {
        self.active_path().is_some_and(|active| {
            active == path || (is_dir && active.is_strictly_under(path))
        })
    }

    fn retarget(&mut self, from: &VirtualPath, to: &VirtualPath, is_dir: bool) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let rewritten = if is_dir {
            if active.path.is_strictly_under(from) {
                active.path.with_prefix_replaced(from, to)
            } else {
                None
            }
        } else if &active.path == from {
            Some(to.clone())
        } else {
            None
        };

        if let Some(new_path) = rewritten {
            let old_path = mem::replace(&mut active.path, new_path.clone());
            if self.pending_reload.as_ref() == Some(&old_path) {
                self.pending_reload = Some(new_path.clone());
            }
            tracing::debug!("active document followed {old_path} -> {new_path}");
            self.signals.push(TrackerSignal::Retargeted {
                from: old_path,
                to: new_path,
            });
        }
    }

    fn force_close(&mut self, reason: impl FnOnce(&VirtualPath) -> String) {
        self.pending_reload = None;
        if let Some(document) = self.active.take() {
            let reason = reason(&document.path);
            tracing::warn!("closing {}: {reason}", document.path);
            self.signals.push(TrackerSignal::ForceClosed {
                path: document.path,
                reason,
            });
        }
    }
}

impl ChangeListener for ActiveDocumentTracker {
    fn on_renamed(&mut self, from: &VirtualPath, to: &VirtualPath, is_dir: bool) {
        self.retarget(from, to, is_dir);
    }

    fn on_moved(&mut self, from: &VirtualPath, to: &VirtualPath, is_dir: bool) {
        self.retarget(from, to, is_dir);
    }

    fn on_removed(&mut self, path: &VirtualPath, is_dir: bool) {
        if self.affects(path, is_dir) {
            self.force_close(|active| format!("'{}' was deleted", active.name()));
        }
    }

    fn on_overwrite(&mut self, path: &VirtualPath, is_dir: bool) {
        if !self.affects(path, is_dir) {
            return;
        }
        let Some(active) = self.active_path().cloned() else {
            return;
        };

        // Exists check failing counts as gone.
        if self.store.exists(&active).unwrap_or(false) {
            tracing::debug!("{active} was overwritten, asking whether to reload");
            self.pending_reload = Some(active.clone());
            self.signals.push(TrackerSignal::ReloadPrompt { path: active });
        } else {
            self.force_close(|active| {
                format!("'{}' was overwritten and no longer exists", active.name())
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::Mutator;
    use crate::mutation::TransferRequest;
    use crate::paths::PathResolver;
    use crate::paths::Root;
    use crate::store::tests::vp;
    use crate::system::InMemoryFileSystem;

    fn setup() -> (Arc<Store>, ActiveDocumentTracker) {
        let fs = InMemoryFileSystem::new();
        fs.add_file("/root/Drafts/a/note.snippet", "note");
        fs.add_file("/root/Drafts/a/sub/deep.snippet", "deep");
        fs.add_file("/root/Drafts/x.snippet", "x");
        fs.add_dir("/root/LocalSpace");
        let resolver = PathResolver::new(
            vec![
                Root::new("Drafts", "/root/Drafts"),
                Root::new("LocalSpace", "/root/LocalSpace"),
            ],
            "/root",
        );
        let store = Arc::new(Store::new(Arc::new(fs), resolver));
        let tracker = ActiveDocumentTracker::new(store.clone());
        (store, tracker)
    }

    fn transfer(source: &str, target: &str, overwrite: bool) -> TransferRequest {
        TransferRequest {
            source: source.to_string(),
            target: target.to_string(),
            is_folder: false,
            overwrite,
        }
    }

    mod retargeting {
        use super::*;

        #[test]
        fn test_rename_of_containing_folder() {
            let (store, mut tracker) = setup();
            tracker.open(vp("Drafts/a/note.snippet")).unwrap();

            Mutator::new(&store)
                .rename_node("Drafts/a", "b", &mut tracker)
                .unwrap();

            assert_eq!(tracker.active_path(), Some(&vp("Drafts/b/note.snippet")));
            assert_eq!(
                tracker.drain_signals(),
                vec![TrackerSignal::Retargeted {
                    from: vp("Drafts/a/note.snippet"),
                    to: vp("Drafts/b/note.snippet"),
                }]
            );
        }

        #[test]
        fn test_move_of_the_file_itself() {
            let (store, mut tracker) = setup();
            tracker.open(vp("Drafts/x.snippet")).unwrap();

            Mutator::new(&store)
                .move_node(&transfer("Drafts/x.snippet", "LocalSpace", false), &mut tracker)
                .unwrap();

            assert_eq!(tracker.active_path(), Some(&vp("LocalSpace/x.snippet")));
            assert_eq!(tracker.active().unwrap().content, "x");
        }

        #[test]
        fn test_nested_move_keeps_suffix() {
            let (store, mut tracker) = setup();
            tracker.open(vp("Drafts/a/sub/deep.snippet")).unwrap();

            Mutator::new(&store)
                .move_node(&transfer("Drafts/a", "LocalSpace", false), &mut tracker)
                .unwrap();

            assert_eq!(
                tracker.active_path(),
                Some(&vp("LocalSpace/a/sub/deep.snippet"))
            );
        }

        #[test]
        fn test_unrelated_mutation_is_ignored() {
            let (store, mut tracker) = setup();
            tracker.open(vp("Drafts/a/note.snippet")).unwrap();

            Mutator::new(&store)
                .move_node(&transfer("Drafts/x.snippet", "LocalSpace", false), &mut tracker)
                .unwrap();

            assert_eq!(tracker.active_path(), Some(&vp("Drafts/a/note.snippet")));
            assert!(tracker.drain_signals().is_empty());
        }

        #[test]
        fn test_file_event_with_prefix_path_is_ignored() {
            let (_, mut tracker) = setup();
            tracker.open(vp("Drafts/a/note.snippet")).unwrap();

            tracker.on_renamed(&vp("Drafts/a"), &vp("Drafts/z"), false);

            assert_eq!(tracker.active_path(), Some(&vp("Drafts/a/note.snippet")));
        }
    }

    mod removal {
        use super::*;

        #[test]
        fn test_removing_containing_folder_closes_once() {
            let (store, mut tracker) = setup();
            tracker.open(vp("Drafts/a/note.snippet")).unwrap();

            let pending = Mutator::new(&store)
                .prepare_remove("Drafts/a", true)
                .unwrap();
            pending.commit(&store, &mut tracker).unwrap();
            tracker.on_removed(&vp("Drafts/a"), true);

            assert!(tracker.active().is_none());
            let signals = tracker.drain_signals();
            assert_eq!(signals.len(), 1);
            assert!(matches!(
                &signals[0],
                TrackerSignal::ForceClosed { path, .. } if path == &vp("Drafts/a/note.snippet")
            ));
        }

        #[test]
        fn test_removing_sibling_keeps_document() {
            let (store, mut tracker) = setup();
            tracker.open(vp("Drafts/a/note.snippet")).unwrap();

            Mutator::new(&store)
                .prepare_remove("Drafts/x.snippet", false)
                .unwrap()
                .commit(&store, &mut tracker)
                .unwrap();

            assert!(tracker.active().is_some());
            assert!(tracker.drain_signals().is_empty());
        }
    }

    mod overwrite {
        use super::*;

        #[test]
        fn test_prompt_then_reload() {
            let (store, mut tracker) = setup();
            store
                .write_file(&vp("LocalSpace/x.snippet"), b"old")
                .unwrap();
            tracker.open(vp("LocalSpace/x.snippet")).unwrap();

            Mutator::new(&store)
                .copy_node(&transfer("Drafts/x.snippet", "LocalSpace", true), &mut tracker)
                .unwrap();

            assert_eq!(
                tracker.drain_signals(),
                vec![TrackerSignal::ReloadPrompt {
                    path: vp("LocalSpace/x.snippet")
                }]
            );
            assert_eq!(tracker.active().unwrap().content, "old");

            tracker.resolve_reload(ReloadChoice::Reload).unwrap();
            assert_eq!(tracker.active().unwrap().content, "x");
            assert_eq!(
                tracker.drain_signals(),
                vec![TrackerSignal::Reloaded {
                    path: vp("LocalSpace/x.snippet")
                }]
            );
        }

        #[test]
        fn test_keep_leaves_stale_content() {
            let (store, mut tracker) = setup();
            store
                .write_file(&vp("LocalSpace/x.snippet"), b"old")
                .unwrap();
            tracker.open(vp("LocalSpace/x.snippet")).unwrap();

            Mutator::new(&store)
                .move_node(&transfer("Drafts/x.snippet", "LocalSpace", true), &mut tracker)
                .unwrap();
            tracker.resolve_reload(ReloadChoice::Keep).unwrap();

            assert_eq!(tracker.active_path(), Some(&vp("LocalSpace/x.snippet")));
            assert_eq!(tracker.active().unwrap().content, "old");
            assert!(tracker.pending_reload().is_none());
        }

        #[test]
        fn test_overwritten_folder_without_document_closes() {
            let (store, mut tracker) = setup();
            store
                .write_file(&vp("LocalSpace/a/only-here.snippet"), b"gone soon")
                .unwrap();
            tracker.open(vp("LocalSpace/a/only-here.snippet")).unwrap();

            Mutator::new(&store)
                .copy_node(&transfer("Drafts/a", "LocalSpace", true), &mut tracker)
                .unwrap();

            assert!(tracker.active().is_none());
            assert!(matches!(
                tracker.drain_signals().as_slice(),
                [TrackerSignal::ForceClosed { .. }]
            ));
        }
    }

    #[test]
    fn test_open_missing_document_fails() {
        let (_, mut tracker) = setup();
        assert!(tracker.open(vp("Drafts/missing.snippet")).is_err());
        assert!(tracker.active().is_none());
    }
}
