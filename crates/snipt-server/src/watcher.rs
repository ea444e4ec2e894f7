//! Reload the root configuration when its file changes on disk.

use std::ffi::OsString;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Result;
use camino::Utf8Path;
use notify::Config;
use notify::Event;
use notify::EventKind;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;
use tokio::sync::mpsc;

use crate::server::SniptServer;

/// Editors tend to write a file in several steps; wait for them to settle.
const DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches the roots file. Dropping it stops the watch.
pub struct RootsWatcher {
    _watcher: RecommendedWatcher,
}

impl RootsWatcher {
    /// Start watching `path`, reloading `server`'s roots after each burst of
    /// changes.
    ///
    /// The parent directory is watched rather than the file itself, so the
    /// file may be created, replaced or deleted while watched. Must be called
    /// inside a [`tokio::task::LocalSet`].
    pub fn spawn(path: &Utf8Path, server: SniptServer) -> Result<Self> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .ok_or_else(|| anyhow!("{path} has no parent directory"))?;
        let file_name = OsString::from(
            path.file_name()
                .ok_or_else(|| anyhow!("{path} has no file name"))?,
        );
        std::fs::create_dir_all(parent)?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &file_name) => {
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(err) => tracing::warn!("watch error: {err}"),
            },
            Config::default(),
        )?;
        watcher.watch(parent.as_std_path(), RecursiveMode::NonRecursive)?;
        tracing::info!("watching {path}");

        tokio::task::spawn_local(async move {
            while rx.recv().await.is_some() {
                loop {
                    match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
                        Ok(Some(())) => {}
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }
                tracing::debug!("roots file changed");
                if let Err(err) = server.reload_config().await {
                    tracing::warn!("reloading roots failed: {}", err.message);
                }
            }
        });

        Ok(Self { _watcher: watcher })
    }
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::CreateKind;
    use notify::event::ModifyKind;
    use std::path::PathBuf;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_the_roots_file_counts() {
        let name = OsString::from("roots.json");
        assert!(touches(
            &event(EventKind::Modify(ModifyKind::Any), "/cfg/roots.json"),
            &name
        ));
        assert!(touches(
            &event(EventKind::Create(CreateKind::File), "/cfg/roots.json"),
            &name
        ));
        assert!(!touches(
            &event(EventKind::Modify(ModifyKind::Any), "/cfg/settings.toml"),
            &name
        ));
        assert!(!touches(&event(EventKind::Any, "/cfg/roots.json"), &name));
    }
}
