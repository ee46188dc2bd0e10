//! File watching for automatic task re-execution
//!
//! Uses the `notify` crate with debouncing. Each binding pairs a glob set
//! with the task it re-runs; every change batch that matches a binding
//! spawns one run of its task without waiting for it, so detection carries
//! on while rebuilds are in flight.

use std::path::{Path, PathBuf};
use std::time::Duration;

use console::style;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::{FrontpipeError, Result};
use crate::livereload::LiveReload;
use crate::paths::{AssetCategory, PathTable};
use crate::runner::{ActionHandler, Runner};

/// A set of source globs and the task to re-run when one of them changes
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub task: String,
    pub patterns: Vec<String>,
    set: GlobSet,
}

impl WatchBinding {
    pub fn new(task: &str, patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| FrontpipeError::InvalidGlob {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| FrontpipeError::InvalidGlob {
            pattern: patterns.join(", "),
            reason: e.to_string(),
        })?;

        Ok(Self {
            task: task.to_string(),
            patterns: patterns.to_vec(),
            set,
        })
    }

    /// Whether a root-relative path belongs to this binding
    pub fn matches(&self, relative: &Path) -> bool {
        self.set.is_match(relative)
    }
}

/// Scripts, HTML and CSS sources, each bound to its own task
pub fn default_bindings(table: &PathTable) -> Result<Vec<WatchBinding>> {
    [
        AssetCategory::Scripts,
        AssetCategory::Html,
        AssetCategory::Css,
    ]
    .into_iter()
    .map(|category| WatchBinding::new(category.as_str(), &table.watch_patterns(category)))
    .collect()
}

/// Bindings hit by a batch of changes, each with its changed paths
/// (root-relative, forward slashes). Paths outside `root` are ignored.
pub fn triggered<'a>(
    bindings: &'a [WatchBinding],
    root: &Path,
    changed: &[PathBuf],
) -> Vec<(&'a WatchBinding, Vec<String>)> {
    let relative: Vec<&Path> = changed
        .iter()
        .filter_map(|p| p.strip_prefix(root).ok())
        .collect();

    bindings
        .iter()
        .filter_map(|binding| {
            let hits: Vec<String> = relative
                .iter()
                .filter(|p| binding.matches(p))
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .collect();
            (!hits.is_empty()).then_some((binding, hits))
        })
        .collect()
}

/// Debounced recursive watcher over the project root
pub struct FileWatcher {
    debouncer: Debouncer<notify::RecommendedWatcher>,
    rx: mpsc::Receiver<Vec<PathBuf>>,
}

impl FileWatcher {
    pub fn new(debounce_ms: u64) -> Result<Self> {
        let (tx, rx) = mpsc::channel(16);

        let debouncer = new_debouncer(
            Duration::from_millis(debounce_ms.max(1)),
            move |events: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match events {
                Ok(events) => {
                    let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                    let _ = tx.blocking_send(paths);
                }
                Err(e) => error!(error = %e, "file watch error"),
            },
        )
        .map_err(|e| FrontpipeError::Watch { source: e })?;

        Ok(Self { debouncer, rx })
    }

    /// Start watching a directory recursively
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        self.debouncer
            .watcher()
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| FrontpipeError::Watch { source: e })
    }

    /// Debounced batches of changed paths
    pub fn batches(&mut self) -> &mut mpsc::Receiver<Vec<PathBuf>> {
        &mut self.rx
    }
}

/// Watch `root` forever, re-running bound tasks on change.
///
/// A failing re-run is logged; the loop keeps going.
pub async fn watch_and_run<H>(
    root: &Path,
    bindings: Vec<WatchBinding>,
    debounce_ms: u64,
    runner: Runner<H>,
    reload: Option<LiveReload>,
) -> Result<()>
where
    H: ActionHandler + 'static,
{
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let mut watcher = FileWatcher::new(debounce_ms)?;
    watcher.watch(&root)?;

    for binding in &bindings {
        info!(task = %binding.task, patterns = ?binding.patterns, "watch binding");
    }
    println!("{} Watcher started", style("👀").cyan());

    run_loop(watcher.batches(), &root, &bindings, runner, reload).await;
    Ok(())
}

/// Route every batch to the bindings it hits until the channel closes.
///
/// Each hit spawns one run of the bound task without waiting for it. After
/// a successful run, every changed path of that batch is pushed to
/// live-reload clients.
pub async fn run_loop<H>(
    batches: &mut mpsc::Receiver<Vec<PathBuf>>,
    root: &Path,
    bindings: &[WatchBinding],
    runner: Runner<H>,
    reload: Option<LiveReload>,
) where
    H: ActionHandler + 'static,
{
    while let Some(changed) = batches.recv().await {
        for (binding, paths) in triggered(bindings, root, &changed) {
            println!(
                "{} Changed: {}",
                style("📝").yellow(),
                style(paths.join(", ")).dim()
            );

            let runner = runner.clone();
            let reload = reload.clone();
            let task = binding.task.clone();

            tokio::spawn(async move {
                match runner.run_task(&task).await {
                    Ok(_) => {
                        if let Some(reload) = &reload {
                            for path in &paths {
                                reload.notify(path);
                            }
                        }
                    }
                    Err(e) if e.is_transform() => {
                        warn!(task = %task, error = %e, "rebuild skipped a malformed file");
                    }
                    Err(e) => {
                        error!(task = %task, error = %e, "rebuild failed");
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    use crate::config::Config;
    use crate::graph::{Action, TaskGraph};
    use crate::livereload::Command;
    use crate::runner::tests::Recorder;
    use crate::runner::RunnerConfig;

    #[test]
    fn test_default_bindings() {
        let bindings = default_bindings(&PathTable::default()).unwrap();
        let tasks: Vec<_> = bindings.iter().map(|b| b.task.as_str()).collect();
        assert_eq!(tasks, vec!["scripts", "html", "css"]);

        assert!(bindings[0].matches(Path::new("app/scripts/controllers/main.js")));
        assert!(bindings[1].matches(Path::new("app/index.html")));
        assert!(bindings[1].matches(Path::new("app/views/main.html")));
        assert!(bindings[2].matches(Path::new("app/styles/main.css")));
        assert!(!bindings[2].matches(Path::new("app/images/logo.png")));
        assert!(!bindings[2].matches(Path::new("app/styles/vendor/reset.css")));
    }

    #[test]
    fn test_triggered_routes_each_binding_once() {
        let bindings = default_bindings(&PathTable::default()).unwrap();
        let root = Path::new("/project");
        let changed = vec![
            PathBuf::from("/project/app/styles/main.css"),
            PathBuf::from("/project/app/styles/theme.css"),
            PathBuf::from("/project/app/index.html"),
            PathBuf::from("/project/dist/styles/main.css"),
            PathBuf::from("/elsewhere/app/scripts/a.js"),
        ];

        let hits = triggered(&bindings, root, &changed);
        let summary: Vec<(&str, Vec<String>)> = hits
            .into_iter()
            .map(|(b, paths)| (b.task.as_str(), paths))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("html", vec!["app/index.html".to_string()]),
                (
                    "css",
                    vec![
                        "app/styles/main.css".to_string(),
                        "app/styles/theme.css".to_string()
                    ]
                ),
            ]
        );
    }

    async fn wait_for_calls(recorder: &Recorder, count: usize) {
        for _ in 0..200 {
            if recorder.calls().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} calls, saw {:?}", count, recorder.calls());
    }

    #[tokio::test]
    async fn test_loop_survives_failure_and_reloads_after_success() {
        let recorder = Arc::new(Recorder {
            fail_on: Some(Action::Transform(AssetCategory::Css)),
            ..Default::default()
        });
        let registry = Arc::new(TaskGraph::from_config(&Config::default()).unwrap());
        let runner = Runner::new(
            registry,
            Arc::clone(&recorder),
            RunnerConfig {
                quiet: true,
                ..Default::default()
            },
        );

        let reload = LiveReload::start("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let url = format!("ws://{}/livereload", reload.local_addr());
        let (mut client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        client
            .send(Message::Text(
                r#"{"command":"hello","protocols":["http://livereload.com/protocols/official-7"]}"#
                    .to_string(),
            ))
            .await
            .unwrap();
        client.next().await.unwrap().unwrap();

        let root = Path::new("/project");
        let bindings = default_bindings(&PathTable::default()).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(vec![PathBuf::from("/project/app/styles/broken.css")])
            .await
            .unwrap();
        tx.send(vec![PathBuf::from("/project/app/index.html")])
            .await
            .unwrap();
        drop(tx);

        run_loop(&mut rx, root, &bindings, runner, Some(reload)).await;
        wait_for_calls(&recorder, 2).await;

        let calls = recorder.calls();
        assert!(calls.contains(&Action::Transform(AssetCategory::Css)));
        assert!(calls.contains(&Action::Transform(AssetCategory::Html)));

        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let command: Command = serde_json::from_str(message.to_text().unwrap()).unwrap();
        assert_eq!(
            command,
            Command::Reload {
                path: "app/index.html".to_string(),
                live_css: true,
            }
        );
    }

    #[tokio::test]
    async fn test_batch_outside_bindings_runs_nothing() {
        let recorder = Arc::new(Recorder::default());
        let registry = Arc::new(TaskGraph::from_config(&Config::default()).unwrap());
        let runner = Runner::new(registry, Arc::clone(&recorder), RunnerConfig::default());

        let bindings = default_bindings(&PathTable::default()).unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(vec![PathBuf::from("/project/dist/styles/main.css")])
            .await
            .unwrap();
        drop(tx);

        run_loop(&mut rx, Path::new("/project"), &bindings, runner, None).await;
        tokio::task::yield_now().await;
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_invalid_watch_glob() {
        let result = WatchBinding::new("css", &["app/[styles".to_string()]);
        assert!(matches!(result, Err(FrontpipeError::InvalidGlob { .. })));
    }
}
