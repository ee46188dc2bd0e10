//! Binds the leaf actions of the task graph to the cleaner, the
//! transformers and the watcher

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::clean::clean;
use crate::config::{Config, Settings};
use crate::error::{FrontpipeError, Result};
use crate::graph::{Action, TaskGraph};
use crate::livereload::LiveReload;
use crate::paths::AssetCategory;
use crate::runner::{ActionHandler, Runner, RunnerConfig};
use crate::transform::{TransformReport, Transformer};
use crate::watch::{default_bindings, watch_and_run};

/// The real action handler
#[derive(Debug, Clone)]
pub struct Pipeline {
    transformer: Arc<Transformer>,
    settings: Settings,
    registry: Arc<TaskGraph>,
    runner_config: RunnerConfig,
}

impl Pipeline {
    pub fn new(
        root: impl Into<PathBuf>,
        config: &Config,
        registry: Arc<TaskGraph>,
        runner_config: RunnerConfig,
    ) -> Result<Self> {
        let transformer = Transformer::new(root, config.path_table()?, &config.settings);
        Ok(Self {
            transformer: Arc::new(transformer),
            settings: config.settings.clone(),
            registry,
            runner_config,
        })
    }

    pub fn root(&self) -> &Path {
        self.transformer.root()
    }

    /// A runner over this pipeline and its registry
    pub fn runner(&self) -> Runner<Pipeline> {
        Runner::new(
            Arc::clone(&self.registry),
            Arc::new(self.clone()),
            self.runner_config.clone(),
        )
    }

    /// Run one category's transform chain
    pub async fn transform(&self, category: AssetCategory) -> Result<TransformReport> {
        let report = self.transformer.run(category).await?;
        info!(
            %category,
            read = report.read,
            written = report.written.len(),
            "transformed"
        );
        Ok(report)
    }

    /// Clean or transform
    async fn perform(&self, action: Action) -> Result<()> {
        match action {
            Action::Clean => {
                clean(self.root(), &self.transformer.paths().clean).await?;
            }
            Action::Transform(category) => {
                self.transform(category).await?;
            }
            Action::Watch => {
                return Err(FrontpipeError::InvalidTask {
                    task: "watch".to_string(),
                    reason: "watch cannot be triggered from inside watch mode".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Start live-reload, then re-run bound tasks on change until the
    /// process ends
    pub async fn watch(&self) -> Result<()> {
        let bindings = default_bindings(self.transformer.paths())?;

        let reload = if self.settings.livereload {
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.settings.livereload_port));
            Some(LiveReload::start(addr).await?)
        } else {
            None
        };

        let rebuild = Runner::new(
            Arc::clone(&self.registry),
            Arc::new(Rebuild(self.clone())),
            self.runner_config.clone(),
        );

        watch_and_run(
            self.root(),
            bindings,
            self.settings.watch_debounce_ms,
            rebuild,
            reload,
        )
        .await
    }
}

impl ActionHandler for Pipeline {
    fn invoke(&self, action: Action) -> impl Future<Output = Result<()>> + Send {
        async move {
            match action {
                Action::Watch => self.watch().await,
                other => self.perform(other).await,
            }
        }
    }
}

/// Handler used by watch mode for re-runs; everything but `watch` itself
#[derive(Debug, Clone)]
struct Rebuild(Pipeline);

impl ActionHandler for Rebuild {
    fn invoke(&self, action: Action) -> impl Future<Output = Result<()>> + Send {
        self.0.perform(action)
    }
}
