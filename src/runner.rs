//! Task execution
//!
//! Resolves a task name to its plan of leaf actions and hands each action to
//! an [`ActionHandler`]. The handler is a trait so the pipeline can be
//! replaced in tests.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::RunOrdering;
use crate::error::Result;
use crate::graph::{Action, TaskGraph};

/// Something that knows how to perform leaf actions
pub trait ActionHandler: Send + Sync {
    fn invoke(&self, action: Action) -> impl Future<Output = Result<()>> + Send;
}

/// Result of executing a single action
#[derive(Debug)]
pub struct ActionResult {
    pub action: Action,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Runner configuration
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    pub ordering: RunOrdering,
    /// Suppress progress and result lines
    pub quiet: bool,
}

/// Runs named tasks from a registry
pub struct Runner<H> {
    registry: Arc<TaskGraph>,
    handler: Arc<H>,
    config: RunnerConfig,
    progress: MultiProgress,
}

impl<H> Clone for Runner<H> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            handler: Arc::clone(&self.handler),
            config: self.config.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<H: ActionHandler> Runner<H> {
    pub fn new(registry: Arc<TaskGraph>, handler: Arc<H>, config: RunnerConfig) -> Self {
        Self {
            registry,
            handler,
            config,
            progress: MultiProgress::new(),
        }
    }

    /// Run a task and everything it depends on.
    ///
    /// The plan is resolved up front, so an unknown task or a cycle fails
    /// before any action starts.
    pub async fn run_task(&self, name: &str) -> Result<Vec<ActionResult>> {
        let plan = self.registry.plan(name)?;
        info!(task = name, steps = plan.len(), ordering = ?self.config.ordering, "running task");

        let results = match self.config.ordering {
            RunOrdering::Completion => {
                let mut results = Vec::with_capacity(plan.len());
                for action in plan {
                    let (result, outcome) = self.run_action(action).await;
                    results.push(result);
                    outcome?;
                }
                results
            }
            RunOrdering::Initiation => {
                let started = plan.into_iter().map(|action| self.run_action(action));
                let mut results = Vec::new();
                let mut first_error = None;

                for (result, outcome) in futures::future::join_all(started).await {
                    results.push(result);
                    if let Err(e) = outcome {
                        first_error.get_or_insert(e);
                    }
                }

                if let Some(e) = first_error {
                    return Err(e);
                }
                results
            }
        };

        self.print_summary(name, &results);
        Ok(results)
    }

    async fn run_action(&self, action: Action) -> (ActionResult, Result<()>) {
        debug!(%action, "starting");
        let start = Instant::now();

        let spinner = (!self.config.quiet && action != Action::Watch).then(|| {
            let pb = self.progress.add(ProgressBar::new_spinner());
            if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(spinner_style);
            }
            pb.set_message(format!("Running {}", action));
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let outcome = self.handler.invoke(action).await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        let result = ActionResult {
            action,
            success: outcome.is_ok(),
            duration: start.elapsed(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
        };

        if !self.config.quiet {
            Self::print_action_result(&result);
        }

        (result, outcome)
    }

    fn print_action_result(result: &ActionResult) {
        let status = if result.success {
            style("✓").green()
        } else {
            style("✗").red()
        };

        let duration = format!("{:.2}s", result.duration.as_secs_f64());

        println!(
            "{} {} {}",
            status,
            style(result.action).bold(),
            style(duration).dim()
        );

        if let Some(error) = &result.error {
            eprintln!("  {}", style(error).red());
        }
    }

    fn print_summary(&self, name: &str, results: &[ActionResult]) {
        if self.config.quiet {
            return;
        }

        let total: Duration = results.iter().map(|r| r.duration).sum();
        println!(
            "{} {} finished {} steps in {:.2}s",
            style("✓").green().bold(),
            style(name).bold(),
            results.len(),
            total.as_secs_f64()
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::FrontpipeError;
    use crate::paths::AssetCategory;
    use std::sync::Mutex;

    /// Records every action it is asked to perform
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub calls: Mutex<Vec<Action>>,
        pub fail_on: Option<Action>,
    }

    impl Recorder {
        pub fn calls(&self) -> Vec<Action> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ActionHandler for Recorder {
        fn invoke(&self, action: Action) -> impl Future<Output = Result<()>> + Send {
            self.calls.lock().unwrap().push(action);
            let fail = self.fail_on == Some(action);
            async move {
                tokio::task::yield_now().await;
                if fail {
                    Err(FrontpipeError::Transform {
                        path: "broken.css".into(),
                        reason: "unbalanced braces".to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    fn runner(recorder: Arc<Recorder>, ordering: RunOrdering) -> Runner<Recorder> {
        let registry = Arc::new(TaskGraph::from_config(&Config::default()).unwrap());
        Runner::new(
            registry,
            recorder,
            RunnerConfig {
                ordering,
                quiet: true,
            },
        )
    }

    #[tokio::test]
    async fn test_lib_invokes_only_dependencies() {
        let recorder = Arc::new(Recorder::default());
        runner(recorder.clone(), RunOrdering::Completion)
            .run_task("lib")
            .await
            .unwrap();

        assert_eq!(
            recorder.calls(),
            vec![Action::Transform(AssetCategory::Dependencies)]
        );
    }

    #[tokio::test]
    async fn test_build_initiation_order() {
        for ordering in [RunOrdering::Completion, RunOrdering::Initiation] {
            let recorder = Arc::new(Recorder::default());
            let results = runner(recorder.clone(), ordering)
                .run_task("build")
                .await
                .unwrap();

            assert_eq!(
                recorder.calls(),
                vec![
                    Action::Transform(AssetCategory::Scripts),
                    Action::Transform(AssetCategory::Html),
                    Action::Transform(AssetCategory::Css),
                    Action::Transform(AssetCategory::Images),
                    Action::Watch,
                ]
            );
            assert_eq!(results.len(), 5);
            assert!(results.iter().all(|r| r.success));
        }
    }

    #[tokio::test]
    async fn test_unknown_task_runs_nothing() {
        let recorder = Arc::new(Recorder::default());
        let result = runner(recorder.clone(), RunOrdering::Completion)
            .run_task("deploy")
            .await;

        assert!(matches!(result, Err(FrontpipeError::TaskNotFound { .. })));
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_completion_stops_at_first_failure() {
        let recorder = Arc::new(Recorder {
            fail_on: Some(Action::Transform(AssetCategory::Html)),
            ..Default::default()
        });
        let result = runner(recorder.clone(), RunOrdering::Completion)
            .run_task("build")
            .await;

        assert!(matches!(result, Err(FrontpipeError::Transform { .. })));
        assert_eq!(
            recorder.calls(),
            vec![
                Action::Transform(AssetCategory::Scripts),
                Action::Transform(AssetCategory::Html),
            ]
        );
    }

    #[tokio::test]
    async fn test_initiation_starts_everything_despite_failure() {
        let recorder = Arc::new(Recorder {
            fail_on: Some(Action::Transform(AssetCategory::Html)),
            ..Default::default()
        });
        let result = runner(recorder.clone(), RunOrdering::Initiation)
            .run_task("build")
            .await;

        assert!(matches!(result, Err(FrontpipeError::Transform { .. })));
        assert_eq!(recorder.calls().len(), 5);
    }
}
