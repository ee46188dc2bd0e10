//! frontpipe - a front-end asset pipeline
//!
//! This crate provides both a CLI tool and a library. A fixed set of tasks
//! turns an `app/` source tree into a deployable `dist/` tree:
//!
//! - **clean** - empty the output directory
//! - **scripts** - DI-annotate, concatenate and source-map JavaScript
//! - **html** - copy pages and view templates
//! - **css** - minify stylesheets, keeping line breaks
//! - **images** - lossy PNG quantization and SVG minification
//! - **dependencies** - bundle bower packages into `lib.min.js`/`lib.min.css`
//! - **watch** - re-run tasks on change and push live-reload notifications
//!
//! Composite tasks (`build`, `lib`, and any declared in `frontpipe.toml`)
//! are resolved by the task graph and executed by the runner.
//!
//! # Example
//!
//! ```toml
//! # frontpipe.toml
//!
//! [paths.css]
//! src = ["app/styles/*.css", "app/vendor/*.css"]
//!
//! [tasks.dist]
//! desc = "Clean then build everything except watch"
//! depends = ["clean", "scripts", "html", "css", "images", "favicon", "lib"]
//! ```
//!
//! # Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use frontpipe::{Config, Pipeline, RunnerConfig, TaskGraph};
//!
//! #[tokio::main]
//! async fn main() -> frontpipe::Result<()> {
//!     let (config, _) = Config::load(None)?;
//!     let graph = Arc::new(TaskGraph::from_config(&config)?);
//!
//!     let pipeline = Pipeline::new(".", &config, graph, RunnerConfig::default())?;
//!     pipeline.runner().run_task("lib").await?;
//!
//!     Ok(())
//! }
//! ```

pub mod clean;
pub mod config;
pub mod error;
pub mod graph;
pub mod livereload;
pub mod paths;
pub mod pipeline;
pub mod runner;
pub mod transform;
pub mod watch;

pub use config::Config;
pub use error::{FrontpipeError, Result};
pub use graph::{Action, TaskGraph, TaskNode};
pub use paths::{AssetCategory, PathTable};
pub use pipeline::Pipeline;
pub use runner::{ActionHandler, ActionResult, Runner, RunnerConfig};
pub use transform::{TransformReport, Transformer};
