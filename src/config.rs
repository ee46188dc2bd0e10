//! Configuration parsing for frontpipe.toml
//!
//! The file is optional. Without one the built-in `app/` → `dist/` layout and
//! the built-in tasks are used unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{FrontpipeError, Result};
use crate::paths::{CategoryPaths, PathTable, SourceGroup};

/// Default config file names to search for
pub const CONFIG_FILES: &[&str] = &["frontpipe.toml", "Frontpipe.toml"];

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Overrides for the path table
    #[serde(default)]
    pub paths: PathsConfig,

    /// Composite task aliases
    #[serde(default)]
    pub tasks: HashMap<String, TaskConfig>,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// How the runner sequences the actions of one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOrdering {
    /// Await each action before starting the next
    #[default]
    Completion,
    /// Start every action in order, then wait for all of them
    Initiation,
}

/// Global settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub ordering: RunOrdering,

    /// Watch debounce delay in milliseconds
    #[serde(default = "default_debounce")]
    pub watch_debounce_ms: u64,

    /// Keep a line break after every CSS rule
    #[serde(default = "default_true")]
    pub keep_breaks: bool,

    /// Minimum acceptable PNG quality (0-100); below it the original is kept
    #[serde(default = "default_png_min")]
    pub png_quality_min: u8,

    /// Target PNG quality (0-100)
    #[serde(default = "default_png_max")]
    pub png_quality_max: u8,

    /// Start the live-reload server in watch mode
    #[serde(default = "default_true")]
    pub livereload: bool,

    #[serde(default = "default_livereload_port")]
    pub livereload_port: u16,
}

fn default_true() -> bool {
    true
}

fn default_debounce() -> u64 {
    100
}

fn default_png_min() -> u8 {
    65
}

fn default_png_max() -> u8 {
    80
}

fn default_livereload_port() -> u16 {
    35729
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ordering: RunOrdering::default(),
            watch_debounce_ms: default_debounce(),
            keep_breaks: true,
            png_quality_min: default_png_min(),
            png_quality_max: default_png_max(),
            livereload: true,
            livereload_port: default_livereload_port(),
        }
    }
}

/// A composite task declared in configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Human-readable description
    #[serde(default)]
    pub desc: Option<String>,

    /// Tasks to run, in order
    #[serde(default)]
    pub depends: Vec<String>,
}

/// `[paths]` overrides; anything left out keeps its default
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    #[serde(default)]
    pub clean: Option<String>,
    #[serde(default)]
    pub scripts: Option<CategoryOverride>,
    #[serde(default)]
    pub html: Option<HtmlOverride>,
    #[serde(default)]
    pub css: Option<CategoryOverride>,
    #[serde(default)]
    pub images: Option<CategoryOverride>,
    #[serde(default)]
    pub favicon: Option<CategoryOverride>,
    #[serde(default)]
    pub dependencies: Option<CategoryOverride>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryOverride {
    #[serde(default)]
    pub src: Option<Vec<String>>,
    #[serde(default)]
    pub dest: Option<PathBuf>,
    #[serde(default)]
    pub dev: Option<PathBuf>,
    /// Only meaningful for scripts
    #[serde(default)]
    pub watch: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HtmlOverride {
    #[serde(default)]
    pub base: Option<Vec<String>>,
    #[serde(default)]
    pub views: Option<Vec<String>>,
    #[serde(default)]
    pub base_dest: Option<PathBuf>,
    #[serde(default)]
    pub views_dest: Option<PathBuf>,
}

impl CategoryOverride {
    fn apply(&self, paths: &mut CategoryPaths) {
        let group = &mut paths.groups[0];
        if let Some(src) = &self.src {
            group.patterns = src.clone();
        }
        if let Some(dest) = &self.dest {
            group.dest = dest.clone();
        }
        if let Some(dev) = &self.dev {
            paths.dev = Some(dev.clone());
        }
    }
}

impl HtmlOverride {
    fn apply(&self, paths: &mut CategoryPaths) {
        fn set(group: &mut SourceGroup, src: &Option<Vec<String>>, dest: &Option<PathBuf>) {
            if let Some(src) = src {
                group.patterns = src.clone();
            }
            if let Some(dest) = dest {
                group.dest = dest.clone();
            }
        }
        set(&mut paths.groups[0], &self.base, &self.base_dest);
        set(&mut paths.groups[1], &self.views, &self.views_dest);
    }
}

impl Config {
    /// Load configuration from the specified path or search for it.
    ///
    /// Returns the path it was read from, or `None` when no file exists and
    /// defaults are in effect. An explicit path that does not exist is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let config_path = match path {
            Some(p) => {
                if p.exists() {
                    p.to_path_buf()
                } else {
                    return Err(FrontpipeError::ConfigNotFound {
                        searched: vec![p.to_path_buf()],
                    });
                }
            }
            None => match Self::find_config()? {
                Some(p) => p,
                None => return Ok((Config::default(), None)),
            },
        };

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| FrontpipeError::fs(&config_path, e))?;
        let config = Self::parse(&content, &config_path)?;

        Ok((config, Some(config_path)))
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| FrontpipeError::ConfigParse {
            source: e,
            path: path.to_path_buf(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Search for a config file starting from the current directory
    fn find_config() -> Result<Option<PathBuf>> {
        let mut current = std::env::current_dir()?;

        loop {
            for name in CONFIG_FILES {
                let candidate = current.join(name);
                if candidate.exists() {
                    return Ok(Some(candidate));
                }
            }

            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        for (name, task) in &self.tasks {
            if task.depends.is_empty() {
                return Err(FrontpipeError::InvalidTask {
                    task: name.clone(),
                    reason: "Task must list the tasks it runs in 'depends'".to_string(),
                });
            }

            if task.depends.contains(name) {
                return Err(FrontpipeError::InvalidTask {
                    task: name.clone(),
                    reason: "Task cannot depend on itself".to_string(),
                });
            }
        }

        let s = &self.settings;
        if s.png_quality_max > 100 || s.png_quality_min > s.png_quality_max {
            return Err(FrontpipeError::InvalidConfig {
                reason: format!(
                    "PNG quality range {}-{} must satisfy min <= max <= 100",
                    s.png_quality_min, s.png_quality_max
                ),
            });
        }

        self.path_table()?;
        Ok(())
    }

    /// Build the path table: defaults with `[paths]` overrides applied
    pub fn path_table(&self) -> Result<PathTable> {
        let mut table = PathTable::default();
        let p = &self.paths;

        if let Some(clean) = &p.clean {
            table.clean = clean.clone();
        }
        if let Some(scripts) = &p.scripts {
            scripts.apply(&mut table.scripts);
            if let Some(watch) = &scripts.watch {
                table.scripts_watch = watch.clone();
            } else if let Some(src) = &scripts.src {
                table.scripts_watch = src.clone();
            }
        }
        if let Some(html) = &p.html {
            html.apply(&mut table.html);
        }
        for (over, paths) in [
            (&p.css, &mut table.css),
            (&p.images, &mut table.images),
            (&p.favicon, &mut table.favicon),
            (&p.dependencies, &mut table.dependencies),
        ] {
            if let Some(over) = over {
                over.apply(paths);
            }
        }

        table.validate()?;
        Ok(table)
    }
}

/// Starter config written by `frontpipe init`
pub const TEMPLATE: &str = r#"# frontpipe.toml - front-end pipeline configuration
# Every entry is optional; the values below are the defaults.

[paths]
clean = "dist/**/*"

[paths.scripts]
src = ["app/scripts/**/*.js"]
dest = "dist/scripts"
dev = "app/scripts"
watch = ["app/scripts/**/*.js", "app/scripts/scripts.js"]

[paths.html]
base = ["app/*.html"]
views = ["app/views/*.html"]
base_dest = "dist"
views_dest = "dist/views"

[paths.css]
src = ["app/styles/*.css"]
dest = "dist/styles"

[paths.images]
src = ["app/images/*"]
dest = "dist/images"

[paths.favicon]
src = ["app/favicon.ico"]
dest = "dist"

[paths.dependencies]
src = ["bower.json"]
dest = "dist/bower_components"
dev = "app/bower_components"

[settings]
# ordering = "completion"   # or "initiation": start all, then wait
# watch_debounce_ms = 100
# keep_breaks = true
# png_quality_min = 65
# png_quality_max = 80
# livereload = true
# livereload_port = 35729

# [tasks.release]
# desc = "Clean, then build everything including dependencies"
# depends = ["clean", "scripts", "html", "css", "images", "favicon", "dependencies"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("", Path::new("frontpipe.toml")).unwrap();
        assert_eq!(config.path_table().unwrap(), PathTable::default());
        assert_eq!(config.settings.ordering, RunOrdering::Completion);
        assert!(config.settings.keep_breaks);
        assert_eq!(config.settings.livereload_port, 35729);
    }

    #[test]
    fn test_template_matches_defaults() {
        let config = Config::parse(TEMPLATE, Path::new("frontpipe.toml")).unwrap();
        assert_eq!(config.path_table().unwrap(), PathTable::default());
    }

    #[test]
    fn test_path_overrides() {
        let toml = r#"
            [paths.css]
            dest = "public/css"

            [paths.html]
            views = ["app/partials/*.html"]
        "#;

        let config = Config::parse(toml, Path::new("frontpipe.toml")).unwrap();
        let table = config.path_table().unwrap();
        assert_eq!(table.css.destination(), Path::new("public/css"));
        assert_eq!(table.css.groups[0].patterns, vec!["app/styles/*.css"]);
        assert_eq!(table.html.groups[1].patterns, vec!["app/partials/*.html"]);
        assert_eq!(table.html.groups[1].dest, PathBuf::from("dist/views"));
    }

    #[test]
    fn test_parse_task_alias() {
        let toml = r#"
            [settings]
            ordering = "initiation"

            [tasks.release]
            desc = "Everything"
            depends = ["clean", "build"]
        "#;

        let config = Config::parse(toml, Path::new("frontpipe.toml")).unwrap();
        assert_eq!(config.settings.ordering, RunOrdering::Initiation);
        assert_eq!(config.tasks["release"].depends, vec!["clean", "build"]);
    }

    #[test]
    fn test_self_dependency_rejected() {
        let toml = r#"
            [tasks.loop]
            depends = ["loop"]
        "#;

        let result = Config::parse(toml, Path::new("frontpipe.toml"));
        assert!(matches!(result, Err(FrontpipeError::InvalidTask { .. })));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = Config::parse("[settings]\nminify = true\n", Path::new("frontpipe.toml"));
        assert!(matches!(result, Err(FrontpipeError::ConfigParse { .. })));
    }

    #[test]
    fn test_bad_quality_range() {
        let toml = "[settings]\npng_quality_min = 90\npng_quality_max = 80\n";
        let result = Config::parse(toml, Path::new("frontpipe.toml"));
        assert!(matches!(result, Err(FrontpipeError::InvalidConfig { .. })));
    }
}
