//! The path table: where every asset category is read from and written to
//!
//! Defaults follow the `app/` → `dist/` layout. Any entry can be overridden
//! from the `[paths]` section of `frontpipe.toml`.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FrontpipeError, Result};

/// Asset categories known to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Scripts,
    Html,
    Css,
    Images,
    Favicon,
    Dependencies,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 6] = [
        AssetCategory::Scripts,
        AssetCategory::Html,
        AssetCategory::Css,
        AssetCategory::Images,
        AssetCategory::Favicon,
        AssetCategory::Dependencies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Scripts => "scripts",
            AssetCategory::Html => "html",
            AssetCategory::Css => "css",
            AssetCategory::Images => "images",
            AssetCategory::Favicon => "favicon",
            AssetCategory::Dependencies => "dependencies",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of source globs written to one destination directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroup {
    pub patterns: Vec<String>,
    pub dest: PathBuf,
}

/// Resolved paths for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPaths {
    /// Source groups; the first one owns the primary destination
    pub groups: Vec<SourceGroup>,
    /// Secondary destination for the in-tree development variant
    pub dev: Option<PathBuf>,
}

impl CategoryPaths {
    fn single(patterns: &[&str], dest: &str) -> Self {
        Self {
            groups: vec![SourceGroup {
                patterns: patterns.iter().map(|p| p.to_string()).collect(),
                dest: PathBuf::from(dest),
            }],
            dev: None,
        }
    }

    fn with_dev(mut self, dev: &str) -> Self {
        self.dev = Some(PathBuf::from(dev));
        self
    }

    /// Primary destination directory
    pub fn destination(&self) -> &Path {
        &self.groups[0].dest
    }

    /// Every source pattern across all groups, in declaration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.patterns.iter().map(String::as_str))
    }
}

/// Static mapping from category to sources and destinations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTable {
    /// Glob of everything the cleaner removes
    pub clean: String,
    pub scripts: CategoryPaths,
    /// Extra patterns that trigger a scripts rebuild in watch mode
    pub scripts_watch: Vec<String>,
    pub html: CategoryPaths,
    pub css: CategoryPaths,
    pub images: CategoryPaths,
    pub favicon: CategoryPaths,
    /// Sources hold the bower manifest path
    pub dependencies: CategoryPaths,
}

impl Default for PathTable {
    fn default() -> Self {
        Self {
            clean: "dist/**/*".to_string(),
            scripts: CategoryPaths::single(&["app/scripts/**/*.js"], "dist/scripts")
                .with_dev("app/scripts"),
            scripts_watch: vec![
                "app/scripts/**/*.js".to_string(),
                "app/scripts/scripts.js".to_string(),
            ],
            html: CategoryPaths {
                groups: vec![
                    SourceGroup {
                        patterns: vec!["app/*.html".to_string()],
                        dest: PathBuf::from("dist"),
                    },
                    SourceGroup {
                        patterns: vec!["app/views/*.html".to_string()],
                        dest: PathBuf::from("dist/views"),
                    },
                ],
                dev: None,
            },
            css: CategoryPaths::single(&["app/styles/*.css"], "dist/styles"),
            images: CategoryPaths::single(&["app/images/*"], "dist/images"),
            favicon: CategoryPaths::single(&["app/favicon.ico"], "dist"),
            dependencies: CategoryPaths::single(&["bower.json"], "dist/bower_components")
                .with_dev("app/bower_components"),
        }
    }
}

impl PathTable {
    /// Look up the paths for a category
    pub fn resolve(&self, category: AssetCategory) -> &CategoryPaths {
        match category {
            AssetCategory::Scripts => &self.scripts,
            AssetCategory::Html => &self.html,
            AssetCategory::Css => &self.css,
            AssetCategory::Images => &self.images,
            AssetCategory::Favicon => &self.favicon,
            AssetCategory::Dependencies => &self.dependencies,
        }
    }

    /// Patterns whose changes re-run the given category in watch mode
    pub fn watch_patterns(&self, category: AssetCategory) -> Vec<String> {
        match category {
            AssetCategory::Scripts => self.scripts_watch.clone(),
            other => self.resolve(other).patterns().map(str::to_string).collect(),
        }
    }

    /// Check the table invariants and that every pattern compiles
    pub fn validate(&self) -> Result<()> {
        for category in AssetCategory::ALL {
            let paths = self.resolve(category);
            if paths.groups.is_empty() {
                return Err(FrontpipeError::InvalidConfig {
                    reason: format!("category '{}' has no destination", category),
                });
            }
            for group in &paths.groups {
                if group.patterns.is_empty() {
                    return Err(FrontpipeError::InvalidConfig {
                        reason: format!("category '{}' has no source pattern", category),
                    });
                }
                for pattern in &group.patterns {
                    check_pattern(pattern)?;
                }
            }
        }
        for pattern in self.scripts_watch.iter().chain(std::iter::once(&self.clean)) {
            check_pattern(pattern)?;
        }
        Ok(())
    }
}

fn check_pattern(pattern: &str) -> Result<()> {
    glob::Pattern::new(pattern)
        .map(|_| ())
        .map_err(|e| FrontpipeError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// A source file matched by a glob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Absolute (root-joined) path
    pub path: PathBuf,
    /// Path relative to the glob base; mirrored under the destination
    pub relative: PathBuf,
}

/// The leading part of a glob with no wildcards in it.
///
/// A pattern without wildcards has its parent directory as base, so
/// `app/favicon.ico` lands as `favicon.ico` in the destination.
pub fn glob_base(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').collect();
    let literal = components
        .iter()
        .take_while(|c| !c.contains(['*', '?', '[', '{']))
        .count();

    let take = if literal == components.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };

    components[..take].iter().collect()
}

/// Expand source patterns relative to `root`.
///
/// Files only, in glob order, each file at most once. A pattern that
/// matches nothing contributes nothing.
pub fn expand(root: &Path, patterns: &[String]) -> Result<Vec<MatchedFile>> {
    let mut seen = HashSet::new();
    let mut matched = Vec::new();

    for pattern in patterns {
        let base = root.join(glob_base(pattern));
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            pattern
        );

        let entries = glob::glob(&full).map_err(|e| FrontpipeError::InvalidGlob {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                FrontpipeError::fs(path, e.into())
            })?;

            if !path.is_file() || !seen.insert(path.clone()) {
                continue;
            }

            let relative = path
                .strip_prefix(&base)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));

            matched.push(MatchedFile { path, relative });
        }
    }

    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("app/scripts/**/*.js"), PathBuf::from("app/scripts"));
        assert_eq!(glob_base("app/*.html"), PathBuf::from("app"));
        assert_eq!(glob_base("app/favicon.ico"), PathBuf::from("app"));
        assert_eq!(glob_base("*.css"), PathBuf::new());
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = PathTable::default();
        table.validate().unwrap();

        for category in AssetCategory::ALL {
            let paths = table.resolve(category);
            assert!(paths.patterns().next().is_some());
        }
        assert_eq!(table.resolve(AssetCategory::Css).destination(), Path::new("dist/styles"));
        assert_eq!(
            table.resolve(AssetCategory::Scripts).dev.as_deref(),
            Some(Path::new("app/scripts"))
        );
    }

    #[test]
    fn test_empty_sources_rejected() {
        let mut table = PathTable::default();
        table.css.groups[0].patterns.clear();
        assert!(matches!(
            table.validate(),
            Err(FrontpipeError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_expand_keeps_nesting_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("app/scripts/controllers")).unwrap();
        std::fs::write(root.join("app/scripts/app.js"), "a").unwrap();
        std::fs::write(root.join("app/scripts/controllers/main.js"), "b").unwrap();

        let patterns = vec![
            "app/scripts/**/*.js".to_string(),
            "app/scripts/app.js".to_string(),
        ];
        let files = expand(root, &patterns).unwrap();

        let mut relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();
        relative.sort();
        assert_eq!(
            relative,
            vec![PathBuf::from("app.js"), PathBuf::from("controllers/main.js")]
        );
    }

    #[test]
    fn test_expand_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        let files = expand(dir.path(), &["app/images/*".to_string()]).unwrap();
        assert!(files.is_empty());
    }
}
