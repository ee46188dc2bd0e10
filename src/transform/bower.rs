//! Bower-style front-end dependency resolution
//!
//! Reads the project `bower.json`, walks installed components depth-first so
//! that every component's own dependencies come before it, and collects the
//! files each component declares in `main`. Root-level `overrides` replace a
//! component's `main` or `dependencies`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{FrontpipeError, Result};
use crate::paths::expand;

const DEFAULT_DIRECTORY: &str = "bower_components";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MainField {
    One(String),
    Many(Vec<String>),
}

impl MainField {
    fn patterns(&self) -> Vec<String> {
        match self {
            MainField::One(p) => vec![normalize(p)],
            MainField::Many(ps) => ps.iter().map(|p| normalize(p)).collect(),
        }
    }
}

fn normalize(pattern: &str) -> String {
    pattern.trim_start_matches("./").to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    main: Option<MainField>,
    #[serde(default)]
    dependencies: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    overrides: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Override {
    #[serde(default)]
    main: Option<MainField>,
    #[serde(default)]
    dependencies: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct BowerRc {
    #[serde(default)]
    directory: Option<PathBuf>,
}

#[derive(Debug)]
struct Resolver {
    components: PathBuf,
    overrides: serde_json::Map<String, serde_json::Value>,
    visited: HashSet<String>,
    files: Vec<PathBuf>,
}

/// All `main` files of the dependencies declared in `manifest`, in
/// dependency-first order. A missing manifest resolves to nothing.
pub fn resolve(root: &Path, manifest: &Path) -> Result<Vec<PathBuf>> {
    let manifest_path = root.join(manifest);
    if !manifest_path.exists() {
        debug!(path = %manifest_path.display(), "no bower manifest");
        return Ok(Vec::new());
    }

    let root_manifest = read_manifest(&manifest_path)?;
    let project_dir = manifest_path.parent().unwrap_or(root);

    let mut resolver = Resolver {
        components: components_dir(project_dir)?,
        overrides: root_manifest.overrides.clone(),
        visited: HashSet::new(),
        files: Vec::new(),
    };

    for name in root_manifest.dependencies.keys() {
        resolver.visit(name)?;
    }

    Ok(resolver.files)
}

/// The components directory: `.bowerrc` `directory`, else `bower_components`
fn components_dir(project_dir: &Path) -> Result<PathBuf> {
    let rc_path = project_dir.join(".bowerrc");
    if !rc_path.exists() {
        return Ok(project_dir.join(DEFAULT_DIRECTORY));
    }

    let content = std::fs::read_to_string(&rc_path).map_err(|e| FrontpipeError::fs(&rc_path, e))?;
    let rc: BowerRc = serde_json::from_str(&content).map_err(|e| FrontpipeError::Manifest {
        path: rc_path.clone(),
        reason: e.to_string(),
    })?;

    Ok(project_dir.join(rc.directory.unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY))))
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|e| FrontpipeError::fs(path, e))?;
    serde_json::from_str(&content).map_err(|e| FrontpipeError::Manifest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

impl Resolver {
    fn visit(&mut self, name: &str) -> Result<()> {
        if !self.visited.insert(name.to_string()) {
            return Ok(());
        }

        let dir = self.components.join(name);
        if !dir.is_dir() {
            return Err(FrontpipeError::DependencyNotInstalled {
                name: name.to_string(),
                dir: self.components.clone(),
            });
        }

        let manifest = [".bower.json", "bower.json"]
            .iter()
            .map(|f| dir.join(f))
            .find(|p| p.exists())
            .map(|p| read_manifest(&p))
            .transpose()?
            .unwrap_or_default();

        let over: Override = match self.overrides.get(name) {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                FrontpipeError::Manifest {
                    path: PathBuf::from("bower.json"),
                    reason: format!("override for '{}': {}", name, e),
                }
            })?,
            None => Override::default(),
        };

        let dependencies = over.dependencies.unwrap_or(manifest.dependencies);
        for dep in dependencies.keys() {
            self.visit(dep)?;
        }

        let Some(main) = over.main.or(manifest.main) else {
            warn!(component = name, "component declares no main files");
            return Ok(());
        };

        for file in expand(&dir, &main.patterns())? {
            debug!(component = name, file = %file.path.display(), "dependency file");
            self.files.push(file.path);
        }

        Ok(())
    }
}
