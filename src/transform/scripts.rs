//! Scripts: annotate, concatenate, attach an inline source map

use tracing::debug;

use super::annotate::annotate;
use super::sourcemap::Concat;
use super::{display_relative, read_text, write_output, TransformReport, Transformer};
use crate::error::{FrontpipeError, Result};
use crate::paths::{expand, AssetCategory};

/// Name of the concatenated bundle
pub const SCRIPTS_BUNDLE: &str = "scripts.min.js";

pub(super) async fn run(t: &Transformer) -> Result<TransformReport> {
    let paths = t.paths().resolve(AssetCategory::Scripts);
    let group = &paths.groups[0];
    let files = expand(t.root(), &group.patterns)?;

    if files.is_empty() {
        return Ok(TransformReport::default());
    }

    let mut concat = Concat::new(SCRIPTS_BUNDLE);
    for file in &files {
        let original = read_text(&file.path).await?;
        let annotated = annotate(&original).map_err(|reason| FrontpipeError::Transform {
            path: file.path.clone(),
            reason,
        })?;
        debug!(file = %file.path.display(), "annotated");
        concat.add(display_relative(&file.relative), &original, &annotated);
    }

    let (mut bundle, map) = concat.finish();
    bundle.push('\n');
    bundle.push_str(&map.inline_comment());
    bundle.push('\n');

    let target = t.root().join(&group.dest).join(SCRIPTS_BUNDLE);
    write_output(&target, bundle).await?;

    Ok(TransformReport {
        read: files.len(),
        written: vec![target],
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{snapshot, transformer, write};
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    fn decode_map(bundle: &str) -> serde_json::Value {
        let line = bundle
            .lines()
            .find(|l| l.starts_with("//# sourceMappingURL="))
            .expect("source map comment");
        let encoded = line.rsplit(',').next().unwrap();
        serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_single_script_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "app/scripts/a.js", b"console.log('a');");

        let report = transformer(root).run(AssetCategory::Scripts).await.unwrap();
        assert_eq!(report.read, 1);

        let out = snapshot(&root.join("dist"));
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["scripts/scripts.min.js"]);

        let bundle = String::from_utf8(out["scripts/scripts.min.js"].clone()).unwrap();
        assert!(bundle.starts_with("console.log('a');\n//# sourceMappingURL=data:application/json"));

        let map = decode_map(&bundle);
        assert_eq!(map["sources"], serde_json::json!(["a.js"]));
        assert_eq!(map["file"], "scripts.min.js");
    }

    #[tokio::test]
    async fn test_scripts_concatenated_and_annotated() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "app/scripts/app.js", b"angular.module('app', []);");
        write(
            root,
            "app/scripts/controllers/main.js",
            b"angular.module('app').controller('Main', function ($scope) {});",
        );

        transformer(root).run(AssetCategory::Scripts).await.unwrap();

        let bundle = std::fs::read_to_string(root.join("dist/scripts/scripts.min.js")).unwrap();
        assert!(bundle.contains(
            "angular.module('app', []);\nangular.module('app').controller('Main', ['$scope', function ($scope) {}]);\n"
        ));

        let map = decode_map(&bundle);
        assert_eq!(map["sources"], serde_json::json!(["app.js", "controllers/main.js"]));
        assert_eq!(
            map["sourcesContent"][1],
            "angular.module('app').controller('Main', function ($scope) {});"
        );
    }

    #[tokio::test]
    async fn test_broken_script_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "app/scripts/bad.js", b"app.run(function ($rootScope) {");

        let result = transformer(root).run(AssetCategory::Scripts).await;
        match result {
            Err(FrontpipeError::Transform { path, .. }) => assert!(path.ends_with("bad.js")),
            other => panic!("expected Transform error, got {:?}", other),
        }
        assert!(!root.join("dist").exists());
    }
}
