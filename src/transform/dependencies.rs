//! Front-end dependencies: one bundle per extension

use std::path::{Path, PathBuf};

use super::bower;
use super::{read_text, write_output, TransformReport, Transformer};
use crate::error::Result;
use crate::paths::AssetCategory;

pub const LIB_JS: &str = "lib.min.js";
pub const LIB_CSS: &str = "lib.min.css";

pub(super) async fn run(t: &Transformer) -> Result<TransformReport> {
    let group = &t.paths().resolve(AssetCategory::Dependencies).groups[0];
    let dest = t.root().join(&group.dest);

    let mut files = Vec::new();
    for manifest in &group.patterns {
        files.extend(bower::resolve(t.root(), Path::new(manifest))?);
    }

    let mut report = TransformReport::default();
    for (extension, bundle) in [("js", LIB_JS), ("css", LIB_CSS)] {
        let matching: Vec<&PathBuf> = files
            .iter()
            .filter(|f| f.extension().is_some_and(|e| e.eq_ignore_ascii_case(extension)))
            .collect();

        if matching.is_empty() {
            continue;
        }

        let mut parts = Vec::with_capacity(matching.len());
        for file in &matching {
            parts.push(read_text(file).await?);
        }

        let target = dest.join(bundle);
        write_output(&target, parts.join("\n")).await?;
        report.read += matching.len();
        report.written.push(target);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{snapshot, transformer, write};
    use super::*;

    #[tokio::test]
    async fn test_bundles_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "bower.json", br#"{"dependencies": {"bootstrap": "*"}}"#);
        write(
            root,
            "bower_components/bootstrap/bower.json",
            br#"{"main": ["dist/bootstrap.css", "dist/bootstrap.js"], "dependencies": {"jquery": "*"}}"#,
        );
        write(root, "bower_components/bootstrap/dist/bootstrap.css", b".btn{}");
        write(root, "bower_components/bootstrap/dist/bootstrap.js", b"bootstrap();");
        write(root, "bower_components/jquery/bower.json", br#"{"main": "jquery.js"}"#);
        write(root, "bower_components/jquery/jquery.js", b"jQuery();");

        let report = transformer(root).run(AssetCategory::Dependencies).await.unwrap();
        assert_eq!(report.read, 3);

        let out = snapshot(&root.join("dist"));
        assert_eq!(out.len(), 2);
        assert_eq!(out["bower_components/lib.min.js"], b"jQuery();\nbootstrap();");
        assert_eq!(out["bower_components/lib.min.css"], b".btn{}");
    }

    #[tokio::test]
    async fn test_js_only_writes_one_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "bower.json", br#"{"dependencies": {"lodash": "*"}}"#);
        write(root, "bower_components/lodash/bower.json", br#"{"main": "lodash.js"}"#);
        write(root, "bower_components/lodash/lodash.js", b"_();");

        transformer(root).run(AssetCategory::Dependencies).await.unwrap();
        assert!(root.join("dist/bower_components/lib.min.js").exists());
        assert!(!root.join("dist/bower_components/lib.min.css").exists());
    }
}
