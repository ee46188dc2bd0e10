//! Stylesheets: one minified output per source

use tracing::warn;

use super::cssmin::minify;
use super::{read_text, write_output, TransformReport, Transformer};
use crate::error::{FrontpipeError, Result};
use crate::paths::{expand, AssetCategory};

/// A malformed sheet is skipped; the others are still written and the first
/// failure is returned at the end.
pub(super) async fn run(t: &Transformer) -> Result<TransformReport> {
    let group = &t.paths().resolve(AssetCategory::Css).groups[0];
    let dest = t.root().join(&group.dest);
    let mut report = TransformReport::default();
    let mut first_error = None;

    for file in expand(t.root(), &group.patterns)? {
        let source = read_text(&file.path).await?;
        report.read += 1;

        match minify(&source, t.css) {
            Ok(minified) => {
                let target = dest.join(&file.relative);
                write_output(&target, minified).await?;
                report.written.push(target);
            }
            Err(reason) => {
                warn!(file = %file.path.display(), %reason, "skipping stylesheet");
                first_error.get_or_insert(FrontpipeError::Transform {
                    path: file.path,
                    reason,
                });
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{snapshot, transformer, write};
    use super::*;

    #[tokio::test]
    async fn test_one_output_per_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "app/styles/main.css", b"body {\n  margin : 0;\n}\n\np { color: red; }\n");
        write(root, "app/styles/theme.css", b"/* theme */\n.a, .b { padding: 1px 2px; }\n");

        let report = transformer(root).run(AssetCategory::Css).await.unwrap();
        assert_eq!(report.written.len(), 2);

        let out = snapshot(&root.join("dist"));
        assert_eq!(out.len(), 2);
        assert_eq!(out["styles/main.css"], b"body{margin:0}\np{color:red}");
        assert_eq!(out["styles/theme.css"], b".a,.b{padding:1px 2px}");
    }

    #[tokio::test]
    async fn test_malformed_sheet_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "app/styles/a.css", b"a { color: red;");
        write(root, "app/styles/b.css", b"b { color: blue; }");

        let result = transformer(root).run(AssetCategory::Css).await;
        match result {
            Err(FrontpipeError::Transform { path, .. }) => assert!(path.ends_with("a.css")),
            other => panic!("expected Transform error, got {:?}", other),
        }
        assert_eq!(
            std::fs::read_to_string(root.join("dist/styles/b.css")).unwrap(),
            "b{color:blue}"
        );
    }
}
