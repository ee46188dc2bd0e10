//! A conservative CSS minifier
//!
//! Removes comments (except `/*! ... */`), collapses whitespace, strips the
//! whitespace around punctuation that never needs it, drops the last `;` of
//! every block and removes empty rules. With `keep_breaks` a newline follows
//! every closing brace, so one rule stays on one line.

/// Minifier options
#[derive(Debug, Clone, Copy)]
pub struct CssOptions {
    pub keep_breaks: bool,
}

impl Default for CssOptions {
    fn default() -> Self {
        Self { keep_breaks: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    /// Holds `property: value` pairs
    Declarations,
    /// Holds nested rules (`@media`, `@keyframes`, ...)
    Rules,
}

const NESTING_AT_RULES: &[&str] = &[
    "@media",
    "@supports",
    "@document",
    "@layer",
    "@container",
    "@keyframes",
    "@-webkit-keyframes",
    "@-moz-keyframes",
    "@-o-keyframes",
];

/// Minify a stylesheet.
///
/// Fails with a description on unterminated comments or strings and on
/// unbalanced braces.
pub fn minify(source: &str, options: CssOptions) -> Result<String, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut blocks: Vec<(Block, usize)> = Vec::new();
    let mut statement_start = 0usize;
    let mut pending_space = false;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let in_declarations = matches!(blocks.last(), Some((Block::Declarations, _)));

        match c {
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = find_comment_end(&chars, i + 2)
                    .ok_or_else(|| format!("unterminated comment at line {}", line_at(&chars, i)))?;
                if chars.get(i + 2) == Some(&'!') {
                    out.extend(&chars[i..end]);
                    if options.keep_breaks {
                        out.push('\n');
                    }
                    statement_start = out.len();
                } else {
                    pending_space = true;
                }
                i = end;
                continue;
            }
            '"' | '\'' => {
                if pending_space && needs_space_before(&out) {
                    out.push(' ');
                }
                pending_space = false;
                let end = find_string_end(&chars, i)
                    .ok_or_else(|| format!("unterminated string at line {}", line_at(&chars, i)))?;
                out.extend(&chars[i..end]);
                i = end;
                continue;
            }
            c if c.is_whitespace() => {
                pending_space = true;
            }
            '{' => {
                trim_trailing_space(&mut out);
                let prelude = out[statement_start..].trim_start();
                let kind = if NESTING_AT_RULES
                    .iter()
                    .any(|at| prelude.split_whitespace().next() == Some(*at))
                {
                    Block::Rules
                } else {
                    Block::Declarations
                };
                blocks.push((kind, statement_start));
                out.push('{');
                statement_start = out.len();
                pending_space = false;
            }
            '}' => {
                let (_, prelude_start) = blocks
                    .pop()
                    .ok_or_else(|| format!("unexpected '}}' at line {}", line_at(&chars, i)))?;
                trim_trailing_space(&mut out);
                if out.ends_with(';') {
                    out.pop();
                }

                if out.ends_with('{') {
                    out.truncate(prelude_start);
                } else {
                    out.push('}');
                    if options.keep_breaks {
                        out.push('\n');
                    }
                }
                statement_start = out.len();
                pending_space = false;
            }
            ';' => {
                trim_trailing_space(&mut out);
                if !(out.ends_with(';') || out.ends_with('{')) {
                    out.push(';');
                }
                statement_start = out.len();
                pending_space = false;
            }
            ',' | '>' => {
                trim_trailing_space(&mut out);
                out.push(c);
                pending_space = false;
            }
            ':' if in_declarations => {
                trim_trailing_space(&mut out);
                out.push(':');
                pending_space = false;
            }
            _ => {
                if pending_space && needs_space_before(&out) {
                    out.push(' ');
                }
                out.push(c);
                pending_space = false;
            }
        }

        i += 1;
    }

    if !blocks.is_empty() {
        return Err(format!("{} unclosed block(s)", blocks.len()));
    }

    Ok(out.trim_end().to_string())
}

fn needs_space_before(out: &str) -> bool {
    match out.chars().last() {
        None => false,
        Some(last) => !matches!(last, '{' | '}' | ';' | ':' | ',' | '>' | '\n'),
    }
}

fn trim_trailing_space(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
}

/// Index just past the closing `*/`
fn find_comment_end(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len().saturating_sub(1))
        .find(|&j| chars[j] == '*' && chars[j + 1] == '/')
        .map(|j| j + 2)
}

/// Index just past the closing quote
fn find_string_end(chars: &[char], open: usize) -> Option<usize> {
    let quote = chars[open];
    let mut j = open + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 1,
            '\n' => return None,
            c if c == quote => return Some(j + 1),
            _ => {}
        }
        j += 1;
    }
    None
}

fn line_at(chars: &[char], index: usize) -> usize {
    chars[..index].iter().filter(|&&c| c == '\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"/* header */
body {
  color : red;
  margin: 0 auto;
}

h1,  h2 > span {
  font-weight: bold;;
}
.empty { }
a:hover , a :focus { background: url("a b.png") }
"#;

    #[test]
    fn test_keep_breaks() {
        let out = minify(SHEET, CssOptions { keep_breaks: true }).unwrap();
        assert_eq!(
            out,
            "body{color:red;margin:0 auto}\nh1,h2>span{font-weight:bold}\na:hover,a :focus{background:url(\"a b.png\")}"
        );
    }

    #[test]
    fn test_single_line() {
        let out = minify(SHEET, CssOptions { keep_breaks: false }).unwrap();
        assert!(!out.contains('\n'));
        assert!(out.starts_with("body{color:red;margin:0 auto}h1,h2>span{"));
    }

    #[test]
    fn test_media_block() {
        let src = "@media screen and (max-width: 600px) {\n  .nav { display : none; }\n  .gone {}\n}\n@font-face { font-family : Foo; }";
        let out = minify(src, CssOptions::default()).unwrap();
        assert_eq!(
            out,
            "@media screen and (max-width:600px){.nav{display:none}\n}\n@font-face{font-family:Foo}"
        );
    }

    #[test]
    fn test_important_comment_kept() {
        let out = minify("/*! license */\na { b: c }", CssOptions::default()).unwrap();
        assert_eq!(out, "/*! license */\na{b:c}");
    }

    #[test]
    fn test_malformed() {
        assert!(minify("a { b: c", CssOptions::default()).is_err());
        assert!(minify("a { b: c } }", CssOptions::default()).is_err());
        assert!(minify("/* open", CssOptions::default()).is_err());
        assert!(minify("a { content: \"x }", CssOptions::default()).is_err());
    }
}
