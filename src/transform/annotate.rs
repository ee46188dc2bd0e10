//! Dependency-injection annotation for AngularJS modules
//!
//! Rewrites injectable functions into the array form that survives
//! renaming of parameters:
//!
//! ```text
//! .controller('Main', function ($scope, $http) { ... })
//! .controller('Main', ['$scope', '$http', function ($scope, $http) { ... }])
//! ```
//!
//! Only the module API forms are recognised. Functions that are already in
//! array form, or take no parameters, are left untouched.

use once_cell::sync::Lazy;
use regex::Regex;

/// Registrations that take a name followed by the injectable function
static NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\.(?:controller|factory|service|directive|component|filter|provider|animation|decorator)\s*\(\s*(?:'[^'\n]*'|"[^"\n]*")\s*,\s*function\b"#,
    )
    .expect("static regex")
});

/// Registrations whose only argument is the injectable function
static BARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.(?:config|run)\s*\(\s*function\b").expect("static regex")
});

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*.*?\*/|//[^\n]*").expect("static regex"));

/// Annotate every injectable function in `source`.
///
/// Fails with a description when a function body is not terminated.
pub fn annotate(source: &str) -> Result<String, String> {
    let mut inserts: Vec<(usize, String)> = Vec::new();

    let starts = NAMED
        .find_iter(source)
        .chain(BARE.find_iter(source))
        .map(|m| m.end() - "function".len());

    for start in starts {
        let Some(function) = parse_function(source, start)? else {
            continue;
        };
        if function.params.is_empty() {
            continue;
        }

        let names: Vec<String> = function.params.iter().map(|p| format!("'{}'", p)).collect();
        inserts.push((start, format!("[{}, ", names.join(", "))));
        inserts.push((function.end, "]".to_string()));
    }

    // Positions refer to the original text; apply back to front.
    inserts.sort_by(|a, b| b.0.cmp(&a.0));

    let mut output = source.to_string();
    for (pos, text) in inserts {
        output.insert_str(pos, &text);
    }
    Ok(output)
}

struct FunctionSpan {
    params: Vec<String>,
    /// Byte offset just past the closing brace
    end: usize,
}

/// Parse `function name?(params) { body }` starting at `start`.
///
/// `Ok(None)` when the text is not a function expression after all.
fn parse_function(source: &str, start: usize) -> Result<Option<FunctionSpan>, String> {
    let rest = &source[start..];
    let Some(open) = rest.find('(') else {
        return Ok(None);
    };
    let Some(close) = rest[open..].find(')') else {
        return Ok(None);
    };

    let raw_params = &rest[open + 1..open + close];
    let params: Vec<String> = COMMENT
        .replace_all(raw_params, "")
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let after_params = start + open + close + 1;
    let body_offset = source[after_params..]
        .find(|c: char| !c.is_whitespace())
        .map(|o| after_params + o);

    match body_offset {
        Some(body) if source.as_bytes()[body] == b'{' => {
            let end = matching_brace(source, body).ok_or_else(|| {
                format!(
                    "unterminated function body starting at line {}",
                    line_of(source, start)
                )
            })?;
            Ok(Some(FunctionSpan { params, end }))
        }
        _ => Ok(None),
    }
}

/// Offset just past the `}` that closes the `{` at `open`.
///
/// Skips string literals, template literals, regex literals and comments.
fn matching_brace(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'/' if regex_allowed(bytes, i) => {
                i = regex_end(bytes, i);
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Keywords after which a `/` opens a regex literal
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof",
];

/// Whether the `/` at `slash` starts a regex literal rather than a division
fn regex_allowed(bytes: &[u8], slash: usize) -> bool {
    let before = &bytes[..slash];
    let Some(last) = before.iter().rposition(|b| !b.is_ascii_whitespace()) else {
        return true;
    };

    match before[last] {
        b'(' | b',' | b'=' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b'}' | b';'
        | b'+' | b'-' | b'*' | b'%' | b'<' | b'>' | b'~' | b'^' => true,
        c if is_ident(c) => {
            let start = before[..=last]
                .iter()
                .rposition(|&b| !is_ident(b))
                .map_or(0, |p| p + 1);
            let word = &before[start..=last];
            REGEX_KEYWORDS.iter().any(|k| k.as_bytes() == word)
        }
        _ => false,
    }
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Offset of the `/` closing the regex literal opened at `slash`.
///
/// Character classes may contain an unescaped `/`. A literal never spans
/// lines; hitting a newline ends the scan there.
fn regex_end(bytes: &[u8], slash: usize) -> usize {
    let mut i = slash + 1;
    let mut in_class = false;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => return i,
            b'\n' => return i,
            _ => {}
        }
        i += 1;
    }
    i
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_registration() {
        let src = "angular.module('app').controller('Main', function ($scope, $http) {\n  $scope.x = 1;\n});\n";
        let out = annotate(src).unwrap();
        assert_eq!(
            out,
            "angular.module('app').controller('Main', ['$scope', '$http', function ($scope, $http) {\n  $scope.x = 1;\n}]);\n"
        );
    }

    #[test]
    fn test_config_and_chained_registrations() {
        let src = "app.config(function($routeProvider) { $routeProvider.when('/', {}); })\n   .service(\"Api\", function Api($http) { return { get: function() { return '}'; } }; });";
        let out = annotate(src).unwrap();
        assert_eq!(
            out,
            "app.config(['$routeProvider', function($routeProvider) { $routeProvider.when('/', {}); }])\n   .service(\"Api\", ['$http', function Api($http) { return { get: function() { return '}'; } }; }]);"
        );
    }

    #[test]
    fn test_already_annotated_and_parameterless_untouched() {
        let src = "app.controller('A', ['$scope', function ($scope) {}]);\napp.run(function () {});\n";
        assert_eq!(annotate(src).unwrap(), src);
    }

    #[test]
    fn test_plain_code_untouched() {
        let src = "var x = 1;\nfunction helper(a, b) { return a + b; }\n";
        assert_eq!(annotate(src).unwrap(), src);
    }

    #[test]
    fn test_unterminated_body() {
        let err = annotate("app.factory('F', function ($q) {\n  return $q;\n").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_regex_literals_with_quotes() {
        let src = "app.controller('A', function ($scope) {\n  $scope.esc = function (s) { return s.replace(/'/g, \"\\\\'\"); };\n});\n";
        let out = annotate(src).unwrap();
        assert!(out.starts_with("app.controller('A', ['$scope', function ($scope) {"));
        assert!(out.ends_with("}]);\n"));

        let src = "app.factory('Q', function ($q) {\n  var q = /\"/g;\n  var r = /[/}]+/;\n  return $q;\n});\n";
        let out = annotate(src).unwrap();
        assert!(out.ends_with("}]);\n"));
    }

    #[test]
    fn test_division_is_not_a_regex() {
        let src = "app.filter('half', function ($log) { return function (n) { return n / 2 / 1; }; });";
        assert_eq!(
            annotate(src).unwrap(),
            "app.filter('half', ['$log', function ($log) { return function (n) { return n / 2 / 1; }; }]);"
        );
    }
}
