//! Concatenation with a version 3 source map
//!
//! Every generated line is mapped back to the line it came from. The map is
//! attached inline as a base64 data URL comment.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

const BASE64_DIGITS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// A source map document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    /// `//# sourceMappingURL=` comment carrying the whole map
    pub fn inline_comment(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        format!(
            "//# sourceMappingURL=data:application/json;charset=utf8;base64,{}",
            STANDARD.encode(json)
        )
    }
}

/// Concatenates sources with `\n` while tracking line mappings
#[derive(Debug)]
pub struct Concat {
    file: String,
    content: String,
    sources: Vec<String>,
    sources_content: Vec<String>,
    /// Per generated line: `(source index, source line)`, `None` for blank lines
    lines: Vec<Option<(usize, usize)>>,
}

impl Concat {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            content: String::new(),
            sources: Vec::new(),
            sources_content: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Append one source.
    ///
    /// `original` is embedded as `sourcesContent`; `transformed` is what goes
    /// into the output and must keep the line structure of `original`.
    pub fn add(&mut self, name: impl Into<String>, original: &str, transformed: &str) {
        if !self.sources.is_empty() {
            self.content.push('\n');
        }

        let index = self.sources.len();
        self.sources.push(name.into());
        self.sources_content.push(original.to_string());

        for (line, text) in transformed.split('\n').enumerate() {
            self.lines
                .push((!text.trim().is_empty()).then_some((index, line)));
        }
        self.content.push_str(transformed);
    }

    /// The concatenated text and its map
    pub fn finish(self) -> (String, SourceMap) {
        let mappings = encode_mappings(&self.lines);
        let map = SourceMap {
            version: 3,
            file: self.file,
            sources: self.sources,
            sources_content: self.sources_content,
            names: Vec::new(),
            mappings,
        };
        (self.content, map)
    }
}

fn encode_mappings(lines: &[Option<(usize, usize)>]) -> String {
    let mut out = String::new();
    let mut prev_source = 0i64;
    let mut prev_line = 0i64;

    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        if let Some((source, source_line)) = *line {
            let (source, source_line) = (source as i64, source_line as i64);
            // generated column, source delta, line delta, source column
            encode_vlq(&mut out, 0);
            encode_vlq(&mut out, source - prev_source);
            encode_vlq(&mut out, source_line - prev_line);
            encode_vlq(&mut out, 0);
            prev_source = source;
            prev_line = source_line;
        }
    }

    out
}

fn encode_vlq(out: &mut String, value: i64) {
    let signed = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    let mut vlq = signed as u64;

    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64_DIGITS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut s = String::new();
        encode_vlq(&mut s, value);
        s
    }

    #[test]
    fn test_vlq() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
    }

    #[test]
    fn test_concat_mappings() {
        let mut concat = Concat::new("scripts.min.js");
        concat.add("a.js", "var a;\nvar b;", "var a;\nvar b;");
        concat.add("b.js", "\nvar c;", "\nvar c;");
        let (content, map) = concat.finish();

        assert_eq!(content, "var a;\nvar b;\n\nvar c;");
        assert_eq!(map.sources, vec!["a.js", "b.js"]);
        // a:0, a:1, blank, b:1
        assert_eq!(map.mappings, "AAAA;AACA;;ACAA");
    }

    #[test]
    fn test_inline_comment_round_trips() {
        let mut concat = Concat::new("scripts.min.js");
        concat.add("a.js", "x();", "x();");
        let (_, map) = concat.finish();

        let comment = map.inline_comment();
        let encoded = comment
            .strip_prefix("//# sourceMappingURL=data:application/json;charset=utf8;base64,")
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["sourcesContent"][0], "x();");
        assert_eq!(json["file"], "scripts.min.js");
    }
}
