//! Images: palette-reduce PNGs, strip SVG overhead, pass everything else
//! through untouched

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::{read_bytes, write_output, TransformReport, Transformer};
use crate::error::{FrontpipeError, Result};
use crate::paths::{expand, AssetCategory};

/// Quality bounds for PNG palette reduction, 0-100
#[derive(Debug, Clone, Copy)]
pub struct PngQuality {
    pub min: u8,
    pub max: u8,
}

pub(super) async fn run(t: &Transformer) -> Result<TransformReport> {
    let group = &t.paths().resolve(AssetCategory::Images).groups[0];
    let dest = t.root().join(&group.dest);
    let mut report = TransformReport::default();
    let mut first_error = None;

    for file in expand(t.root(), &group.patterns)? {
        let original = read_bytes(&file.path).await?;
        report.read += 1;

        let extension = file
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let optimized = match extension.as_str() {
            "png" => {
                let quality = t.png;
                let input = original.clone();
                tokio::task::spawn_blocking(move || compress_png(&input, quality))
                    .await
                    .map_err(|e| FrontpipeError::Io(std::io::Error::other(e.to_string())))?
                    .map(|smaller| smaller.unwrap_or_else(|| original.clone()))
            }
            "svg" => match std::str::from_utf8(&original) {
                Ok(text) => Ok(minify_svg(text).into_bytes()),
                Err(e) => Err(e.to_string()),
            },
            _ => Ok(original.clone()),
        };

        match optimized {
            Ok(bytes) => {
                debug!(
                    file = %file.path.display(),
                    before = original.len(),
                    after = bytes.len(),
                    "image"
                );
                let target = dest.join(&file.relative);
                write_output(&target, bytes).await?;
                report.written.push(target);
            }
            Err(reason) => {
                warn!(file = %file.path.display(), %reason, "skipping image");
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

/// Quantize a PNG to an indexed palette.
///
/// `Ok(None)` when the result would not meet the minimum quality or would
/// not be smaller than the input.
pub fn compress_png(input: &[u8], quality: PngQuality) -> std::result::Result<Option<Vec<u8>>, String> {
    let rgba = image::load_from_memory_with_format(input, image::ImageFormat::Png)
        .map_err(|e| e.to_string())?
        .to_rgba8();
    let (width, height) = rgba.dimensions();

    let pixels: Vec<imagequant::RGBA> = rgba
        .pixels()
        .map(|p| imagequant::RGBA::new(p[0], p[1], p[2], p[3]))
        .collect();

    let mut attr = imagequant::new();
    attr.set_quality(quality.min, quality.max)
        .map_err(|e| e.to_string())?;

    let mut img = attr
        .new_image(pixels, width as usize, height as usize, 0.0)
        .map_err(|e| e.to_string())?;

    let mut quantized = match attr.quantize(&mut img) {
        Ok(q) => q,
        Err(imagequant::Error::QualityTooLow) => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };
    quantized
        .set_dithering_level(1.0)
        .map_err(|e| e.to_string())?;
    let (palette, indexed) = quantized.remapped(&mut img).map_err(|e| e.to_string())?;

    let mut output = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut output, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);
        encoder.set_palette(
            palette
                .iter()
                .flat_map(|c| [c.r, c.g, c.b])
                .collect::<Vec<u8>>(),
        );
        if palette.iter().any(|c| c.a < u8::MAX) {
            encoder.set_trns(palette.iter().map(|c| c.a).collect::<Vec<u8>>());
        }

        let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
        writer
            .write_image_data(&indexed)
            .map_err(|e| e.to_string())?;
        writer.finish().map_err(|e| e.to_string())?;
    }

    Ok((output.len() < input.len()).then_some(output))
}

static SVG_PROLOG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<\?xml.*?\?>|<!DOCTYPE[^>]*>|<!--.*?-->|<metadata\b.*?</metadata>")
        .expect("static regex")
});

static SVG_BETWEEN_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").expect("static regex"));

/// Remove the XML prolog, doctype, comments, metadata and the whitespace
/// between tags. Attributes, `viewBox` included, are never touched.
pub fn minify_svg(source: &str) -> String {
    let stripped = SVG_PROLOG.replace_all(source, "");
    SVG_BETWEEN_TAGS
        .replace_all(&stripped, "><")
        .trim()
        .to_string()
}
