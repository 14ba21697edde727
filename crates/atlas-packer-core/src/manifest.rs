//! Text atlas manifest: writer, parser and JSON export.
//!
//! The text layout is one block per page image:
//!
//! ```text
//!
//! pack.png
//! size: 64,32
//! format: RGBA8888
//! filter: Nearest,Nearest
//! repeat: none
//! button
//!   rotate: false
//!   xy: 2, 2
//!   size: 30, 12
//!   split: 4, 4, 3, 3
//!   orig: 32, 14
//!   offset: 1, 1
//!   index: -1
//! ```
//!
//! `xy` is the top-left of the trimmed pixels in image coordinates (y down).

use crate::config::{PixelFormat, TextureFilter};
use crate::error::{AtlasPackerError, Result};
use crate::source::ImageSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every page of one emitted scale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AtlasManifest {
    pub pages: Vec<ManifestPage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPage {
    /// Page image file name.
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter_min: TextureFilter,
    pub filter_mag: TextureFilter,
    /// `none`, `x`, `y` or `xy`.
    pub repeat: String,
    /// Regions in `(name, index)` order, each followed by its aliases.
    pub regions: Vec<ManifestRegion>,
}

impl ManifestPage {
    fn named(image: &str) -> Self {
        Self {
            image: image.to_string(),
            width: 0,
            height: 0,
            format: PixelFormat::Rgba8888,
            filter_min: TextureFilter::Nearest,
            filter_mag: TextureFilter::Nearest,
            repeat: "none".into(),
            regions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRegion {
    pub name: String,
    pub index: i32,
    pub rotate: bool,
    pub x: u32,
    pub y: u32,
    /// Trimmed size, unrotated.
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<[i32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad: Option<[i32; 4]>,
    pub orig_width: u32,
    pub orig_height: u32,
    pub offset_x: u32,
    /// Distance from the bottom of the original image to the bottom of the trim.
    pub offset_y: u32,
}

impl ManifestRegion {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            index: -1,
            rotate: false,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            split: None,
            pad: None,
            orig_width: 0,
            orig_height: 0,
            offset_x: 0,
            offset_y: 0,
        }
    }

    /// Describes `source` placed with its trimmed top-left at `(x, y)` (base units),
    /// with every pixel quantity multiplied by `scale`.
    pub fn for_source(source: &ImageSource, x: u32, y: u32, rotate: bool, scale: u32) -> Self {
        let (orig_w, orig_h) = source.base_size().unwrap_or((0, 0));
        let strip = source.strip().unwrap_or_default();
        let guides = source.guides();
        let mul = |v: [i32; 4]| v.map(|e| if e < 0 { e } else { e * scale as i32 });
        Self {
            name: source.id().name.clone(),
            index: source.id().index,
            rotate,
            x: x * scale,
            y: y * scale,
            width: strip.w * scale,
            height: strip.h * scale,
            split: guides.splits.map(mul),
            pad: guides.pads.map(mul),
            orig_width: orig_w * scale,
            orig_height: orig_h * scale,
            offset_x: strip.x * scale,
            offset_y: orig_h.saturating_sub(strip.h + strip.y) * scale,
        }
    }
}

impl AtlasManifest {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn region(&self, name: &str, index: i32) -> Option<&ManifestRegion> {
        self.pages
            .iter()
            .flat_map(|p| p.regions.iter())
            .find(|r| r.name == name && r.index == index)
    }

    pub fn num_regions(&self) -> usize {
        self.pages.iter().map(|p| p.regions.len()).sum()
    }
}

impl fmt::Display for AtlasManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for page in &self.pages {
            writeln!(f)?;
            writeln!(f, "{}", page.image)?;
            writeln!(f, "size: {},{}", page.width, page.height)?;
            writeln!(f, "format: {}", page.format)?;
            writeln!(f, "filter: {},{}", page.filter_min, page.filter_mag)?;
            writeln!(f, "repeat: {}", page.repeat)?;
            for r in &page.regions {
                writeln!(f, "{}", r.name)?;
                writeln!(f, "  rotate: {}", r.rotate)?;
                writeln!(f, "  xy: {}, {}", r.x, r.y)?;
                writeln!(f, "  size: {}, {}", r.width, r.height)?;
                // readers expect a split line whenever pads are present
                match (r.split, r.pad) {
                    (Some(s), _) => writeln!(f, "  split: {}, {}, {}, {}", s[0], s[1], s[2], s[3])?,
                    (None, Some(_)) => writeln!(f, "  split: 0, 0, 0, 0")?,
                    (None, None) => {}
                }
                if let Some(p) = r.pad {
                    writeln!(f, "  pad: {}, {}, {}, {}", p[0], p[1], p[2], p[3])?;
                }
                writeln!(f, "  orig: {}, {}", r.orig_width, r.orig_height)?;
                writeln!(f, "  offset: {}, {}", r.offset_x, r.offset_y)?;
                writeln!(f, "  index: {}", r.index)?;
            }
        }
        Ok(())
    }
}

fn err(line: usize, reason: impl Into<String>) -> AtlasPackerError {
    AtlasPackerError::Manifest {
        line,
        reason: reason.into(),
    }
}

fn values<T: FromStr, const N: usize>(value: &str, line: usize) -> Result<[T; N]> {
    let parsed = value
        .split(',')
        .map(|v| v.trim().parse::<T>().map_err(|_| err(line, format!("bad number {:?}", v.trim()))))
        .collect::<Result<Vec<T>>>()?;
    let found = parsed.len();
    parsed
        .try_into()
        .map_err(|_| err(line, format!("expected {N} values, found {found}")))
}

fn parse_enum<T: FromStr>(value: &str, line: usize, what: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| err(line, format!("unknown {what} {:?}", value.trim())))
}

const PAGE_KEYS: [&str; 4] = ["size", "format", "filter", "repeat"];

/// Parses the text form back into an [`AtlasManifest`]. Whitespace around values and
/// separators is ignored; unknown region keys are an error.
pub fn parse_atlas(text: &str) -> Result<AtlasManifest> {
    let mut manifest = AtlasManifest::default();
    let mut expect_page = true;

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            expect_page = true;
            continue;
        }
        if expect_page {
            manifest.pages.push(ManifestPage::named(trimmed));
            expect_page = false;
            continue;
        }
        let Some(page) = manifest.pages.last_mut() else {
            return Err(err(line, "content before the first page"));
        };

        let indented = raw.starts_with(' ') || raw.starts_with('\t');
        let pair = trimmed.split_once(':').map(|(k, v)| (k.trim(), v.trim()));

        if !indented {
            match pair {
                Some((key, value)) if page.regions.is_empty() && PAGE_KEYS.contains(&key) => {
                    match key {
                        "size" => [page.width, page.height] = values::<u32, 2>(value, line)?,
                        "format" => page.format = parse_enum(value, line, "format")?,
                        "filter" => {
                            let (min, mag) = value
                                .split_once(',')
                                .ok_or_else(|| err(line, "filter needs min,mag"))?;
                            page.filter_min = parse_enum(min, line, "filter")?;
                            page.filter_mag = parse_enum(mag, line, "filter")?;
                        }
                        _ => page.repeat = value.to_string(),
                    }
                }
                _ => page.regions.push(ManifestRegion::named(trimmed)),
            }
            continue;
        }

        let region = page
            .regions
            .last_mut()
            .ok_or_else(|| err(line, "region attribute without a region"))?;
        let (key, value) = pair.ok_or_else(|| err(line, "expected `key: value`"))?;
        match key {
            "rotate" => {
                region.rotate = match value {
                    "true" => true,
                    "false" => false,
                    other => return Err(err(line, format!("bad rotate value {other:?}"))),
                }
            }
            "xy" => [region.x, region.y] = values::<u32, 2>(value, line)?,
            "size" => [region.width, region.height] = values::<u32, 2>(value, line)?,
            "split" => region.split = Some(values::<i32, 4>(value, line)?),
            "pad" => region.pad = Some(values::<i32, 4>(value, line)?),
            "orig" => [region.orig_width, region.orig_height] = values::<u32, 2>(value, line)?,
            "offset" => [region.offset_x, region.offset_y] = values::<u32, 2>(value, line)?,
            "index" => [region.index] = values::<i32, 1>(value, line)?,
            other => return Err(err(line, format!("unknown region key {other:?}"))),
        }
    }

    // a bare "0, 0, 0, 0" split only stands in for missing splits next to pads
    for region in manifest.pages.iter_mut().flat_map(|p| p.regions.iter_mut()) {
        if region.pad.is_some() && region.split == Some([0; 4]) {
            region.split = None;
        }
    }
    Ok(manifest)
}

/// `name` for scale 1, `name@Nx` otherwise.
pub fn scaled_name(base: &str, scale: u32) -> String {
    if scale == 1 {
        base.to_string()
    } else {
        format!("{base}@{scale}x")
    }
}

/// File name of page `index` (zero-based): `name.png`, `name2.png`, `name@2x3.png`...
pub fn page_image_name(base: &str, scale: u32, index: usize, extension: &str) -> String {
    let stem = scaled_name(base, scale);
    if index == 0 {
        format!("{stem}.{extension}")
    } else {
        format!("{stem}{}.{extension}", index + 1)
    }
}
