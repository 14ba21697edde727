use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest scale factor a source may carry bitmaps for (`@1x` .. `@4x`).
pub const MAX_SCALE_FACTOR: u32 = 4;

/// MaxRects placement heuristics, in the order the page search evaluates them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MaxRectsHeuristic {
    BestShortSideFit,
    BestLongSideFit,
    BestAreaFit,
    BottomLeft,
    ContactPoint,
}

impl MaxRectsHeuristic {
    /// Canonical evaluation order. Ties between results are resolved in favour of
    /// the heuristic that appears first here.
    pub const ALL: [MaxRectsHeuristic; 5] = [
        Self::BestShortSideFit,
        Self::BestLongSideFit,
        Self::BestAreaFit,
        Self::BottomLeft,
        Self::ContactPoint,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::BestShortSideFit => "bssf",
            Self::BestLongSideFit => "blsf",
            Self::BestAreaFit => "baf",
            Self::BottomLeft => "bl",
            Self::ContactPoint => "cp",
        }
    }
}

impl FromStr for MaxRectsHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "blsf" | "bestlongsidefit" => Ok(Self::BestLongSideFit),
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "cp" | "contactpoint" => Ok(Self::ContactPoint),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MaxRectsHeuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Texture sampling filter recorded in the manifest page header.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
    MipMap,
    MipMapNearestNearest,
    MipMapLinearNearest,
    MipMapNearestLinear,
    MipMapLinearLinear,
}

impl TextureFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "Nearest",
            Self::Linear => "Linear",
            Self::MipMap => "MipMap",
            Self::MipMapNearestNearest => "MipMapNearestNearest",
            Self::MipMapLinearNearest => "MipMapLinearNearest",
            Self::MipMapNearestLinear => "MipMapNearestLinear",
            Self::MipMapLinearLinear => "MipMapLinearLinear",
        }
    }
}

impl fmt::Display for TextureFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextureFilter {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "linear" => Ok(Self::Linear),
            "mipmap" => Ok(Self::MipMap),
            "mipmapnearestnearest" => Ok(Self::MipMapNearestNearest),
            "mipmaplinearnearest" => Ok(Self::MipMapLinearNearest),
            "mipmapnearestlinear" => Ok(Self::MipMapNearestLinear),
            "mipmaplinearlinear" => Ok(Self::MipMapLinearLinear),
            _ => Err(()),
        }
    }
}

/// Texture wrap mode per axis; combined into the manifest `repeat:` value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TextureWrap {
    MirroredRepeat,
    ClampToEdge,
    Repeat,
}

impl FromStr for TextureWrap {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mirroredrepeat" | "mirrored" => Ok(Self::MirroredRepeat),
            "clamptoedge" | "clamp" => Ok(Self::ClampToEdge),
            "repeat" => Ok(Self::Repeat),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TextureWrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MirroredRepeat => "MirroredRepeat",
            Self::ClampToEdge => "ClampToEdge",
            Self::Repeat => "Repeat",
        })
    }
}

/// Pixel format of the output pages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PixelFormat {
    Alpha,
    Intensity,
    LuminanceAlpha,
    #[serde(rename = "RGB565")]
    Rgb565,
    #[serde(rename = "RGBA4444")]
    Rgba4444,
    #[serde(rename = "RGB888")]
    Rgb888,
    #[serde(rename = "RGBA8888")]
    Rgba8888,
}

impl PixelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alpha => "Alpha",
            Self::Intensity => "Intensity",
            Self::LuminanceAlpha => "LuminanceAlpha",
            Self::Rgb565 => "RGB565",
            Self::Rgba4444 => "RGBA4444",
            Self::Rgb888 => "RGB888",
            Self::Rgba8888 => "RGBA8888",
        }
    }

    /// True when the encoded page keeps an alpha channel.
    pub fn has_alpha(&self) -> bool {
        !matches!(self, Self::Rgb565 | Self::Rgb888)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelFormat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alpha" => Ok(Self::Alpha),
            "intensity" => Ok(Self::Intensity),
            "luminancealpha" => Ok(Self::LuminanceAlpha),
            "rgb565" => Ok(Self::Rgb565),
            "rgba4444" => Ok(Self::Rgba4444),
            "rgb888" => Ok(Self::Rgb888),
            "rgba8888" => Ok(Self::Rgba8888),
            _ => Err(()),
        }
    }
}

/// Filter used when a scale level is derived from another one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    Nearest,
    Bilinear,
    Bicubic,
}

impl ResampleFilter {
    pub fn filter_type(&self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Bilinear => image::imageops::FilterType::Triangle,
            Self::Bicubic => image::imageops::FilterType::CatmullRom,
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" | "linear" => Ok(Self::Bilinear),
            "bicubic" | "cubic" => Ok(Self::Bicubic),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Bicubic => "bicubic",
        })
    }
}

/// Encoded page format; decides the page file extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Packing configuration shared by every stage.
///
/// Padding is added to the right/top of each footprint; with `edge_padding` the page
/// also gets a gutter along its outer edges. `duplicate_padding` halves the gutter and
/// fills it with the rectangle's own edge pixels instead of leaving it transparent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub padding_x: u32,
    pub padding_y: u32,
    pub edge_padding: bool,
    pub duplicate_padding: bool,

    /// Page sizes (and the binary search) are restricted to powers of two.
    pub power_of_two: bool,
    pub square: bool,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,

    pub allow_rotation: bool,
    /// Single greedy pass per page instead of "best rectangle next".
    pub fast: bool,
    /// Merge sources with identical pixels into one placement.
    pub alias: bool,
    pub ignore_blank_images: bool,

    /// Trim transparent columns (left/right), i.e. along the x axis.
    ///
    /// Some texture packer configs spell this as `stripWhitespaceX` but mean rows;
    /// swap the two flags when carrying such a config over.
    pub strip_whitespace_x: bool,
    /// Trim transparent rows (top/bottom), i.e. along the y axis.
    pub strip_whitespace_y: bool,
    /// Rows/columns whose alpha never exceeds this value count as blank.
    pub alpha_threshold: u8,

    /// Output scale factors; one set of pages and one manifest per entry.
    pub scales: Vec<u32>,
    pub format: PixelFormat,
    pub filter_min: TextureFilter,
    pub filter_mag: TextureFilter,
    pub wrap_x: TextureWrap,
    pub wrap_y: TextureWrap,
    pub resample: ResampleFilter,
    pub output_format: OutputFormat,
    pub jpeg_quality: f32,
    pub atlas_extension: String,
    pub premultiply_alpha: bool,
    /// Draw magenta outlines around placements and pages.
    pub debug: bool,
    /// Evaluate heuristics concurrently when the "parallel" feature is on.
    pub parallel: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            padding_x: 2,
            padding_y: 2,
            edge_padding: true,
            duplicate_padding: false,
            power_of_two: true,
            square: false,
            min_width: 16,
            min_height: 16,
            max_width: 1024,
            max_height: 1024,
            allow_rotation: false,
            fast: false,
            alias: true,
            ignore_blank_images: true,
            strip_whitespace_x: false,
            strip_whitespace_y: false,
            alpha_threshold: 0,
            scales: vec![1],
            format: PixelFormat::Rgba8888,
            filter_min: TextureFilter::Nearest,
            filter_mag: TextureFilter::Nearest,
            wrap_x: TextureWrap::ClampToEdge,
            wrap_y: TextureWrap::ClampToEdge,
            resample: ResampleFilter::Bilinear,
            output_format: OutputFormat::Png,
            jpeg_quality: 0.9,
            atlas_extension: ".atlas".into(),
            premultiply_alpha: false,
            debug: false,
            parallel: false,
        }
    }
}

impl Settings {
    /// Validates the configuration.
    ///
    /// Returns an error if:
    /// - max dimensions are zero or smaller than the minimums
    /// - power-of-two packing is requested with non power-of-two max dimensions
    /// - the scale list is empty or holds an unsupported factor
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AtlasPackerError;

        if self.max_width == 0 || self.max_height == 0 {
            return Err(AtlasPackerError::InvalidDimensions {
                width: self.max_width,
                height: self.max_height,
            });
        }
        if self.min_width > self.max_width || self.min_height > self.max_height {
            return Err(AtlasPackerError::InvalidConfig(format!(
                "min page size {}x{} exceeds max page size {}x{}",
                self.min_width, self.min_height, self.max_width, self.max_height
            )));
        }
        if self.power_of_two
            && (!self.max_width.is_power_of_two() || !self.max_height.is_power_of_two())
        {
            return Err(AtlasPackerError::NotPowerOfTwo {
                width: self.max_width,
                height: self.max_height,
            });
        }
        if self.scales.is_empty() {
            return Err(AtlasPackerError::InvalidConfig(
                "at least one output scale is required".into(),
            ));
        }
        if let Some(bad) = self
            .scales
            .iter()
            .find(|s| **s == 0 || **s > MAX_SCALE_FACTOR)
        {
            return Err(AtlasPackerError::InvalidConfig(format!(
                "output scale {} is outside 1..={}",
                bad, MAX_SCALE_FACTOR
            )));
        }
        if !(0.0..=1.0).contains(&self.jpeg_quality) {
            return Err(AtlasPackerError::InvalidConfig(format!(
                "jpeg_quality {} is outside 0..=1",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Manifest `repeat:` value derived from the two wrap modes.
    pub fn repeat_value(&self) -> &'static str {
        match (self.wrap_x, self.wrap_y) {
            (TextureWrap::Repeat, TextureWrap::Repeat) => "xy",
            (TextureWrap::Repeat, TextureWrap::ClampToEdge) => "x",
            (TextureWrap::ClampToEdge, TextureWrap::Repeat) => "y",
            _ => "none",
        }
    }

    /// Binary-search early exit threshold for the non power-of-two search.
    pub fn search_fuzziness(&self) -> u32 {
        if self.power_of_two {
            0
        } else if self.fast {
            25
        } else {
            15
        }
    }

    /// Create a fluent builder for `Settings`.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }
}

/// Builder for `Settings` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct SettingsBuilder {
    cfg: Settings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            cfg: Settings::default(),
        }
    }
    pub fn padding(mut self, x: u32, y: u32) -> Self {
        self.cfg.padding_x = x;
        self.cfg.padding_y = y;
        self
    }
    pub fn edge_padding(mut self, v: bool) -> Self {
        self.cfg.edge_padding = v;
        self
    }
    pub fn duplicate_padding(mut self, v: bool) -> Self {
        self.cfg.duplicate_padding = v;
        self
    }
    pub fn pow2(mut self, v: bool) -> Self {
        self.cfg.power_of_two = v;
        self
    }
    pub fn square(mut self, v: bool) -> Self {
        self.cfg.square = v;
        self
    }
    pub fn with_min_dimensions(mut self, w: u32, h: u32) -> Self {
        self.cfg.min_width = w;
        self.cfg.min_height = h;
        self
    }
    pub fn with_max_dimensions(mut self, w: u32, h: u32) -> Self {
        self.cfg.max_width = w;
        self.cfg.max_height = h;
        self
    }
    pub fn allow_rotation(mut self, v: bool) -> Self {
        self.cfg.allow_rotation = v;
        self
    }
    pub fn fast(mut self, v: bool) -> Self {
        self.cfg.fast = v;
        self
    }
    pub fn alias(mut self, v: bool) -> Self {
        self.cfg.alias = v;
        self
    }
    pub fn ignore_blank_images(mut self, v: bool) -> Self {
        self.cfg.ignore_blank_images = v;
        self
    }
    pub fn strip_whitespace(mut self, x: bool, y: bool) -> Self {
        self.cfg.strip_whitespace_x = x;
        self.cfg.strip_whitespace_y = y;
        self
    }
    pub fn alpha_threshold(mut self, v: u8) -> Self {
        self.cfg.alpha_threshold = v;
        self
    }
    pub fn scales(mut self, v: Vec<u32>) -> Self {
        self.cfg.scales = v;
        self
    }
    pub fn format(mut self, v: PixelFormat) -> Self {
        self.cfg.format = v;
        self
    }
    pub fn filter(mut self, min: TextureFilter, mag: TextureFilter) -> Self {
        self.cfg.filter_min = min;
        self.cfg.filter_mag = mag;
        self
    }
    pub fn wrap(mut self, x: TextureWrap, y: TextureWrap) -> Self {
        self.cfg.wrap_x = x;
        self.cfg.wrap_y = y;
        self
    }
    pub fn resample(mut self, v: ResampleFilter) -> Self {
        self.cfg.resample = v;
        self
    }
    pub fn output_format(mut self, v: OutputFormat) -> Self {
        self.cfg.output_format = v;
        self
    }
    pub fn jpeg_quality(mut self, v: f32) -> Self {
        self.cfg.jpeg_quality = v;
        self
    }
    pub fn atlas_extension(mut self, v: impl Into<String>) -> Self {
        self.cfg.atlas_extension = v.into();
        self
    }
    pub fn premultiply_alpha(mut self, v: bool) -> Self {
        self.cfg.premultiply_alpha = v;
        self
    }
    pub fn debug(mut self, v: bool) -> Self {
        self.cfg.debug = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn build(self) -> Settings {
        self.cfg
    }
}
