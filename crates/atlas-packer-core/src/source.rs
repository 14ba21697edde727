//! Per-name source images and their normalization into a packable footprint.

use crate::config::{MAX_SCALE_FACTOR, ResampleFilter, Settings};
use crate::error::{AtlasPackerError, Result};
use crate::geometry::{BaseBounds, whitespace_bounds};
use crate::model::{Rect, SourceId};
use crate::ninepatch::{NinepatchGuides, extract_guides};
use crate::observer::PackObserver;
use crate::resample;
use image::RgbaImage;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

const SLOTS: usize = MAX_SCALE_FACTOR as usize;

/// Renders a resolution-independent image (SVG, glyph outlines...) at any pixel size.
pub trait Rasterizer {
    /// Pixel size of the image at the scale factor it was registered for.
    fn natural_size(&self) -> (u32, u32);
    /// Render at exactly `width x height`.
    fn rasterize(&self, width: u32, height: u32) -> std::result::Result<RgbaImage, String>;
}

/// Decoded input for one scale factor of a source.
pub enum SourceImage {
    Bitmap { rgba: RgbaImage, ninepatch: bool },
    Vector(Box<dyn Rasterizer>),
}

impl SourceImage {
    pub fn bitmap(rgba: RgbaImage) -> Self {
        Self::Bitmap {
            rgba,
            ninepatch: false,
        }
    }

    /// A bitmap still carrying its 1px ninepatch guide border.
    pub fn ninepatch(rgba: RgbaImage) -> Self {
        Self::Bitmap {
            rgba,
            ninepatch: true,
        }
    }

    pub fn vector(rasterizer: impl Rasterizer + 'static) -> Self {
        Self::Vector(Box::new(rasterizer))
    }

    fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitmap { rgba, ninepatch } => f
                .debug_struct("Bitmap")
                .field("size", &rgba.dimensions())
                .field("ninepatch", ninepatch)
                .finish(),
            Self::Vector(r) => f
                .debug_tuple("Vector")
                .field(&r.natural_size())
                .finish(),
        }
    }
}

/// What happened to an image handed to [`ImageSource::add_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Bitmap stored as the raster override of a vector at the same factor.
    Override,
    /// The factor was already taken; the first assignment stays.
    Ignored,
}

/// Where the bitmap of one output scale came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOrigin {
    Explicit,
    DerivedDown { from: u32 },
    DerivedUp { from: u32 },
    Missing,
}

#[derive(Debug)]
struct ScaleSlot {
    primary: SourceImage,
    raster_override: Option<RgbaImage>,
}

/// Geometry fixed by validation.
#[derive(Debug, Clone, Copy)]
struct Normalized {
    base_width: u32,
    base_height: u32,
    ninepatch: bool,
    guides: NinepatchGuides,
    strip: Rect,
    blank: bool,
}

/// All scale-factor variants of one logical image.
#[derive(Debug)]
pub struct ImageSource {
    id: SourceId,
    slots: [Option<ScaleSlot>; SLOTS],
    bitmaps: [Option<RgbaImage>; SLOTS],
    origins: [ScaleOrigin; SLOTS],
    normalized: Option<Normalized>,
    digest: OnceLock<[u8; 32]>,
}

fn check_factor(id: &SourceId, scale: u32) -> Result<usize> {
    if (1..=MAX_SCALE_FACTOR).contains(&scale) {
        Ok(scale as usize - 1)
    } else {
        Err(AtlasPackerError::InvalidScaleFactor {
            name: id.to_string(),
            scale,
        })
    }
}

impl ImageSource {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            slots: Default::default(),
            bitmaps: Default::default(),
            origins: [ScaleOrigin::Missing; SLOTS],
            normalized: None,
            digest: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn is_validated(&self) -> bool {
        self.normalized.is_some()
    }

    /// Registers `image` for `scale`. First assignment per factor wins, except that a
    /// bitmap added on top of a vector becomes the vector's raster override.
    pub fn add_image(&mut self, scale: u32, image: SourceImage) -> Result<AddOutcome> {
        if self.is_validated() {
            return Err(AtlasPackerError::AlreadyValidated {
                name: self.id.to_string(),
            });
        }
        let i = check_factor(&self.id, scale)?;
        let Some(slot) = self.slots[i].as_mut() else {
            self.slots[i] = Some(ScaleSlot {
                primary: image,
                raster_override: None,
            });
            return Ok(AddOutcome::Added);
        };
        match image {
            SourceImage::Bitmap { rgba, .. }
                if slot.primary.is_vector() && slot.raster_override.is_none() =>
            {
                slot.raster_override = Some(rgba);
                Ok(AddOutcome::Override)
            }
            _ => Ok(AddOutcome::Ignored),
        }
    }

    /// Fixes base size, ninepatch guides, every requested scale bitmap and the trim
    /// rectangle. Can run only once.
    pub fn validate(&mut self, settings: &Settings, observer: &mut dyn PackObserver) -> Result<()> {
        let name = self.id.to_string();
        if self.is_validated() {
            return Err(AtlasPackerError::AlreadyValidated { name });
        }
        let lowest = self
            .slots
            .iter()
            .position(Option::is_some)
            .ok_or_else(|| AtlasPackerError::NoImages { name: name.clone() })?;
        let lowest_factor = lowest as u32 + 1;

        // Geometry always comes from the primary image of the lowest factor.
        let (ninepatch, guides, (geo_w, geo_h)) = match self.slots[lowest].as_ref().map(|s| &s.primary) {
            Some(SourceImage::Bitmap {
                rgba,
                ninepatch: true,
            }) => {
                let (inner, guides) = extract_guides(&name, rgba)?;
                (true, guides.to_base(lowest_factor), inner.dimensions())
            }
            Some(SourceImage::Bitmap { rgba, .. }) => (false, NinepatchGuides::default(), rgba.dimensions()),
            Some(SourceImage::Vector(r)) => (false, NinepatchGuides::default(), r.natural_size()),
            None => return Err(AtlasPackerError::NoImages { name }),
        };
        let base_width = geo_w / lowest_factor;
        let base_height = geo_h / lowest_factor;
        if base_width == 0 || base_height == 0 {
            return Err(AtlasPackerError::InvalidConfig(format!(
                "\"{}\" is {}x{} at @{}x, smaller than one base pixel",
                name, geo_w, geo_h, lowest_factor
            )));
        }

        let mut scales = settings.scales.clone();
        scales.sort_unstable();
        scales.dedup();

        for &scale in &scales {
            let i = check_factor(&self.id, scale)?;
            let (ew, eh) = (base_width * scale, base_height * scale);
            if self.slots[i].is_some() {
                let (bitmap, measured) = self.render_slot(i, ew, eh, settings.resample)?;
                if measured != (ew, eh) {
                    observer.on_warning(
                        &name,
                        &format!(
                            "expected {}x{} at @{}x but the image is {}x{}; it was resampled and may look distorted",
                            ew, eh, scale, measured.0, measured.1
                        ),
                    );
                }
                self.bitmaps[i] = Some(bitmap);
                self.origins[i] = ScaleOrigin::Explicit;
            }
        }

        for &scale in &scales {
            let i = scale as usize - 1;
            if self.origins[i] == ScaleOrigin::Explicit {
                continue;
            }
            let (ew, eh) = (base_width * scale, base_height * scale);
            let down = (scale + 1..=MAX_SCALE_FACTOR).find(|f| self.slots[*f as usize - 1].is_some());
            let origin = match down {
                Some(from) => ScaleOrigin::DerivedDown { from },
                None => match (1..scale).rev().find(|f| self.slots[*f as usize - 1].is_some()) {
                    Some(from) => ScaleOrigin::DerivedUp { from },
                    None => ScaleOrigin::Missing,
                },
            };
            let from = match origin {
                ScaleOrigin::DerivedDown { from } | ScaleOrigin::DerivedUp { from } => from,
                _ => return Err(AtlasPackerError::MissingScale { name, scale }),
            };
            let (bitmap, _) = self.render_slot(from as usize - 1, ew, eh, settings.resample)?;
            self.bitmaps[i] = Some(bitmap);
            self.origins[i] = origin;
        }

        let (strip, blank) = self.compute_strip(settings, &scales, base_width, base_height);
        self.normalized = Some(Normalized {
            base_width,
            base_height,
            ninepatch,
            guides,
            strip,
            blank,
        });
        Ok(())
    }

    /// Renders slot `i` at `w x h`; also reports the slot's own measured size.
    fn render_slot(&self, i: usize, w: u32, h: u32, filter: ResampleFilter) -> Result<(RgbaImage, (u32, u32))> {
        let name = self.id.to_string();
        let Some(slot) = self.slots[i].as_ref() else {
            return Err(AtlasPackerError::MissingScale {
                name,
                scale: i as u32 + 1,
            });
        };
        let fit = |img: RgbaImage| {
            let measured = img.dimensions();
            if measured == (w, h) {
                (img, measured)
            } else {
                (resample::resize(&img, w, h, filter), measured)
            }
        };
        match (&slot.primary, &slot.raster_override) {
            (SourceImage::Vector(_), Some(raster)) => Ok(fit(raster.clone())),
            (SourceImage::Vector(r), None) => {
                let img = r
                    .rasterize(w, h)
                    .map_err(|reason| AtlasPackerError::Rasterize { name, reason })?;
                Ok(fit(img))
            }
            (SourceImage::Bitmap { rgba, ninepatch: true }, _) => {
                let (inner, _) = extract_guides(&name, rgba)?;
                Ok(fit(inner))
            }
            (SourceImage::Bitmap { rgba, .. }, _) => Ok(fit(rgba.clone())),
        }
    }

    fn compute_strip(&self, settings: &Settings, scales: &[u32], base_w: u32, base_h: u32) -> (Rect, bool) {
        let full = Rect::new(0, 0, base_w, base_h);
        if !settings.strip_whitespace_x && !settings.strip_whitespace_y {
            return (full, false);
        }
        let explicit: Vec<u32> = scales
            .iter()
            .copied()
            .filter(|s| self.origins[*s as usize - 1] == ScaleOrigin::Explicit)
            .collect();
        // derived levels are covered by their parents unless nothing requested is explicit
        let considered = if explicit.is_empty() { scales } else { &explicit[..] };

        let mut bounds: Option<BaseBounds> = None;
        for &scale in considered {
            let Some(bitmap) = self.bitmaps[scale as usize - 1].as_ref() else {
                continue;
            };
            let Some(r) = whitespace_bounds(
                bitmap,
                settings.strip_whitespace_x,
                settings.strip_whitespace_y,
                settings.alpha_threshold,
            ) else {
                continue;
            };
            let b = BaseBounds::from_scaled(r, scale);
            bounds = Some(match bounds {
                Some(acc) => acc.merge(b),
                None => b,
            });
        }
        match bounds.map(|b| b.snap(base_w, base_h)) {
            Some(r) if !r.is_empty() => (r, false),
            _ => (Rect::new(0, 0, 1, 1), true),
        }
    }

    fn normalized(&self) -> Result<&Normalized> {
        self.normalized.as_ref().ok_or_else(|| {
            AtlasPackerError::InvalidConfig(format!("\"{}\" has not been validated", self.id))
        })
    }

    pub fn base_size(&self) -> Option<(u32, u32)> {
        self.normalized.as_ref().map(|n| (n.base_width, n.base_height))
    }

    pub fn is_ninepatch(&self) -> bool {
        self.normalized.as_ref().is_some_and(|n| n.ninepatch)
    }

    pub fn guides(&self) -> NinepatchGuides {
        self.normalized.as_ref().map(|n| n.guides).unwrap_or_default()
    }

    /// Trimmed content rectangle in base units. A blank source reports a 1x1 box at
    /// the origin.
    pub fn strip(&self) -> Option<Rect> {
        self.normalized.as_ref().map(|n| n.strip)
    }

    pub fn is_blank(&self) -> bool {
        self.normalized.as_ref().is_some_and(|n| n.blank)
    }

    pub fn scale_origin(&self, scale: u32) -> ScaleOrigin {
        match check_factor(&self.id, scale) {
            Ok(i) => self.origins[i],
            Err(_) => ScaleOrigin::Missing,
        }
    }

    /// Full (untrimmed) bitmap for a validated output scale.
    pub fn bitmap(&self, scale: u32) -> Option<&RgbaImage> {
        let i = check_factor(&self.id, scale).ok()?;
        self.bitmaps[i].as_ref()
    }

    /// The trimmed region of the bitmap for `scale`.
    pub fn trimmed_bitmap(&self, scale: u32) -> Result<RgbaImage> {
        let n = self.normalized()?;
        let bitmap = self.bitmap(scale).ok_or_else(|| AtlasPackerError::MissingScale {
            name: self.id.to_string(),
            scale,
        })?;
        let s = n.strip;
        if s.x == 0 && s.y == 0 && s.w == n.base_width && s.h == n.base_height {
            return Ok(bitmap.clone());
        }
        Ok(image::imageops::crop_imm(bitmap, s.x * scale, s.y * scale, s.w * scale, s.h * scale).to_image())
    }

    /// SHA-256 over every scale slot: absent slots add a single zero byte, present
    /// ones their RGBA bytes in row-major order followed by width and height.
    pub fn digest(&self) -> [u8; 32] {
        *self.digest.get_or_init(|| {
            let mut hasher = Sha256::new();
            for bitmap in &self.bitmaps {
                match bitmap {
                    None => hasher.update([0u8]),
                    Some(img) => {
                        hasher.update(img.as_raw());
                        hasher.update(img.width().to_be_bytes());
                        hasher.update(img.height().to_be_bytes());
                    }
                }
            }
            hasher.finalize().into()
        })
    }

    /// Pixel identity: same rendered output at every scale.
    pub fn is_identical(&self, other: &ImageSource) -> bool {
        self.is_validated() && other.is_validated() && self.digest() == other.digest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::TracingObserver;
    use image::Rgba;

    fn solid(w: u32, h: u32, c: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(c))
    }

    fn settings(scales: Vec<u32>) -> Settings {
        Settings::builder().scales(scales).build()
    }

    struct Disc(u32);

    impl Rasterizer for Disc {
        fn natural_size(&self) -> (u32, u32) {
            (self.0, self.0)
        }
        fn rasterize(&self, width: u32, height: u32) -> std::result::Result<RgbaImage, String> {
            Ok(solid(width, height, [0, 255, 0, 255]))
        }
    }

    #[test]
    fn first_assignment_wins() {
        let mut src = ImageSource::new(SourceId::named("a"));
        assert_eq!(src.add_image(1, SourceImage::bitmap(solid(4, 4, [255, 0, 0, 255]))).unwrap(), AddOutcome::Added);
        assert_eq!(src.add_image(1, SourceImage::bitmap(solid(4, 4, [0, 0, 255, 255]))).unwrap(), AddOutcome::Ignored);
        src.validate(&settings(vec![1]), &mut TracingObserver).unwrap();
        assert_eq!(src.bitmap(1).unwrap().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn rejects_out_of_range_factor() {
        let mut src = ImageSource::new(SourceId::named("a"));
        assert!(matches!(
            src.add_image(5, SourceImage::bitmap(solid(4, 4, [0; 4]))),
            Err(AtlasPackerError::InvalidScaleFactor { scale: 5, .. })
        ));
    }

    #[test]
    fn validate_requires_an_image_and_runs_once() {
        let mut empty = ImageSource::new(SourceId::named("empty"));
        assert!(matches!(
            empty.validate(&settings(vec![1]), &mut TracingObserver),
            Err(AtlasPackerError::NoImages { .. })
        ));

        let mut src = ImageSource::new(SourceId::named("a"));
        src.add_image(1, SourceImage::bitmap(solid(4, 4, [9; 4]))).unwrap();
        src.validate(&settings(vec![1]), &mut TracingObserver).unwrap();
        assert!(matches!(
            src.validate(&settings(vec![1]), &mut TracingObserver),
            Err(AtlasPackerError::AlreadyValidated { .. })
        ));
        assert!(matches!(
            src.add_image(2, SourceImage::bitmap(solid(8, 8, [9; 4]))),
            Err(AtlasPackerError::AlreadyValidated { .. })
        ));
    }

    #[test]
    fn derives_missing_scales_preferring_downscale() {
        let mut src = ImageSource::new(SourceId::named("icon"));
        src.add_image(1, SourceImage::bitmap(solid(5, 3, [1, 2, 3, 255]))).unwrap();
        src.add_image(4, SourceImage::bitmap(solid(20, 12, [1, 2, 3, 255]))).unwrap();
        src.validate(&settings(vec![1, 2, 3]), &mut TracingObserver).unwrap();
        assert_eq!(src.base_size(), Some((5, 3)));
        assert_eq!(src.scale_origin(1), ScaleOrigin::Explicit);
        assert_eq!(src.scale_origin(2), ScaleOrigin::DerivedDown { from: 4 });
        assert_eq!(src.scale_origin(3), ScaleOrigin::DerivedDown { from: 4 });
        assert_eq!(src.bitmap(3).unwrap().dimensions(), (15, 9));
        // not requested, so never materialised
        assert!(src.bitmap(4).is_none());
    }

    #[test]
    fn derives_up_when_nothing_larger_exists() {
        let mut src = ImageSource::new(SourceId::named("icon"));
        src.add_image(1, SourceImage::bitmap(solid(4, 4, [7; 4]))).unwrap();
        src.validate(&settings(vec![1, 2]), &mut TracingObserver).unwrap();
        assert_eq!(src.scale_origin(2), ScaleOrigin::DerivedUp { from: 1 });
        assert_eq!(src.bitmap(2).unwrap().dimensions(), (8, 8));
    }

    #[test]
    fn base_size_comes_from_lowest_factor() {
        let mut src = ImageSource::new(SourceId::named("hi"));
        src.add_image(2, SourceImage::bitmap(solid(12, 8, [7; 4]))).unwrap();
        src.validate(&settings(vec![1, 2]), &mut TracingObserver).unwrap();
        assert_eq!(src.base_size(), Some((6, 4)));
        assert_eq!(src.scale_origin(1), ScaleOrigin::DerivedDown { from: 2 });
    }

    #[test]
    fn mismatched_size_is_warned_and_resampled() {
        #[derive(Default)]
        struct Collect(Vec<String>);
        impl PackObserver for Collect {
            fn on_warning(&mut self, source: &str, message: &str) {
                self.0.push(format!("{source}: {message}"));
            }
        }
        let mut src = ImageSource::new(SourceId::named("odd"));
        src.add_image(1, SourceImage::bitmap(solid(4, 4, [7; 4]))).unwrap();
        src.add_image(2, SourceImage::bitmap(solid(9, 7, [7; 4]))).unwrap();
        let mut obs = Collect::default();
        src.validate(&settings(vec![1, 2]), &mut obs).unwrap();
        assert_eq!(obs.0.len(), 1);
        assert!(obs.0[0].starts_with("odd: expected 8x8"));
        assert_eq!(src.bitmap(2).unwrap().dimensions(), (8, 8));
    }

    #[test]
    fn vector_geometry_with_raster_override() {
        let mut src = ImageSource::new(SourceId::named("logo"));
        src.add_image(1, SourceImage::vector(Disc(6))).unwrap();
        assert_eq!(
            src.add_image(1, SourceImage::bitmap(solid(6, 6, [255, 0, 0, 255]))).unwrap(),
            AddOutcome::Override
        );
        src.validate(&settings(vec![1, 2]), &mut TracingObserver).unwrap();
        assert_eq!(src.base_size(), Some((6, 6)));
        assert_eq!(src.bitmap(1).unwrap().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        // derived from the override as well
        assert_eq!(src.bitmap(2).unwrap().get_pixel(5, 5), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn vector_rasterizes_at_every_scale() {
        let mut src = ImageSource::new(SourceId::named("logo"));
        src.add_image(1, SourceImage::vector(Disc(3))).unwrap();
        src.validate(&settings(vec![1, 3]), &mut TracingObserver).unwrap();
        assert_eq!(src.bitmap(3).unwrap().dimensions(), (9, 9));
        assert_eq!(src.bitmap(3).unwrap().get_pixel(8, 8), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn blank_source_keeps_unit_footprint() {
        let mut src = ImageSource::new(SourceId::named("blank"));
        src.add_image(1, SourceImage::bitmap(RgbaImage::new(8, 8))).unwrap();
        let s = Settings::builder().strip_whitespace(true, true).build();
        src.validate(&s, &mut TracingObserver).unwrap();
        assert!(src.is_blank());
        assert_eq!(src.strip(), Some(Rect::new(0, 0, 1, 1)));
        assert_eq!(src.trimmed_bitmap(1).unwrap().dimensions(), (1, 1));
    }

    #[test]
    fn digest_distinguishes_one_pixel() {
        let make = |tweak: bool| {
            let mut img = solid(4, 4, [10, 10, 10, 255]);
            if tweak {
                img.put_pixel(3, 3, Rgba([10, 10, 11, 255]));
            }
            let mut src = ImageSource::new(SourceId::named("x"));
            src.add_image(1, SourceImage::bitmap(img)).unwrap();
            src.validate(&settings(vec![1]), &mut TracingObserver).unwrap();
            src
        };
        let a = make(false);
        assert!(a.is_identical(&make(false)));
        assert!(!a.is_identical(&make(true)));
    }
}
