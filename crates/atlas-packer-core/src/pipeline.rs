use crate::alias::{self, AliasGroup};
use crate::compositing;
use crate::config::Settings;
use crate::error::{AtlasPackerError, Result};
use crate::manifest::{self, AtlasManifest, ManifestPage, ManifestRegion};
use crate::model::{PackItem, PackStats, Page, SourceId};
use crate::observer::{PackObserver, TracingObserver};
use crate::packer::search::PageSearch;
use crate::source::{AddOutcome, ImageSource, SourceImage};
use image::RgbaImage;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// In-memory image to pack: the source it belongs to, its scale factor and pixels.
pub struct InputImage {
    pub id: SourceId,
    pub scale: u32,
    pub image: SourceImage,
}

impl InputImage {
    pub fn new(id: SourceId, scale: u32, image: SourceImage) -> Self {
        Self { id, scale, image }
    }

    /// A plain `@1x` bitmap without a frame index.
    pub fn bitmap(name: impl Into<String>, rgba: RgbaImage) -> Self {
        Self::new(SourceId::named(name), 1, SourceImage::bitmap(rgba))
    }
}

/// A composed page image.
pub struct OutputPage {
    /// Zero-based page number, shared by every scale.
    pub index: usize,
    /// File name, e.g. `pack2.png` or `pack@2x.png`.
    pub name: String,
    pub rgba: RgbaImage,
}

/// Pages and manifest for one emitted scale factor.
pub struct ScaleOutput {
    pub scale: u32,
    /// Manifest file name, e.g. `pack@2x.atlas`.
    pub manifest_name: String,
    pub manifest: AtlasManifest,
    pub pages: Vec<OutputPage>,
}

/// The sources behind one packed rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedEntry {
    pub id: SourceId,
    /// Sources with identical pixels written at the same position, sorted.
    pub aliases: Vec<SourceId>,
}

/// Output of a packing run.
pub struct PackOutput {
    /// Packed pages in packing coordinates; `Placement::id` indexes `entries`.
    pub layout: Vec<Page>,
    pub entries: Vec<PackedEntry>,
    /// One entry per emitted scale, ascending.
    pub scales: Vec<ScaleOutput>,
    stats: PackStats,
}

impl PackOutput {
    pub fn stats(&self) -> PackStats {
        self.stats
    }

    pub fn scale(&self, scale: u32) -> Option<&ScaleOutput> {
        self.scales.iter().find(|s| s.scale == scale)
    }
}

/// Collects multi-scale sources and turns them into atlas pages.
///
/// Sources are keyed by [`SourceId`] and processed in `(name, index)` order, so the
/// result does not depend on the order images were added in.
pub struct AtlasPacker<O = TracingObserver> {
    settings: Settings,
    sources: BTreeMap<SourceId, ImageSource>,
    observer: O,
}

impl AtlasPacker<TracingObserver> {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            sources: BTreeMap::new(),
            observer: TracingObserver,
        })
    }
}

impl<O: PackObserver> AtlasPacker<O> {
    /// Replaces the observer receiving progress and warnings.
    pub fn with_observer<P: PackObserver>(self, observer: P) -> AtlasPacker<P> {
        AtlasPacker {
            settings: self.settings,
            sources: self.sources,
            observer,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn source(&self, id: &SourceId) -> Option<&ImageSource> {
        self.sources.get(id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Assigns `image` to scale factor `scale` of source `id`, creating the source on
    /// first use. A second image for the same factor is reported and ignored.
    pub fn add_image(&mut self, id: SourceId, scale: u32, image: SourceImage) -> Result<()> {
        let source = self
            .sources
            .entry(id)
            .or_insert_with_key(|id| ImageSource::new(id.clone()));
        match source.add_image(scale, image)? {
            AddOutcome::Added => {}
            AddOutcome::Override => debug!(source = %source.id(), scale, "raster override for vector source"),
            AddOutcome::Ignored => {
                let name = source.id().to_string();
                self.observer.on_warning(
                    &name,
                    &format!("an image for @{scale}x was already assigned; keeping the first one"),
                );
            }
        }
        Ok(())
    }

    pub fn add(&mut self, input: InputImage) -> Result<()> {
        self.add_image(input.id, input.scale, input.image)
    }

    #[instrument(skip_all, fields(pack = pack_name))]
    /// Validates every source, packs the footprints and composes each requested scale.
    ///
    /// Notes:
    /// - Sources are validated once; packing again reuses their normalized geometry.
    /// - Blank sources are dropped when `ignore_blank_images` is set.
    /// - With `alias` on, sources with identical pixels share one rectangle.
    pub fn pack(&mut self, pack_name: &str) -> Result<PackOutput> {
        if self.sources.is_empty() {
            return Err(AtlasPackerError::Empty);
        }
        let started = Instant::now();
        let settings = &self.settings;
        if settings.duplicate_padding && (settings.padding_x < 2 || settings.padding_y < 2) {
            self.observer.on_warning(
                pack_name,
                "duplicate padding needs a padding of at least 2 to leave room for the copied edge",
            );
        }

        for source in self.sources.values_mut() {
            if !source.is_validated() {
                source.validate(settings, &mut self.observer)?;
            }
        }

        let mut packable: Vec<&ImageSource> = Vec::with_capacity(self.sources.len());
        for source in self.sources.values() {
            if source.is_blank() {
                let name = source.id().to_string();
                if settings.ignore_blank_images {
                    self.observer.on_warning(&name, "image is blank and was ignored");
                    continue;
                }
                self.observer
                    .on_warning(&name, "image is blank; keeping a 1x1 transparent region");
            }
            packable.push(source);
        }
        if packable.is_empty() {
            return Err(AtlasPackerError::Empty);
        }

        let groups = if settings.alias {
            alias::group_by_content(packable.iter().copied())
        } else {
            alias::ungrouped(packable.len())
        };
        let primaries: Vec<&ImageSource> = groups.iter().map(|g| packable[g.primary]).collect();
        let items: Vec<PackItem> = primaries
            .iter()
            .enumerate()
            .map(|(id, source)| {
                let strip = source.strip().unwrap_or_default();
                PackItem {
                    id,
                    width: strip.w + settings.padding_x,
                    height: strip.h + settings.padding_y,
                    can_rotate: settings.allow_rotation && !source.is_ninepatch(),
                }
            })
            .collect();
        let num_aliases = groups.iter().map(|g| g.aliases.len()).sum();
        debug!(sources = packable.len(), rectangles = items.len(), num_aliases, "prepared footprints");

        let name_of = |id: usize| primaries[id].id().to_string();
        let mut search = PageSearch::new(settings, &mut self.observer);
        let layout = search.pack_pages(items, &name_of)?;
        let candidates = search.candidates();

        let mut scales = settings.scales.clone();
        scales.sort_unstable();
        scales.dedup();
        let mut outputs = Vec::with_capacity(scales.len());
        for scale in scales {
            if settings.power_of_two && !scale.is_power_of_two() {
                self.observer.on_warning(
                    pack_name,
                    &format!("scale {scale} is not a power of two and was skipped"),
                );
                continue;
            }
            outputs.push(compose_scale(
                pack_name, &layout, &groups, &packable, &primaries, settings, scale,
            )?);
        }

        let entries = groups
            .iter()
            .map(|g| {
                let mut aliases: Vec<SourceId> =
                    g.aliases.iter().map(|&a| packable[a].id().clone()).collect();
                aliases.sort();
                PackedEntry {
                    id: packable[g.primary].id().clone(),
                    aliases,
                }
            })
            .collect();

        let stats = PackStats::from_pages(&layout, num_aliases);
        info!(
            candidates,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "{}",
            stats.summary()
        );
        Ok(PackOutput {
            layout,
            entries,
            scales: outputs,
            stats,
        })
    }
}

fn compose_scale(
    pack_name: &str,
    layout: &[Page],
    groups: &[AliasGroup],
    packable: &[&ImageSource],
    primaries: &[&ImageSource],
    settings: &Settings,
    scale: u32,
) -> Result<ScaleOutput> {
    let ext = settings.output_format.extension();
    let mut manifest = AtlasManifest::default();
    let mut pages = Vec::with_capacity(layout.len());

    for (index, page) in layout.iter().enumerate() {
        let name = manifest::page_image_name(pack_name, scale, index, ext);
        let rgba = compositing::compose_page(page, primaries, settings, scale)?;

        let mut placed: Vec<_> = page.placements.iter().collect();
        placed.sort_by(|a, b| primaries[a.id].id().cmp(primaries[b.id].id()));
        let mut regions = Vec::new();
        for p in placed {
            let (x, y) = compositing::region_origin(page, p, settings);
            let group = &groups[p.id];
            let mut aliases: Vec<&ImageSource> = group.aliases.iter().map(|&a| packable[a]).collect();
            aliases.sort_by(|a, b| a.id().cmp(b.id()));
            regions.push(ManifestRegion::for_source(packable[group.primary], x, y, p.rotated, scale));
            regions.extend(
                aliases
                    .into_iter()
                    .map(|a| ManifestRegion::for_source(a, x, y, p.rotated, scale)),
            );
        }

        manifest.pages.push(ManifestPage {
            image: name.clone(),
            width: rgba.width(),
            height: rgba.height(),
            format: settings.format,
            filter_min: settings.filter_min,
            filter_mag: settings.filter_mag,
            repeat: settings.repeat_value().to_string(),
            regions,
        });
        pages.push(OutputPage { index, name, rgba });
    }

    Ok(ScaleOutput {
        scale,
        manifest_name: format!(
            "{}{}",
            manifest::scaled_name(pack_name, scale),
            settings.atlas_extension
        ),
        manifest,
        pages,
    })
}

#[instrument(skip_all)]
/// Packs `inputs` into pages named after `pack_name` using `settings`.
pub fn pack_images(pack_name: &str, inputs: Vec<InputImage>, settings: Settings) -> Result<PackOutput> {
    let mut packer = AtlasPacker::new(settings)?;
    for input in inputs {
        packer.add(input)?;
    }
    packer.pack(pack_name)
}

// ---------------- Layout-only API ----------------

/// Result of [`pack_layout`]: `Placement::id` indexes `names`.
#[derive(Debug, Clone)]
pub struct LayoutOutput {
    pub names: Vec<String>,
    pub pages: Vec<Page>,
    pub stats: PackStats,
}

#[instrument(skip_all)]
/// Packs bare `(name, width, height)` sizes through the page search without pixels.
/// Sizes are unpadded; the configured padding is added to each.
pub fn pack_layout<K: Into<String>>(inputs: Vec<(K, u32, u32)>, settings: &Settings) -> Result<LayoutOutput> {
    settings.validate()?;
    if inputs.is_empty() {
        return Err(AtlasPackerError::Empty);
    }
    let mut names = Vec::with_capacity(inputs.len());
    let mut items = Vec::with_capacity(inputs.len());
    for (id, (name, w, h)) in inputs.into_iter().enumerate() {
        if w == 0 || h == 0 {
            return Err(AtlasPackerError::InvalidDimensions { width: w, height: h });
        }
        names.push(name.into());
        items.push(PackItem {
            id,
            width: w + settings.padding_x,
            height: h + settings.padding_y,
            can_rotate: settings.allow_rotation,
        });
    }

    let mut observer = TracingObserver;
    let pages = PageSearch::new(settings, &mut observer).pack_pages(items, &|id| names[id].clone())?;
    let stats = PackStats::from_pages(&pages, 0);
    Ok(LayoutOutput { names, pages, stats })
}
