//! Core library for packing multi-scale textures into atlases.
//!
//! - Sources: named images with up to four scale factors, ninepatch guides, vector
//!   sources rendered on demand; missing scales are derived by resampling.
//! - Packing: MaxRects (BSSF/BLSF/BAF/BL/CP) driven by a binary search for the smallest
//!   page that holds everything, spilling onto extra pages when needed.
//! - Output: composed RGBA pages per scale plus a text manifest (`.atlas`) that can be
//!   parsed back with [`manifest::parse_atlas`].
//!
//! Quick example:
//! ```ignore
//! use atlas_packer_core::{AtlasPacker, Settings, SourceId, SourceImage};
//! # fn main() -> anyhow::Result<()> {
//! let mut packer = AtlasPacker::new(Settings::builder().scales(vec![1, 2]).build())?;
//! let button = image::open("button@2x.png")?.to_rgba8();
//! packer.add_image(SourceId::named("button"), 2, SourceImage::bitmap(button))?;
//! let out = packer.pack("ui")?;
//! for scale in &out.scales {
//!     println!("{} -> {} page(s)", scale.manifest_name, scale.pages.len());
//! }
//! # Ok(()) }
//! ```

pub mod alias;
pub mod compositing;
pub mod config;
pub mod error;
pub mod geometry;
pub mod manifest;
pub mod model;
pub mod ninepatch;
pub mod observer;
pub mod packer;
pub mod pipeline;
pub mod resample;
pub mod source;

pub use config::*;
pub use error::*;
pub use model::*;
pub use observer::{PackObserver, TracingObserver};
pub use packer::Packer;
pub use pipeline::*;
pub use source::{ImageSource, Rasterizer, ScaleOrigin, SourceImage};

/// Convenience prelude for common types and functions.
/// Importing `atlas_packer_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{
        MaxRectsHeuristic, OutputFormat, PixelFormat, ResampleFilter, Settings, SettingsBuilder,
        TextureFilter, TextureWrap,
    };
    pub use crate::manifest::{AtlasManifest, ManifestPage, ManifestRegion, parse_atlas};
    pub use crate::model::{PackStats, Page, Placement, Rect, SourceId};
    pub use crate::observer::{PackObserver, TracingObserver};
    pub use crate::packer::maxrects::MaxRectsBin;
    pub use crate::source::{ImageSource, Rasterizer, SourceImage};
    pub use crate::{
        AtlasPacker, InputImage, LayoutOutput, OutputPage, PackOutput, ScaleOutput, pack_images,
        pack_layout,
    };
}
