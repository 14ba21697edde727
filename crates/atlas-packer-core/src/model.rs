use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle (pixels). `x,y` is the origin corner; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn right_ex(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive far edge on the y axis (`y + h`).
    pub fn bottom_ex(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x
            && r.y >= self.y
            && r.right_ex() <= self.right_ex()
            && r.bottom_ex() <= self.bottom_ex()
    }
    /// Returns true if the interiors of the two rectangles overlap.
    pub fn intersects(&self, r: &Rect) -> bool {
        !(self.x >= r.right_ex()
            || r.x >= self.right_ex()
            || self.y >= r.bottom_ex()
            || r.y >= self.bottom_ex())
    }
    /// Smallest rectangle covering both.
    pub fn union(&self, r: &Rect) -> Rect {
        let x = self.x.min(r.x);
        let y = self.y.min(r.y);
        let x2 = self.right_ex().max(r.right_ex());
        let y2 = self.bottom_ex().max(r.bottom_ex());
        Rect::new(x, y, x2 - x, y2 - y)
    }
}

/// Identity of a logical source image: its name plus an optional frame index.
///
/// This is *name* identity. Two different ids may still carry identical pixels;
/// that notion is handled separately by content digests in [`crate::alias`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId {
    pub name: String,
    /// Frame index, `-1` when the source is not part of an indexed sequence.
    pub index: i32,
}

impl SourceId {
    pub fn new(name: impl Into<String>, index: i32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, -1)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index >= 0 {
            write!(f, "{}[{}]", self.name, self.index)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// A footprint handed to the bin packer.
///
/// `width`/`height` already include padding. `id` is opaque to the packer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackItem {
    pub id: usize,
    pub width: u32,
    pub height: u32,
    /// False for ninepatches and whenever rotation is disabled.
    pub can_rotate: bool,
}

/// A footprint placed on a page (packing coordinates, padding included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: usize,
    pub x: u32,
    pub y: u32,
    /// Placed width (post-rotation).
    pub width: u32,
    /// Placed height (post-rotation).
    pub height: u32,
    pub rotated: bool,
}

impl Placement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// One packed bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Placements in insertion order.
    pub placements: Vec<Placement>,
    /// Packed extent: the furthest right/far edge over all placements.
    pub width: u32,
    pub height: u32,
    /// Candidate bin size this page was packed at.
    pub bin_width: u32,
    pub bin_height: u32,
    /// Sum of placed (padded) footprint areas.
    pub used_area: u64,
}

impl Page {
    pub(crate) fn from_placements(placements: Vec<Placement>, bin_width: u32, bin_height: u32) -> Self {
        let mut width = 0;
        let mut height = 0;
        let mut used_area = 0u64;
        for p in &placements {
            width = width.max(p.x + p.width);
            height = height.max(p.y + p.height);
            used_area += p.rect().area();
        }
        Self {
            placements,
            width,
            height,
            bin_width,
            bin_height,
            used_area,
        }
    }

    pub fn page_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Fraction of the packed extent covered by placements, in (0, 1] for any
    /// non-empty page.
    pub fn occupancy(&self) -> f64 {
        let area = self.page_area();
        if area == 0 {
            0.0
        } else {
            self.used_area as f64 / area as f64
        }
    }
}

/// Statistics about atlas packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PackStats {
    /// Total number of pages in the atlas.
    pub num_pages: usize,
    /// Number of packed rectangles (aliases excluded).
    pub num_regions: usize,
    /// Number of sources merged into another rectangle as aliases.
    pub num_aliases: usize,
    /// Number of rotated rectangles.
    pub num_rotated: usize,
    /// Sum of page extents (width * height).
    pub total_page_area: u64,
    /// Sum of placed footprint areas.
    pub used_area: u64,
    /// used_area / total_page_area (0.0 to 1.0).
    pub occupancy: f64,
    pub max_page_width: u32,
    pub max_page_height: u32,
}

impl PackStats {
    pub fn from_pages(pages: &[Page], num_aliases: usize) -> Self {
        let mut stats = PackStats {
            num_pages: pages.len(),
            num_regions: 0,
            num_aliases,
            num_rotated: 0,
            total_page_area: 0,
            used_area: 0,
            occupancy: 0.0,
            max_page_width: 0,
            max_page_height: 0,
        };
        for page in pages {
            stats.num_regions += page.placements.len();
            stats.num_rotated += page.placements.iter().filter(|p| p.rotated).count();
            stats.total_page_area += page.page_area();
            stats.used_area += page.used_area;
            stats.max_page_width = stats.max_page_width.max(page.width);
            stats.max_page_height = stats.max_page_height.max(page.height);
        }
        if stats.total_page_area > 0 {
            stats.occupancy = stats.used_area as f64 / stats.total_page_area as f64;
        }
        stats
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Pages: {}, Regions: {}, Aliases: {}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px², Rotated: {}",
            self.num_pages,
            self.num_regions,
            self.num_aliases,
            self.occupancy * 100.0,
            self.total_page_area,
            self.used_area,
            self.num_rotated,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_page_area.saturating_sub(self.used_area)
    }
}
