//! Ninepatch guide border parsing.
//!
//! A ninepatch bitmap carries a 1px guide border. Dark opaque runs on the top row and
//! left column mark the stretchable region ("splits"); runs on the bottom row and right
//! column mark the content region ("pads"). Both are stored as `[left, right, top, bottom]`
//! where `right`/`bottom` are distances from the far edge of the inner image.

use crate::error::{AtlasPackerError, Result};
use image::{Rgba, RgbaImage};

/// Guide channels must be this close to 0 or 255.
const GUIDE_TOLERANCE: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NinepatchGuides {
    /// `None` when the image has no split run on either axis.
    pub splits: Option<[i32; 4]>,
    /// `None` when there are no pad runs or they repeat the splits. An axis without a
    /// run holds `-1, -1`.
    pub pads: Option<[i32; 4]>,
}

impl NinepatchGuides {
    /// Rescale guides measured on a `factor`x bitmap into base units.
    pub fn to_base(self, factor: u32) -> Self {
        let f = factor.max(1) as f64;
        let scale = |v: [i32; 4]| v.map(|c| if c < 0 { c } else { (c as f64 / f).round() as i32 });
        Self {
            splits: self.splits.map(scale),
            pads: self.pads.map(scale),
        }
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn guide_pixel(img: &RgbaImage, axis: Axis, fixed: u32, i: u32) -> (u32, u32, Rgba<u8>) {
    let (x, y) = match axis {
        Axis::Horizontal => (i, fixed),
        Axis::Vertical => (fixed, i),
    };
    (x, y, *img.get_pixel(x, y))
}

fn is_marker(px: &Rgba<u8>) -> bool {
    px[3] > 64 && px[0] < 64
}

fn check_guide_pixel(name: &str, x: u32, y: u32, px: &Rgba<u8>) -> Result<()> {
    let clear = px
        .0
        .iter()
        .all(|c| *c <= GUIDE_TOLERANCE || *c >= u8::MAX - GUIDE_TOLERANCE);
    let [r, g, b, _] = px.0;
    let coherent = (r < 64 && g < 64 && b < 64) || (r >= 64 && g >= 64 && b >= 64);
    if clear && coherent {
        Ok(())
    } else {
        Err(AtlasPackerError::InvalidNinepatch {
            name: name.to_string(),
            x,
            y,
            rgba: px.0,
        })
    }
}

/// Reads one guide line (excluding the corners) and returns the first run of markers
/// as inner-image `(start, distance_from_far_edge)`.
fn read_run(name: &str, img: &RgbaImage, axis: Axis, fixed: u32) -> Result<Option<(i32, i32)>> {
    let len = match axis {
        Axis::Horizontal => img.width(),
        Axis::Vertical => img.height(),
    };
    let mut start = None;
    let mut end = None;
    for i in 1..len - 1 {
        let (x, y, px) = guide_pixel(img, axis, fixed, i);
        check_guide_pixel(name, x, y, &px)?;
        match (start, end) {
            (None, _) if is_marker(&px) => start = Some(i),
            (Some(_), None) if !is_marker(&px) => end = Some(i),
            _ => {}
        }
    }
    Ok(start.map(|s| {
        // run reaching the corner ends at the inner edge
        let e = end.unwrap_or(len - 1);
        (s as i32 - 1, (len - 1 - e) as i32)
    }))
}

/// Parses the guide border of `bordered` and returns the inner image (border cropped)
/// together with the guides, in pixels of this bitmap.
pub fn extract_guides(name: &str, bordered: &RgbaImage) -> Result<(RgbaImage, NinepatchGuides)> {
    let (w, h) = bordered.dimensions();
    if w < 3 || h < 3 {
        return Err(AtlasPackerError::MalformedNinepatch {
            name: name.to_string(),
            reason: format!("{}x{} is too small to carry a guide border", w, h),
        });
    }

    let split_x = read_run(name, bordered, Axis::Horizontal, 0)?;
    let split_y = read_run(name, bordered, Axis::Vertical, 0)?;
    let splits = match (split_x, split_y) {
        (None, None) => None,
        (x, y) => {
            let (l, r) = x.unwrap_or((0, 0));
            let (t, b) = y.unwrap_or((0, 0));
            Some([l, r, t, b])
        }
    };

    let pad_x = read_run(name, bordered, Axis::Horizontal, h - 1)?;
    let pad_y = read_run(name, bordered, Axis::Vertical, w - 1)?;
    let pads = match (pad_x, pad_y) {
        (None, None) => None,
        (x, y) => {
            let (l, r) = x.unwrap_or((-1, -1));
            let (t, b) = y.unwrap_or((-1, -1));
            Some([l, r, t, b])
        }
    };
    let pads = pads.filter(|p| Some(*p) != splits);

    let inner = image::imageops::crop_imm(bordered, 1, 1, w - 2, h - 2).to_image();
    Ok((inner, NinepatchGuides { splits, pads }))
}
