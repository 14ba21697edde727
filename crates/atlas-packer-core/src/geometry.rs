use crate::model::Rect;
use image::RgbaImage;

fn row_is_blank(rgba: &RgbaImage, y: u32, x1: u32, x2: u32, threshold: u8) -> bool {
    (x1..x2).all(|x| rgba.get_pixel(x, y)[3] <= threshold)
}

fn column_is_blank(rgba: &RgbaImage, x: u32, y1: u32, y2: u32, threshold: u8) -> bool {
    (y1..y2).all(|y| rgba.get_pixel(x, y)[3] <= threshold)
}

/// Bounding box of the visible content of `rgba`.
///
/// Rows are trimmed when `strip_rows` is set and columns when `strip_columns` is set;
/// columns are only inspected within the surviving rows. A row/column is blank when
/// none of its alpha values exceed `threshold`. Returns `None` when stripping removed
/// everything, and the full image rect when neither axis is stripped.
pub fn whitespace_bounds(
    rgba: &RgbaImage,
    strip_columns: bool,
    strip_rows: bool,
    threshold: u8,
) -> Option<Rect> {
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let mut top = 0;
    let mut bottom = h;
    if strip_rows {
        while top < h && row_is_blank(rgba, top, 0, w, threshold) {
            top += 1;
        }
        if top == h {
            return None;
        }
        while bottom > top && row_is_blank(rgba, bottom - 1, 0, w, threshold) {
            bottom -= 1;
        }
    }
    let mut left = 0;
    let mut right = w;
    if strip_columns {
        while left < w && column_is_blank(rgba, left, top, bottom, threshold) {
            left += 1;
        }
        if left == w {
            return None;
        }
        while right > left && column_is_blank(rgba, right - 1, top, bottom, threshold) {
            right -= 1;
        }
    }
    Some(Rect::new(left, top, right - left, bottom - top))
}

/// Fractional content box in base (factor 1) units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BaseBounds {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BaseBounds {
    pub fn from_scaled(r: Rect, factor: u32) -> Self {
        let f = factor as f64;
        Self {
            x1: r.x as f64 / f,
            y1: r.y as f64 / f,
            x2: r.right_ex() as f64 / f,
            y2: r.bottom_ex() as f64 / f,
        }
    }

    pub fn merge(self, o: BaseBounds) -> Self {
        Self {
            x1: self.x1.min(o.x1),
            y1: self.y1.min(o.y1),
            x2: self.x2.max(o.x2),
            y2: self.y2.max(o.y2),
        }
    }

    /// Floor the offset, round the size up so the far edge stays covered, clamp
    /// inside `base_w x base_h`.
    pub fn snap(self, base_w: u32, base_h: u32) -> Rect {
        let x = (self.x1.floor().max(0.0) as u32).min(base_w);
        let y = (self.y1.floor().max(0.0) as u32).min(base_h);
        let w = (self.x2.ceil().max(0.0) as u32).saturating_sub(x).min(base_w - x);
        let h = (self.y2.ceil().max(0.0) as u32).saturating_sub(y).min(base_h - y);
        Rect::new(x, y, w, h)
    }
}

/// Exponent of the smallest power of two >= `v` (`v = 0` maps to 0).
pub fn pow2_exponent(v: u32) -> u32 {
    v.max(1).next_power_of_two().trailing_zeros()
}
