use crate::config::Settings;
use crate::error::{AtlasPackerError, Result};
use crate::model::{Page, Placement};
use crate::resample::premultiply_alpha;
use crate::source::ImageSource;
use image::{Rgba, RgbaImage};

const DEBUG_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Where packing coordinates start inside the page image, in base units.
pub fn page_origin(settings: &Settings) -> (u32, u32) {
    if !settings.edge_padding {
        (0, 0)
    } else if settings.duplicate_padding {
        (settings.padding_x / 2, settings.padding_y / 2)
    } else {
        (settings.padding_x, settings.padding_y)
    }
}

/// Final pixel size of `page` rendered at `scale`.
///
/// The trailing padding of the outermost footprints is dropped, the edge gutter is
/// added on both sides, then the result is scaled, rounded up to a power of two when
/// requested and raised to the minimum page size.
pub fn page_image_size(page: &Page, settings: &Settings, scale: u32) -> (u32, u32) {
    let (ox, oy) = page_origin(settings);
    let mut w = (page.width.saturating_sub(settings.padding_x) + 2 * ox) * scale;
    let mut h = (page.height.saturating_sub(settings.padding_y) + 2 * oy) * scale;
    if settings.power_of_two {
        w = w.max(1).next_power_of_two();
        h = h.max(1).next_power_of_two();
    }
    (w.max(settings.min_width), h.max(settings.min_height))
}

/// Top-left of a placement's content in page image space (y down), base units.
pub fn region_origin(page: &Page, p: &Placement, settings: &Settings) -> (u32, u32) {
    let (ox, oy) = page_origin(settings);
    (ox + p.x, oy + page.height - p.y - p.height)
}

fn plot(canvas: &mut RgbaImage, x: i64, y: i64, px: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < canvas.width() as u64 && (y as u64) < canvas.height() as u64 {
        canvas.put_pixel(x as u32, y as u32, px);
    }
}

/// Copies `src` to `(dx, dy)`. Rotated copies are turned 90 degrees counter-clockwise:
/// source column `i` becomes destination row `w - 1 - i`.
pub fn blit(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32, rotated: bool) {
    let (w, h) = src.dimensions();
    let (dx, dy) = (dx as i64, dy as i64);
    for j in 0..h {
        for i in 0..w {
            let px = *src.get_pixel(i, j);
            if rotated {
                plot(canvas, dx + j as i64, dy + (w - i - 1) as i64, px);
            } else {
                plot(canvas, dx + i as i64, dy + j as i64, px);
            }
        }
    }
}

/// Replicates the border pixels of the content box `(x, y, w, h)` outward by
/// `amount_x`/`amount_y` pixels: edges first, then the corner blocks.
pub fn extrude(canvas: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, amount_x: u32, amount_y: u32) {
    if w == 0 || h == 0 || (amount_x == 0 && amount_y == 0) {
        return;
    }
    let (x0, y0) = (x as i64, y as i64);
    let (x1, y1) = (x0 + w as i64 - 1, y0 + h as i64 - 1);
    let at = |c: &RgbaImage, px: i64, py: i64| *c.get_pixel(px as u32, py as u32);
    if x1 >= canvas.width() as i64 || y1 >= canvas.height() as i64 {
        return;
    }

    for e in 1..=amount_y as i64 {
        for xx in x0..=x1 {
            let top = at(canvas, xx, y0);
            let bottom = at(canvas, xx, y1);
            plot(canvas, xx, y0 - e, top);
            plot(canvas, xx, y1 + e, bottom);
        }
    }
    for e in 1..=amount_x as i64 {
        for yy in y0..=y1 {
            let left = at(canvas, x0, yy);
            let right = at(canvas, x1, yy);
            plot(canvas, x0 - e, yy, left);
            plot(canvas, x1 + e, yy, right);
        }
    }

    let corners = [
        (x0, y0, -1, -1),
        (x1, y0, 1, -1),
        (x0, y1, -1, 1),
        (x1, y1, 1, 1),
    ];
    for (cx, cy, sx, sy) in corners {
        let px = at(canvas, cx, cy);
        for ex in 1..=amount_x as i64 {
            for ey in 1..=amount_y as i64 {
                plot(canvas, cx + sx * ex, cy + sy * ey, px);
            }
        }
    }
}

/// 1px outline of the box `(x, y, w, h)`.
pub fn outline(canvas: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    if w == 0 || h == 0 {
        return;
    }
    let (x0, y0) = (x as i64, y as i64);
    let (x1, y1) = (x0 + w as i64 - 1, y0 + h as i64 - 1);
    for xx in x0..=x1 {
        plot(canvas, xx, y0, color);
        plot(canvas, xx, y1, color);
    }
    for yy in y0..=y1 {
        plot(canvas, x0, yy, color);
        plot(canvas, x1, yy, color);
    }
}

/// Renders one page at `scale`. `sources[placement.id]` supplies the pixels of each
/// placement.
pub fn compose_page(page: &Page, sources: &[&ImageSource], settings: &Settings, scale: u32) -> Result<RgbaImage> {
    let (width, height) = page_image_size(page, settings, scale);
    let mut canvas = RgbaImage::new(width, height);
    let amount_x = settings.padding_x / 2 * scale;
    let amount_y = settings.padding_y / 2 * scale;

    for p in &page.placements {
        let source = sources.get(p.id).ok_or_else(|| {
            AtlasPackerError::InvalidConfig(format!("placement refers to unknown source #{}", p.id))
        })?;
        let trimmed = source.trimmed_bitmap(scale)?;
        let (rx, ry) = region_origin(page, p, settings);
        let (dx, dy) = (rx * scale, ry * scale);
        blit(&trimmed, &mut canvas, dx, dy, p.rotated);

        let (iw, ih) = trimmed.dimensions();
        let (cw, ch) = if p.rotated { (ih, iw) } else { (iw, ih) };
        if settings.duplicate_padding {
            extrude(&mut canvas, dx, dy, cw, ch, amount_x, amount_y);
        }
        if settings.debug {
            outline(&mut canvas, dx, dy, cw, ch, DEBUG_COLOR);
        }
    }

    if settings.debug {
        outline(&mut canvas, 0, 0, width, height, DEBUG_COLOR);
    }
    if settings.premultiply_alpha {
        premultiply_alpha(&mut canvas);
    }
    Ok(canvas)
}
