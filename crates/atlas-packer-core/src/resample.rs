use crate::config::ResampleFilter;
use image::RgbaImage;
use image::imageops;

/// Resize `img` to exactly `w x h`.
///
/// Bilinear downscaling by more than 2x halves the image repeatedly first so every
/// source pixel still contributes to the result.
pub fn resize(img: &RgbaImage, w: u32, h: u32, filter: ResampleFilter) -> RgbaImage {
    let w = w.max(1);
    let h = h.max(1);
    if img.dimensions() == (w, h) {
        return img.clone();
    }
    if filter != ResampleFilter::Bilinear {
        return imageops::resize(img, w, h, filter.filter_type());
    }

    let mut current: Option<RgbaImage> = None;
    loop {
        let src = current.as_ref().unwrap_or(img);
        let (cw, ch) = src.dimensions();
        if cw / 2 < w || ch / 2 < h {
            break;
        }
        let halved = imageops::resize(src, cw / 2, ch / 2, filter.filter_type());
        current = Some(halved);
    }
    let src = current.as_ref().unwrap_or(img);
    if src.dimensions() == (w, h) {
        return src.clone();
    }
    imageops::resize(src, w, h, filter.filter_type())
}

/// Multiply color channels by alpha in place.
pub fn premultiply_alpha(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let a = px[3] as u32;
        for c in 0..3 {
            px[c] = ((px[c] as u32 * a + 127) / 255) as u8;
        }
    }
}
