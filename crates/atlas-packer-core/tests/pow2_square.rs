use atlas_packer_core::config::Settings;
use atlas_packer_core::{pack_images, pack_layout, InputImage};
use image::{Rgba, RgbaImage};

fn inputs() -> Vec<InputImage> {
    [(30, 12), (17, 40), (9, 9), (50, 21)]
        .into_iter()
        .enumerate()
        .map(|(i, (w, h))| {
            InputImage::bitmap(format!("img{i}"), RgbaImage::from_pixel(w, h, Rgba([i as u8 * 40, 0, 0, 255])))
        })
        .collect()
}

#[test]
fn pot_pages_have_power_of_two_sides() {
    let out = pack_images("pot", inputs(), Settings::builder().pow2(true).build()).unwrap();
    for page in &out.scales[0].pages {
        let (w, h) = page.rgba.dimensions();
        assert!(w.is_power_of_two() && h.is_power_of_two(), "{w}x{h}");
    }
}

#[test]
fn square_pages_are_square() {
    let settings = Settings::builder().pow2(false).square(true).build();
    let out = pack_images("sq", inputs(), settings.clone()).unwrap();
    for page in &out.scales[0].pages {
        let (w, h) = page.rgba.dimensions();
        assert_eq!(w, h);
    }
    let layout = pack_layout(vec![("a", 100, 10), ("b", 10, 10)], &settings).unwrap();
    assert_eq!(layout.pages[0].width, layout.pages[0].height);
}

#[test]
fn min_dimensions_raise_small_pages() {
    let settings = Settings::builder()
        .pow2(false)
        .with_min_dimensions(64, 48)
        .build();
    let out = pack_images(
        "tiny",
        vec![InputImage::bitmap("dot", RgbaImage::from_pixel(3, 3, Rgba([1, 1, 1, 255])))],
        settings,
    )
    .unwrap();
    assert_eq!(out.scales[0].pages[0].rgba.dimensions(), (64, 48));
}
