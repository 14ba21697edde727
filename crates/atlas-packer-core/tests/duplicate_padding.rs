use atlas_packer_core::compositing::{page_image_size, page_origin};
use atlas_packer_core::config::Settings;
use atlas_packer_core::{pack_images, InputImage};
use image::{Rgba, RgbaImage};

fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([10 + x as u8 * 20, 10 + y as u8 * 20, 99, 255]))
}

fn settings() -> Settings {
    Settings::builder()
        .padding(4, 4)
        .edge_padding(true)
        .duplicate_padding(true)
        .pow2(false)
        .with_min_dimensions(1, 1)
        .build()
}

#[test]
fn gutter_repeats_edge_and_corner_pixels() {
    let src = gradient(6, 6);
    let out = pack_images("dup", vec![InputImage::bitmap("tile", src.clone())], settings()).unwrap();
    let page = &out.scales[0].pages[0].rgba;
    // half the padding on the outer edge, the other half after the content
    assert_eq!(page.dimensions(), (10, 10));
    let region = out.scales[0].manifest.region("tile", -1).unwrap();
    assert_eq!((region.x, region.y), (2, 2));

    assert_eq!(page.get_pixel(2, 2), src.get_pixel(0, 0));
    // left gutter copies column 0, twice
    assert_eq!(page.get_pixel(0, 4), src.get_pixel(0, 2));
    assert_eq!(page.get_pixel(1, 4), src.get_pixel(0, 2));
    // top gutter copies row 0
    assert_eq!(page.get_pixel(5, 0), src.get_pixel(3, 0));
    // bottom-right corner block repeats the corner pixel
    assert_eq!(page.get_pixel(9, 9), src.get_pixel(5, 5));
    assert_eq!(page.get_pixel(8, 9), src.get_pixel(5, 5));
    assert_eq!(page.get_pixel(0, 0), src.get_pixel(0, 0));
}

#[test]
fn gutter_scales_with_output_factor() {
    let settings = Settings {
        scales: vec![2],
        ..settings()
    };
    let src = gradient(6, 6);
    let out = pack_images("dup", vec![InputImage::bitmap("tile", src)], settings).unwrap();
    let page = &out.scales[0].pages[0].rgba;
    assert_eq!(page.dimensions(), (20, 20));
    let region = out.scales[0].manifest.region("tile", -1).unwrap();
    assert_eq!((region.x, region.y), (4, 4));
    let inner = *page.get_pixel(4, 4);
    for g in 0..4 {
        assert_eq!(*page.get_pixel(g, 6), *page.get_pixel(4, 6));
        assert_eq!(*page.get_pixel(g, g), inner);
    }
}

#[test]
fn plain_edge_padding_leaves_a_transparent_frame() {
    let settings = Settings {
        duplicate_padding: false,
        ..settings()
    };
    assert_eq!(page_origin(&settings), (4, 4));
    let out = pack_images("edge", vec![InputImage::bitmap("tile", gradient(6, 6))], settings.clone()).unwrap();
    let page = &out.scales[0].pages[0].rgba;
    assert_eq!(page.dimensions(), page_image_size(&out.layout[0], &settings, 1));
    assert_eq!(page.dimensions(), (14, 14));
    assert_eq!(page.get_pixel(0, 0)[3], 0);
    assert_eq!(page.get_pixel(4, 4)[3], 255);
}

#[test]
fn rotated_region_is_transposed_and_its_gutter_follows_the_rotated_edges() {
    // 4x10 only fits a 16x8 page lying on its side
    let settings = Settings::builder()
        .padding(2, 2)
        .duplicate_padding(true)
        .allow_rotation(true)
        .pow2(false)
        .with_min_dimensions(1, 1)
        .with_max_dimensions(16, 8)
        .build();
    let src = gradient(4, 10);
    let out = pack_images("rot", vec![InputImage::bitmap("tall", src.clone())], settings).unwrap();
    assert!(out.layout[0].placements[0].rotated);

    let region = out.scales[0].manifest.region("tall", -1).unwrap();
    assert!(region.rotate);
    assert_eq!((region.x, region.y), (1, 1));
    assert_eq!((region.width, region.height), (4, 10));

    let page = &out.scales[0].pages[0].rgba;
    assert_eq!(page.dimensions(), (12, 6));
    // the content box is 10x4 at (1,1); source column i lands on row 4 - i
    assert_eq!(page.get_pixel(1, 4), src.get_pixel(0, 0));
    assert_eq!(page.get_pixel(1, 1), src.get_pixel(3, 0));
    assert_eq!(page.get_pixel(10, 1), src.get_pixel(3, 9));
    assert_eq!(page.get_pixel(10, 4), src.get_pixel(0, 9));
    assert_eq!(page.get_pixel(5, 2), src.get_pixel(2, 4));

    // edges of the rotated box
    assert_eq!(page.get_pixel(0, 3), src.get_pixel(1, 0));
    assert_eq!(page.get_pixel(11, 3), src.get_pixel(1, 9));
    assert_eq!(page.get_pixel(5, 0), src.get_pixel(3, 4));
    assert_eq!(page.get_pixel(5, 5), src.get_pixel(0, 4));
    // corners
    assert_eq!(page.get_pixel(0, 0), src.get_pixel(3, 0));
    assert_eq!(page.get_pixel(11, 0), src.get_pixel(3, 9));
    assert_eq!(page.get_pixel(0, 5), src.get_pixel(0, 0));
    assert_eq!(page.get_pixel(11, 5), src.get_pixel(0, 9));
}
