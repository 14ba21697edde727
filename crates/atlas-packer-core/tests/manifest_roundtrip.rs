use atlas_packer_core::config::{PixelFormat, Settings, TextureFilter, TextureWrap};
use atlas_packer_core::manifest::parse_atlas;
use atlas_packer_core::model::SourceId;
use atlas_packer_core::source::SourceImage;
use atlas_packer_core::AtlasPacker;
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn framed(w: u32, h: u32, margin: u32, shade: u8) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        let inside = x >= margin && y >= margin && x + margin < w && y + margin < h;
        if inside {
            Rgba([shade, shade, 255 - shade, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[test]
fn written_manifest_parses_back_to_the_same_regions() {
    let mut rng = StdRng::seed_from_u64(99);
    let settings = Settings::builder()
        .allow_rotation(true)
        .strip_whitespace(true, true)
        .with_max_dimensions(128, 128)
        .format(PixelFormat::Rgba4444)
        .filter(TextureFilter::Linear, TextureFilter::MipMapLinearLinear)
        .wrap(TextureWrap::Repeat, TextureWrap::ClampToEdge)
        .scales(vec![1, 2])
        .build();
    let mut packer = AtlasPacker::new(settings).unwrap();
    for i in 0..40 {
        let (w, h) = (rng.gen_range(4..40), rng.gen_range(4..40));
        let margin = rng.gen_range(0..2);
        packer
            .add_image(
                SourceId::new("frame", i),
                2,
                SourceImage::bitmap(framed(w * 2, h * 2, margin * 2, i as u8 * 5)),
            )
            .unwrap();
    }
    let out = packer.pack("roundtrip").unwrap();
    assert!(out.layout.len() > 1, "expected several pages");

    for scale in &out.scales {
        let text = scale.manifest.to_string();
        let parsed = parse_atlas(&text).unwrap();
        assert_eq!(parsed, scale.manifest);
        assert_eq!(parsed.num_regions(), 40);
        assert_eq!(parsed.pages.len(), out.layout.len());
        for page in &parsed.pages {
            assert_eq!(page.repeat, "x");
            assert_eq!(page.format, PixelFormat::Rgba4444);
            assert_eq!(page.filter_mag, TextureFilter::MipMapLinearLinear);
        }
    }
}

#[test]
fn regions_are_sorted_by_name_then_index() {
    let mut packer = AtlasPacker::new(Settings::default()).unwrap();
    for (name, index, shade) in [("b", -1, 1), ("a", 2, 2), ("a", 1, 3), ("c", 0, 4)] {
        packer
            .add_image(
                SourceId::new(name, index),
                1,
                SourceImage::bitmap(RgbaImage::from_pixel(5, 5, Rgba([shade, 0, 0, 255]))),
            )
            .unwrap();
    }
    let out = packer.pack("sorted").unwrap();
    let order: Vec<(String, i32)> = out.scales[0].manifest.pages[0]
        .regions
        .iter()
        .map(|r| (r.name.clone(), r.index))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a".to_string(), 1),
            ("a".to_string(), 2),
            ("b".to_string(), -1),
            ("c".to_string(), 0)
        ]
    );
}
