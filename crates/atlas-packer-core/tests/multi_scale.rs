use atlas_packer_core::config::Settings;
use atlas_packer_core::model::SourceId;
use atlas_packer_core::source::{Rasterizer, SourceImage};
use atlas_packer_core::{AtlasPacker, AtlasPackerError, PackObserver, ScaleOrigin};
use image::{Rgba, RgbaImage};

fn pattern(w: u32, h: u32, seed: u8) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([seed, (x * 7) as u8, (y * 11) as u8, 255]))
}

fn settings() -> Settings {
    Settings::builder()
        .scales(vec![1, 2])
        .pow2(false)
        .with_min_dimensions(1, 1)
        .build()
}

#[test]
fn scales_are_derived_and_positions_scale_together() {
    let mut packer = AtlasPacker::new(settings()).unwrap();
    packer
        .add_image(SourceId::named("both"), 1, SourceImage::bitmap(pattern(8, 6, 1)))
        .unwrap();
    packer
        .add_image(SourceId::named("both"), 2, SourceImage::bitmap(pattern(16, 12, 1)))
        .unwrap();
    packer
        .add_image(SourceId::named("hi"), 2, SourceImage::bitmap(pattern(20, 10, 2)))
        .unwrap();
    packer
        .add_image(SourceId::named("lo"), 1, SourceImage::bitmap(pattern(7, 9, 3)))
        .unwrap();
    let out = packer.pack("multi").unwrap();

    let origin = |name: &str, scale| packer.source(&SourceId::named(name)).unwrap().scale_origin(scale);
    assert_eq!(origin("both", 2), ScaleOrigin::Explicit);
    assert_eq!(origin("hi", 1), ScaleOrigin::DerivedDown { from: 2 });
    assert_eq!(origin("lo", 2), ScaleOrigin::DerivedUp { from: 1 });

    let one = out.scale(1).unwrap();
    let two = out.scale(2).unwrap();
    assert_eq!(one.manifest_name, "multi.atlas");
    assert_eq!(two.manifest_name, "multi@2x.atlas");
    assert_eq!(one.pages[0].name, "multi.png");
    assert_eq!(two.pages[0].name, "multi@2x.png");

    let (w1, h1) = one.pages[0].rgba.dimensions();
    assert_eq!(two.pages[0].rgba.dimensions(), (w1 * 2, h1 * 2));

    for (r1, r2) in one.manifest.pages[0]
        .regions
        .iter()
        .zip(&two.manifest.pages[0].regions)
    {
        assert_eq!(r1.name, r2.name);
        assert_eq!((r1.x * 2, r1.y * 2), (r2.x, r2.y));
        assert_eq!((r1.width * 2, r1.height * 2), (r2.width, r2.height));
        assert_eq!((r1.orig_width * 2, r1.orig_height * 2), (r2.orig_width, r2.orig_height));
    }

    // explicit @2x pixels are copied untouched
    let region = two.manifest.region("both", -1).unwrap();
    let page = &two.pages[0].rgba;
    let src = pattern(16, 12, 1);
    assert_eq!(page.get_pixel(region.x, region.y), src.get_pixel(0, 0));
    assert_eq!(page.get_pixel(region.x + 15, region.y + 11), src.get_pixel(15, 11));
}

#[test]
fn mismatched_size_is_reported_and_resampled() {
    #[derive(Default)]
    struct Warnings(Vec<String>);
    impl PackObserver for Warnings {
        fn on_warning(&mut self, _source: &str, message: &str) {
            self.0.push(message.to_string());
        }
    }

    let mut packer = AtlasPacker::new(settings()).unwrap().with_observer(Warnings::default());
    packer
        .add_image(SourceId::named("odd"), 1, SourceImage::bitmap(pattern(8, 8, 1)))
        .unwrap();
    packer
        .add_image(SourceId::named("odd"), 2, SourceImage::bitmap(pattern(15, 16, 1)))
        .unwrap();
    let out = packer.pack("p").unwrap();
    assert!(packer.observer().0.iter().any(|m| m.contains("expected 16x16")));
    let region = out.scale(2).unwrap().manifest.region("odd", -1).unwrap();
    assert_eq!((region.width, region.height), (16, 16));
}

struct Disc {
    side: u32,
}

impl Rasterizer for Disc {
    fn natural_size(&self) -> (u32, u32) {
        (self.side, self.side)
    }

    fn rasterize(&self, width: u32, height: u32) -> Result<RgbaImage, String> {
        Ok(RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 255])))
    }
}

struct Broken;

impl Rasterizer for Broken {
    fn natural_size(&self) -> (u32, u32) {
        (4, 4)
    }

    fn rasterize(&self, _width: u32, _height: u32) -> Result<RgbaImage, String> {
        Err("unsupported path command".into())
    }
}

#[test]
fn vector_sources_render_at_every_scale() {
    let mut packer = AtlasPacker::new(settings()).unwrap();
    packer
        .add_image(SourceId::named("disc"), 1, SourceImage::vector(Disc { side: 10 }))
        .unwrap();
    let out = packer.pack("v").unwrap();
    let region = out.scale(2).unwrap().manifest.region("disc", -1).unwrap();
    assert_eq!((region.width, region.height), (20, 20));

    let mut packer = AtlasPacker::new(settings()).unwrap();
    packer
        .add_image(SourceId::named("bad"), 1, SourceImage::vector(Broken))
        .unwrap();
    assert!(matches!(
        packer.pack("v"),
        Err(AtlasPackerError::Rasterize { ref name, .. }) if name == "bad"
    ));
}

#[test]
fn unsupported_scale_is_rejected() {
    let mut packer = AtlasPacker::new(Settings::default()).unwrap();
    let err = packer
        .add_image(SourceId::named("x"), 5, SourceImage::bitmap(pattern(4, 4, 0)))
        .unwrap_err();
    assert!(matches!(err, AtlasPackerError::InvalidScaleFactor { scale: 5, .. }));
}
