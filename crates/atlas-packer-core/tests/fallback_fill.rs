use atlas_packer_core::config::{MaxRectsHeuristic, Settings};
use atlas_packer_core::model::PackItem;
use atlas_packer_core::packer::maxrects::MaxRectsBin;
use atlas_packer_core::pack_layout;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn settings(fast: bool) -> Settings {
    Settings::builder()
        .padding(0, 0)
        .pow2(false)
        .with_min_dimensions(16, 16)
        .with_max_dimensions(64, 64)
        .fast(fast)
        .build()
}

/// Most area any single heuristic places on an empty 64x64 bin.
fn best_single_fill(items: &[PackItem], fast: bool) -> u64 {
    MaxRectsHeuristic::ALL
        .iter()
        .map(|&h| {
            let mut bin = MaxRectsBin::new(64, 64, h).with_padding(0, 0).with_rotation(false);
            let out = if fast {
                bin.pack_in_order(items)
            } else {
                bin.pack_exhaustive(items)
            };
            out.placements
                .iter()
                .map(|p| p.width as u64 * p.height as u64)
                .sum::<u64>()
        })
        .max()
        .unwrap_or(0)
}

#[test]
fn overflowing_batches_fill_the_first_page_as_much_as_possible() {
    for fast in [false, true] {
        let mut rng = StdRng::seed_from_u64(0xf111);
        let mut multi_page = 0;
        for seed in 0..60 {
            let n = rng.gen_range(6..=14);
            let sizes: Vec<(String, u32, u32)> = (0..n)
                .map(|i| (format!("r{i}"), rng.gen_range(8..=40), rng.gen_range(8..=40)))
                .collect();
            let mut items: Vec<PackItem> = sizes
                .iter()
                .enumerate()
                .map(|(id, &(_, w, h))| PackItem {
                    id,
                    width: w,
                    height: h,
                    can_rotate: false,
                })
                .collect();
            if fast {
                items.sort_by_key(|i| std::cmp::Reverse(i.width));
            }

            let out = pack_layout(sizes, &settings(fast)).unwrap();
            if out.pages.len() < 2 {
                continue;
            }
            multi_page += 1;
            assert_eq!(
                out.pages[0].used_area,
                best_single_fill(&items, fast),
                "fast={fast} seed={seed}"
            );
        }
        assert!(multi_page > 0, "fast={fast}: no batch overflowed");
    }
}
