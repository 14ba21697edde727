//! Page-size search and the multi-page driver.
//!
//! Each page is the smallest bin (within the configured bounds) that some heuristic
//! packs completely. When no size holds the whole batch, a maximum-size page is filled
//! and the leftovers start a new search.

use super::maxrects::{BinOutcome, MaxRectsBin};
use crate::config::{MaxRectsHeuristic, Settings};
use crate::error::{AtlasPackerError, Result};
use crate::geometry::pow2_exponent;
use crate::model::{PackItem, Page};
use crate::observer::PackObserver;
use std::cmp::Ordering;
use tracing::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Integer binary search over page sizes, or over exponents in power-of-two mode.
#[derive(Debug, Clone)]
pub(crate) struct BinarySearch {
    min: i64,
    max: i64,
    fuzziness: i64,
    pot: bool,
    low: i64,
    high: i64,
    current: i64,
}

impl BinarySearch {
    pub fn new(min: u32, max: u32, fuzziness: u32, pot: bool) -> Self {
        let (min, max) = if pot {
            (pow2_exponent(min) as i64, pow2_exponent(max) as i64)
        } else {
            (min as i64, max as i64)
        };
        Self {
            min,
            max,
            fuzziness: if pot { 0 } else { fuzziness as i64 },
            pot,
            low: min,
            high: max,
            current: (min + max) / 2,
        }
    }

    fn value(&self) -> u32 {
        if self.pot {
            1u32 << self.current.clamp(0, 31)
        } else {
            self.current.max(0) as u32
        }
    }

    pub fn reset(&mut self) -> u32 {
        self.low = self.min;
        self.high = self.max;
        self.current = (self.low + self.high) / 2;
        self.value()
    }

    /// Next candidate after the current one did (`fits`) or did not pack.
    pub fn next(&mut self, fits: bool) -> Option<u32> {
        if self.low >= self.high {
            return None;
        }
        if fits {
            self.high = self.current - 1;
        } else {
            self.low = self.current + 1;
        }
        self.current = (self.low + self.high).div_euclid(2);
        if (self.low - self.high).abs() < self.fuzziness {
            return None;
        }
        Some(self.value())
    }
}

/// One heuristic run at one bin size.
#[derive(Debug, Clone)]
struct Evaluation {
    page: Page,
    remaining: Vec<PackItem>,
}

impl Evaluation {
    fn bin_area(&self) -> u64 {
        self.page.bin_width as u64 * self.page.bin_height as u64
    }
}

/// Higher occupancy first (exact cross-multiplication), then the smaller bin, then
/// `a` as the earlier evaluation.
fn better(a: Option<Evaluation>, b: Option<Evaluation>) -> Option<Evaluation> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) => {
            let lhs = a.page.used_area as u128 * b.page.page_area() as u128;
            let rhs = b.page.used_area as u128 * a.page.page_area() as u128;
            let pick_b = match lhs.cmp(&rhs) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => b.bin_area() < a.bin_area(),
            };
            Some(if pick_b { b } else { a })
        }
    }
}

/// Fallback ranking at the maximum bin: every candidate shares the bin, so the one
/// that placed the most area wins; ties keep `a`.
fn fuller(a: Option<Evaluation>, b: Option<Evaluation>) -> Option<Evaluation> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) => Some(if b.page.used_area > a.page.used_area { b } else { a }),
    }
}

/// Drives the page-size search for one packing run.
pub struct PageSearch<'a> {
    settings: &'a Settings,
    observer: &'a mut dyn PackObserver,
    candidates: usize,
}

impl<'a> PageSearch<'a> {
    pub fn new(settings: &'a Settings, observer: &'a mut dyn PackObserver) -> Self {
        Self {
            settings,
            observer,
            candidates: 0,
        }
    }

    /// Number of page-size candidates evaluated so far.
    pub fn candidates(&self) -> usize {
        self.candidates
    }

    /// Edge gutter reserved on every page: `(x, y)` subtracted from each candidate.
    fn edge_padding(&self) -> (u32, u32) {
        let s = self.settings;
        if s.edge_padding && !s.duplicate_padding {
            (s.padding_x, s.padding_y)
        } else {
            (0, 0)
        }
    }

    /// Largest bin the packer may use. Duplicated padding reuses the footprint's
    /// own padding as the edge gutter, so it reserves nothing extra.
    fn max_bin(&self) -> (u32, u32) {
        let (ex, ey) = self.edge_padding();
        (
            self.settings.max_width.saturating_sub(ex),
            self.settings.max_height.saturating_sub(ey),
        )
    }

    fn rotated_size(&self, item: &PackItem) -> (u32, u32) {
        let s = self.settings;
        (
            item.height.saturating_sub(s.padding_y) + s.padding_x,
            item.width.saturating_sub(s.padding_x) + s.padding_y,
        )
    }

    fn check_fits(&self, item: &PackItem, name_of: &dyn Fn(usize) -> String) -> Result<()> {
        let s = self.settings;
        let (max_w, max_h) = self.max_bin();
        let upright = item.width <= max_w && item.height <= max_h;
        let (rw, rh) = self.rotated_size(item);
        let rotated = s.allow_rotation && item.can_rotate && rw <= max_w && rh <= max_h;
        if upright || rotated {
            return Ok(());
        }
        Err(AtlasPackerError::DoesNotFit {
            name: name_of(item.id),
            width: item.width.saturating_sub(s.padding_x),
            height: item.height.saturating_sub(s.padding_y),
            max_width: s.max_width,
            max_height: s.max_height,
        })
    }

    /// Packs every item onto as few pages as the search finds. Items are padded
    /// footprints; `name_of` labels an item id in errors.
    pub fn pack_pages(&mut self, mut items: Vec<PackItem>, name_of: &dyn Fn(usize) -> String) -> Result<Vec<Page>> {
        for item in &items {
            self.check_fits(item, name_of)?;
        }
        if self.settings.fast {
            if self.settings.allow_rotation {
                items.sort_by_key(|i| std::cmp::Reverse(i.width.max(i.height)));
            } else {
                items.sort_by_key(|i| std::cmp::Reverse(i.width));
            }
        }

        let mut pages = Vec::new();
        while !items.is_empty() {
            let eval = self.pack_page(&items)?;
            debug!(
                page = pages.len(),
                width = eval.page.width,
                height = eval.page.height,
                placed = eval.page.placements.len(),
                remaining = eval.remaining.len(),
                occupancy = eval.page.occupancy(),
                "packed page"
            );
            items = eval.remaining;
            pages.push(eval.page);
        }
        Ok(pages)
    }

    fn min_bounds(&self, items: &[PackItem]) -> (u32, u32) {
        let s = self.settings;
        let mut min_w = u32::MAX;
        let mut min_h = u32::MAX;
        for item in items {
            if s.allow_rotation && item.can_rotate {
                let short = item.width.min(item.height);
                min_w = min_w.min(short);
                min_h = min_h.min(short);
            } else {
                min_w = min_w.min(item.width);
                min_h = min_h.min(item.height);
            }
        }
        (
            min_w.max(s.min_width).min(s.max_width),
            min_h.max(s.min_height).min(s.max_height),
        )
    }

    fn pack_page(&mut self, items: &[PackItem]) -> Result<Evaluation> {
        let s = self.settings;
        let (edge_x, edge_y) = self.edge_padding();
        let (min_w, min_h) = self.min_bounds(items);
        let fuzziness = s.search_fuzziness();

        let mut best: Option<Evaluation> = None;
        if s.square {
            let min_size = min_w.max(min_h);
            let max_size = s.max_width.min(s.max_height);
            let mut search = BinarySearch::new(min_size.min(max_size), max_size, fuzziness, s.power_of_two);
            let mut size = Some(search.reset());
            while let Some(sz) = size {
                let result = self.pack_at_size(true, sz.saturating_sub(edge_x), sz.saturating_sub(edge_y), items);
                let fits = result.is_some();
                best = better(best, result);
                size = search.next(fits);
            }
            if best.is_none() {
                best = self.pack_at_size(
                    false,
                    max_size.saturating_sub(edge_x),
                    max_size.saturating_sub(edge_y),
                    items,
                );
            }
            return best
                .map(|mut eval| {
                    let side = eval.page.width.max(eval.page.height);
                    eval.page.width = side;
                    eval.page.height = side;
                    eval
                })
                .ok_or(AtlasPackerError::OutOfSpace {
                    remaining: items.len(),
                });
        }

        let mut width_search = BinarySearch::new(min_w, s.max_width, fuzziness, s.power_of_two);
        let mut height_search = BinarySearch::new(min_h, s.max_height, fuzziness, s.power_of_two);
        let mut height = Some(height_search.reset());
        while let Some(h) = height {
            let mut best_for_height = None;
            let mut width = Some(width_search.reset());
            while let Some(w) = width {
                let result = self.pack_at_size(true, w.saturating_sub(edge_x), h.saturating_sub(edge_y), items);
                let fits = result.is_some();
                best_for_height = better(best_for_height, result);
                width = width_search.next(fits);
            }
            let fits = best_for_height.is_some();
            best = better(best, best_for_height);
            height = height_search.next(fits);
        }
        if best.is_none() {
            trace!("no candidate holds the whole batch; filling a maximum-size page");
            best = self.pack_at_size(
                false,
                s.max_width.saturating_sub(edge_x),
                s.max_height.saturating_sub(edge_y),
                items,
            );
        }
        best.ok_or(AtlasPackerError::OutOfSpace {
            remaining: items.len(),
        })
    }

    /// Runs every heuristic at one bin size and keeps the best result. With `fully`
    /// only complete packs count.
    fn pack_at_size(&mut self, fully: bool, width: u32, height: u32, items: &[PackItem]) -> Option<Evaluation> {
        let s = self.settings;
        let run = |heuristic: MaxRectsHeuristic| -> Option<Evaluation> {
            let mut bin = MaxRectsBin::new(width, height, heuristic)
                .with_padding(s.padding_x, s.padding_y)
                .with_rotation(s.allow_rotation);
            let BinOutcome {
                placements,
                remaining,
            } = if s.fast {
                bin.pack_in_order(items)
            } else {
                bin.pack_exhaustive(items)
            };
            if placements.is_empty() || (fully && !remaining.is_empty()) {
                return None;
            }
            Some(Evaluation {
                page: Page::from_placements(placements, width, height),
                remaining,
            })
        };

        #[cfg(feature = "parallel")]
        let results: Vec<Option<Evaluation>> = if s.parallel {
            MaxRectsHeuristic::ALL.par_iter().map(|h| run(*h)).collect()
        } else {
            MaxRectsHeuristic::ALL.iter().map(|h| run(*h)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results: Vec<Option<Evaluation>> = MaxRectsHeuristic::ALL.iter().map(|h| run(*h)).collect();

        self.observer.on_progress(self.candidates);
        self.candidates += 1;
        trace!(width, height, fully, "page size candidate");
        // canonical heuristic order decides ties
        let pick: fn(Option<Evaluation>, Option<Evaluation>) -> Option<Evaluation> =
            if fully { better } else { fuller };
        results.into_iter().fold(None, pick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::TracingObserver;

    fn item(id: usize, w: u32, h: u32) -> PackItem {
        PackItem {
            id,
            width: w,
            height: h,
            can_rotate: true,
        }
    }

    #[test]
    fn binary_search_walks_towards_smallest_fit() {
        let mut search = BinarySearch::new(16, 64, 0, false);
        assert_eq!(search.reset(), 40);
        // fits -> shrink
        assert_eq!(search.next(true), Some(27));
        // fails -> grow
        assert_eq!(search.next(false), Some(33));
    }

    #[test]
    fn fuzziness_stops_early() {
        let mut search = BinarySearch::new(16, 64, 15, false);
        search.reset();
        assert_eq!(search.next(true), Some(27));
        assert_eq!(search.next(true), None);
    }

    #[test]
    fn pot_search_visits_powers_of_two() {
        let mut search = BinarySearch::new(16, 1024, 15, true);
        let mut seen = vec![search.reset()];
        let mut fits = true;
        while let Some(v) = search.next(fits) {
            seen.push(v);
            fits = !fits;
        }
        assert!(seen.iter().all(|v| v.is_power_of_two()));
        assert_eq!(seen[0], 128);
    }

    #[test]
    fn better_prefers_occupancy_then_smaller_bin() {
        let eval = |w: u32, bin: u32| Evaluation {
            page: Page::from_placements(
                vec![crate::model::Placement {
                    id: 0,
                    x: 0,
                    y: 0,
                    width: w,
                    height: 10,
                    rotated: false,
                }],
                bin,
                bin,
            ),
            remaining: vec![],
        };
        let picked = better(Some(eval(10, 64)), Some(eval(10, 32))).unwrap();
        assert_eq!(picked.page.bin_width, 32);
        let picked = better(Some(eval(10, 32)), Some(eval(10, 32))).unwrap();
        assert_eq!(picked.page.bin_width, 32);
    }

    #[test]
    fn fallback_prefers_placed_area_over_tightness() {
        let eval = |placed: &[(u32, u32, u32)]| Evaluation {
            page: Page::from_placements(
                placed
                    .iter()
                    .enumerate()
                    .map(|(id, &(x, w, h))| crate::model::Placement {
                        id,
                        x,
                        y: 0,
                        width: w,
                        height: h,
                        rotated: false,
                    })
                    .collect(),
                64,
                64,
            ),
            remaining: vec![],
        };
        // tight 10x10 extent vs a looser page holding twice the area
        let tight = eval(&[(0, 10, 10)]);
        let loose = eval(&[(0, 10, 10), (40, 10, 10)]);
        assert_eq!(better(Some(loose.clone()), Some(tight.clone())).unwrap().page.used_area, 100);
        assert_eq!(fuller(Some(tight), Some(loose)).unwrap().page.used_area, 200);
    }

    #[test]
    fn oversized_item_is_fatal() {
        let settings = Settings::builder()
            .with_max_dimensions(1024, 1024)
            .padding(0, 0)
            .build();
        let mut obs = TracingObserver;
        let mut search = PageSearch::new(&settings, &mut obs);
        let err = search
            .pack_pages(vec![item(0, 2000, 2000)], &|_| "huge".to_string())
            .unwrap_err();
        assert!(matches!(err, AtlasPackerError::DoesNotFit { ref name, width: 2000, .. } if name == "huge"));
        assert_eq!(search.candidates(), 0);
    }

    #[test]
    fn overflow_spills_to_more_pages() {
        let settings = Settings::builder()
            .with_max_dimensions(64, 64)
            .with_min_dimensions(16, 16)
            .padding(0, 0)
            .build();
        let mut obs = TracingObserver;
        let mut search = PageSearch::new(&settings, &mut obs);
        let items: Vec<PackItem> = (0..5).map(|i| item(i, 64, 32)).collect();
        let pages = search.pack_pages(items, &|i| i.to_string()).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages.iter().map(|p| p.placements.len()).sum::<usize>(), 5);
    }
}
