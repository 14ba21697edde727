use super::Packer;
use crate::config::MaxRectsHeuristic;
use crate::model::{PackItem, Placement, Rect};

/// A scored position for one item. Lower `key()` is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub rect: Rect,
    pub rotated: bool,
    pub score: (i64, i64),
}

impl Candidate {
    /// Heuristic score, then lower top edge, then lower x.
    pub fn key(&self) -> (i64, i64, u32, u32) {
        (self.score.0, self.score.1, self.rect.bottom_ex(), self.rect.x)
    }
}

/// Placements made on one bin plus the items that did not fit.
#[derive(Debug, Clone, Default)]
pub struct BinOutcome {
    pub placements: Vec<Placement>,
    pub remaining: Vec<PackItem>,
}

/// Maximal-rectangles bin of a fixed size.
///
/// Footprints already include padding on their right/far edge; when an item turns
/// 90 degrees the padding stays on the same edges, so the rotated footprint is
/// `(h - pad_y + pad_x) x (w - pad_x + pad_y)`.
pub struct MaxRectsBin {
    width: u32,
    height: u32,
    pad_x: u32,
    pad_y: u32,
    allow_rotation: bool,
    heuristic: MaxRectsHeuristic,
    free: Vec<Rect>,
    used: Vec<Rect>,
}

impl MaxRectsBin {
    pub fn new(width: u32, height: u32, heuristic: MaxRectsHeuristic) -> Self {
        Self {
            width,
            height,
            pad_x: 0,
            pad_y: 0,
            allow_rotation: false,
            heuristic,
            free: vec![Rect::new(0, 0, width, height)],
            used: Vec::new(),
        }
    }

    pub fn with_padding(mut self, pad_x: u32, pad_y: u32) -> Self {
        self.pad_x = pad_x;
        self.pad_y = pad_y;
        self
    }

    pub fn with_rotation(mut self, allow: bool) -> Self {
        self.allow_rotation = allow;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn free_rects(&self) -> &[Rect] {
        &self.free
    }

    fn rotated_size(&self, item: &PackItem) -> (u32, u32) {
        (
            item.height.saturating_sub(self.pad_y) + self.pad_x,
            item.width.saturating_sub(self.pad_x) + self.pad_y,
        )
    }

    fn score(&self, fr: &Rect, w: u32, h: u32) -> (i64, i64) {
        let leftover_h = (fr.w - w) as i64;
        let leftover_v = (fr.h - h) as i64;
        let short_fit = leftover_h.min(leftover_v);
        let long_fit = leftover_h.max(leftover_v);
        let area_fit = fr.area() as i64 - (w as u64 * h as u64) as i64;
        match self.heuristic {
            MaxRectsHeuristic::BestShortSideFit => (short_fit, long_fit),
            MaxRectsHeuristic::BestLongSideFit => (long_fit, short_fit),
            MaxRectsHeuristic::BestAreaFit => (area_fit, short_fit),
            MaxRectsHeuristic::BottomLeft => ((fr.y + h) as i64, fr.x as i64),
            MaxRectsHeuristic::ContactPoint => {
                // more contact is better; negate so lower wins everywhere
                let contact = self.contact_point_score(&Rect::new(fr.x, fr.y, w, h));
                (-(contact as i64), area_fit)
            }
        }
    }

    /// Best position for `item`, or `None` when it fits in no free rectangle.
    ///
    /// Ties keep the earlier free rectangle, and upright before rotated.
    pub fn find_position(&self, item: &PackItem) -> Option<Candidate> {
        let rotate = self.allow_rotation && item.can_rotate;
        let (rw, rh) = self.rotated_size(item);
        let mut best: Option<Candidate> = None;
        let mut consider = |c: Candidate| {
            if best.is_none_or(|b| c.key() < b.key()) {
                best = Some(c);
            }
        };
        for fr in &self.free {
            if fr.w >= item.width && fr.h >= item.height {
                consider(Candidate {
                    rect: Rect::new(fr.x, fr.y, item.width, item.height),
                    rotated: false,
                    score: self.score(fr, item.width, item.height),
                });
            }
            if rotate && fr.w >= rw && fr.h >= rh {
                consider(Candidate {
                    rect: Rect::new(fr.x, fr.y, rw, rh),
                    rotated: true,
                    score: self.score(fr, rw, rh),
                });
            }
        }
        best.filter(|c| !c.rect.is_empty())
    }

    /// Commits a candidate returned by [`find_position`](Self::find_position).
    pub fn place(&mut self, item: &PackItem, c: Candidate) -> Placement {
        self.split_free(&c.rect);
        self.prune_free_list();
        self.used.push(c.rect);
        Placement {
            id: item.id,
            x: c.rect.x,
            y: c.rect.y,
            width: c.rect.w,
            height: c.rect.h,
            rotated: c.rotated,
        }
    }

    fn split_free(&mut self, used: &Rect) {
        let mut remainders = Vec::new();
        self.free.retain(|fr| {
            if !fr.intersects(used) {
                return true;
            }
            split_free_node(fr, used, &mut remainders);
            false
        });
        self.free.extend(remainders);
    }

    /// Drops free rectangles contained in another one; survivors keep their order.
    fn prune_free_list(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let mut j = i + 1;
            let mut remove_i = false;
            while j < self.free.len() {
                if self.free[j].contains(&self.free[i]) {
                    remove_i = true;
                    break;
                }
                if self.free[i].contains(&self.free[j]) {
                    self.free.remove(j);
                    continue;
                }
                j += 1;
            }
            if remove_i {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn contact_point_score(&self, node: &Rect) -> u32 {
        let mut score = 0u32;
        if node.x == 0 || node.right_ex() == self.width {
            score += node.h;
        }
        if node.y == 0 || node.bottom_ex() == self.height {
            score += node.w;
        }
        for u in &self.used {
            if u.x == node.right_ex() || u.right_ex() == node.x {
                score += overlap_1d(u.y, u.bottom_ex(), node.y, node.bottom_ex());
            }
            if u.y == node.bottom_ex() || u.bottom_ex() == node.y {
                score += overlap_1d(u.x, u.right_ex(), node.x, node.right_ex());
            }
        }
        score
    }

    /// Greedy "best rectangle next": each step places whichever pending item scores
    /// best anywhere on the bin. Exact ties keep the earlier item.
    pub fn pack_exhaustive(&mut self, items: &[PackItem]) -> BinOutcome {
        let mut pending = items.to_vec();
        let mut placements = Vec::with_capacity(items.len());
        loop {
            let mut best: Option<(usize, Candidate)> = None;
            for (i, item) in pending.iter().enumerate() {
                if let Some(c) = self.find_position(item) {
                    if best.is_none_or(|(_, b)| c.key() < b.key()) {
                        best = Some((i, c));
                    }
                }
            }
            let Some((i, c)) = best else { break };
            let item = pending.remove(i);
            placements.push(self.place(&item, c));
        }
        BinOutcome {
            placements,
            remaining: pending,
        }
    }

    /// Single pass in the given order; the first item that does not fit ends the bin
    /// and it and everything after it are returned as remaining.
    pub fn pack_in_order(&mut self, items: &[PackItem]) -> BinOutcome {
        let mut placements = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match self.insert(item) {
                Some(p) => placements.push(p),
                None => {
                    return BinOutcome {
                        placements,
                        remaining: items[i..].to_vec(),
                    };
                }
            }
        }
        BinOutcome {
            placements,
            remaining: Vec::new(),
        }
    }
}

/// Remainders of `fr` around `used`, spanning the full extent of `fr` on the other
/// axis, in bottom, top, left, right order.
fn split_free_node(fr: &Rect, used: &Rect, out: &mut Vec<Rect>) {
    if used.x < fr.right_ex() && used.right_ex() > fr.x {
        if used.y > fr.y && used.y < fr.bottom_ex() {
            out.push(Rect::new(fr.x, fr.y, fr.w, used.y - fr.y));
        }
        if used.bottom_ex() < fr.bottom_ex() {
            out.push(Rect::new(fr.x, used.bottom_ex(), fr.w, fr.bottom_ex() - used.bottom_ex()));
        }
    }
    if used.y < fr.bottom_ex() && used.bottom_ex() > fr.y {
        if used.x > fr.x && used.x < fr.right_ex() {
            out.push(Rect::new(fr.x, fr.y, used.x - fr.x, fr.h));
        }
        if used.right_ex() < fr.right_ex() {
            out.push(Rect::new(used.right_ex(), fr.y, fr.right_ex() - used.right_ex(), fr.h));
        }
    }
}

fn overlap_1d(a1: u32, a2: u32, b1: u32, b2: u32) -> u32 {
    a2.min(b2).saturating_sub(a1.max(b1))
}

impl Packer for MaxRectsBin {
    fn can_pack(&self, item: &PackItem) -> bool {
        self.find_position(item).is_some()
    }

    fn insert(&mut self, item: &PackItem) -> Option<Placement> {
        let c = self.find_position(item)?;
        Some(self.place(item, c))
    }
}
