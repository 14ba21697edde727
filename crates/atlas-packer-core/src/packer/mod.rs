use crate::model::{PackItem, Placement};

pub mod maxrects;
pub mod search;

/// A packer places footprints into a single page.
///
/// Implementations must never produce overlapping placements and must keep every
/// placement inside the page. `insert` returns `None` when the item fits nowhere.
pub trait Packer {
    fn can_pack(&self, item: &PackItem) -> bool;
    fn insert(&mut self, item: &PackItem) -> Option<Placement>;
}
