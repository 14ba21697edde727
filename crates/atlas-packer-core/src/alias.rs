//! Pixel-identity grouping.
//!
//! Two sources are aliases when their rendered bitmaps match at every scale, which is
//! decided by [`ImageSource::digest`]. Name identity ([`crate::SourceId`]) plays no part.

use crate::source::ImageSource;
use std::collections::HashMap;

/// One packed rectangle and the sources that reuse its pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasGroup {
    /// Index of the first source with this content.
    pub primary: usize,
    /// Later sources with identical content, in input order.
    pub aliases: Vec<usize>,
}

/// Groups `sources` by content digest. Groups come out in the order of their first
/// member; every source index appears exactly once.
pub fn group_by_content<'a, I>(sources: I) -> Vec<AliasGroup>
where
    I: IntoIterator<Item = &'a ImageSource>,
{
    let mut groups: Vec<AliasGroup> = Vec::new();
    let mut by_digest: HashMap<[u8; 32], usize> = HashMap::new();
    for (i, source) in sources.into_iter().enumerate() {
        match by_digest.get(&source.digest()) {
            Some(&g) => groups[g].aliases.push(i),
            None => {
                by_digest.insert(source.digest(), groups.len());
                groups.push(AliasGroup {
                    primary: i,
                    aliases: Vec::new(),
                });
            }
        }
    }
    groups
}

/// Every source in its own group.
pub fn ungrouped(len: usize) -> Vec<AliasGroup> {
    (0..len)
        .map(|primary| AliasGroup {
            primary,
            aliases: Vec::new(),
        })
        .collect()
}
