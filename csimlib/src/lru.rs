//! Least recently used bookkeeping
//!
//! There is no clock. Each line carries a recency counter where 0 means "just used", and every
//! access ages all other valid lines by one. The counters are aged across the whole cache, not
//! only the touched set, so a line's recency is the number of accesses (to any set) since it was
//! last used. Within a set this keeps the valid lines' counters distinct, which is all eviction
//! needs.

use crate::cache::CacheLine;

/// Marks `lines[index]` as the most recently used line, ageing every other valid line
///
/// `lines` is the whole cache, not a single set
pub(crate) fn touch(lines: &mut [CacheLine], index: usize) {
    for (i, line) in lines.iter_mut().enumerate() {
        if line.valid && i != index {
            line.recency += 1;
        }
    }
    lines[index].recency = 0;
}

/// Picks the slot to evict from a full set: the line with the largest recency, and the lowest
/// slot among lines tied for the largest
///
/// Returns `None` only for an empty set
pub(crate) fn select_victim(set: &[CacheLine]) -> Option<usize> {
    let mut victim: Option<(usize, u64)> = None;
    for (slot, line) in set.iter().enumerate() {
        // Strictly greater, so the first slot wins a tie
        match victim {
            Some((_, recency)) if line.recency <= recency => {}
            _ => victim = Some((slot, line.recency)),
        }
    }
    victim.map(|(slot, _)| slot)
}
