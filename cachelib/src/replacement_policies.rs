use std::collections::{BTreeMap, BTreeSet, HashMap};
use crate::config::ReplacementPolicyConfig;
use crate::Tag;

/// A generic trait for replacement policies. Every call is scoped to one set of one cache, the
/// policy keeps independent bookkeeping for each set.
///
/// Policies only deal in tags. Storage of the tags is the responsibility of the cache, which asks
/// the policy for a victim and removes it from the set itself
pub trait ReplacementPolicy {
    /// Records a use of `tag` in `set`, either a hit on a resident tag or a fresh insertion
    ///
    /// A tag the policy hasn't seen before is treated as its first use
    ///
    /// # Panics
    ///
    /// If `tag` is new and the set is already tracking as many tags as it has ways
    fn touch(&mut self, set: usize, tag: Tag);

    /// Chooses a victim in `set`, stops tracking it, and returns it so the cache can remove it
    ///
    /// Only meaningful when the set is full
    ///
    /// # Panics
    ///
    /// If the set has no resident tags, this is a bug in the caller rather than a runtime
    /// condition
    fn evict(&mut self, set: usize) -> Tag;

    /// Stops tracking `tag` in `set` without it being chosen as a victim. Unknown tags are ignored
    fn forget(&mut self, set: usize, tag: Tag);
}

/// Round robin replacement, which keeps a separate victim cursor for each set
///
/// The cursor walks the slots of the set in order, so victims leave in the order they were
/// inserted. Hits don't affect the order
pub struct RoundRobin {
    ways: usize,
    slots: Vec<Option<Tag>>,
    cursors: Vec<usize>,
}

impl RoundRobin {
    pub fn new(num_sets: usize, ways: usize) -> Self {
        Self {
            ways,
            slots: vec![None; num_sets * ways],
            cursors: vec![0; num_sets],
        }
    }

    fn set_slots(&mut self, set: usize) -> &mut [Option<Tag>] {
        &mut self.slots[set * self.ways..(set + 1) * self.ways]
    }
}

impl ReplacementPolicy for RoundRobin {
    fn touch(&mut self, set: usize, tag: Tag) {
        let ways = self.ways;
        let cursor = self.cursors[set];
        let slots = self.set_slots(set);
        if slots.contains(&Some(tag)) {
            return;
        }
        if slots[cursor].is_none() {
            slots[cursor] = Some(tag);
            self.cursors[set] = (cursor + 1) % ways;
        } else {
            // Only reachable after forget() opened a gap away from the cursor
            let free = slots
                .iter()
                .position(Option::is_none)
                .unwrap_or_else(|| panic!("round robin: inserting tag {tag:#x} into full set {set}"));
            slots[free] = Some(tag);
        }
    }

    fn evict(&mut self, set: usize) -> Tag {
        let cursor = self.cursors[set];
        self.set_slots(set)[cursor]
            .take()
            .unwrap_or_else(|| panic!("round robin: evicting from set {set} with an empty victim slot"))
    }

    fn forget(&mut self, set: usize, tag: Tag) {
        if let Some(slot) = self.set_slots(set).iter_mut().find(|slot| **slot == Some(tag)) {
            *slot = None;
        }
    }
}

type Handle = u32;

#[derive(Debug, Clone, Copy)]
struct Node {
    tag: Tag,
    prev: Option<Handle>,
    next: Option<Handle>,
}

/// Recency chain for a single set
///
/// The chain is a doubly linked list stored in a fixed arena of `ways` nodes, linked by handle.
/// Unused nodes sit on the free list. `head` is the least recently used tag, `tail` the most
/// recently used
#[derive(Debug)]
struct RecencyList {
    nodes: Vec<Node>,
    free: Vec<Handle>,
    head: Option<Handle>,
    tail: Option<Handle>,
    positions: HashMap<Tag, Handle>,
}

impl RecencyList {
    fn new(ways: usize) -> Self {
        let blank = Node {
            tag: 0,
            prev: None,
            next: None,
        };
        Self {
            nodes: vec![blank; ways],
            // Reversed so handles are handed out from 0 upwards
            free: (0..ways as Handle).rev().collect(),
            head: None,
            tail: None,
            positions: HashMap::new(),
        }
    }

    fn unlink(&mut self, handle: Handle) {
        let Node { prev, next, .. } = self.nodes[handle as usize];
        match prev {
            Some(p) => self.nodes[p as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n as usize].prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_back(&mut self, handle: Handle) {
        let node = &mut self.nodes[handle as usize];
        node.prev = self.tail;
        node.next = None;
        match self.tail {
            Some(t) => self.nodes[t as usize].next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
    }

    fn touch(&mut self, tag: Tag) {
        if let Some(&handle) = self.positions.get(&tag) {
            self.unlink(handle);
            self.push_back(handle);
            return;
        }
        let handle = self
            .free
            .pop()
            .unwrap_or_else(|| panic!("lru: inserting tag {tag:#x} into a full set"));
        self.nodes[handle as usize].tag = tag;
        self.positions.insert(tag, handle);
        self.push_back(handle);
    }

    fn release(&mut self, handle: Handle) -> Tag {
        self.unlink(handle);
        self.free.push(handle);
        let tag = self.nodes[handle as usize].tag;
        self.positions.remove(&tag);
        tag
    }

    fn pop_front(&mut self) -> Option<Tag> {
        let head = self.head?;
        Some(self.release(head))
    }

    fn remove(&mut self, tag: Tag) {
        if let Some(&handle) = self.positions.get(&tag) {
            self.release(handle);
        }
    }
}

/// Least recently used replacement policy
///
/// Each set keeps its own recency chain with an index from tag to node, so both a hit and an
/// eviction are O(1)
pub struct LeastRecentlyUsed {
    sets: Vec<RecencyList>,
}

impl LeastRecentlyUsed {
    pub fn new(num_sets: usize, ways: usize) -> Self {
        Self {
            sets: (0..num_sets).map(|_| RecencyList::new(ways)).collect(),
        }
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn touch(&mut self, set: usize, tag: Tag) {
        self.sets[set].touch(tag);
    }

    fn evict(&mut self, set: usize) -> Tag {
        self.sets[set]
            .pop_front()
            .unwrap_or_else(|| panic!("lru: evicting from empty set {set}"))
    }

    fn forget(&mut self, set: usize, tag: Tag) {
        self.sets[set].remove(tag);
    }
}

/// Frequency bookkeeping for a single set
#[derive(Debug, Default)]
struct FrequencyTable {
    counts: HashMap<Tag, u64>,
    // Ordered sets so the lowest tag is the tie-break victim
    buckets: BTreeMap<u64, BTreeSet<Tag>>,
    // 0 when the set is empty
    min_frequency: u64,
}

impl FrequencyTable {
    fn touch(&mut self, tag: Tag, ways: usize) {
        match self.counts.get(&tag).copied() {
            Some(old) => {
                self.counts.insert(tag, old + 1);
                let emptied = match self.buckets.get_mut(&old) {
                    Some(bucket) => {
                        bucket.remove(&tag);
                        bucket.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    self.buckets.remove(&old);
                    if self.min_frequency == old {
                        self.min_frequency = old + 1;
                    }
                }
                self.buckets.entry(old + 1).or_default().insert(tag);
            }
            None => {
                assert!(self.counts.len() < ways, "lfu: inserting tag {tag:#x} into a full set");
                self.counts.insert(tag, 1);
                self.buckets.entry(1).or_default().insert(tag);
                self.min_frequency = 1;
            }
        }
    }

    /// Drops `tag` from the bucket for `frequency`, moving the minimum on if that bucket was the
    /// minimum and is now empty
    fn remove_from_bucket(&mut self, tag: Tag, frequency: u64) {
        if let Some(bucket) = self.buckets.get_mut(&frequency) {
            bucket.remove(&tag);
            if bucket.is_empty() {
                self.buckets.remove(&frequency);
                if self.min_frequency == frequency {
                    self.min_frequency = self.buckets.keys().next().copied().unwrap_or(0);
                }
            }
        }
    }

    fn evict(&mut self) -> Option<Tag> {
        let frequency = self.min_frequency;
        let victim = self.buckets.get(&frequency)?.first().copied()?;
        self.counts.remove(&victim);
        self.remove_from_bucket(victim, frequency);
        Some(victim)
    }

    fn forget(&mut self, tag: Tag) {
        if let Some(frequency) = self.counts.remove(&tag) {
            self.remove_from_bucket(tag, frequency);
        }
    }
}

/// Least frequently used replacement policy
///
/// Ties between tags with the same use count go to the lowest tag, which keeps results
/// deterministic regardless of insertion order
pub struct LeastFrequentlyUsed {
    ways: usize,
    sets: Vec<FrequencyTable>,
}

impl LeastFrequentlyUsed {
    pub fn new(num_sets: usize, ways: usize) -> Self {
        Self {
            ways,
            sets: (0..num_sets).map(|_| FrequencyTable::default()).collect(),
        }
    }
}

impl ReplacementPolicy for LeastFrequentlyUsed {
    fn touch(&mut self, set: usize, tag: Tag) {
        self.sets[set].touch(tag, self.ways);
    }

    fn evict(&mut self, set: usize) -> Tag {
        self.sets[set]
            .evict()
            .unwrap_or_else(|| panic!("lfu: evicting from empty set {set}"))
    }

    fn forget(&mut self, set: usize, tag: Tag) {
        self.sets[set].forget(tag);
    }
}

/// Enum over the provided replacement policies
///
/// Branching explicitly on the concrete policy lets the compiler inline each implementation,
/// which a `dyn ReplacementPolicy` would prevent on the hottest path of the simulation
pub enum Policy {
    RoundRobin(RoundRobin),
    LeastRecentlyUsed(LeastRecentlyUsed),
    LeastFrequentlyUsed(LeastFrequentlyUsed),
}

impl Policy {
    /// Builds the configured policy for a cache with the given geometry
    pub fn new(config: ReplacementPolicyConfig, num_sets: usize, ways: usize) -> Self {
        match config {
            ReplacementPolicyConfig::RoundRobin => RoundRobin::new(num_sets, ways).into(),
            ReplacementPolicyConfig::LeastRecentlyUsed => LeastRecentlyUsed::new(num_sets, ways).into(),
            ReplacementPolicyConfig::LeastFrequentlyUsed => LeastFrequentlyUsed::new(num_sets, ways).into(),
        }
    }

    pub fn kind(&self) -> ReplacementPolicyConfig {
        match self {
            Policy::RoundRobin(_) => ReplacementPolicyConfig::RoundRobin,
            Policy::LeastRecentlyUsed(_) => ReplacementPolicyConfig::LeastRecentlyUsed,
            Policy::LeastFrequentlyUsed(_) => ReplacementPolicyConfig::LeastFrequentlyUsed,
        }
    }
}

impl From<RoundRobin> for Policy {
    fn from(value: RoundRobin) -> Self {
        Self::RoundRobin(value)
    }
}

impl From<LeastRecentlyUsed> for Policy {
    fn from(value: LeastRecentlyUsed) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<LeastFrequentlyUsed> for Policy {
    fn from(value: LeastFrequentlyUsed) -> Self {
        Self::LeastFrequentlyUsed(value)
    }
}

impl ReplacementPolicy for Policy {
    #[inline]
    fn touch(&mut self, set: usize, tag: Tag) {
        match self {
            Policy::RoundRobin(p) => p.touch(set, tag),
            Policy::LeastRecentlyUsed(p) => p.touch(set, tag),
            Policy::LeastFrequentlyUsed(p) => p.touch(set, tag),
        }
    }

    #[inline]
    fn evict(&mut self, set: usize) -> Tag {
        match self {
            Policy::RoundRobin(p) => p.evict(set),
            Policy::LeastRecentlyUsed(p) => p.evict(set),
            Policy::LeastFrequentlyUsed(p) => p.evict(set),
        }
    }

    fn forget(&mut self, set: usize, tag: Tag) {
        match self {
            Policy::RoundRobin(p) => p.forget(set, tag),
            Policy::LeastRecentlyUsed(p) => p.forget(set, tag),
            Policy::LeastFrequentlyUsed(p) => p.forget(set, tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Tag = 0xA;
    const B: Tag = 0xB;
    const C: Tag = 0xC;

    #[test]
    fn lru_evicts_least_recent() {
        let mut lru = LeastRecentlyUsed::new(1, 2);
        lru.touch(0, A);
        lru.touch(0, B);
        lru.touch(0, A);
        // Making room for c
        assert_eq!(lru.evict(0), B);
        lru.touch(0, C);
        assert_eq!(lru.evict(0), A);
        assert_eq!(lru.evict(0), C);
    }

    #[test]
    fn lru_reuses_freed_nodes() {
        let mut lru = LeastRecentlyUsed::new(2, 3);
        for round in 0..10u64 {
            for tag in 0..3 {
                lru.touch(1, round * 3 + tag);
            }
            for tag in 0..3 {
                assert_eq!(lru.evict(1), round * 3 + tag);
            }
        }
        // The other set was never touched
        assert!(lru.sets[0].head.is_none());
    }

    #[test]
    fn lru_forget_unlinks_middle() {
        let mut lru = LeastRecentlyUsed::new(1, 3);
        lru.touch(0, A);
        lru.touch(0, B);
        lru.touch(0, C);
        lru.forget(0, B);
        lru.forget(0, 0x1234);
        assert_eq!(lru.evict(0), A);
        assert_eq!(lru.evict(0), C);
    }

    #[test]
    #[should_panic(expected = "empty set")]
    fn lru_evict_empty_panics() {
        LeastRecentlyUsed::new(1, 2).evict(0);
    }

    #[test]
    #[should_panic(expected = "full set")]
    fn lru_overfilled_set_panics() {
        let mut lru = LeastRecentlyUsed::new(1, 1);
        lru.touch(0, A);
        lru.touch(0, B);
    }

    #[test]
    fn lfu_evicts_least_frequent() {
        let mut lfu = LeastFrequentlyUsed::new(1, 2);
        lfu.touch(0, A);
        lfu.touch(0, A);
        lfu.touch(0, B);
        assert_eq!(lfu.evict(0), B);
        lfu.touch(0, C);
        assert_eq!(lfu.evict(0), C);
    }

    #[test]
    fn lfu_ties_go_to_lowest_tag() {
        let mut lfu = LeastFrequentlyUsed::new(1, 2);
        lfu.touch(0, B);
        lfu.touch(0, A);
        assert_eq!(lfu.evict(0), A);
        assert_eq!(lfu.evict(0), B);
    }

    #[test]
    fn lfu_minimum_moves_on_after_eviction() {
        let mut lfu = LeastFrequentlyUsed::new(1, 3);
        lfu.touch(0, A);
        lfu.touch(0, B);
        lfu.touch(0, B);
        lfu.touch(0, C);
        lfu.touch(0, C);
        lfu.touch(0, C);
        assert_eq!(lfu.evict(0), A);
        assert_eq!(lfu.sets[0].min_frequency, 2);
        assert_eq!(lfu.evict(0), B);
        assert_eq!(lfu.sets[0].min_frequency, 3);
        assert_eq!(lfu.evict(0), C);
        assert_eq!(lfu.sets[0].min_frequency, 0);
    }

    #[test]
    fn lfu_minimum_bumps_on_touch() {
        let mut lfu = LeastFrequentlyUsed::new(1, 2);
        lfu.touch(0, A);
        lfu.touch(0, A);
        assert_eq!(lfu.sets[0].min_frequency, 2);
        lfu.touch(0, B);
        assert_eq!(lfu.sets[0].min_frequency, 1);
        lfu.forget(0, B);
        assert_eq!(lfu.sets[0].min_frequency, 2);
        assert_eq!(lfu.evict(0), A);
    }

    #[test]
    #[should_panic(expected = "empty set")]
    fn lfu_evict_empty_panics() {
        LeastFrequentlyUsed::new(4, 2).evict(3);
    }

    #[test]
    fn round_robin_is_cyclic() {
        let (x, y, z, v, w) = (1, 2, 3, 4, 5);
        let mut rr = RoundRobin::new(1, 3);
        rr.touch(0, x);
        rr.touch(0, y);
        rr.touch(0, z);
        // Hits don't reorder anything
        rr.touch(0, x);
        assert_eq!(rr.evict(0), x);
        rr.touch(0, v);
        assert_eq!(rr.evict(0), y);
        rr.touch(0, w);
        assert_eq!(rr.evict(0), z);
    }

    #[test]
    fn round_robin_sets_are_independent() {
        let mut rr = RoundRobin::new(2, 2);
        rr.touch(0, A);
        rr.touch(1, B);
        rr.touch(1, C);
        rr.touch(0, C);
        assert_eq!(rr.evict(1), B);
        assert_eq!(rr.evict(0), A);
    }

    #[test]
    fn round_robin_fills_gap_left_by_forget() {
        let mut rr = RoundRobin::new(1, 3);
        rr.touch(0, A);
        rr.touch(0, B);
        rr.forget(0, B);
        rr.touch(0, C);
        rr.touch(0, B);
        // C filled the cursor slot, B went back into the gap
        assert_eq!(rr.evict(0), A);
    }

    #[test]
    #[should_panic(expected = "empty victim slot")]
    fn round_robin_evict_empty_panics() {
        RoundRobin::new(1, 2).evict(0);
    }

    #[test]
    fn policy_dispatches_to_variant() {
        let mut policy = Policy::new(ReplacementPolicyConfig::LeastRecentlyUsed, 1, 2);
        assert_eq!(policy.kind(), ReplacementPolicyConfig::LeastRecentlyUsed);
        policy.touch(0, A);
        policy.touch(0, B);
        policy.touch(0, A);
        assert_eq!(policy.evict(0), B);
    }
}
