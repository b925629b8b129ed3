//! Backlog ordering.
//!
//! Pending work comes in three buckets: deletions (tombstones keyed by
//! modification time), creations (mappers without a remote id keyed by
//! creation time) and updates (mappers with a remote id keyed by
//! modification time). The buckets are merged by timestamp; on a tie a
//! deletion goes before a creation, which goes before an update.

use erpsync_core::{Mapper, Timestamp, Tombstone};
use std::cmp::Ordering;
use std::iter::Peekable;

/// One unit of backlog work.
#[derive(Debug, Clone, PartialEq)]
pub enum BacklogItem {
    /// Propagate a deletion.
    Delete(Tombstone),
    /// Create a remote object.
    Create(Mapper),
    /// Update a remote object.
    Update(Mapper),
}

impl BacklogItem {
    /// The timestamp the item is ordered by.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            BacklogItem::Delete(tombstone) => tombstone.modified_at,
            BacklogItem::Create(mapper) => mapper.created_at,
            BacklogItem::Update(mapper) => mapper.modified_at,
        }
    }

    /// Tie-break rank; lower goes first.
    pub fn rank(&self) -> u8 {
        match self {
            BacklogItem::Delete(_) => 0,
            BacklogItem::Create(_) => 1,
            BacklogItem::Update(_) => 2,
        }
    }

    fn sort_key(&self) -> (Timestamp, u8) {
        (self.timestamp(), self.rank())
    }
}

/// Orders tombstones and mappers into a replay sequence.
pub fn merge_backlog(tombstones: Vec<Tombstone>, mappers: Vec<Mapper>) -> Vec<BacklogItem> {
    let mut deletions: Vec<BacklogItem> =
        tombstones.into_iter().map(BacklogItem::Delete).collect();
    let (creations, updates): (Vec<Mapper>, Vec<Mapper>) =
        mappers.into_iter().partition(|m| m.remote_id.is_none());
    let mut creations: Vec<BacklogItem> =
        creations.into_iter().map(BacklogItem::Create).collect();
    let mut updates: Vec<BacklogItem> = updates.into_iter().map(BacklogItem::Update).collect();

    for bucket in [&mut deletions, &mut creations, &mut updates] {
        bucket.sort_by_key(BacklogItem::timestamp);
    }

    let mut merged = Vec::with_capacity(deletions.len() + creations.len() + updates.len());
    let mut buckets = [
        deletions.into_iter().peekable(),
        creations.into_iter().peekable(),
        updates.into_iter().peekable(),
    ];

    while let Some(next) = pick_next(&mut buckets) {
        if let Some(item) = buckets[next].next() {
            merged.push(item);
        }
    }

    merged
}

fn pick_next<I: Iterator<Item = BacklogItem>>(buckets: &mut [Peekable<I>; 3]) -> Option<usize> {
    let mut best: Option<(usize, (Timestamp, u8))> = None;
    for (index, bucket) in buckets.iter_mut().enumerate() {
        let Some(head) = bucket.peek() else { continue };
        let key = head.sort_key();
        let better = match &best {
            None => true,
            Some((_, current)) => key.cmp(current) == Ordering::Less,
        };
        if better {
            best = Some((index, key));
        }
    }
    best.map(|(index, _)| index)
}
