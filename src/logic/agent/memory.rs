//! Replay Memory
//!
//! Two bounded FIFO sets of past corrections, one per class. A vector is
//! never a member of both: recording it under one class first removes it
//! from the other.

use std::collections::{HashSet, VecDeque};

use rand::seq::IteratorRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::logic::features::FeatureVector;
use crate::logic::labels::Label;

// ============================================================================
// BOUNDED SET
// ============================================================================

/// Insertion-ordered set with O(1) membership
#[derive(Debug, Clone, Default)]
pub struct BoundedSet {
    order: VecDeque<FeatureVector>,
    members: HashSet<FeatureVector>,
}

impl BoundedSet {
    pub fn contains(&self, v: &FeatureVector) -> bool {
        self.members.contains(v)
    }

    /// Append if absent; returns whether it was added
    pub fn insert(&mut self, v: FeatureVector) -> bool {
        if !self.members.insert(v) {
            return false;
        }
        self.order.push_back(v);
        true
    }

    pub fn remove(&mut self, v: &FeatureVector) -> bool {
        if !self.members.remove(v) {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|x| x == v) {
            self.order.remove(pos);
        }
        true
    }

    /// Drop oldest entries until at most `capacity` remain
    pub fn evict_to(&mut self, capacity: usize) -> Vec<FeatureVector> {
        let mut evicted = Vec::new();
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &FeatureVector> {
        self.order.iter()
    }

    /// Up to `n` members, uniformly without replacement
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<FeatureVector> {
        self.order.iter().copied().choose_multiple(rng, n)
    }
}

// ============================================================================
// REPLAY MEMORY
// ============================================================================

/// What `ReplayMemory::record` changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// The vector was in the other class and got removed
    pub contradiction_resolved: bool,
    pub inserted: bool,
    pub evicted: Vec<FeatureVector>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "MemorySnapshot", into = "MemorySnapshot")]
pub struct ReplayMemory {
    safe: BoundedSet,
    phish: BoundedSet,
}

/// Serialized shape: two oldest-first lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub safe: Vec<FeatureVector>,
    #[serde(default)]
    pub phish: Vec<FeatureVector>,
}

impl ReplayMemory {
    pub fn new() -> Self {
        Self { safe: BoundedSet::default(), phish: BoundedSet::default() }
    }

    /// Record `v` as `label`, keeping both sets disjoint and within `capacity`
    pub fn record(&mut self, v: FeatureVector, label: Label, capacity: usize) -> RecordOutcome {
        let (target, other) = match label {
            Label::Legitimate => (&mut self.safe, &mut self.phish),
            Label::Phishing => (&mut self.phish, &mut self.safe),
        };

        let contradiction_resolved = other.remove(&v);
        let inserted = target.insert(v);

        let mut evicted = target.evict_to(capacity);
        evicted.extend(other.evict_to(capacity));

        RecordOutcome { contradiction_resolved, inserted, evicted }
    }

    pub fn set(&self, label: Label) -> &BoundedSet {
        match label {
            Label::Legitimate => &self.safe,
            Label::Phishing => &self.phish,
        }
    }

    pub fn safe(&self) -> &BoundedSet {
        &self.safe
    }

    pub fn phish(&self) -> &BoundedSet {
        &self.phish
    }

    /// Enforce a capacity on both sets (e.g. after loading with a smaller cap)
    pub fn shrink_to(&mut self, capacity: usize) {
        self.safe.evict_to(capacity);
        self.phish.evict_to(capacity);
    }
}

impl Default for ReplayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl From<MemorySnapshot> for ReplayMemory {
    fn from(snapshot: MemorySnapshot) -> Self {
        let mut memory = ReplayMemory::new();
        for v in snapshot.safe {
            memory.safe.insert(v);
        }
        // A blob written by older code may hold contradictions; the later
        // phish entry wins, matching record() order
        for v in snapshot.phish {
            memory.safe.remove(&v);
            memory.phish.insert(v);
        }
        memory
    }
}

impl From<ReplayMemory> for MemorySnapshot {
    fn from(memory: ReplayMemory) -> Self {
        Self {
            safe: memory.safe.iter().copied().collect(),
            phish: memory.phish.iter().copied().collect(),
        }
    }
}
