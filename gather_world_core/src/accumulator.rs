//! N-step transition accumulation.
//!
//! The accumulator keeps a sliding window over the last `N + 1` snapshots,
//! the `N` action vectors taken between them and the `N` reward maps those
//! actions earned. Once the window is full, every ship of the oldest snapshot
//! becomes one transition row:
//!
//! - `state` is the ship's oldest feature row,
//! - `action` is what it did on that tick,
//! - `reward` is `sum(gamma^i * r_i)` over the window, counting only the
//!   ticks in which the ship was still alive,
//! - `next_state` is its newest feature row if it is still alive, and
//!   `is_non_terminal` records whether it is.
//!
//! Ships are matched between the oldest and newest snapshot by id. Ids are
//! ascending and never reused, so a single merge pass is enough.

use std::collections::VecDeque;

use tracing::debug;

use crate::{
    EntityId,
    features::{FeatureBatch, Snapshot},
    reward::RewardMap,
};

/// Fixed-capacity output of one emission. Row `r` describes the ship at
/// position `r` of the oldest snapshot's id list; only the first
/// `valid_rows` handed to the sink are meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalBatch<A> {
    pub state: FeatureBatch,
    pub next_state: FeatureBatch,
    pub action: Vec<A>,
    pub reward: Vec<f32>,
    pub is_non_terminal: Vec<bool>,
}

impl<A: Copy + Default> FinalBatch<A> {
    pub fn new(capacity: usize, row_len: usize) -> Self {
        FinalBatch {
            state: FeatureBatch::zeros(capacity, row_len),
            next_state: FeatureBatch::zeros(capacity, row_len),
            action: vec![A::default(); capacity],
            reward: vec![0.0; capacity],
            is_non_terminal: vec![false; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.reward.len()
    }

    fn clear(&mut self) {
        self.state.fill(0.0);
        self.next_state.fill(0.0);
        self.action.fill(A::default());
        self.reward.fill(0.0);
        self.is_non_terminal.fill(false);
    }
}

/// Receives emitted batches. Implementations must copy whatever rows they
/// want to keep: the batch is overwritten by the next emission.
pub trait TransitionSink<A> {
    fn push(&mut self, batch: &FinalBatch<A>, valid_rows: usize);
}

/// `N` reward maps addressed relative to the oldest one.
#[derive(Debug, Clone)]
struct RewardRing {
    slots: Vec<RewardMap>,
    cursor: usize,
}

impl RewardRing {
    fn new(n: usize) -> Self {
        RewardRing {
            slots: vec![RewardMap::new(); n],
            cursor: 0,
        }
    }

    /// Overwrites the oldest map. Once the ring is full, the cursor again
    /// points at the oldest map.
    fn record(&mut self, rewards: RewardMap) {
        self.slots[self.cursor] = rewards;
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Map `offset` ticks after the oldest one.
    fn slot(&self, offset: usize) -> &RewardMap {
        &self.slots[(self.cursor + offset) % self.slots.len()]
    }

    fn reset(&mut self) {
        self.slots.iter_mut().for_each(RewardMap::clear);
        self.cursor = 0;
    }
}

/// Result of matching the oldest snapshot's ids against the newest one's.
#[derive(Debug, Clone, Default)]
struct IdMatch {
    retained_indices: Vec<usize>,
    destroyed_indices: Vec<usize>,
    retained_ids: Vec<EntityId>,
    // Row of each retained ship in the newest snapshot.
    latest_rows: Vec<usize>,
}

impl IdMatch {
    fn with_capacity(capacity: usize) -> Self {
        IdMatch {
            retained_indices: Vec::with_capacity(capacity),
            destroyed_indices: Vec::with_capacity(capacity),
            retained_ids: Vec::with_capacity(capacity),
            latest_rows: Vec::with_capacity(capacity),
        }
    }

    /// Merges two ascending id lists, recording which rows of `oldest`
    /// survived into `latest`.
    fn rebuild(&mut self, oldest: &[EntityId], latest: &[EntityId]) {
        self.clear();
        let mut rc = 0;
        for (row, &id) in oldest.iter().enumerate() {
            while latest.get(rc).is_some_and(|&other| other < id) {
                rc += 1;
            }
            if latest.get(rc) == Some(&id) {
                self.retained_indices.push(row);
                self.retained_ids.push(id);
                self.latest_rows.push(rc);
                rc += 1;
            } else {
                self.destroyed_indices.push(row);
            }
        }
    }

    fn clear(&mut self) {
        self.retained_indices.clear();
        self.destroyed_indices.clear();
        self.retained_ids.clear();
        self.latest_rows.clear();
    }
}

/// Turns a stream of snapshots, actions and rewards into N-step transitions.
#[derive(Debug, Clone)]
pub struct TransitionAccumulator<A> {
    n: usize,
    gamma: f32,
    snapshots: VecDeque<Snapshot>,
    actions: VecDeque<Vec<A>>,
    rewards: RewardRing,
    matching: IdMatch,
    final_batch: FinalBatch<A>,
    pending_rows: Option<usize>,
}

impl<A: Copy + Default> TransitionAccumulator<A> {
    /// `capacity` bounds the number of ships in any snapshot and `row_len` is
    /// the width of every feature row.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn new(n: usize, gamma: f32, capacity: usize, row_len: usize) -> Self {
        assert!(n > 0, "multi-step n must be positive");
        TransitionAccumulator {
            n,
            gamma,
            snapshots: VecDeque::with_capacity(n + 1),
            actions: VecDeque::with_capacity(n),
            rewards: RewardRing::new(n),
            matching: IdMatch::with_capacity(capacity),
            final_batch: FinalBatch::new(capacity, row_len),
            pending_rows: None,
        }
    }

    /// Adds the snapshot of the tick that just completed.
    ///
    /// `previous_actions` are the actions taken on the previous snapshot, one
    /// per id in ascending order, and `rewards` is what they earned. Pass
    /// `None` on the first tick of an episode, when nothing has acted yet;
    /// `rewards` is then ignored.
    ///
    /// # Panics
    ///
    /// Panics if actions are given without a preceding snapshot, if their
    /// count differs from that snapshot's id count, or if the snapshot does
    /// not fit the batch.
    pub fn push(&mut self, snapshot: Snapshot, rewards: &RewardMap, previous_actions: Option<&[A]>) {
        assert!(
            snapshot.len() <= self.final_batch.capacity(),
            "snapshot exceeds batch capacity"
        );
        assert_eq!(
            snapshot.features.row_len(),
            self.final_batch.state.row_len(),
            "snapshot row length mismatch"
        );

        if let Some(actions) = previous_actions {
            let previous = self
                .snapshots
                .back()
                .expect("actions pushed without a preceding snapshot");
            assert_eq!(
                actions.len(),
                previous.len(),
                "action count does not match previous snapshot"
            );
            self.rewards.record(rewards.clone());
            self.actions.push_back(actions.to_vec());
        }
        self.snapshots.push_back(snapshot);

        if self.actions.len() == self.n {
            self.emit();
        }
    }

    fn emit(&mut self) {
        let (Some(oldest), Some(oldest_actions)) =
            (self.snapshots.pop_front(), self.actions.pop_front())
        else {
            return;
        };
        let Some(latest) = self.snapshots.back() else {
            return;
        };

        self.matching.rebuild(&oldest.ids, &latest.ids);

        if oldest.is_empty() {
            self.pending_rows = None;
            return;
        }

        let batch = &mut self.final_batch;
        batch.clear();

        for row in 0..oldest.len() {
            batch.state.copy_row_from(row, &oldest.features, row);
        }
        let matching = &self.matching;
        for (&row, &latest_row) in matching.retained_indices.iter().zip(&matching.latest_rows) {
            batch.next_state.copy_row_from(row, &latest.features, latest_row);
            batch.is_non_terminal[row] = true;
        }
        batch.action[..oldest.len()].copy_from_slice(&oldest_actions);

        for (row, id) in oldest.ids.iter().enumerate() {
            let mut discount = 1.0;
            let mut total = 0.0;
            for i in 0..self.n {
                total += discount * self.rewards.slot(i).get(id).copied().unwrap_or(0.0);
                discount *= self.gamma;
            }
            batch.reward[row] = total;
        }

        debug!(
            step = oldest.step,
            rows = oldest.len(),
            retained = matching.retained_indices.len(),
            destroyed = matching.destroyed_indices.len(),
            "emitted transitions"
        );
        self.pending_rows = Some(oldest.len());
    }

    /// Hands the latest emission to `sink`, at most once per emission.
    /// Returns whether anything was handed over.
    pub fn push_transitions(&mut self, sink: &mut impl TransitionSink<A>) -> bool {
        match self.pending_rows.take() {
            Some(rows) => {
                sink.push(&self.final_batch, rows);
                true
            }
            None => false,
        }
    }

    /// Drops the window and any unflushed transitions.
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.actions.clear();
        self.rewards.reset();
        self.matching.clear();
        self.final_batch.clear();
        self.pending_rows = None;
    }

    pub fn final_batch(&self) -> &FinalBatch<A> {
        &self.final_batch
    }

    /// Most recently pushed snapshot.
    pub fn latest_state(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn latest_ids(&self) -> &[EntityId] {
        self.snapshots
            .back()
            .map(|snapshot| snapshot.ids.as_slice())
            .unwrap_or_default()
    }

    /// Number of buffered action vectors.
    pub fn queue_len(&self) -> usize {
        self.actions.len()
    }

    /// Rows of the last emitted oldest snapshot whose ships are still alive.
    pub fn retained_indices(&self) -> &[usize] {
        &self.matching.retained_indices
    }

    pub fn destroyed_indices(&self) -> &[usize] {
        &self.matching.destroyed_indices
    }

    pub fn retained_ids(&self) -> &[EntityId] {
        &self.matching.retained_ids
    }

    pub fn multi_step_n(&self) -> usize {
        self.n
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }
}
