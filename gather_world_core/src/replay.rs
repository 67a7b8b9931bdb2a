use rand::{SeedableRng, rngs::StdRng, seq::index};

use crate::accumulator::{FinalBatch, TransitionSink};

/// A single N-step transition copied out of a [`FinalBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<A> {
    pub state: Vec<f32>,
    pub action: A,
    /// Discounted N-step return.
    pub reward: f32,
    pub next_state: Vec<f32>,
    /// False when the ship no longer existed at the end of the window.
    pub is_non_terminal: bool,
}

impl<A: Copy> Transition<A> {
    pub fn from_batch(batch: &FinalBatch<A>, row: usize) -> Self {
        Transition {
            state: batch.state.row(row).to_vec(),
            action: batch.action[row],
            reward: batch.reward[row],
            next_state: batch.next_state.row(row).to_vec(),
            is_non_terminal: batch.is_non_terminal[row],
        }
    }
}

/// Fixed-capacity ring buffer of transitions with uniform sampling.
#[derive(Debug)]
pub struct ReplayStore<A> {
    buffer: Vec<Transition<A>>,
    capacity: usize,
    position: usize,
    total_pushed: usize,
    rng: StdRng,
}

impl<A: Copy> ReplayStore<A> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, seed: u64) -> Self {
        assert!(capacity > 0, "replay capacity must be positive");
        ReplayStore {
            buffer: Vec::with_capacity(capacity),
            capacity,
            position: 0,
            total_pushed: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Add a transition. Overwrites the oldest when full.
    pub fn insert(&mut self, transition: Transition<A>) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            self.buffer[self.position] = transition;
        }
        self.position = (self.position + 1) % self.capacity;
        self.total_pushed += 1;
    }

    /// Sample a random batch of transitions without replacement.
    pub fn sample(&mut self, batch_size: usize) -> Vec<Transition<A>> {
        assert!(
            batch_size <= self.buffer.len(),
            "Not enough transitions to sample"
        );
        let indices = index::sample(&mut self.rng, self.buffer.len(), batch_size);
        indices.iter().map(|i| self.buffer[i].clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Transitions inserted since creation, including overwritten ones.
    pub fn total_pushed(&self) -> usize {
        self.total_pushed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition<A>> {
        self.buffer.iter()
    }
}

impl<A: Copy> TransitionSink<A> for ReplayStore<A> {
    fn push(&mut self, batch: &FinalBatch<A>, valid_rows: usize) {
        for row in 0..valid_rows {
            self.insert(Transition::from_batch(batch, row));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(reward: f32) -> Transition<u8> {
        Transition {
            state: vec![0.0; 3],
            action: 1,
            reward,
            next_state: vec![1.0; 3],
            is_non_terminal: true,
        }
    }

    #[test]
    fn test_ring_buffer_overwrites_oldest() {
        let mut store = ReplayStore::new(3, 0);
        for i in 0..5 {
            store.insert(transition(i as f32));
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.total_pushed(), 5);
        let mut rewards: Vec<f32> = store.iter().map(|t| t.reward).collect();
        rewards.sort_by(f32::total_cmp);
        assert_eq!(rewards, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sink_copies_valid_rows_only() {
        let mut batch: FinalBatch<u8> = FinalBatch::new(4, 3);
        batch.reward[0] = 1.5;
        batch.reward[1] = 2.5;
        batch.reward[2] = 9.0;
        batch.action[1] = 4;
        batch.is_non_terminal[0] = true;

        let mut store = ReplayStore::new(10, 0);
        store.push(&batch, 2);
        assert_eq!(store.len(), 2);
        let stored: Vec<_> = store.iter().collect();
        assert_eq!(stored[0].reward, 1.5);
        assert!(stored[0].is_non_terminal);
        assert_eq!(stored[1].action, 4);
        assert!(!stored[1].is_non_terminal);
    }

    #[test]
    fn test_sample_is_seeded() {
        let mut a = ReplayStore::new(50, 7);
        let mut b = ReplayStore::new(50, 7);
        for i in 0..50 {
            a.insert(transition(i as f32));
            b.insert(transition(i as f32));
        }
        let left: Vec<f32> = a.sample(10).iter().map(|t| t.reward).collect();
        let right: Vec<f32> = b.sample(10).iter().map(|t| t.reward).collect();
        assert_eq!(left.len(), 10);
        assert_eq!(left, right);
    }

    #[test]
    #[should_panic(expected = "Not enough transitions")]
    fn test_sample_too_many() {
        let mut store = ReplayStore::new(10, 0);
        store.insert(transition(0.0));
        store.sample(5);
    }
}
