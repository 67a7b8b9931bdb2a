use crate::{EntityId, Position, simulation::GridSimulation};

/// Dense row-major matrix of `f32` features, one row per ship.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureBatch {
    rows: usize,
    row_len: usize,
    data: Vec<f32>,
}

impl FeatureBatch {
    pub fn zeros(rows: usize, row_len: usize) -> Self {
        FeatureBatch {
            rows,
            row_len,
            data: vec![0.0; rows * row_len],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn row_len(&self) -> usize {
        self.row_len
    }

    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.row_len;
        &self.data[start..start + self.row_len]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        let start = row * self.row_len;
        &mut self.data[start..start + self.row_len]
    }

    /// Copies row `from` of `source` into row `to` of `self`.
    ///
    /// # Panics
    ///
    /// Panics if the row lengths differ.
    pub fn copy_row_from(&mut self, to: usize, source: &FeatureBatch, from: usize) {
        assert_eq!(self.row_len, source.row_len, "feature row length mismatch");
        self.row_mut(to).copy_from_slice(source.row(from));
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Encodes the live ships of a simulation into feature rows.
pub trait FeatureExtractor {
    /// Width of every row produced by [`FeatureExtractor::extract`].
    fn row_len(&self) -> usize;

    /// Writes one row per live ship, ascending by id, into `out`. `out` has
    /// exactly as many rows as there are live ships.
    fn extract(&self, simulation: &GridSimulation, out: &mut FeatureBatch);
}

/// Ship-centred view of the board.
///
/// Each row holds three `size x size` planes shifted so that the ship sits at
/// the centre cell: halite normalised by the cell cap, shipyards, and other
/// ships. Two scalars follow: the fraction of the episode left and the ship's
/// cargo normalised by the cell cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipFeatures {
    size: usize,
}

impl ShipFeatures {
    pub const PLANES: usize = 3;
    pub const SCALARS: usize = 2;

    pub fn new(size: usize) -> Self {
        ShipFeatures { size }
    }

    /// Cell of the plane that `position` lands on when `centre` is moved to
    /// the middle of the board.
    fn shifted_index(&self, position: Position, centre: Position) -> usize {
        let half = self.size / 2;
        let x = (position.x + half + self.size - centre.x) % self.size;
        let y = (position.y + half + self.size - centre.y) % self.size;
        y * self.size + x
    }
}

impl FeatureExtractor for ShipFeatures {
    fn row_len(&self) -> usize {
        Self::PLANES * self.size * self.size + Self::SCALARS
    }

    fn extract(&self, simulation: &GridSimulation, out: &mut FeatureBatch) {
        assert_eq!(out.row_len(), self.row_len(), "feature row length mismatch");
        assert_eq!(
            out.rows(),
            simulation.ship_count(),
            "feature rows must match live ship count"
        );
        assert_eq!(
            simulation.halite().width(),
            self.size,
            "extractor size does not match board size"
        );

        let config = simulation.config();
        let cap = config.max_cell_halite;
        let plane = self.size * self.size;
        let remaining = config.episode_steps.saturating_sub(simulation.step_count()) as f32
            / config.episode_steps as f32;

        out.fill(0.0);
        for (row, ship) in simulation.ships().enumerate() {
            let features = out.row_mut(row);
            for (position, &halite) in simulation.halite().enumerate() {
                let cell = self.shifted_index(position, ship.position);
                features[cell] = halite / cap;
            }
            for shipyard in simulation.shipyards() {
                features[plane + self.shifted_index(shipyard.position, ship.position)] = 1.0;
            }
            for other in simulation.ships().filter(|other| other.id != ship.id) {
                features[2 * plane + self.shifted_index(other.position, ship.position)] = 1.0;
            }
            features[3 * plane] = remaining;
            features[3 * plane + 1] = ship.cargo / cap;
        }
    }
}

/// Live ship ids of one tick together with their feature rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub step: usize,
    /// Strictly ascending.
    pub ids: Vec<EntityId>,
    /// Row `i` belongs to `ids[i]`.
    pub features: FeatureBatch,
}

impl Snapshot {
    /// # Panics
    ///
    /// Panics if the number of feature rows differs from the number of ids.
    pub fn new(step: usize, ids: Vec<EntityId>, features: FeatureBatch) -> Self {
        assert_eq!(
            features.rows(),
            ids.len(),
            "snapshot rows must match id count"
        );
        debug_assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids must ascend");
        Snapshot {
            step,
            ids,
            features,
        }
    }

    /// Encodes the current live ships of `simulation`.
    pub fn capture(simulation: &GridSimulation, extractor: &impl FeatureExtractor) -> Self {
        let ids = simulation.ship_ids();
        let mut features = FeatureBatch::zeros(ids.len(), extractor.row_len());
        extractor.extract(simulation, &mut features);
        Snapshot::new(simulation.step_count(), ids, features)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
