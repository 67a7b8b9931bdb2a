use rand::{Rng, SeedableRng, distr::Bernoulli, rngs::StdRng};
use rand_distr::{Distribution, Gumbel};
use tracing::debug;

use crate::{
    Position,
    config::BoardConfig,
    error::GenerationError,
    map::Grid,
    simulation::GridSimulation,
};

/// Scale of the noise added to every cell of the seed quadrant.
const QUADRANT_NOISE_SCALE: f32 = 300.0;
/// Scale of the extra noise concentrated in the quadrant's inner corner.
const CORNER_NOISE_SCALE: f32 = 500.0;

/// Produces random starting boards whose halite field is mirror-symmetric
/// about both axes. The same seed always yields the same sequence of boards.
#[derive(Debug, Clone)]
pub struct BoardGenerator {
    config: BoardConfig,
    rng: StdRng,
    quadrant_noise: Gumbel<f32>,
    corner_noise: Gumbel<f32>,
    mask: Bernoulli,
}

impl BoardGenerator {
    pub fn new(config: BoardConfig, seed: u64) -> Result<Self, GenerationError> {
        let quadrant_noise =
            Gumbel::new(0.0, QUADRANT_NOISE_SCALE).map_err(|e| GenerationError::Distribution {
                name: "gumbel",
                reason: e.to_string(),
            })?;
        let corner_noise =
            Gumbel::new(0.0, CORNER_NOISE_SCALE).map_err(|e| GenerationError::Distribution {
                name: "gumbel",
                reason: e.to_string(),
            })?;
        let mask = Bernoulli::new(0.5).map_err(|e| GenerationError::Distribution {
            name: "bernoulli",
            reason: e.to_string(),
        })?;
        Ok(BoardGenerator {
            config,
            rng: StdRng::seed_from_u64(seed),
            quadrant_noise,
            corner_noise,
            mask,
        })
    }

    /// Generates a fresh board with a single ship at its centre.
    pub fn next_board(&mut self) -> Result<GridSimulation, GenerationError> {
        let size = self.config.size;
        let quadrant = self.quadrant();

        let mut simulation = GridSimulation::new(self.config.clone());
        *simulation.halite_mut() = mirror(&quadrant, size);

        simulation.add_ship(Position::new(size / 2, size / 2))?;
        debug!(
            size,
            total = simulation.halite().iter().sum::<f32>(),
            "generated board"
        );
        Ok(simulation)
    }

    /// Builds the top-left `half x half` quadrant, normalised so that the
    /// mirrored board holds roughly `starting_halite` in total.
    fn quadrant(&mut self) -> Grid<f32> {
        let half = self.config.size / 2 + 1;
        let fourth = half / 4;
        let mut quadrant: Grid<f32> = Grid::new(half, half);

        for i in 0..half {
            let value = (i * i) as f32;
            let x = self.rng.random_range(0..half - 1);
            let y = self.rng.random_range(0..half - 1);
            quadrant[Position::new(x, y)] = value;
            let x = self.rng.random_range(half / 2..half);
            let y = self.rng.random_range(half / 2..half);
            quadrant[Position::new(x, y)] = value;
        }

        for cell in quadrant.iter_mut() {
            let noise = self.quadrant_noise.sample(&mut self.rng).max(0.0);
            if self.mask.sample(&mut self.rng) {
                *cell += noise;
            }
        }

        for y in half - fourth..half {
            for x in half - fourth..half {
                quadrant[Position::new(x, y)] += self.corner_noise.sample(&mut self.rng).max(0.0);
            }
        }

        let sum: f32 = quadrant.iter().sum();
        if sum > 0.0 {
            let multiplier = self.config.starting_halite / sum / 4.0;
            for cell in quadrant.iter_mut() {
                *cell *= multiplier;
            }
        }
        quadrant
    }
}

/// Copies the quadrant into all four corners of a `size x size` board.
fn mirror(quadrant: &Grid<f32>, size: usize) -> Grid<f32> {
    let mut board = Grid::new(size, size);
    for (position, &value) in quadrant.enumerate() {
        let (x, y) = (position.x, position.y);
        let (mx, my) = (size - x - 1, size - y - 1);
        for (bx, by) in [(x, y), (mx, y), (x, my), (mx, my)] {
            board[Position::new(bx, by)] = value;
        }
    }
    board
}
