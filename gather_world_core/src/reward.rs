use std::collections::BTreeMap;

use tracing::trace;

use crate::{
    EntityId,
    config::{BoardConfig, RewardConfig, RewardTerm},
    simulation::{GridSimulation, Ship, ShipAction},
};

/// Shaped reward of every ship that acted during a tick, keyed by ship id.
pub type RewardMap = BTreeMap<EntityId, f32>;

/// Per-tick weight curve of one reward term together with its clip range.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    weights: Vec<f32>,
    min_clip: f32,
    max_clip: f32,
}

impl Schedule {
    /// `beta * exp(-t / (time_beta * T))`: starts at `beta` and fades out.
    pub fn decaying(term: &RewardTerm, episode_steps: usize) -> Self {
        Self::build(term, episode_steps, |decay| term.beta * decay)
    }

    /// `beta * (1 - exp(-t / (time_beta * T)))`: starts at zero and rises
    /// towards `beta`.
    pub fn rising(term: &RewardTerm, episode_steps: usize) -> Self {
        Self::build(term, episode_steps, |decay| term.beta * (1.0 - decay))
    }

    fn build(term: &RewardTerm, episode_steps: usize, shape: impl Fn(f32) -> f32) -> Self {
        let horizon = term.time_beta * episode_steps as f32;
        let weights = (0..episode_steps.max(1))
            .map(|t| shape((-(t as f32) / horizon).exp()))
            .collect();
        Schedule {
            weights,
            min_clip: term.min_clip,
            max_clip: term.max_clip,
        }
    }

    /// Weight at tick `step`. Ticks past the end of the episode reuse the
    /// last weight.
    pub fn weight(&self, step: usize) -> f32 {
        let last = self.weights.len() - 1;
        self.weights[step.min(last)]
    }

    pub fn clip(&self, value: f32) -> f32 {
        value.clamp(self.min_clip, self.max_clip)
    }
}

/// Turns the per-tick deltas of each ship into a scalar reward.
#[derive(Debug, Clone)]
pub struct RewardShaper {
    collect_rate: f32,
    mine: Schedule,
    deposit: Schedule,
    distance: Schedule,
    discovery: Schedule,
}

impl RewardShaper {
    pub fn new(reward: &RewardConfig, board: &BoardConfig) -> Self {
        let steps = board.episode_steps;
        RewardShaper {
            collect_rate: board.collect_rate,
            mine: Schedule::decaying(&reward.mine, steps),
            deposit: Schedule::rising(&reward.deposit, steps),
            distance: Schedule::rising(&reward.distance, steps),
            discovery: Schedule::decaying(&reward.discovery, steps),
        }
    }

    /// Rewards for every ship in the simulation's last outcome, evaluated at
    /// the simulation's current step.
    pub fn compute_rewards(&self, simulation: &GridSimulation) -> RewardMap {
        let step = simulation.step_count();
        let max_cell = simulation.max_cell_halite();
        let rewards: RewardMap = simulation
            .last_outcome()
            .retained
            .iter()
            .map(|ship| {
                let local = simulation.halite_at(ship.position);
                (ship.id, self.ship_reward(ship, step, max_cell, local))
            })
            .collect();
        trace!(step, ?rewards, "computed rewards");
        rewards
    }

    /// Sum of the four reward terms for one ship. `local` is the halite left
    /// on the ship's cell.
    pub fn ship_reward(&self, ship: &Ship, step: usize, max_cell: f32, local: f32) -> f32 {
        let (mine, deposit, discovery) = if max_cell > 0.0 {
            let mineable = max_cell * self.collect_rate;
            let explored = if ship.action != ShipAction::None { 1.0 } else { 0.0 };
            (
                self.mine
                    .clip(self.mine.weight(step) * ship.delta_cargo / mineable),
                self.deposit
                    .clip(self.deposit.weight(step) * ship.delta_value / max_cell),
                self.discovery
                    .clip(explored * self.discovery.weight(step) * local / max_cell),
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let distance = if ship.cargo > 0.0 && ship.moved_closer {
            self.distance.weight(step)
        } else {
            0.0
        };

        mine + deposit + distance + discovery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    fn term(beta: f32, time_beta: f32, max_clip: f32) -> RewardTerm {
        RewardTerm {
            beta,
            time_beta,
            min_clip: 0.0,
            max_clip,
        }
    }

    fn ship() -> Ship {
        Ship {
            id: 3,
            position: Position::new(0, 0),
            cargo: 0.0,
            delta_cargo: 0.0,
            delta_value: 0.0,
            moved_closer: false,
            action: ShipAction::None,
        }
    }

    fn shaper(reward: RewardConfig) -> RewardShaper {
        RewardShaper::new(&reward, &BoardConfig::default())
    }

    #[test]
    fn test_schedule_shapes() {
        let t = term(2.0, 0.5, 5.0);
        let decaying = Schedule::decaying(&t, 100);
        let rising = Schedule::rising(&t, 100);
        assert_eq!(decaying.weight(0), 2.0);
        assert_eq!(rising.weight(0), 0.0);
        // One time constant in: exp(-1).
        assert!((decaying.weight(50) - 2.0 * (-1.0f32).exp()).abs() < 1e-5);
        assert!((rising.weight(50) - 2.0 * (1.0 - (-1.0f32).exp())).abs() < 1e-5);
        assert!(decaying.weight(99) < decaying.weight(98));
        assert_eq!(decaying.weight(1000), decaying.weight(99));
    }

    #[test]
    fn test_mine_reward_is_normalised_and_clipped() {
        let shaper = shaper(RewardConfig::default());
        let mut s = ship();
        s.delta_cargo = 25.0;
        // 2.0 * 25 / (100 * 0.25) = 2.0
        assert!((shaper.ship_reward(&s, 0, 100.0, 0.0) - 2.0).abs() < 1e-6);

        s.delta_cargo = 1000.0;
        assert_eq!(shaper.ship_reward(&s, 0, 100.0, 0.0), 5.0);
    }

    #[test]
    fn test_deposit_reward_is_normalised_and_clipped() {
        let mut reward = RewardConfig::default();
        reward.mine.beta = 0.0;
        reward.deposit = term(3.0, 0.5, 1.0);
        let shaper = shaper(reward);
        let mut s = ship();
        s.delta_value = 106.383;

        // 3 * (1 - exp(-202 / (0.5 * 361))) * 106.383 / 500
        let expected = 3.0 * (1.0 - (-202.0f32 / 180.5).exp()) * 106.383 / 500.0;
        let got = shaper.ship_reward(&s, 202, 500.0, 0.0);
        assert!((got - expected).abs() < 1e-5, "{got} != {expected}");
        assert!((got - 0.4298).abs() < 1e-3);

        s.delta_value = 1000.0;
        assert_eq!(shaper.ship_reward(&s, 360, 500.0, 0.0), 1.0);
        assert_eq!(shaper.ship_reward(&s, 0, 500.0, 0.0), 0.0);
    }

    #[test]
    fn test_distance_reward_needs_cargo() {
        let mut reward = RewardConfig::default();
        reward.mine.beta = 0.0;
        reward.distance = term(1.0, 0.5, 1.0);
        let shaper = shaper(reward);
        let step = 100;
        let expected = shaper.distance.weight(step);
        assert!(expected > 0.0);

        let mut s = ship();
        s.action = ShipAction::MoveEast;
        s.moved_closer = true;
        assert_eq!(shaper.ship_reward(&s, step, 100.0, 0.0), 0.0);

        s.cargo = 10.0;
        assert_eq!(shaper.ship_reward(&s, step, 100.0, 0.0), expected);
    }

    #[test]
    fn test_discovery_only_for_non_idle_actions() {
        let mut reward = RewardConfig::default();
        reward.mine.beta = 0.0;
        reward.discovery = term(1.0, 0.25, 0.25);
        let shaper = shaper(reward);

        let mut s = ship();
        assert_eq!(shaper.ship_reward(&s, 0, 100.0, 50.0), 0.0);
        s.action = ShipAction::MoveNorth;
        // min(1.0 * 50 / 100, 0.25)
        assert_eq!(shaper.ship_reward(&s, 0, 100.0, 50.0), 0.25);
    }

    #[test]
    fn test_empty_board_contributes_zero() {
        let shaper = shaper(RewardConfig::default());
        let mut s = ship();
        s.delta_cargo = 10.0;
        s.delta_value = 10.0;
        assert_eq!(shaper.ship_reward(&s, 0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_compute_rewards_covers_retained_ships() {
        let board = BoardConfig {
            size: 3,
            ..BoardConfig::default()
        };
        let mut sim = GridSimulation::from_layout(
            board.clone(),
            "S100 S0 0
             0 0 0
             0 0 0",
        )
        .unwrap();
        sim.set_actions(&[ShipAction::None, ShipAction::MoveWest], &[]);
        sim.step();

        let shaper = RewardShaper::new(&RewardConfig::default(), &board);
        let rewards = shaper.compute_rewards(&sim);
        assert_eq!(rewards.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert!(rewards[&0] > 0.0);
        assert_eq!(rewards[&1], 0.0);
    }
}
