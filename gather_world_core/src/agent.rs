use std::collections::VecDeque;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Direction, Position,
    simulation::{GridSimulation, ShipAction, ShipyardAction},
};

/// One tick's worth of orders: an action per live ship and per shipyard,
/// both in ascending-id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionPlan {
    pub ships: Vec<ShipAction>,
    pub shipyards: Vec<ShipyardAction>,
}

impl ActionPlan {
    /// Every ship collects and no shipyard spawns.
    pub fn idle(simulation: &GridSimulation) -> Self {
        ActionPlan {
            ships: vec![ShipAction::None; simulation.ship_count()],
            shipyards: vec![ShipyardAction::None; simulation.shipyard_count()],
        }
    }
}

/// Trait defining how actions are chosen for the entities on a board.
pub trait ActionSource {
    /// Returns one action per live ship and shipyard of `simulation`.
    /// `&mut self` lets the source keep internal state (an RNG, a script).
    fn choose(&mut self, simulation: &GridSimulation) -> ActionPlan;
}

impl<T: ActionSource + ?Sized> ActionSource for Box<T> {
    fn choose(&mut self, simulation: &GridSimulation) -> ActionPlan {
        (**self).choose(simulation)
    }
}

/// Picks uniformly among collecting and the four moves. Converting and
/// spawning happen with small fixed probabilities.
#[derive(Debug)]
pub struct RandomActions {
    rng: StdRng,
    convert_probability: f64,
    spawn_probability: f64,
}

impl RandomActions {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            convert_probability: 0.01,
            spawn_probability: 0.1,
        }
    }

    pub fn with_probabilities(mut self, convert: f64, spawn: f64) -> Self {
        self.convert_probability = convert;
        self.spawn_probability = spawn;
        self
    }
}

impl ActionSource for RandomActions {
    fn choose(&mut self, simulation: &GridSimulation) -> ActionPlan {
        let config = simulation.config();
        let can_convert = simulation.player_halite() >= config.convert_cost;
        let ships = (0..simulation.ship_count())
            .map(|_| {
                if can_convert && self.rng.random_bool(self.convert_probability) {
                    ShipAction::Convert
                } else {
                    ShipAction::ALL[self.rng.random_range(0..5)]
                }
            })
            .collect();

        let can_spawn = simulation.player_halite() >= config.spawn_cost;
        let shipyards = (0..simulation.shipyard_count())
            .map(|_| {
                if can_spawn && self.rng.random_bool(self.spawn_probability) {
                    ShipyardAction::Spawn
                } else {
                    ShipyardAction::None
                }
            })
            .collect();

        ActionPlan { ships, shipyards }
    }
}

/// Replays a fixed list of plans, then idles.
#[derive(Debug, Default)]
pub struct ScriptedActions {
    plans: VecDeque<ActionPlan>,
}

impl ScriptedActions {
    pub fn new(plans: impl IntoIterator<Item = ActionPlan>) -> Self {
        Self {
            plans: plans.into_iter().collect(),
        }
    }

    /// Script for a single ship with no shipyards.
    pub fn single_ship(actions: impl IntoIterator<Item = ShipAction>) -> Self {
        Self::new(actions.into_iter().map(|action| ActionPlan {
            ships: vec![action],
            shipyards: Vec::new(),
        }))
    }

    pub fn remaining(&self) -> usize {
        self.plans.len()
    }
}

impl ActionSource for ScriptedActions {
    fn choose(&mut self, simulation: &GridSimulation) -> ActionPlan {
        self.plans
            .pop_front()
            .unwrap_or_else(|| ActionPlan::idle(simulation))
    }
}

/// A planning source: ships mine until their cargo reaches a threshold, then
/// head back to the nearest shipyard. While mining, a ship moves to the
/// richest neighbouring cell if it holds noticeably more halite than its
/// own. Shipyards spawn while the fleet is below a target size.
#[derive(Debug, Clone)]
pub struct HarvestPlanner {
    return_cargo: f32,
    target_fleet: usize,
}

impl HarvestPlanner {
    pub fn new(return_cargo: f32, target_fleet: usize) -> Self {
        Self {
            return_cargo,
            target_fleet,
        }
    }

    /// Move that brings `from` closest to any shipyard, if one exists.
    fn homeward(simulation: &GridSimulation, from: Position) -> Option<ShipAction> {
        let current = simulation.nearest_shipyard_distance(from)?;
        let grid = simulation.halite();
        MOVES
            .iter()
            .filter_map(|&(direction, action)| {
                let next = grid.step(from, direction);
                let distance = simulation.nearest_shipyard_distance(next)?;
                (distance < current).then_some((distance, action))
            })
            .min_by_key(|&(distance, _)| distance)
            .map(|(_, action)| action)
    }

    fn richest_neighbour(simulation: &GridSimulation, from: Position) -> ShipAction {
        let grid = simulation.halite();
        let here = grid[from];
        MOVES
            .iter()
            .map(|&(direction, action)| (grid[grid.step(from, direction)], action))
            .filter(|&(halite, _)| halite > 2.0 * here)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map_or(ShipAction::None, |(_, action)| action)
    }
}

const MOVES: [(Direction, ShipAction); 4] = [
    (Direction::North, ShipAction::MoveNorth),
    (Direction::East, ShipAction::MoveEast),
    (Direction::South, ShipAction::MoveSouth),
    (Direction::West, ShipAction::MoveWest),
];

impl Default for HarvestPlanner {
    fn default() -> Self {
        Self::new(200.0, 4)
    }
}

impl ActionSource for HarvestPlanner {
    fn choose(&mut self, simulation: &GridSimulation) -> ActionPlan {
        let ships = simulation
            .ships()
            .map(|ship| {
                if ship.cargo >= self.return_cargo {
                    if let Some(action) = Self::homeward(simulation, ship.position) {
                        return action;
                    }
                }
                Self::richest_neighbour(simulation, ship.position)
            })
            .collect();

        let mut budget = simulation.player_halite();
        let mut fleet = simulation.ship_count();
        let spawn_cost = simulation.config().spawn_cost;
        let shipyards = simulation
            .shipyards()
            .map(|shipyard| {
                let free = simulation.ship_at(shipyard.position).is_none();
                if free && fleet < self.target_fleet && budget >= spawn_cost {
                    budget -= spawn_cost;
                    fleet += 1;
                    ShipyardAction::Spawn
                } else {
                    ShipyardAction::None
                }
            })
            .collect();

        ActionPlan { ships, shipyards }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardConfig;

    fn board(size: usize, layout: &str) -> GridSimulation {
        let config = BoardConfig {
            size,
            ..BoardConfig::default()
        };
        GridSimulation::from_layout(config, layout).unwrap()
    }

    #[test]
    fn test_random_plan_matches_entity_counts() {
        let sim = board(
            4,
            "S0 0 0 0
             0 S0 0 0
             0 0 Y0 0
             0 0 0 S0",
        );
        let mut source = RandomActions::new(1);
        for _ in 0..20 {
            let plan = source.choose(&sim);
            assert_eq!(plan.ships.len(), 3);
            assert_eq!(plan.shipyards.len(), 1);
        }
    }

    #[test]
    fn test_random_respects_budget() {
        let layout = "S0 S0 0\n0 Y0 0\n0 0 0";
        let mut source = RandomActions::new(3).with_probabilities(1.0, 1.0);

        let rich = board(3, layout);
        let plan = source.choose(&rich);
        assert!(plan.ships.iter().all(|a| *a == ShipAction::Convert));
        assert_eq!(plan.shipyards, vec![ShipyardAction::Spawn]);

        let config = BoardConfig {
            size: 3,
            starting_halite: 100.0,
            ..BoardConfig::default()
        };
        let broke = GridSimulation::from_layout(config, layout).unwrap();
        for _ in 0..20 {
            let plan = source.choose(&broke);
            assert!(plan.ships.iter().all(|a| *a != ShipAction::Convert));
            assert_eq!(plan.shipyards, vec![ShipyardAction::None]);
        }
    }

    #[test]
    fn test_scripted_then_idle() {
        let sim = board(2, "S0 0\n0 0");
        let mut source = ScriptedActions::single_ship([ShipAction::MoveEast]);
        assert_eq!(source.choose(&sim).ships, vec![ShipAction::MoveEast]);
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.choose(&sim), ActionPlan::idle(&sim));
    }

    #[test]
    fn test_planner_returns_home_with_full_cargo() {
        let mut sim = board(
            5,
            "0 0 0 0 0
             0 0 0 0 0
             Y0 0 S400 0 0
             0 0 0 0 0
             0 0 0 0 0",
        );
        let mut planner = HarvestPlanner::new(50.0, 1);
        let plan = planner.choose(&sim);
        // Empty hold on a rich cell: keep mining.
        assert_eq!(plan.ships, vec![ShipAction::None]);

        sim.set_actions(&[ShipAction::None], &[ShipyardAction::None]);
        sim.step();
        let plan = planner.choose(&sim);
        assert_eq!(plan.ships, vec![ShipAction::MoveWest]);
        assert_eq!(plan.shipyards, vec![ShipyardAction::None]);
    }

    #[test]
    fn test_planner_moves_to_richer_cell_and_spawns() {
        let sim = board(
            3,
            "0 0 0
             0 S10 300
             Y0 0 0",
        );
        let mut planner = HarvestPlanner::new(500.0, 2);
        let plan = planner.choose(&sim);
        assert_eq!(plan.ships, vec![ShipAction::MoveEast]);
        assert_eq!(plan.shipyards, vec![ShipyardAction::Spawn]);
    }
}
