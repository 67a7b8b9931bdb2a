use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Direction, EntityId, Position,
    config::BoardConfig,
    error::{GridError, LayoutError},
    map::Grid,
};

/// Actions a ship can be ordered to take. The discriminants are the action
/// indices used by models and replay storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShipAction {
    /// Stay in place and collect halite from the current cell.
    #[default]
    None = 0,
    MoveNorth = 1,
    MoveEast = 2,
    MoveSouth = 3,
    MoveWest = 4,
    /// Turn the ship into a shipyard on its current cell.
    Convert = 5,
}

impl ShipAction {
    pub const COUNT: usize = 6;

    pub const ALL: [ShipAction; Self::COUNT] = [
        ShipAction::None,
        ShipAction::MoveNorth,
        ShipAction::MoveEast,
        ShipAction::MoveSouth,
        ShipAction::MoveWest,
        ShipAction::Convert,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn direction(self) -> Option<Direction> {
        match self {
            ShipAction::MoveNorth => Some(Direction::North),
            ShipAction::MoveEast => Some(Direction::East),
            ShipAction::MoveSouth => Some(Direction::South),
            ShipAction::MoveWest => Some(Direction::West),
            ShipAction::None | ShipAction::Convert => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShipyardAction {
    #[default]
    None = 0,
    /// Build a new ship on the shipyard's cell.
    Spawn = 1,
}

impl ShipyardAction {
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A mobile agent that collects halite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: EntityId,
    pub position: Position,
    pub cargo: f32,
    /// Halite collected during the last tick.
    pub delta_cargo: f32,
    /// Halite deposited into a shipyard during the last tick.
    pub delta_value: f32,
    /// Whether the last move reduced the distance to the nearest shipyard.
    pub moved_closer: bool,
    /// The pending action, or the action taken during the last tick once
    /// [`GridSimulation::step`] has run.
    pub action: ShipAction,
}

impl Ship {
    fn spawned(id: EntityId, position: Position) -> Self {
        Ship {
            id,
            position,
            cargo: 0.0,
            delta_cargo: 0.0,
            delta_value: 0.0,
            moved_closer: false,
            action: ShipAction::None,
        }
    }
}

/// A stationary entity that spawns ships and receives deposits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipyard {
    pub id: EntityId,
    pub position: Position,
    pub action: ShipyardAction,
}

/// What happened to the ships during one call to [`GridSimulation::step`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Step counter after the tick completed.
    pub step: usize,
    /// Every ship that acted this tick, ascending by id, as it stood at the end
    /// of its action. Ships that converted or collided are included: their
    /// last tick is still scored.
    pub retained: Vec<Ship>,
    pub converted: Vec<EntityId>,
    pub collided: Vec<EntityId>,
    pub spawned: Vec<EntityId>,
}

/// Deterministic halite-gathering world on a toroidal board.
#[derive(Debug, Clone)]
pub struct GridSimulation {
    config: BoardConfig,
    step: usize,
    player_halite: f32,
    next_ship_id: EntityId,
    next_shipyard_id: EntityId,
    halite: Grid<f32>,
    ship_locations: Grid<Option<EntityId>>,
    shipyard_locations: Grid<Option<EntityId>>,
    ships: BTreeMap<EntityId, Ship>,
    shipyards: BTreeMap<EntityId, Shipyard>,
    last_outcome: StepOutcome,
}

impl GridSimulation {
    /// Creates an empty board: no halite, no ships, no shipyards.
    pub fn new(config: BoardConfig) -> Self {
        let size = config.size;
        GridSimulation {
            player_halite: config.starting_halite,
            config,
            step: 0,
            next_ship_id: 0,
            next_shipyard_id: 0,
            halite: Grid::new(size, size),
            ship_locations: Grid::new(size, size),
            shipyard_locations: Grid::new(size, size),
            ships: BTreeMap::new(),
            shipyards: BTreeMap::new(),
            last_outcome: StepOutcome::default(),
        }
    }

    /// Builds a board from a text layout; see [`load_board_from_string`].
    pub fn from_layout(config: BoardConfig, layout: &str) -> Result<Self, LayoutError> {
        load_board_from_string(config, layout)
    }

    /// Places a new ship, assigning it the next ship id.
    pub fn add_ship(&mut self, position: Position) -> Result<EntityId, GridError> {
        self.check_free(position)?;
        let id = self.next_ship_id;
        self.next_ship_id += 1;
        self.ship_locations[position] = Some(id);
        self.ships.insert(id, Ship::spawned(id, position));
        Ok(id)
    }

    /// Places a new shipyard, clearing the halite beneath it.
    pub fn add_shipyard(&mut self, position: Position) -> Result<EntityId, GridError> {
        if !self.halite.contains(position) {
            return Err(out_of_bounds(position, self.config.size));
        }
        if self.shipyard_locations[position].is_some() {
            return Err(GridError::Occupied {
                x: position.x,
                y: position.y,
            });
        }
        Ok(self.create_shipyard(position))
    }

    fn check_free(&self, position: Position) -> Result<(), GridError> {
        match self.ship_locations.get(position) {
            None => Err(out_of_bounds(position, self.config.size)),
            Some(Some(_)) => Err(GridError::Occupied {
                x: position.x,
                y: position.y,
            }),
            Some(None) => Ok(()),
        }
    }

    fn create_shipyard(&mut self, position: Position) -> EntityId {
        let id = self.next_shipyard_id;
        self.next_shipyard_id += 1;
        self.shipyard_locations[position] = Some(id);
        self.halite[position] = 0.0;
        self.shipyards.insert(
            id,
            Shipyard {
                id,
                position,
                action: ShipyardAction::None,
            },
        );
        id
    }

    /// Assigns one action per live ship and per shipyard, in ascending-id order.
    ///
    /// # Panics
    ///
    /// Panics if the number of actions differs from the number of live
    /// entities: the action source has lost sync with the board.
    pub fn set_actions(
        &mut self,
        ship_actions: &[ShipAction],
        shipyard_actions: &[ShipyardAction],
    ) {
        assert_eq!(
            ship_actions.len(),
            self.ships.len(),
            "ship action count does not match live ship count"
        );
        assert_eq!(
            shipyard_actions.len(),
            self.shipyards.len(),
            "shipyard action count does not match shipyard count"
        );
        for (ship, action) in self.ships.values_mut().zip(ship_actions) {
            ship.action = *action;
        }
        for (shipyard, action) in self.shipyards.values_mut().zip(shipyard_actions) {
            shipyard.action = *action;
        }
    }

    /// Advances the world by one tick.
    pub fn step(&mut self) {
        let mut outcome = StepOutcome::default();

        for ship in self.ships.values_mut() {
            ship.delta_cargo = 0.0;
            ship.delta_value = 0.0;
            ship.moved_closer = false;
            let origin = ship.position;
            let mut collided = false;

            match (ship.action, ship.action.direction()) {
                (_, Some(direction)) => {
                    let target = self.halite.step(origin, direction);
                    ship.moved_closer = is_closer(&self.halite, &self.shipyards, origin, target);
                    ship.position = target;
                    vacate(&mut self.ship_locations, origin, ship.id);
                    match self.ship_locations[target] {
                        Some(occupant) if occupant != ship.id => {
                            debug!(ship = ship.id, occupant, x = target.x, y = target.y, "ship collided");
                            collided = true;
                            outcome.collided.push(ship.id);
                        }
                        _ => self.ship_locations[target] = Some(ship.id),
                    }
                }
                (ShipAction::Convert, None) => {
                    self.player_halite -= self.config.convert_cost;
                    vacate(&mut self.ship_locations, origin, ship.id);
                    let id = self.next_shipyard_id;
                    self.next_shipyard_id += 1;
                    self.shipyard_locations[origin] = Some(id);
                    self.shipyards.insert(
                        id,
                        Shipyard {
                            id,
                            position: origin,
                            action: ShipyardAction::None,
                        },
                    );
                    debug!(ship = ship.id, shipyard = id, x = origin.x, y = origin.y, "ship converted");
                    outcome.converted.push(ship.id);
                }
                _ => {
                    let cell = &mut self.halite[origin];
                    let delta = *cell * self.config.collect_rate;
                    *cell -= delta;
                    ship.cargo += delta;
                    ship.delta_cargo = delta;
                }
            }

            if !collided && self.shipyard_locations[ship.position].is_some() {
                self.player_halite += ship.cargo;
                ship.delta_value = ship.cargo;
                ship.delta_cargo = 0.0;
                ship.cargo = 0.0;
            }

            outcome.retained.push(ship.clone());
        }

        for shipyard in self.shipyards.values_mut() {
            let position = shipyard.position;
            if shipyard.action == ShipyardAction::Spawn {
                if self.ship_locations[position].is_some() {
                    debug!(shipyard = shipyard.id, "spawn skipped, shipyard cell occupied");
                } else {
                    self.player_halite -= self.config.spawn_cost;
                    let id = self.next_ship_id;
                    self.next_ship_id += 1;
                    self.ship_locations[position] = Some(id);
                    self.ships.insert(id, Ship::spawned(id, position));
                    debug!(shipyard = shipyard.id, ship = id, "ship spawned");
                    outcome.spawned.push(id);
                }
            }
            shipyard.action = ShipyardAction::None;
        }

        for id in outcome.converted.iter().chain(&outcome.collided) {
            self.ships.remove(id);
        }

        let growth = 1.0 + self.config.regen_rate;
        let cap = self.config.max_cell_halite;
        for cell in self.halite.iter_mut() {
            *cell = (*cell * growth).min(cap);
        }
        for shipyard in self.shipyards.values() {
            self.halite[shipyard.position] = 0.0;
        }

        self.step += 1;
        outcome.step = self.step;
        self.last_outcome = outcome;
    }

    /// Opening sequence: the first ship converts into a shipyard, then that
    /// shipyard spawns a fresh ship.
    ///
    /// # Panics
    ///
    /// Panics if the board has no ships or already has shipyards.
    pub fn pregame(&mut self) {
        assert!(!self.ships.is_empty(), "pregame needs a starting ship");
        assert!(self.shipyards.is_empty(), "pregame expects no shipyards");

        let mut ship_actions = vec![ShipAction::None; self.ships.len()];
        ship_actions[0] = ShipAction::Convert;
        self.set_actions(&ship_actions, &[]);
        self.step();

        let ship_actions = vec![ShipAction::None; self.ships.len()];
        let mut shipyard_actions = vec![ShipyardAction::None; self.shipyards.len()];
        shipyard_actions[0] = ShipyardAction::Spawn;
        self.set_actions(&ship_actions, &shipyard_actions);
        self.step();
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    #[inline]
    pub fn step_count(&self) -> usize {
        self.step
    }

    /// True on the final step of an episode.
    pub fn is_terminal(&self) -> bool {
        self.step + 1 >= self.config.episode_steps
    }

    pub fn player_halite(&self) -> f32 {
        self.player_halite
    }

    pub fn halite(&self) -> &Grid<f32> {
        &self.halite
    }

    pub fn halite_mut(&mut self) -> &mut Grid<f32> {
        &mut self.halite
    }

    pub fn halite_at(&self, position: Position) -> f32 {
        self.halite[position]
    }

    /// Largest halite amount on any single cell.
    pub fn max_cell_halite(&self) -> f32 {
        self.halite.iter().copied().fold(0.0, f32::max)
    }

    /// Live ship ids in ascending order.
    pub fn ship_ids(&self) -> Vec<EntityId> {
        self.ships.keys().copied().collect()
    }

    pub fn shipyard_ids(&self) -> Vec<EntityId> {
        self.shipyards.keys().copied().collect()
    }

    /// Live ships, ascending by id.
    pub fn ships(&self) -> impl Iterator<Item = &Ship> {
        self.ships.values()
    }

    pub fn shipyards(&self) -> impl Iterator<Item = &Shipyard> {
        self.shipyards.values()
    }

    pub fn ship(&self, id: EntityId) -> Option<&Ship> {
        self.ships.get(&id)
    }

    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }

    pub fn shipyard_count(&self) -> usize {
        self.shipyards.len()
    }

    pub fn ship_at(&self, position: Position) -> Option<EntityId> {
        self.ship_locations.get(position).copied().flatten()
    }

    pub fn has_shipyard_at(&self, position: Position) -> bool {
        matches!(self.shipyard_locations.get(position), Some(Some(_)))
    }

    pub fn total_cargo(&self) -> f32 {
        self.ships.values().map(|ship| ship.cargo).sum()
    }

    /// Distance from `position` to the closest shipyard, if any exist.
    pub fn nearest_shipyard_distance(&self, position: Position) -> Option<usize> {
        nearest_distance(&self.halite, &self.shipyards, position)
    }

    pub fn last_outcome(&self) -> &StepOutcome {
        &self.last_outcome
    }
}

fn out_of_bounds(position: Position, size: usize) -> GridError {
    GridError::OutOfBounds {
        x: position.x,
        y: position.y,
        width: size,
        height: size,
    }
}

fn vacate(locations: &mut Grid<Option<EntityId>>, position: Position, id: EntityId) {
    if locations[position] == Some(id) {
        locations[position] = None;
    }
}

fn nearest_distance<T>(
    grid: &Grid<T>,
    shipyards: &BTreeMap<EntityId, Shipyard>,
    position: Position,
) -> Option<usize> {
    shipyards
        .values()
        .map(|shipyard| grid.distance(position, shipyard.position))
        .min()
}

fn is_closer<T>(
    grid: &Grid<T>,
    shipyards: &BTreeMap<EntityId, Shipyard>,
    from: Position,
    to: Position,
) -> bool {
    match (
        nearest_distance(grid, shipyards, from),
        nearest_distance(grid, shipyards, to),
    ) {
        (Some(before), Some(after)) => after < before,
        _ => false,
    }
}

/// Renders the board one row per line: `a` marks a ship, the digit is the
/// cell's halite scaled to 0-9 and `A` marks a shipyard.
impl fmt::Display for GridSimulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "step: {}, H: {:.1}, C: {:.1}",
            self.step,
            self.player_halite,
            self.total_cargo()
        )?;
        for y in 0..self.halite.height() {
            for x in 0..self.halite.width() {
                let position = Position::new(x, y);
                let ship = if self.ship_at(position).is_some() { 'a' } else { ' ' };
                let level = (9.0 * self.halite[position] / self.config.max_cell_halite) as u32;
                let yard = if self.has_shipyard_at(position) { 'A' } else { ' ' };
                write!(f, "|{ship}{}{yard}", level.min(9))?;
            }
            writeln!(f, "|")?;
        }
        Ok(())
    }
}

/// Loads a board from a text layout.
///
/// Each line is a row of whitespace-separated tokens. A token is a halite
/// amount (`.` for zero), optionally prefixed with `S` for a ship or `Y` for
/// a shipyard, e.g. `0 120 S40 Y0`. Ships and shipyards receive ids in
/// row-major order.
pub fn load_board_from_string(
    config: BoardConfig,
    layout: &str,
) -> Result<GridSimulation, LayoutError> {
    let lines: Vec<&str> = layout
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(LayoutError::Empty);
    }

    let mut rows: Vec<Vec<&str>> = Vec::with_capacity(lines.len());
    for (y, line) in lines.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let Some(first) = rows.first() {
            if tokens.len() != first.len() {
                return Err(LayoutError::RaggedRow {
                    row: y,
                    expected: first.len(),
                    found: tokens.len(),
                });
            }
        }
        rows.push(tokens);
    }

    let (width, height) = (rows[0].len(), rows.len());
    if width != config.size || height != config.size {
        return Err(LayoutError::SizeMismatch {
            expected: config.size,
            width,
            height,
        });
    }

    let mut simulation = GridSimulation::new(config);
    let mut ships = Vec::new();
    let mut shipyards = Vec::new();
    for (y, tokens) in rows.iter().enumerate() {
        for (x, token) in tokens.iter().enumerate() {
            let position = Position::new(x, y);
            let amount = match token.chars().next() {
                Some('S') => {
                    ships.push(position);
                    &token[1..]
                }
                Some('Y') => {
                    shipyards.push(position);
                    &token[1..]
                }
                _ => token,
            };
            let halite = match amount {
                "" | "." => 0.0,
                digits => digits.parse::<f32>().map_err(|_| LayoutError::UnknownToken {
                    token: token.to_string(),
                    x,
                    y,
                })?,
            };
            simulation.halite.set(position, halite)?;
        }
    }

    for position in ships {
        simulation.add_ship(position)?;
    }
    for position in shipyards {
        simulation.add_shipyard(position)?;
    }
    Ok(simulation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize) -> BoardConfig {
        BoardConfig {
            size,
            ..BoardConfig::default()
        }
    }

    #[test]
    fn test_collect_withdraws_fraction() {
        let mut sim = load_board_from_string(
            config(3),
            "0 0 0
             0 S100 0
             0 0 0",
        )
        .unwrap();
        sim.set_actions(&[ShipAction::None], &[]);
        sim.step();

        let ship = sim.ship(0).unwrap();
        assert_eq!(ship.delta_cargo, 25.0);
        assert_eq!(ship.cargo, 25.0);
        assert!((sim.halite_at(Position::new(1, 1)) - 75.0 * 1.02).abs() < 1e-4);
        assert_eq!(sim.step_count(), 1);
    }

    #[test]
    fn test_move_wraps_and_updates_occupancy() {
        let mut sim = load_board_from_string(
            config(3),
            "S0 0 0
             0 0 0
             0 0 0",
        )
        .unwrap();
        sim.set_actions(&[ShipAction::MoveNorth], &[]);
        sim.step();
        assert_eq!(sim.ship(0).unwrap().position, Position::new(0, 2));
        assert_eq!(sim.ship_at(Position::new(0, 2)), Some(0));
        assert_eq!(sim.ship_at(Position::new(0, 0)), None);
    }

    #[test]
    fn test_moved_closer_requires_shorter_distance() {
        let mut sim = load_board_from_string(
            config(5),
            "0 0 0 0 0
             0 0 0 0 0
             Y0 0 0 S0 0
             0 0 0 0 0
             0 0 0 0 0",
        )
        .unwrap();
        sim.set_actions(&[ShipAction::MoveEast], &[ShipyardAction::None]);
        sim.step();
        // (3,2) -> (4,2): distance 2 -> 1 going round the edge.
        assert!(sim.ship(0).unwrap().moved_closer);

        sim.set_actions(&[ShipAction::MoveNorth], &[ShipyardAction::None]);
        sim.step();
        assert!(!sim.ship(0).unwrap().moved_closer);
    }

    #[test]
    fn test_convert_creates_shipyard_and_debits() {
        let mut sim = load_board_from_string(
            config(3),
            "0 0 0
             0 S80 0
             0 0 0",
        )
        .unwrap();
        let before = sim.player_halite();
        sim.set_actions(&[ShipAction::Convert], &[]);
        sim.step();

        assert_eq!(sim.ship_count(), 0);
        assert_eq!(sim.shipyard_count(), 1);
        assert!(sim.has_shipyard_at(Position::new(1, 1)));
        assert_eq!(sim.halite_at(Position::new(1, 1)), 0.0);
        assert_eq!(sim.player_halite(), before - 500.0);
        assert_eq!(sim.last_outcome().converted, vec![0]);
        assert_eq!(sim.last_outcome().retained.len(), 1);
    }

    #[test]
    fn test_deposit_credits_cargo() {
        let mut sim = load_board_from_string(
            config(3),
            "0 0 0
             0 S100 Y0
             0 0 0",
        )
        .unwrap();
        sim.set_actions(&[ShipAction::None], &[ShipyardAction::None]);
        sim.step();
        let before = sim.player_halite();

        sim.set_actions(&[ShipAction::MoveEast], &[ShipyardAction::None]);
        sim.step();
        let ship = sim.ship(0).unwrap();
        assert_eq!(ship.cargo, 0.0);
        assert_eq!(ship.delta_value, 25.0);
        assert!(ship.moved_closer);
        assert_eq!(sim.player_halite(), before + 25.0);
    }

    #[test]
    fn test_collision_removes_mover_only() {
        let mut sim = load_board_from_string(
            config(3),
            "S0 S0 0
             0 0 0
             0 0 0",
        )
        .unwrap();
        sim.set_actions(&[ShipAction::None, ShipAction::MoveWest], &[]);
        sim.step();

        assert_eq!(sim.ship_ids(), vec![0]);
        assert_eq!(sim.ship_at(Position::new(0, 0)), Some(0));
        assert_eq!(sim.ship_at(Position::new(1, 0)), None);
        let outcome = sim.last_outcome();
        assert_eq!(outcome.collided, vec![1]);
        assert_eq!(
            outcome.retained.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_ship_leaving_frees_cell_for_later_mover() {
        let mut sim = load_board_from_string(
            config(4),
            "S0 S0 0 0
             0 0 0 0
             0 0 0 0
             0 0 0 0",
        )
        .unwrap();
        // Ship 0 moves away first, so ship 1 can take its old cell.
        sim.set_actions(&[ShipAction::MoveSouth, ShipAction::MoveWest], &[]);
        sim.step();
        assert_eq!(sim.ship_ids(), vec![0, 1]);
        assert!(sim.last_outcome().collided.is_empty());
    }

    #[test]
    fn test_spawn_assigns_fresh_id() {
        let mut sim = load_board_from_string(
            config(3),
            "S0 0 0
             0 Y0 0
             0 0 0",
        )
        .unwrap();
        let before = sim.player_halite();
        sim.set_actions(&[ShipAction::None], &[ShipyardAction::Spawn]);
        sim.step();
        assert_eq!(sim.ship_ids(), vec![0, 1]);
        assert_eq!(sim.ship(1).unwrap().position, Position::new(1, 1));
        assert_eq!(sim.player_halite(), before - 500.0);
        assert_eq!(sim.last_outcome().spawned, vec![1]);
    }

    #[test]
    fn test_spawn_skipped_on_occupied_shipyard() {
        let mut sim = load_board_from_string(
            config(3),
            "0 0 0
             0 Y0 0
             0 0 0",
        )
        .unwrap();
        sim.add_ship(Position::new(1, 1)).unwrap();
        let before = sim.player_halite();
        sim.set_actions(&[ShipAction::None], &[ShipyardAction::Spawn]);
        sim.step();

        assert_eq!(sim.ship_ids(), vec![0]);
        assert!(sim.last_outcome().spawned.is_empty());
        assert_eq!(sim.player_halite(), before);
        assert_eq!(sim.ship_at(Position::new(1, 1)), Some(0));
        assert_eq!(sim.shipyards().next().unwrap().action, ShipyardAction::None);
    }

    #[test]
    fn test_regeneration_is_capped() {
        let mut sim = load_board_from_string(
            config(2),
            "499 100
             0 0",
        )
        .unwrap();
        sim.step();
        assert_eq!(sim.halite_at(Position::new(0, 0)), 500.0);
        assert!((sim.halite_at(Position::new(1, 0)) - 102.0).abs() < 1e-4);
    }

    #[test]
    fn test_pregame_converts_then_spawns() {
        let mut sim = GridSimulation::new(config(5));
        sim.add_ship(Position::new(2, 2)).unwrap();
        sim.pregame();
        assert_eq!(sim.step_count(), 2);
        assert_eq!(sim.shipyard_count(), 1);
        assert_eq!(sim.ship_ids(), vec![1]);
        assert_eq!(sim.player_halite(), 5000.0 - 1000.0);
    }

    #[test]
    #[should_panic(expected = "ship action count")]
    fn test_set_actions_rejects_count_mismatch() {
        let mut sim = GridSimulation::new(config(3));
        sim.add_ship(Position::new(0, 0)).unwrap();
        sim.set_actions(&[], &[]);
    }

    #[test]
    fn test_layout_errors() {
        assert_eq!(
            load_board_from_string(config(2), "").unwrap_err(),
            LayoutError::Empty
        );
        assert!(matches!(
            load_board_from_string(config(2), "0 0\n0").unwrap_err(),
            LayoutError::RaggedRow { row: 1, .. }
        ));
        assert!(matches!(
            load_board_from_string(config(2), "0 X\n0 0").unwrap_err(),
            LayoutError::UnknownToken { x: 1, y: 0, .. }
        ));
        assert!(matches!(
            load_board_from_string(config(3), "0 0\n0 0").unwrap_err(),
            LayoutError::SizeMismatch { expected: 3, .. }
        ));
    }

    #[test]
    fn test_display_marks_entities() {
        let sim = load_board_from_string(
            config(2),
            "S500 Y0
             0 0",
        )
        .unwrap();
        let rendered = sim.to_string();
        assert!(rendered.contains("|a9 | 0A|"));
    }
}
