use tracing::{debug, info};

use crate::{
    accumulator::TransitionAccumulator,
    agent::ActionSource,
    config::Config,
    error::GenerationError,
    features::{FeatureExtractor, ShipFeatures, Snapshot},
    generation::BoardGenerator,
    replay::ReplayStore,
    reward::{RewardMap, RewardShaper},
    simulation::{GridSimulation, ShipAction},
};

/// Running totals for one episode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeStats {
    pub episode: usize,
    pub steps: usize,
    pub reward: f32,
    /// Halite credited to shipyards.
    pub deposited: f32,
    pub collisions: usize,
    pub conversions: usize,
    pub spawns: usize,
    /// Transitions handed to the replay store.
    pub transitions: usize,
    pub final_halite: f32,
}

/// Drives simulation, reward shaping and transition accumulation tick by
/// tick, starting a fresh board whenever an episode ends.
pub struct EpisodeRunner<S, E = ShipFeatures> {
    config: Config,
    generator: BoardGenerator,
    shaper: RewardShaper,
    extractor: E,
    accumulator: TransitionAccumulator<ShipAction>,
    replay: ReplayStore<ShipAction>,
    source: S,
    simulation: GridSimulation,
    previous_actions: Option<Vec<ShipAction>>,
    last_rewards: RewardMap,
    stats: EpisodeStats,
    history: Vec<EpisodeStats>,
}

impl<S: ActionSource> EpisodeRunner<S> {
    /// Runner on generated boards using [`ShipFeatures`].
    pub fn new(config: Config, source: S) -> Result<Self, GenerationError> {
        let extractor = ShipFeatures::new(config.board.size);
        Self::with_extractor(config, source, extractor)
    }
}

impl<S: ActionSource, E: FeatureExtractor> EpisodeRunner<S, E> {
    pub fn with_extractor(config: Config, source: S, extractor: E) -> Result<Self, GenerationError> {
        config.validate()?;
        let mut generator = BoardGenerator::new(config.board.clone(), config.seed)?;
        let mut simulation = generator.next_board()?;
        simulation.pregame();
        Ok(Self::assemble(config, source, extractor, generator, simulation))
    }

    /// Runner whose first episode plays on `simulation` as given. Later
    /// episodes use generated boards.
    pub fn from_simulation(
        config: Config,
        source: S,
        extractor: E,
        simulation: GridSimulation,
    ) -> Result<Self, GenerationError> {
        config.validate()?;
        let generator = BoardGenerator::new(config.board.clone(), config.seed)?;
        Ok(Self::assemble(config, source, extractor, generator, simulation))
    }

    fn assemble(
        config: Config,
        source: S,
        extractor: E,
        generator: BoardGenerator,
        simulation: GridSimulation,
    ) -> Self {
        let accumulator = TransitionAccumulator::new(
            config.accumulator.multi_step_n,
            config.accumulator.gamma,
            config.board.max_ships(),
            extractor.row_len(),
        );
        let replay = ReplayStore::new(config.replay.capacity, config.seed);
        let shaper = RewardShaper::new(&config.reward, &config.board);
        EpisodeRunner {
            config,
            generator,
            shaper,
            extractor,
            accumulator,
            replay,
            source,
            simulation,
            previous_actions: None,
            last_rewards: RewardMap::new(),
            stats: EpisodeStats::default(),
            history: Vec::new(),
        }
    }

    /// Advances by one tick. Returns the finished episode's stats when this
    /// tick ended it; the runner is then already on a fresh board.
    pub fn tick(&mut self) -> Result<Option<EpisodeStats>, GenerationError> {
        let rewards = match self.previous_actions {
            Some(_) => self.shaper.compute_rewards(&self.simulation),
            None => RewardMap::new(),
        };
        self.stats.reward += rewards.values().sum::<f32>();

        let snapshot = Snapshot::capture(&self.simulation, &self.extractor);
        self.accumulator
            .push(snapshot, &rewards, self.previous_actions.as_deref());
        let before = self.replay.total_pushed();
        if self.accumulator.push_transitions(&mut self.replay) {
            self.stats.transitions += self.replay.total_pushed() - before;
        }
        self.last_rewards = rewards;

        if self.simulation.is_terminal() {
            return self.finish_episode().map(Some);
        }

        let plan = self.source.choose(&self.simulation);
        self.simulation.set_actions(&plan.ships, &plan.shipyards);
        self.simulation.step();
        self.previous_actions = Some(plan.ships);
        self.record_outcome();
        Ok(None)
    }

    fn record_outcome(&mut self) {
        let outcome = self.simulation.last_outcome();
        self.stats.steps += 1;
        self.stats.deposited += outcome.retained.iter().map(|s| s.delta_value).sum::<f32>();
        self.stats.collisions += outcome.collided.len();
        self.stats.conversions += outcome.converted.len();
        self.stats.spawns += outcome.spawned.len();
    }

    fn finish_episode(&mut self) -> Result<EpisodeStats, GenerationError> {
        let mut finished = std::mem::take(&mut self.stats);
        finished.final_halite = self.simulation.player_halite();
        info!(
            episode = finished.episode,
            steps = finished.steps,
            reward = finished.reward,
            deposited = finished.deposited,
            collisions = finished.collisions,
            transitions = finished.transitions,
            halite = finished.final_halite,
            "episode finished"
        );
        self.history.push(finished.clone());

        self.accumulator.reset();
        self.previous_actions = None;
        self.last_rewards.clear();
        self.simulation = self.generator.next_board()?;
        self.simulation.pregame();
        self.stats.episode = finished.episode + 1;
        debug!(episode = self.stats.episode, "episode started");
        Ok(finished)
    }

    /// Ticks until the current episode ends.
    pub fn run_episode(&mut self) -> Result<EpisodeStats, GenerationError> {
        loop {
            if let Some(stats) = self.tick()? {
                return Ok(stats);
            }
        }
    }

    pub fn run(&mut self, episodes: usize) -> Result<Vec<EpisodeStats>, GenerationError> {
        (0..episodes).map(|_| self.run_episode()).collect()
    }

    pub fn simulation(&self) -> &GridSimulation {
        &self.simulation
    }

    pub fn accumulator(&self) -> &TransitionAccumulator<ShipAction> {
        &self.accumulator
    }

    pub fn replay(&self) -> &ReplayStore<ShipAction> {
        &self.replay
    }

    pub fn replay_mut(&mut self) -> &mut ReplayStore<ShipAction> {
        &mut self.replay
    }

    /// Rewards computed on the latest tick.
    pub fn last_rewards(&self) -> &RewardMap {
        &self.last_rewards
    }

    /// Stats of the episode in progress.
    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    pub fn history(&self) -> &[EpisodeStats] {
        &self.history
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
