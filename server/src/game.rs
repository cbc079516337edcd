//! Authoritative grid state and level progression.

use crate::error::{ServerError, ToggleRejection};
use log::info;
use shared::{
    GameSnapshot, GridConfig, Owner, PlayerNumber, DEFAULT_MAX_CHECKBOXES, DEFAULT_MAX_WIDTH,
    DEFAULT_START_LEVEL,
};

/// Tunables for grid sizing and the length of a season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Column cap; past `max_width²` cells the grid grows in rows only.
    pub max_width: usize,
    /// Cell count of the final level.
    pub max_checkboxes: usize,
    /// Cell count of the first level.
    pub start_level: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_checkboxes: DEFAULT_MAX_CHECKBOXES,
            start_level: DEFAULT_START_LEVEL,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_width == 0 {
            return Err(ServerError::Config("max width must be at least 1".into()));
        }
        if self.start_level == 0 {
            return Err(ServerError::Config("start level must be at least 1".into()));
        }
        if self.start_level > self.max_checkboxes {
            return Err(ServerError::Config(format!(
                "start level {} exceeds max checkboxes {}",
                self.start_level, self.max_checkboxes
            )));
        }
        Ok(())
    }
}

/// What a completed grid led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelCompletion {
    /// The level was won and the grid has been reset to the next level.
    Advanced { timestamp: u64 },
    /// The final level was won; the grid stays fully owned.
    SeasonComplete,
}

/// Smallest square that holds `cell_count` cells, switching to a fixed
/// `max_width`-column rectangle once the square would be wider than that.
pub fn next_grid_config(cell_count: usize, max_width: usize) -> GridConfig {
    let max_width = max_width.max(1);
    let cell_count = cell_count.max(1);

    if cell_count <= max_width.saturating_mul(max_width) {
        let side = ceil_sqrt(cell_count);
        GridConfig::new(side, side)
    } else {
        GridConfig::new(cell_count.div_ceil(max_width), max_width)
    }
}

fn ceil_sqrt(n: usize) -> usize {
    let mut side = (n as f64).sqrt() as usize;
    while side.saturating_mul(side) < n {
        side += 1;
    }
    while side > 1 && (side - 1) * (side - 1) >= n {
        side -= 1;
    }
    side
}

#[derive(Debug, Clone)]
pub struct GameState {
    checkboxes: Vec<Owner>,
    grid_config: GridConfig,
    last_won: Option<u64>,
    current_level: usize,
    season_over: bool,
    config: GameConfig,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        let cells = config.start_level.clamp(1, config.max_checkboxes.max(1));
        Self {
            checkboxes: vec![None; cells],
            grid_config: next_grid_config(cells, config.max_width),
            last_won: None,
            current_level: cells,
            season_over: false,
            config,
        }
    }

    pub fn checkboxes(&self) -> &[Owner] {
        &self.checkboxes
    }

    pub fn grid_config(&self) -> GridConfig {
        self.grid_config
    }

    pub fn last_won(&self) -> Option<u64> {
        self.last_won
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn is_season_over(&self) -> bool {
        self.season_over
    }

    /// Owner of the cell at `index`, `None` for unowned or out-of-range cells.
    pub fn owner_at(&self, index: i64) -> Owner {
        self.slot(index).and_then(|i| self.checkboxes[i])
    }

    fn slot(&self, index: i64) -> Option<usize> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.checkboxes.len())
    }

    /// Claims an unowned cell or releases one the player already owns.
    ///
    /// Returns the cell's new owner. Cells owned by someone else are never
    /// changed.
    pub fn toggle(&mut self, player: PlayerNumber, index: i64) -> Result<Owner, ToggleRejection> {
        let slot = self.slot(index).ok_or(ToggleRejection::InvalidIndex {
            index,
            len: self.checkboxes.len(),
        })?;

        let cell = &mut self.checkboxes[slot];
        match *cell {
            None => *cell = Some(player),
            Some(owner) if owner == player => *cell = None,
            Some(owner) => return Err(ToggleRejection::OwnedByOther { owner }),
        }

        Ok(*cell)
    }

    pub fn is_complete(&self) -> bool {
        self.checkboxes.iter().all(Option::is_some)
    }

    /// Runs after every accepted toggle.
    ///
    /// Below the final level a full grid records the win time and resets to
    /// the next level. On the final level it ends the season, once.
    pub fn check_win(&mut self, now: u64) -> Option<LevelCompletion> {
        if !self.is_complete() {
            return None;
        }

        if self.current_level < self.config.max_checkboxes {
            self.last_won = Some(now);
            self.reset_game();
            return Some(LevelCompletion::Advanced { timestamp: now });
        }

        if self.season_over {
            return None;
        }
        self.season_over = true;
        info!("Season complete at level {}", self.current_level);
        Some(LevelCompletion::SeasonComplete)
    }

    /// Advances to the next level: one more cell, capped at `max_checkboxes`,
    /// all unowned.
    pub fn reset_game(&mut self) {
        let next_total = (self.current_level + 1).min(self.config.max_checkboxes);

        self.grid_config = next_grid_config(next_total, self.config.max_width);
        self.checkboxes = vec![None; next_total];
        self.current_level = next_total;

        info!(
            "Advanced to level {} ({}x{})",
            self.current_level, self.grid_config.rows, self.grid_config.cols
        );
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            checkboxes: self.checkboxes.clone(),
            grid_config: self.grid_config,
            last_won: self.last_won,
            current_level: self.current_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(start_level: usize, max_checkboxes: usize) -> GameConfig {
        GameConfig {
            max_width: 10,
            max_checkboxes,
            start_level,
        }
    }

    fn fill_all_but_last(state: &mut GameState, player: PlayerNumber) {
        let len = state.checkboxes().len() as i64;
        for index in 0..len - 1 {
            state.toggle(player, index).unwrap();
        }
    }

    #[test]
    fn test_grid_sizing_square_until_cap() {
        assert_eq!(next_grid_config(1, 10), GridConfig::new(1, 1));
        assert_eq!(next_grid_config(2, 10), GridConfig::new(2, 2));
        assert_eq!(next_grid_config(49, 10), GridConfig::new(7, 7));
        assert_eq!(next_grid_config(50, 10), GridConfig::new(8, 8));
        assert_eq!(next_grid_config(64, 10), GridConfig::new(8, 8));
        assert_eq!(next_grid_config(100, 10), GridConfig::new(10, 10));
    }

    #[test]
    fn test_grid_sizing_fixed_width_past_cap() {
        assert_eq!(next_grid_config(101, 10), GridConfig::new(11, 10));
        assert_eq!(next_grid_config(110, 10), GridConfig::new(11, 10));
        assert_eq!(next_grid_config(111, 10), GridConfig::new(12, 10));
        assert_eq!(next_grid_config(5, 2), GridConfig::new(3, 2));
    }

    #[test]
    fn test_grid_always_holds_every_cell() {
        for width in 1..=12 {
            for cells in 1..=300 {
                let grid = next_grid_config(cells, width);
                assert!(grid.capacity() >= cells, "{cells} cells, width {width}");
                assert!(grid.cols <= width);
            }
        }
    }

    #[test]
    fn test_grid_sizing_with_huge_width() {
        assert_eq!(next_grid_config(5, usize::MAX), GridConfig::new(3, 3));
        assert_eq!(next_grid_config(1_000, usize::MAX), GridConfig::new(32, 32));

        let state = GameState::new(GameConfig {
            max_width: usize::MAX,
            max_checkboxes: 100,
            start_level: 50,
        });
        assert_eq!(state.grid_config(), GridConfig::new(8, 8));
    }

    #[test]
    fn test_new_state() {
        let state = GameState::new(config(4, 100));

        assert_eq!(state.checkboxes(), &[None, None, None, None]);
        assert_eq!(state.current_level(), 4);
        assert_eq!(state.grid_config(), GridConfig::new(2, 2));
        assert_eq!(state.last_won(), None);
        assert!(!state.is_season_over());
    }

    #[test]
    fn test_toggle_claims_and_releases() {
        let mut state = GameState::new(config(4, 100));

        assert_eq!(state.toggle(1, 2), Ok(Some(1)));
        assert_eq!(state.owner_at(2), Some(1));

        assert_eq!(state.toggle(1, 2), Ok(None));
        assert_eq!(state.owner_at(2), None);
    }

    #[test]
    fn test_toggle_never_takes_another_players_cell() {
        let mut state = GameState::new(config(4, 100));
        state.toggle(1, 0).unwrap();

        assert_eq!(
            state.toggle(2, 0),
            Err(ToggleRejection::OwnedByOther { owner: 1 })
        );
        assert_eq!(state.owner_at(0), Some(1));
    }

    #[test]
    fn test_toggle_rejects_out_of_range() {
        let mut state = GameState::new(config(4, 100));

        assert_eq!(
            state.toggle(1, 4),
            Err(ToggleRejection::InvalidIndex { index: 4, len: 4 })
        );
        assert_eq!(
            state.toggle(1, -1),
            Err(ToggleRejection::InvalidIndex { index: -1, len: 4 })
        );
        assert_eq!(
            state.toggle(1, i64::MAX),
            Err(ToggleRejection::InvalidIndex {
                index: i64::MAX,
                len: 4
            })
        );
        assert_eq!(state.owner_at(4), None);
        assert_eq!(state.owner_at(-1), None);
        assert_eq!(state.owner_at(i64::MIN), None);
        assert!(state.checkboxes().iter().all(Option::is_none));
    }

    #[test]
    fn test_no_win_while_cells_remain() {
        let mut state = GameState::new(config(3, 100));
        fill_all_but_last(&mut state, 1);

        assert_eq!(state.check_win(100), None);
        assert_eq!(state.current_level(), 3);
        assert_eq!(state.last_won(), None);
    }

    #[test]
    fn test_win_advances_one_cell() {
        let mut state = GameState::new(config(3, 100));
        fill_all_but_last(&mut state, 1);
        state.toggle(2, 2).unwrap();

        assert_eq!(
            state.check_win(1_234),
            Some(LevelCompletion::Advanced { timestamp: 1_234 })
        );
        assert_eq!(state.current_level(), 4);
        assert_eq!(state.checkboxes(), &[None; 4]);
        assert_eq!(state.grid_config(), GridConfig::new(2, 2));
        assert_eq!(state.last_won(), Some(1_234));
    }

    #[test]
    fn test_final_level_ends_season_once() {
        let mut state = GameState::new(config(2, 2));
        state.toggle(1, 0).unwrap();
        state.toggle(1, 1).unwrap();

        assert_eq!(state.check_win(50), Some(LevelCompletion::SeasonComplete));
        assert!(state.is_season_over());
        assert_eq!(state.checkboxes(), &[Some(1), Some(1)]);
        assert_eq!(state.current_level(), 2);
        assert_eq!(state.last_won(), None);

        // Still playable, but the season only ends once
        state.toggle(1, 1).unwrap();
        state.toggle(1, 1).unwrap();
        assert_eq!(state.check_win(60), None);
    }

    #[test]
    fn test_reset_is_capped() {
        let mut state = GameState::new(config(5, 5));
        state.reset_game();

        assert_eq!(state.current_level(), 5);
        assert_eq!(state.checkboxes().len(), 5);
    }

    #[test]
    fn test_level_matches_cell_count_through_a_season() {
        let mut state = GameState::new(config(1, 12));
        let mut now = 0;

        while !state.is_season_over() {
            let len = state.checkboxes().len() as i64;
            for index in 0..len {
                state.toggle(1, index).unwrap();
            }
            now += 1;
            state.check_win(now);
            assert_eq!(state.current_level(), state.checkboxes().len());
            assert!(state.grid_config().capacity() >= state.checkboxes().len());
        }

        assert_eq!(state.current_level(), 12);
        assert_eq!(state.last_won(), Some(11));
    }

    #[test]
    fn test_config_validation() {
        assert!(GameConfig::default().validate().is_ok());
        assert!(config(1, 1).validate().is_ok());
        assert!(config(0, 10).validate().is_err());
        assert!(config(11, 10).validate().is_err());

        let narrow = GameConfig {
            max_width: 0,
            ..GameConfig::default()
        };
        assert!(matches!(narrow.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut state = GameState::new(config(2, 10));
        state.toggle(3, 1).unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.checkboxes, vec![None, Some(3)]);
        assert_eq!(snapshot.current_level, 2);
        assert_eq!(snapshot.grid_config, GridConfig::new(2, 2));
        assert_eq!(snapshot.last_won, None);
    }
}
