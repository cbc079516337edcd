use log::{debug, info};
use shared::{GameSnapshot, Owner, PlayerNumber, ServerPacket};
use std::collections::HashMap;

/// Client-side mirror of the shared grid.
///
/// Toggles are applied locally as soon as they are sent. Each prediction
/// stays pending until the server acknowledges it; snapshots that were
/// produced before the server handled the toggle are overlaid with the
/// pending predictions so the local view does not flicker back.
#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    pub snapshot: Option<GameSnapshot>,
    pub player_number: Option<PlayerNumber>,
    pub player_count: usize,
    pub last_won: Option<u64>,
    pub levels_won: u32,
    pub season_message: Option<String>,
    pending: HashMap<usize, Owner>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.player_number.is_some() && self.snapshot.is_some()
    }

    pub fn is_season_over(&self) -> bool {
        self.season_message.is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn checkboxes(&self) -> &[Owner] {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.checkboxes.as_slice())
            .unwrap_or(&[])
    }

    pub fn unowned_cells(&self) -> Vec<usize> {
        self.checkboxes()
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn owned_by_me(&self) -> usize {
        match self.player_number {
            Some(me) => self
                .checkboxes()
                .iter()
                .filter(|cell| **cell == Some(me))
                .count(),
            None => 0,
        }
    }

    /// Applies a toggle locally before the server has confirmed it.
    ///
    /// Returns false when the move cannot succeed: not registered, index
    /// out of range, or the cell belongs to another player.
    pub fn predict_toggle(&mut self, index: usize) -> bool {
        let Some(me) = self.player_number else {
            return false;
        };
        let Some(cell) = self
            .snapshot
            .as_mut()
            .and_then(|snapshot| snapshot.checkboxes.get_mut(index))
        else {
            return false;
        };

        let predicted = match *cell {
            None => Some(me),
            Some(owner) if owner == me => None,
            Some(_) => return false,
        };

        *cell = predicted;
        self.pending.insert(index, predicted);
        true
    }

    pub fn apply(&mut self, packet: &ServerPacket) {
        match packet {
            ServerPacket::GameStateUpdate {
                game_state,
                player_number,
            } => self.apply_snapshot(game_state.clone(), *player_number),

            ServerPacket::ToggleResponse {
                index,
                success,
                current_state,
            } => self.apply_ack(*index, *success, *current_state),

            ServerPacket::PlayerCountUpdate { count } => {
                self.player_count = *count;
            }

            ServerPacket::GameWon { timestamp } => {
                info!("Level complete at {}", timestamp);
                self.last_won = Some(*timestamp);
                self.levels_won += 1;
            }

            ServerPacket::SeasonEnd { message } => {
                info!("{}", message);
                self.season_message = Some(message.clone());
            }
        }
    }

    fn apply_snapshot(&mut self, mut snapshot: GameSnapshot, player_number: Option<PlayerNumber>) {
        if let Some(number) = player_number {
            self.player_number = Some(number);
        }

        let level_changed = self
            .snapshot
            .as_ref()
            .map_or(true, |current| current.current_level != snapshot.current_level);

        if level_changed {
            self.pending.clear();
        } else {
            for (&index, &predicted) in &self.pending {
                if let Some(cell) = snapshot.checkboxes.get_mut(index) {
                    *cell = predicted;
                }
            }
        }

        self.last_won = snapshot.last_won.or(self.last_won);
        self.snapshot = Some(snapshot);
    }

    fn apply_ack(&mut self, index: i64, success: bool, current_state: Owner) {
        let Ok(index) = usize::try_from(index) else {
            return;
        };
        self.pending.remove(&index);

        if !success {
            debug!("Toggle of {} refused, cell owner is {:?}", index, current_state);
        }

        if let Some(cell) = self
            .snapshot
            .as_mut()
            .and_then(|snapshot| snapshot.checkboxes.get_mut(index))
        {
            *cell = current_state;
        }
    }
}
