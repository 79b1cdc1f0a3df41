use std::collections::BTreeSet;

use crate::{
    Flag, Phase, RoomId, START_ROOM,
    discovery::Frontier,
    map::{FlagVector, RoomMap},
    parser::ParsedPrompt,
    planner::Route,
};

/// Everything the agent believes about the current episode.
///
/// Fields are sticky: a prompt that lacks a field leaves the previous value untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeState {
    pub current_room: RoomId,
    pub phase: Phase,
    /// Set once an execution phase is seen. Only `reset` clears it.
    pub committed: bool,
    pub turn: Option<u32>,
    pub keys_held: Option<u32>,
    pub steps_remaining: Option<u32>,

    pub visited: FlagVector,
    pub inspected: FlagVector,
    pub locked: FlagVector,
    pub has_key: FlagVector,
    pub is_exit: FlagVector,

    pub adjacency: RoomMap,
    pub frontier: Frontier,
    pub exit_room: Option<RoomId>,
    pub key_room: Option<RoomId>,

    pub route: Route,
    /// Index into `route` of the room most recently moved towards.
    pub cursor: usize,
    pub pending_getkey: bool,
    pub pending_usekey: bool,
    /// Rooms where this agent has issued `GETKEY`.
    pub keys_collected: BTreeSet<RoomId>,
    /// Rooms where this agent has issued `USEKEY`.
    pub locks_opened: BTreeSet<RoomId>,

    pub turns_played: u32,
}

impl Default for EpisodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl EpisodeState {
    /// A fresh episode: in the start room, nothing known beyond the start room being visited.
    pub fn new() -> Self {
        let mut visited = FlagVector::default();
        visited[START_ROOM] = Flag::True;

        EpisodeState {
            current_room: START_ROOM,
            phase: Phase::Observation,
            committed: false,
            turn: None,
            keys_held: None,
            steps_remaining: None,
            visited,
            inspected: FlagVector::default(),
            locked: FlagVector::default(),
            has_key: FlagVector::default(),
            is_exit: FlagVector::default(),
            adjacency: RoomMap::new(),
            frontier: Frontier::new(),
            exit_room: None,
            key_room: None,
            route: Vec::new(),
            cursor: 0,
            pending_getkey: false,
            pending_usekey: false,
            keys_collected: BTreeSet::new(),
            locks_opened: BTreeSet::new(),
            turns_played: 0,
        }
    }

    /// Overwrites every field with its fresh-episode value.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Folds the fields found in one prompt into the state.
    pub fn apply(&mut self, parsed: &ParsedPrompt) {
        if let Some(room) = parsed.current_room {
            self.current_room = room;
        }
        if let Some(phase) = parsed.phase.as_deref() {
            self.phase = Phase::from_text(phase);
            if self.phase == Phase::Execution {
                self.committed = true;
            }
        }
        if parsed.turn.is_some() {
            self.turn = parsed.turn;
        }
        if parsed.keys_held.is_some() {
            self.keys_held = parsed.keys_held;
        }
        if parsed.steps_remaining.is_some() {
            self.steps_remaining = parsed.steps_remaining;
        }

        if let Some(visited) = &parsed.visited {
            self.visited = visited.clone();
        }
        if let Some(inspected) = &parsed.inspected {
            self.inspected = inspected.clone();
        }
        if let Some(locked) = &parsed.locked {
            self.locked = locked.clone();
        }
        if let Some(has_key) = &parsed.has_key {
            self.has_key = has_key.clone();
            if let Some(room) = has_key.first_true() {
                self.key_room = Some(room);
            }
        }
        if let Some(is_exit) = &parsed.is_exit {
            self.is_exit = is_exit.clone();
            if let Some(room) = is_exit.first_true() {
                self.exit_room = Some(room);
            }
        }
    }

    /// Whether `room` is locked and this agent has not used a key on it.
    pub fn is_sealed(&self, room: RoomId) -> bool {
        self.locked.is_true(room) && !self.locks_opened.contains(&room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ROOM_COUNT, map::RoomTable};

    fn flags(raw: [i64; ROOM_COUNT]) -> FlagVector {
        RoomTable::from_vec(raw.iter().map(|&v| Flag::from_raw(v).unwrap()).collect()).unwrap()
    }

    #[test]
    fn missing_fields_keep_previous_values() {
        let mut state = EpisodeState::new();
        state.apply(&ParsedPrompt {
            current_room: Some(2),
            locked: Some(flags([0, 1, 0, -1, -1, -1, -1, -1])),
            ..ParsedPrompt::default()
        });
        state.apply(&ParsedPrompt::default());

        assert_eq!(state.current_room, 2);
        assert!(state.locked.is_true(1));
    }

    #[test]
    fn execution_phase_is_sticky() {
        let mut state = EpisodeState::new();
        state.apply(&ParsedPrompt {
            phase: Some("Execution".to_string()),
            ..ParsedPrompt::default()
        });
        state.apply(&ParsedPrompt {
            phase: Some("Observation".to_string()),
            ..ParsedPrompt::default()
        });

        assert!(state.committed);
        assert_eq!(state.phase, Phase::Observation);
    }

    #[test]
    fn records_first_exit_and_key_room() {
        let mut state = EpisodeState::new();
        state.apply(&ParsedPrompt {
            has_key: Some(flags([0, 0, 1, 0, 1, -1, -1, -1])),
            is_exit: Some(flags([0, 0, 0, 1, 0, 0, 1, -1])),
            ..ParsedPrompt::default()
        });
        assert_eq!(state.key_room, Some(2));
        assert_eq!(state.exit_room, Some(3));

        // A later vector without any set entry does not forget the known rooms.
        state.apply(&ParsedPrompt {
            is_exit: Some(flags([-1; ROOM_COUNT])),
            ..ParsedPrompt::default()
        });
        assert_eq!(state.exit_room, Some(3));
    }

    #[test]
    fn reset_clears_everything() {
        let mut state = EpisodeState::new();
        state.adjacency.add_edge(0, 1);
        state.adjacency.add_edge(1, 2);
        state.exit_room = Some(2);
        state.key_room = Some(0);
        state.committed = true;
        state.route = vec![0, 1, 2];
        state.cursor = 2;
        state.frontier.mark_explored(1);
        state.frontier.seed_once();
        state.current_room = 2;
        state.locked = flags([0; ROOM_COUNT]);
        state.has_key = flags([1, 0, 0, 0, 0, 0, 0, 0]);
        state.is_exit = flags([0, 0, 1, 0, 0, 0, 0, 0]);
        state.pending_getkey = true;
        state.pending_usekey = true;
        state.keys_collected.insert(0);
        state.locks_opened.insert(1);

        state.reset();

        assert!(state.adjacency.is_empty());
        assert_eq!(state.exit_room, None);
        assert_eq!(state.key_room, None);
        assert!(!state.committed);
        assert!(state.route.is_empty());
        assert_eq!(state.cursor, 0);
        assert_eq!(state.frontier.explored().collect::<Vec<_>>(), vec![START_ROOM]);
        assert!(state.frontier.is_empty());
        assert_eq!(state.current_room, START_ROOM);
        assert_eq!(state.locked, FlagVector::default());
        assert_eq!(state.has_key, FlagVector::default());
        assert_eq!(state.is_exit, FlagVector::default());
        assert!(!state.pending_getkey);
        assert!(!state.pending_usekey);
        assert!(state.keys_collected.is_empty());
        assert!(state.locks_opened.is_empty());
        assert_eq!(state, EpisodeState::new());
    }
}
