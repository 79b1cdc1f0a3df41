use tracing::{debug, info, warn};

use crate::{
    Action, RoomId,
    discovery::record_transitions,
    map::RoomError,
    parser::parse_prompt,
    planner::{locked_rooms_on, plan_route},
    state::EpisodeState,
};

/// Trait defining the behavior of an agent.
/// Agents decide which action to take based on the host's prompt text.
pub trait Agent {
    /// Determines the action for this turn from the prompt.
    /// `&mut self` allows the agent to accumulate knowledge across turns.
    fn select_action(&mut self, prompt: &str) -> Action;

    /// Forgets everything learned so far and starts a new episode.
    fn reset(&mut self);
}

/// Internal faults while choosing an action. Never escapes `select_action`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Explores the room graph, commits, then replays a planned route to the exit.
#[derive(Debug, Clone, Default)]
pub struct RoomsAgent {
    state: EpisodeState,
}

impl RoomsAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes from an existing belief state.
    pub fn from_state(state: EpisodeState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EpisodeState {
        &mut self.state
    }

    /// Recomputes the route from the current knowledge and rewinds the cursor.
    fn replan(&mut self) {
        let state = &mut self.state;
        state.route = plan_route(
            &state.adjacency,
            &state.locked,
            state.exit_room,
            state.key_room,
        );
        state.cursor = 0;
    }

    fn commit(&mut self) -> Action {
        self.replan();
        info!(
            route = ?self.state.route,
            exit = ?self.state.exit_room,
            key = ?self.state.key_room,
            "committing"
        );
        Action::Commit
    }

    /// Observation phase: commit once the exit is reachable on a usable route, otherwise explore.
    fn explore(&mut self) -> Action {
        self.state.frontier.seed_once();

        if self.state.exit_room.is_some() {
            self.replan();
            let blocked = !locked_rooms_on(&self.state.route, &self.state.locked).is_empty();
            if !blocked || self.state.key_room.is_some() || self.state.frontier.is_empty() {
                return self.commit();
            }
        } else if self.state.frontier.is_empty() {
            return self.commit();
        }

        match self.state.frontier.next_candidate(&self.state.visited) {
            Some(target_room) => Action::Move { target_room },
            None => self.commit(),
        }
    }

    /// Execution phase: key handling first, then the next step along the route.
    fn execute(&mut self) -> Result<Action, DecisionError> {
        if self.state.route.is_empty() && self.state.exit_room.is_some() {
            self.replan();
        }

        let current = self.state.current_room;

        // A refused move leaves the pickup pending in the wrong room; drop it.
        if self.state.pending_getkey {
            self.state.pending_getkey = false;
            if self.state.key_room == Some(current) {
                return Ok(self.pick_up_key());
            }
        }
        if self.state.pending_usekey {
            self.state.pending_usekey = false;
            return Ok(self.use_key());
        }

        let has_key = *self.state.has_key.try_get(current)?;
        if has_key.is_true() && !self.state.keys_collected.contains(&current) {
            return Ok(self.pick_up_key());
        }
        let locked = *self.state.locked.try_get(current)?;
        if locked.is_true() && !self.state.locks_opened.contains(&current) {
            return Ok(self.use_key());
        }

        if let Some(target_room) = self.next_route_step() {
            let state = &mut self.state;
            if state.key_room == Some(target_room) && !state.keys_collected.contains(&target_room) {
                state.pending_getkey = true;
            }
            return Ok(Action::Move { target_room });
        }

        if self.state.exit_room == Some(current) {
            return Ok(if self.state.is_sealed(current) {
                self.use_key()
            } else {
                Action::Inspect
            });
        }

        Ok(Action::Inspect)
    }

    /// The room after the current one on the route, falling back to the cursor position.
    ///
    /// Detours revisit rooms, so the current room is looked up from the cursor onwards.
    /// The search starts one slot back to resume after a refused move.
    fn next_route_step(&mut self) -> Option<RoomId> {
        let state = &mut self.state;
        let current = state.current_room;
        let from = state.cursor.saturating_sub(1).min(state.route.len());

        if let Some(index) = state.route[from..]
            .iter()
            .position(|&room| room == current)
            .map(|offset| from + offset)
        {
            if let Some(&next) = state.route.get(index + 1) {
                state.cursor = index + 1;
                return Some(next);
            }
            if state.exit_room == Some(current) {
                return None;
            }
        }

        let next = *state.route.get(state.cursor + 1)?;
        state.cursor += 1;
        Some(next)
    }

    fn pick_up_key(&mut self) -> Action {
        let state = &mut self.state;
        let room = state.current_room;
        state.keys_collected.insert(room);
        if state.is_sealed(room) {
            state.pending_usekey = true;
        }
        Action::GetKey
    }

    fn use_key(&mut self) -> Action {
        self.state.locks_opened.insert(self.state.current_room);
        Action::UseKey
    }
}

impl Agent for RoomsAgent {
    fn select_action(&mut self, prompt: &str) -> Action {
        let prev_room = self.state.current_room;
        let prev_visited = self.state.visited.clone();

        self.state.apply(&parse_prompt(prompt));
        self.state.turns_played += 1;

        let decision = if self.state.committed {
            self.execute()
        } else {
            let state = &mut self.state;
            record_transitions(
                &mut state.adjacency,
                &mut state.frontier,
                prev_room,
                &prev_visited,
                &state.visited,
            );
            Ok(self.explore())
        };

        match decision {
            Ok(action) => {
                debug!(
                    turn = ?self.state.turn,
                    room = self.state.current_room,
                    committed = self.state.committed,
                    %action,
                    "selected action"
                );
                action
            }
            Err(err) => {
                warn!(%err, "action selection failed, falling back to INSPECT");
                Action::Inspect
            }
        }
    }

    fn reset(&mut self) {
        info!(turns = self.state.turns_played, "resetting agent");
        self.state.reset();
    }
}
