use std::collections::{HashMap, hash_map::Entry};

use tracing::info;

use crate::{
    Action,
    agent::{Agent, RoomsAgent},
    parser::is_episode_start,
};

/// Owns one agent per session/context id.
///
/// Agents are created on first contact and reset whenever a prompt carries
/// the turn-zero marker.
#[derive(Debug)]
pub struct SessionRegistry<A = RoomsAgent> {
    agents: HashMap<String, A>,
}

impl<A> Default for SessionRegistry<A> {
    fn default() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }
}

impl<A: Agent + Default> SessionRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes one prompt to the agent for `context_id` and returns its action.
    pub fn handle_turn(&mut self, context_id: &str, prompt: &str) -> Action {
        let agent = match self.agents.entry(context_id.to_string()) {
            Entry::Occupied(entry) => {
                let agent = entry.into_mut();
                if is_episode_start(prompt) {
                    info!(context_id, "episode start marker, resetting session");
                    agent.reset();
                }
                agent
            }
            Entry::Vacant(entry) => {
                info!(context_id, "new session");
                entry.insert(A::default())
            }
        };
        agent.select_action(prompt)
    }

    /// Like `handle_turn`, rendered as the JSON wire response.
    pub fn respond(&mut self, context_id: &str, prompt: &str) -> Result<String, serde_json::Error> {
        self.handle_turn(context_id, prompt).to_json()
    }

    /// Explicitly starts a fresh episode for `context_id`.
    pub fn reset(&mut self, context_id: &str) {
        self.agents.insert(context_id.to_string(), A::default());
    }

    /// Drops the agent owned by `context_id`. Returns whether one existed.
    pub fn end_session(&mut self, context_id: &str) -> bool {
        self.agents.remove(context_id).is_some()
    }

    pub fn get(&self, context_id: &str) -> Option<&A> {
        self.agents.get(context_id)
    }

    pub fn contains(&self, context_id: &str) -> bool {
        self.agents.contains_key(context_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: &str = "Current state (Move 0):\nCurrent Room: 0\nPhase: Observation\n\
                         Rooms Visited: [1, 0, 0, 0, 0, 0, 0, 0]";
    const SECOND: &str = "Current state (Move 1):\nCurrent Room: 1\nPhase: Observation\n\
                          Rooms Visited: [1, 1, 0, 0, 0, 0, 0, 0]";

    #[test]
    fn creates_agent_on_first_contact() {
        let mut registry: SessionRegistry = SessionRegistry::new();
        assert!(registry.is_empty());

        let action = registry.handle_turn("ctx-a", FIRST);

        assert_eq!(action, Action::Move { target_room: 1 });
        assert!(registry.contains("ctx-a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sessions_do_not_share_state() {
        let mut registry: SessionRegistry = SessionRegistry::new();
        registry.handle_turn("ctx-a", FIRST);
        registry.handle_turn("ctx-a", SECOND);
        registry.handle_turn("ctx-b", FIRST);

        let a = registry.get("ctx-a").unwrap().state();
        let b = registry.get("ctx-b").unwrap().state();
        assert!(a.adjacency.contains_edge(0, 1));
        assert!(b.adjacency.is_empty());
        assert_eq!(b.current_room, 0);
    }

    #[test]
    fn turn_zero_marker_resets_existing_session() {
        let mut registry: SessionRegistry = SessionRegistry::new();
        registry.handle_turn("ctx", FIRST);
        registry.handle_turn("ctx", SECOND);

        let action = registry.handle_turn("ctx", FIRST);

        assert_eq!(action, Action::Move { target_room: 1 });
        let state = registry.get("ctx").unwrap().state();
        assert!(state.adjacency.is_empty());
        assert_eq!(state.turns_played, 1);
    }

    #[test]
    fn respond_renders_json() {
        let mut registry: SessionRegistry = SessionRegistry::new();
        let json = registry.respond("ctx", FIRST).unwrap();
        assert_eq!(json, r#"{"command":"MOVE","target_room":1}"#);
    }

    #[test]
    fn ended_session_starts_over() {
        let mut registry: SessionRegistry = SessionRegistry::new();
        registry.handle_turn("ctx", FIRST);
        assert!(registry.end_session("ctx"));
        assert!(!registry.end_session("ctx"));
        assert!(registry.is_empty());

        registry.handle_turn("ctx", SECOND);
        assert_eq!(registry.get("ctx").unwrap().state().turns_played, 1);
    }
}
