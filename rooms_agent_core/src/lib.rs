use std::fmt;

use serde::{Deserialize, Serialize};

pub mod agent;
pub mod discovery;
pub mod environment;
pub mod generator;
pub mod map;
pub mod parser;
pub mod planner;
pub mod session;
pub mod state;

/// Identifier of a room in the puzzle graph.
pub type RoomId = usize;

/// Number of rooms every puzzle is described with.
pub const ROOM_COUNT: usize = 8;

/// Room every episode starts in.
pub const START_ROOM: RoomId = 0;

/// A tri-state room property as reported by the host: `-1`, `0` or `1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    #[default]
    Unknown,
    False,
    True,
}

impl Flag {
    /// Converts the host's integer encoding. Anything outside `{-1, 0, 1}` is rejected.
    pub fn from_raw(value: i64) -> Option<Self> {
        match value {
            -1 => Some(Flag::Unknown),
            0 => Some(Flag::False),
            1 => Some(Flag::True),
            _ => None,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        if value { Flag::True } else { Flag::False }
    }

    pub fn as_raw(self) -> i8 {
        match self {
            Flag::Unknown => -1,
            Flag::False => 0,
            Flag::True => 1,
        }
    }

    #[inline]
    pub fn is_true(self) -> bool {
        self == Flag::True
    }
}

/// The two phases of an episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Observation,
    Execution,
}

impl Phase {
    /// Interprets free-form phase text. Any text mentioning `Execution` counts as execution.
    pub fn from_text(text: &str) -> Self {
        if text.contains("Execution") {
            Phase::Execution
        } else {
            Phase::Observation
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Observation => "Observation",
            Phase::Execution => "Execution",
        }
    }
}

/// Represents the single action an agent emits per turn.
///
/// Serializes to the flat wire shape the host expects, e.g.
/// `{"command":"MOVE","target_room":2}` or `{"command":"COMMIT"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "UPPERCASE")]
pub enum Action {
    Move { target_room: RoomId },
    GetKey,
    UseKey,
    Inspect,
    Commit,
}

impl Action {
    /// Renders the action as its JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses an action from its JSON wire form.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move { target_room } => write!(f, "MOVE {target_room}"),
            Action::GetKey => f.write_str("GETKEY"),
            Action::UseKey => f.write_str("USEKEY"),
            Action::Inspect => f.write_str("INSPECT"),
            Action::Commit => f.write_str("COMMIT"),
        }
    }
}
