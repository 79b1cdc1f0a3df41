use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Action, Phase, ROOM_COUNT, RoomId, START_ROOM,
    agent::Agent,
    map::{RoomMap, RoomTable},
};

/// Steps granted to an episode when the layout does not say otherwise.
pub const DEFAULT_STEP_BUDGET: u32 = 30;

/// Represents the outcome of processing an agent's action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    Failure(String),
    Win,
}

/// How a finished episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeOutcome {
    Won,
    OutOfSteps,
}

/// Errors raised while loading a layout description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("Layout is empty")]
    Empty,
    #[error("Line {line}: unknown directive '{directive}'")]
    UnknownDirective { line: usize, directive: String },
    #[error("Line {line}: '{directive}' expects {expected} argument(s)")]
    Arity {
        line: usize,
        directive: String,
        expected: usize,
    },
    #[error("Line {line}: '{value}' is not a valid number")]
    InvalidNumber { line: usize, value: String },
    #[error("Room count must be between 1 and {max}, got {count}")]
    RoomCount { count: usize, max: usize },
    #[error("Room {room} is out of range for a layout of {count} rooms")]
    RoomOutOfRange { room: RoomId, count: usize },
    #[error("Edge {room}-{room} joins a room to itself")]
    SelfLoop { room: RoomId },
    #[error("No 'rooms' directive found")]
    MissingRoomCount,
    #[error("No 'exit' directive found")]
    MissingExit,
}

/// The hidden ground truth of a puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomLayout {
    pub room_count: usize,
    pub edges: RoomMap,
    pub locked: BTreeSet<RoomId>,
    pub keys: BTreeSet<RoomId>,
    pub exit: RoomId,
    pub step_budget: u32,
}

impl RoomLayout {
    /// Checks that every referenced room exists.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.room_count == 0 || self.room_count > ROOM_COUNT {
            return Err(LayoutError::RoomCount {
                count: self.room_count,
                max: ROOM_COUNT,
            });
        }
        let referenced = self
            .edges
            .rooms()
            .chain(self.locked.iter().copied())
            .chain(self.keys.iter().copied())
            .chain(std::iter::once(self.exit));
        for room in referenced {
            if room >= self.room_count {
                return Err(LayoutError::RoomOutOfRange {
                    room,
                    count: self.room_count,
                });
            }
        }
        Ok(())
    }
}

/// Loads a layout from its line-oriented text form.
///
/// ```text
/// # comment
/// rooms 3
/// edge 0 1
/// edge 1 2
/// lock 1
/// key 0
/// exit 2
/// steps 30
/// ```
pub fn load_layout_from_string(text: &str) -> Result<RoomLayout, LayoutError> {
    let mut room_count = None;
    let mut edges = RoomMap::new();
    let mut locked = BTreeSet::new();
    let mut keys = BTreeSet::new();
    let mut exit = None;
    let mut step_budget = DEFAULT_STEP_BUDGET;
    let mut saw_directive = false;

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw_line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        saw_directive = true;

        let tokens: Vec<&str> = content.split_whitespace().collect();
        let Some((&directive, args)) = tokens.split_first() else {
            continue;
        };

        match directive {
            "rooms" => room_count = Some(parse_args::<1>(line, directive, args)?[0]),
            "edge" => {
                let [a, b] = parse_args::<2>(line, directive, args)?;
                if a == b {
                    return Err(LayoutError::SelfLoop { room: a });
                }
                edges.add_edge(a, b);
            }
            "exit" => exit = Some(parse_args::<1>(line, directive, args)?[0]),
            "lock" => {
                locked.insert(parse_args::<1>(line, directive, args)?[0]);
            }
            "key" => {
                keys.insert(parse_args::<1>(line, directive, args)?[0]);
            }
            "steps" => {
                let [steps] = parse_args::<1>(line, directive, args)?;
                step_budget = u32::try_from(steps).map_err(|_| LayoutError::InvalidNumber {
                    line,
                    value: steps.to_string(),
                })?;
            }
            unknown => {
                return Err(LayoutError::UnknownDirective {
                    line,
                    directive: unknown.to_string(),
                });
            }
        }
    }

    if !saw_directive {
        return Err(LayoutError::Empty);
    }

    let layout = RoomLayout {
        room_count: room_count.ok_or(LayoutError::MissingRoomCount)?,
        edges,
        locked,
        keys,
        exit: exit.ok_or(LayoutError::MissingExit)?,
        step_budget,
    };
    layout.validate()?;
    Ok(layout)
}

/// Parses exactly `N` numeric arguments of a layout directive.
fn parse_args<const N: usize>(
    line: usize,
    directive: &str,
    args: &[&str],
) -> Result<[usize; N], LayoutError> {
    if args.len() != N {
        return Err(LayoutError::Arity {
            line,
            directive: directive.to_string(),
            expected: N,
        });
    }
    let mut numbers = [0; N];
    for (slot, value) in numbers.iter_mut().zip(args) {
        *slot = value.parse().map_err(|_| LayoutError::InvalidNumber {
            line,
            value: value.to_string(),
        })?;
    }
    Ok(numbers)
}

/// Runs a puzzle on the host side: renders prompts and applies actions.
#[derive(Debug, Clone)]
pub struct RoomsEnvironment {
    layout: RoomLayout,
    position: RoomId,
    phase: Phase,
    visited: RoomTable<bool>,
    inspected: RoomTable<bool>,
    unlocked: RoomTable<bool>,
    keys_taken: RoomTable<bool>,
    keys_held: u32,
    steps_remaining: u32,
    moves: u32,
    outcome: Option<EpisodeOutcome>,
}

impl RoomsEnvironment {
    /// Starts an episode in the start room, which begins visited and inspected.
    pub fn new(layout: RoomLayout) -> Self {
        let mut visited = RoomTable::filled(false);
        let mut inspected = RoomTable::filled(false);
        visited[START_ROOM] = true;
        inspected[START_ROOM] = true;

        RoomsEnvironment {
            steps_remaining: layout.step_budget,
            layout,
            position: START_ROOM,
            phase: Phase::Observation,
            visited,
            inspected,
            unlocked: RoomTable::filled(false),
            keys_taken: RoomTable::filled(false),
            keys_held: 0,
            moves: 0,
            outcome: None,
        }
    }

    pub fn layout(&self) -> &RoomLayout {
        &self.layout
    }
    pub fn position(&self) -> RoomId {
        self.position
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn keys_held(&self) -> u32 {
        self.keys_held
    }
    pub fn steps_remaining(&self) -> u32 {
        self.steps_remaining
    }
    pub fn moves(&self) -> u32 {
        self.moves
    }
    pub fn outcome(&self) -> Option<EpisodeOutcome> {
        self.outcome
    }
    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    fn in_layout(&self, room: RoomId) -> bool {
        room < self.layout.room_count
    }

    /// Whether `room` is locked and has not been opened yet.
    fn is_sealed(&self, room: RoomId) -> bool {
        self.layout.locked.contains(&room) && !self.unlocked[room]
    }

    /// Value of a room property as the agent is allowed to see it.
    fn property(&self, room: RoomId, value: bool) -> i8 {
        if self.in_layout(room) && self.inspected[room] {
            i8::from(value)
        } else {
            -1
        }
    }

    /// Renders the current state in the host's prompt template.
    pub fn render_prompt(&self) -> String {
        let visited = format_flags((0..ROOM_COUNT).map(|room| i8::from(self.visited[room])));
        let inspected = format_flags((0..ROOM_COUNT).map(|room| i8::from(self.inspected[room])));
        let locked =
            format_flags((0..ROOM_COUNT).map(|room| self.property(room, self.is_sealed(room))));
        let has_key = format_flags(
            (0..ROOM_COUNT).map(|room| self.property(room, self.layout.keys.contains(&room))),
        );
        let is_exit =
            format_flags((0..ROOM_COUNT).map(|room| self.property(room, room == self.layout.exit)));

        format!(
            "You are solving a Rooms navigation puzzle. Current state (Move {moves}):\n\
             \n\
             Current Room: {position}\n\
             Phase: {phase}\n\
             Keys Held: {keys}\n\
             Steps Remaining: {steps}\n\
             \n\
             Room Status (1 means true and 0 means false):\n\
             Rooms Visited: {visited}\n\
             Rooms Inspected: {inspected}\n\
             \n\
             Room Properties (1 means true and 0 means false for inspected rooms; -1 means unknown):\n\
             - Locked: {locked}\n\
             - Has Key: {has_key}\n\
             - Is Exit: {is_exit}\n",
            moves = self.moves,
            position = self.position,
            phase = self.phase.as_str(),
            keys = self.keys_held,
            steps = self.steps_remaining,
        )
    }

    /// Processes a single action, spending one step.
    pub fn process_action(&mut self, action: Action) -> ActionResult {
        if self.outcome.is_some() {
            return ActionResult::Failure("Episode is already over.".to_string());
        }
        if self.steps_remaining == 0 {
            self.outcome = Some(EpisodeOutcome::OutOfSteps);
            return ActionResult::Failure("No steps remaining.".to_string());
        }
        self.steps_remaining -= 1;
        self.moves += 1;

        let result = match (self.phase, action) {
            (_, Action::Move { target_room }) => self.move_to(target_room),
            (Phase::Observation, Action::Commit) => {
                self.phase = Phase::Execution;
                self.position = START_ROOM;
                self.keys_held = 0;
                ActionResult::Success
            }
            (Phase::Execution, Action::Commit) => {
                ActionResult::Failure("Already committed.".to_string())
            }
            (Phase::Observation, Action::GetKey | Action::UseKey) => {
                ActionResult::Failure("Keys can only be handled after committing.".to_string())
            }
            (Phase::Execution, Action::GetKey) => self.take_key(),
            (Phase::Execution, Action::UseKey) => self.use_key(),
            (_, Action::Inspect) => {
                self.inspected[self.position] = true;
                ActionResult::Success
            }
        };
        debug!(%action, ?result, room = self.position, "host processed action");

        if result == ActionResult::Success
            && self.phase == Phase::Execution
            && self.position == self.layout.exit
            && !self.is_sealed(self.position)
        {
            self.outcome = Some(EpisodeOutcome::Won);
            return ActionResult::Win;
        }
        if self.steps_remaining == 0 {
            self.outcome = Some(EpisodeOutcome::OutOfSteps);
        }
        result
    }

    fn move_to(&mut self, target: RoomId) -> ActionResult {
        if !self.in_layout(target) {
            return ActionResult::Failure(format!("Room {} does not exist.", target));
        }
        if !self.layout.edges.contains_edge(self.position, target) {
            return ActionResult::Failure(format!(
                "Room {} is not adjacent to room {}.",
                target, self.position
            ));
        }
        // Locks only hold the agent back once the run counts.
        if self.phase == Phase::Execution && self.is_sealed(self.position) {
            return ActionResult::Failure(format!("Room {} is locked.", self.position));
        }

        self.position = target;
        self.visited[target] = true;
        if self.phase == Phase::Observation {
            self.inspected[target] = true;
        }
        ActionResult::Success
    }

    fn take_key(&mut self) -> ActionResult {
        let room = self.position;
        if !self.layout.keys.contains(&room) || self.keys_taken[room] {
            return ActionResult::Failure(format!("No key in room {}.", room));
        }
        self.keys_taken[room] = true;
        self.keys_held += 1;
        ActionResult::Success
    }

    fn use_key(&mut self) -> ActionResult {
        let room = self.position;
        if !self.is_sealed(room) {
            return ActionResult::Failure(format!("Room {} is not locked.", room));
        }
        if self.keys_held == 0 {
            return ActionResult::Failure("No key held.".to_string());
        }
        self.keys_held -= 1;
        self.unlocked[room] = true;
        ActionResult::Success
    }

    /// Asks `agent` for one action and applies it. Returns `None` once the episode is over.
    pub fn step<A: Agent>(&mut self, agent: &mut A) -> Option<(Action, ActionResult)> {
        if self.is_over() {
            return None;
        }
        let action = agent.select_action(&self.render_prompt());
        let result = self.process_action(action);
        Some((action, result))
    }
}

/// Formats flags the way the host prints lists: `[1, 0, -1]`.
fn format_flags(values: impl Iterator<Item = i8>) -> String {
    let body = values
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", body)
}

/// Summary of a finished episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeReport {
    pub outcome: EpisodeOutcome,
    pub actions: Vec<(Action, ActionResult)>,
}

impl EpisodeReport {
    pub fn turns(&self) -> usize {
        self.actions.len()
    }

    pub fn solved(&self) -> bool {
        self.outcome == EpisodeOutcome::Won
    }
}

/// Plays `env` to the end with `agent`.
pub fn run_episode<A: Agent>(agent: &mut A, env: &mut RoomsEnvironment) -> EpisodeReport {
    let mut actions = Vec::new();
    while let Some(turn) = env.step(agent) {
        actions.push(turn);
    }
    EpisodeReport {
        outcome: env.outcome().unwrap_or(EpisodeOutcome::OutOfSteps),
        actions,
    }
}
