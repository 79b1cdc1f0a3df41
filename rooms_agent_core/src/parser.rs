//! Label-anchored extraction of state fields from host prompts.
//!
//! Every field is optional. A label that is missing, or whose value is
//! malformed, yields `None` for that field and never an error.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Flag, ROOM_COUNT, RoomId, map::FlagVector, map::RoomTable};

/// Fields extracted from one prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPrompt {
    /// Turn counter from the `(Move N)` header.
    pub turn: Option<u32>,
    pub current_room: Option<RoomId>,
    pub phase: Option<String>,
    pub keys_held: Option<u32>,
    pub steps_remaining: Option<u32>,
    pub visited: Option<FlagVector>,
    pub inspected: Option<FlagVector>,
    pub locked: Option<FlagVector>,
    pub has_key: Option<FlagVector>,
    pub is_exit: Option<FlagVector>,
}

struct Patterns {
    turn: Regex,
    current_room: Regex,
    phase: Regex,
    keys_held: Regex,
    steps_remaining: Regex,
    visited: Regex,
    inspected: Regex,
    locked: Regex,
    has_key: Regex,
    is_exit: Regex,
}

impl Patterns {
    fn compile() -> Self {
        Self {
            turn: Regex::new(r"\(Move\s+(\d+)\)").expect("turn pattern is valid"),
            current_room: int_pattern("Current Room"),
            phase: Regex::new(r"Phase:\s*(\w+)").expect("phase pattern is valid"),
            keys_held: int_pattern("Keys Held"),
            steps_remaining: int_pattern("Steps Remaining"),
            visited: list_pattern("Rooms Visited"),
            inspected: list_pattern("Rooms Inspected"),
            locked: list_pattern("Locked"),
            has_key: list_pattern("Has Key"),
            is_exit: list_pattern("Is Exit"),
        }
    }
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(Patterns::compile);

fn int_pattern(label: &str) -> Regex {
    Regex::new(&format!(r"{}:\s*(\d+)", regex::escape(label))).expect("integer pattern is valid")
}

fn list_pattern(label: &str) -> Regex {
    Regex::new(&format!(r"{}:\s*\[([^\]]*)\]", regex::escape(label)))
        .expect("list pattern is valid")
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn parse_u32(re: &Regex, text: &str) -> Option<u32> {
    capture(re, text)?.parse().ok()
}

/// Parses the bracket body of a flag list. Needs exactly `ROOM_COUNT` values in `{-1, 0, 1}`.
fn parse_flags(re: &Regex, text: &str) -> Option<FlagVector> {
    let body = capture(re, text)?;
    let flags = body
        .split(',')
        .map(|raw| raw.trim().parse::<i64>().ok().and_then(Flag::from_raw))
        .collect::<Option<Vec<_>>>()?;
    RoomTable::from_vec(flags)
}

/// Extracts every recognised field from a prompt.
pub fn parse_prompt(prompt: &str) -> ParsedPrompt {
    let patterns = &*PATTERNS;
    ParsedPrompt {
        turn: parse_u32(&patterns.turn, prompt),
        current_room: capture(&patterns.current_room, prompt)
            .and_then(|raw| raw.parse::<RoomId>().ok())
            .filter(|&room| room < ROOM_COUNT),
        phase: capture(&patterns.phase, prompt).map(str::to_string),
        keys_held: parse_u32(&patterns.keys_held, prompt),
        steps_remaining: parse_u32(&patterns.steps_remaining, prompt),
        visited: parse_flags(&patterns.visited, prompt),
        inspected: parse_flags(&patterns.inspected, prompt),
        locked: parse_flags(&patterns.locked, prompt),
        has_key: parse_flags(&patterns.has_key, prompt),
        is_exit: parse_flags(&patterns.is_exit, prompt),
    }
}

/// Whether the prompt carries the turn-zero marker of a fresh episode.
pub fn is_episode_start(prompt: &str) -> bool {
    parse_u32(&PATTERNS.turn, prompt) == Some(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PROMPT: &str = "You are solving a Rooms navigation puzzle. Current state (Move 4):\n\
        \n\
        Current Room: 3\n\
        Phase: Observation\n\
        Keys Held: 1\n\
        Steps Remaining: 26\n\
        \n\
        Room Status (1 means true and 0 means false):\n\
        Rooms Visited: [1, 1, 1, 1, 0, 0, 0, 0]\n\
        Rooms Inspected: [1, 1, 1, 1, 0, 0, 0, 0]\n\
        \n\
        Room Properties (1 means true and 0 means false for inspected rooms; -1 means unknown):\n\
        - Locked: [0, 1, 0, 0, -1, -1, -1, -1]\n\
        - Has Key: [1, 0, 0, 0, -1, -1, -1, -1]\n\
        - Is Exit: [0, 0, 0, 1, -1, -1, -1, -1]\n";

    fn flags(raw: [i64; ROOM_COUNT]) -> FlagVector {
        RoomTable::from_vec(raw.iter().map(|&v| Flag::from_raw(v).unwrap()).collect()).unwrap()
    }

    #[test]
    fn parses_every_field_of_host_template() {
        let parsed = parse_prompt(PROMPT);
        assert_eq!(parsed.turn, Some(4));
        assert_eq!(parsed.current_room, Some(3));
        assert_eq!(parsed.phase.as_deref(), Some("Observation"));
        assert_eq!(parsed.keys_held, Some(1));
        assert_eq!(parsed.steps_remaining, Some(26));
        assert_eq!(parsed.visited, Some(flags([1, 1, 1, 1, 0, 0, 0, 0])));
        assert_eq!(parsed.locked, Some(flags([0, 1, 0, 0, -1, -1, -1, -1])));
        assert_eq!(parsed.has_key, Some(flags([1, 0, 0, 0, -1, -1, -1, -1])));
        assert_eq!(parsed.is_exit, Some(flags([0, 0, 0, 1, -1, -1, -1, -1])));
    }

    #[test]
    fn empty_prompt_yields_no_fields() {
        assert_eq!(parse_prompt(""), ParsedPrompt::default());
    }

    #[test]
    fn wrong_length_list_is_ignored() {
        let parsed = parse_prompt("Rooms Visited: [1, 0, 0]\nIs Exit: [0, 0, 0, 0, 0, 0, 0, 0, 1]");
        assert_eq!(parsed.visited, None);
        assert_eq!(parsed.is_exit, None);
    }

    #[test]
    fn malformed_list_values_are_ignored() {
        let parsed = parse_prompt(
            "- Locked: [0, x, 0, 0, 0, 0, 0, 0]\n- Has Key: [0, 2, 0, 0, 0, 0, 0, 0]\n- Is Exit: []",
        );
        assert_eq!(parsed.locked, None);
        assert_eq!(parsed.has_key, None);
        assert_eq!(parsed.is_exit, None);
    }

    #[test]
    fn current_room_outside_universe_is_ignored() {
        assert_eq!(parse_prompt("Current Room: 8").current_room, None);
        assert_eq!(parse_prompt("Current Room: 99999999999999999999").current_room, None);
        assert_eq!(parse_prompt("Current Room: 7").current_room, Some(7));
    }

    #[test]
    fn labels_are_case_sensitive() {
        let parsed = parse_prompt("current room: 2\nphase: Execution");
        assert_eq!(parsed.current_room, None);
        assert_eq!(parsed.phase, None);
    }

    #[test]
    fn detects_turn_zero_marker() {
        assert!(is_episode_start("Current state (Move 0):"));
        assert!(!is_episode_start("Current state (Move 10):"));
        assert!(!is_episode_start("Current Room: 0"));
    }

    proptest! {
        #[test]
        fn arbitrary_text_never_panics(text in ".*") {
            let _ = parse_prompt(&text);
        }

        #[test]
        fn lists_of_other_lengths_are_rejected(values in prop::collection::vec(-1i64..=1, 0..16)) {
            prop_assume!(values.len() != ROOM_COUNT);
            let body = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
            let parsed = parse_prompt(&format!("Rooms Visited: [{body}]"));
            prop_assert_eq!(parsed.visited, None);
        }
    }
}
