use std::collections::BTreeSet;

use rand::{
    Rng, SeedableRng,
    rngs::StdRng,
    seq::{IndexedRandom, SliceRandom},
};
use serde::{Deserialize, Serialize};

use crate::{
    ROOM_COUNT, RoomId, START_ROOM,
    environment::{DEFAULT_STEP_BUDGET, RoomLayout},
    map::RoomMap,
    planner::shortest_path,
};

/// Puzzle families the generator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// Three rooms in a line, exit at the far end.
    Tutorial,
    /// A shuffled chain over 3..=8 rooms, sometimes with one lock and its key.
    Easy,
    /// A random tree over 3..=8 rooms, sometimes with one lock. Its key may sit
    /// off the exit route, anywhere reachable without passing the lock.
    Random,
}

impl Difficulty {
    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Tutorial => "tutorial",
            Difficulty::Easy => "easy",
            Difficulty::Random => "random",
        }
    }
}

/// Generates a layout deterministically from `seed`.
pub fn generate_layout(difficulty: Difficulty, seed: u64) -> RoomLayout {
    let mut rng = StdRng::seed_from_u64(seed);

    match difficulty {
        Difficulty::Tutorial => {
            let mut edges = RoomMap::new();
            edges.add_edge(0, 1);
            edges.add_edge(1, 2);
            RoomLayout {
                room_count: 3,
                edges,
                locked: BTreeSet::new(),
                keys: BTreeSet::new(),
                exit: 2,
                step_budget: DEFAULT_STEP_BUDGET,
            }
        }
        Difficulty::Easy => {
            let room_count = rng.random_range(3..=ROOM_COUNT);
            let mut order: Vec<RoomId> = (1..room_count).collect();
            order.shuffle(&mut rng);
            order.insert(0, START_ROOM);

            let mut edges = RoomMap::new();
            for pair in order.windows(2) {
                edges.add_edge(pair[0], pair[1]);
            }
            finish_layout(&mut rng, room_count, edges, false)
        }
        Difficulty::Random => {
            let room_count = rng.random_range(3..=ROOM_COUNT);
            let mut edges = RoomMap::new();
            for room in 1..room_count {
                let parent = rng.random_range(0..room);
                edges.add_edge(parent, room);
            }
            finish_layout(&mut rng, room_count, edges, true)
        }
    }
}

/// Places the exit at the room farthest from the start, then maybe a lock on the way there.
///
/// The key goes before the lock on the exit route, or with `key_off_route` anywhere the
/// start reaches without entering the locked room.
fn finish_layout(
    rng: &mut StdRng,
    room_count: usize,
    edges: RoomMap,
    key_off_route: bool,
) -> RoomLayout {
    let route = (0..room_count)
        .map(|room| shortest_path(&edges, START_ROOM, room))
        .max_by_key(|path| path.len())
        .unwrap_or_else(|| vec![START_ROOM]);
    let exit = route.last().copied().unwrap_or(START_ROOM);

    let mut locked = BTreeSet::new();
    let mut keys = BTreeSet::new();
    if route.len() >= 2 && rng.random_bool(0.5) {
        let lock = route[rng.random_range(1..route.len())];
        let candidates: Vec<RoomId> = if key_off_route {
            (0..room_count)
                .filter(|&room| !shortest_path(&edges, START_ROOM, room).contains(&lock))
                .collect()
        } else {
            route.iter().copied().take_while(|&room| room != lock).collect()
        };
        if let Some(&key) = candidates.choose(rng) {
            locked.insert(lock);
            keys.insert(key);
        }
    }

    RoomLayout {
        room_count,
        edges,
        locked,
        keys,
        exit,
        step_budget: (room_count * room_count * 2) as u32 + DEFAULT_STEP_BUDGET,
    }
}
