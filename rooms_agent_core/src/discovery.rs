use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::{
    ROOM_COUNT, RoomId, START_ROOM,
    map::{FlagVector, RoomMap},
};

/// Exploration bookkeeping for the observation phase.
///
/// The queue is FIFO and tolerates duplicates; stale entries are skipped when dequeued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontier {
    queue: VecDeque<RoomId>,
    explored: BTreeSet<RoomId>,
    seeded: bool,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    /// Starts with only the start room explored and nothing queued.
    pub fn new() -> Self {
        Frontier {
            queue: VecDeque::new(),
            explored: BTreeSet::from([START_ROOM]),
            seeded: false,
        }
    }

    /// Queues every unexplored room the first time it is called.
    pub fn seed_once(&mut self) {
        if !self.seeded {
            self.seeded = true;
            self.enqueue_unexplored();
        }
    }

    /// Appends every room not yet explored, in ascending order.
    pub fn enqueue_unexplored(&mut self) {
        for room in 0..ROOM_COUNT {
            if !self.explored.contains(&room) {
                self.queue.push_back(room);
            }
        }
    }

    /// Marks `room` explored. Returns `true` if it was not explored before.
    pub fn mark_explored(&mut self, room: RoomId) -> bool {
        self.explored.insert(room)
    }

    pub fn is_explored(&self, room: RoomId) -> bool {
        self.explored.contains(&room)
    }

    /// Pops candidates until one is neither explored nor flagged visited.
    pub fn next_candidate(&mut self, visited: &FlagVector) -> Option<RoomId> {
        while let Some(room) = self.queue.pop_front() {
            if !self.explored.contains(&room) && !visited.is_true(room) {
                return Some(room);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.queue.iter().copied()
    }

    pub fn explored(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.explored.iter().copied()
    }
}

/// Infers edges from a before/after pair of visited vectors.
///
/// Every room that went from not-visited to visited is joined to `prev_room`,
/// the room occupied before the update. A newly explored room re-seeds the
/// frontier with all rooms still unexplored. Returns the newly visited rooms.
pub fn record_transitions(
    adjacency: &mut RoomMap,
    frontier: &mut Frontier,
    prev_room: RoomId,
    before: &FlagVector,
    after: &FlagVector,
) -> Vec<RoomId> {
    let mut discovered = Vec::new();

    for room in 0..ROOM_COUNT {
        if !after.is_true(room) || before.is_true(room) || room == prev_room {
            continue;
        }

        if adjacency.add_edge(prev_room, room) {
            debug!(from = prev_room, to = room, "discovered edge");
        }
        discovered.push(room);

        if frontier.mark_explored(room) {
            frontier.enqueue_unexplored();
        }
    }

    discovered
}
