use std::{
    collections::{BTreeMap, BTreeSet},
    ops::{Index, IndexMut},
};

use serde::{Deserialize, Serialize};

use crate::{Flag, ROOM_COUNT, RoomId};

/// Represents errors that can occur within per-room table operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room {room} is out of range for a table of {count} rooms")]
    OutOfRange { room: RoomId, count: usize },
}

/// A fixed-size table holding one value per room.
///
/// Always holds exactly `ROOM_COUNT` cells, indexed by `RoomId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomTable<T> {
    cells: Vec<T>,
}

/// One tri-state flag per room.
pub type FlagVector = RoomTable<Flag>;

impl<T> RoomTable<T> {
    /// Creates a table where every room holds `value`.
    pub fn filled(value: T) -> Self
    where
        T: Clone,
    {
        RoomTable {
            cells: vec![value; ROOM_COUNT],
        }
    }

    /// Creates a table filled by a generator function.
    ///
    /// The generator function `f` takes a room id and returns the value for that room.
    pub fn from_generator<F>(f: F) -> Self
    where
        F: FnMut(RoomId) -> T,
    {
        RoomTable {
            cells: (0..ROOM_COUNT).map(f).collect(),
        }
    }

    /// Wraps a vector of per-room values.
    ///
    /// Returns `None` unless the vector holds exactly `ROOM_COUNT` values.
    pub fn from_vec(cells: Vec<T>) -> Option<Self> {
        (cells.len() == ROOM_COUNT).then_some(RoomTable { cells })
    }

    /// Returns the number of rooms in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Checks if the given room id lies inside the table.
    #[inline]
    pub fn is_valid(&self, room: RoomId) -> bool {
        room < self.cells.len()
    }

    /// Gets an immutable reference to the value for `room`.
    ///
    /// Returns `None` if the room is out of range.
    pub fn get(&self, room: RoomId) -> Option<&T> {
        self.cells.get(room)
    }

    /// Gets a mutable reference to the value for `room`.
    ///
    /// Returns `None` if the room is out of range.
    pub fn get_mut(&mut self, room: RoomId) -> Option<&mut T> {
        self.cells.get_mut(room)
    }

    /// Like `get`, but reports an out-of-range room as an error.
    pub fn try_get(&self, room: RoomId) -> Result<&T, RoomError> {
        self.cells.get(room).ok_or(RoomError::OutOfRange {
            room,
            count: self.cells.len(),
        })
    }

    /// Sets the value for `room`.
    ///
    /// Returns `Err(RoomError::OutOfRange)` if the room id is invalid.
    pub fn set(&mut self, room: RoomId, value: T) -> Result<(), RoomError> {
        let count = self.cells.len();
        let cell = self
            .cells
            .get_mut(room)
            .ok_or(RoomError::OutOfRange { room, count })?;
        *cell = value;
        Ok(())
    }

    /// Returns an iterator over the values in room order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    /// Returns an iterator that yields `(room, &T)` for each room.
    pub fn enumerate(&self) -> impl Iterator<Item = (RoomId, &T)> {
        self.cells.iter().enumerate()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }
}

impl<T: Default + Clone> Default for RoomTable<T> {
    fn default() -> Self {
        RoomTable::filled(T::default())
    }
}

impl RoomTable<Flag> {
    /// Returns the first room whose flag is set.
    pub fn first_true(&self) -> Option<RoomId> {
        self.cells.iter().position(|flag| flag.is_true())
    }

    /// Whether `room` is flagged true. Out-of-range rooms read as false.
    pub fn is_true(&self, room: RoomId) -> bool {
        self.get(room).is_some_and(|flag| flag.is_true())
    }

    /// The host's integer encoding of every flag.
    pub fn to_raw(&self) -> Vec<i8> {
        self.cells.iter().map(|flag| flag.as_raw()).collect()
    }
}

impl<T> Index<RoomId> for RoomTable<T> {
    type Output = T;

    #[inline]
    fn index(&self, room: RoomId) -> &Self::Output {
        match self.cells.get(room) {
            Some(cell) => cell,
            None => panic!(
                "Room {} out of range for table of {} rooms",
                room,
                self.cells.len()
            ),
        }
    }
}

impl<T> IndexMut<RoomId> for RoomTable<T> {
    #[inline]
    fn index_mut(&mut self, room: RoomId) -> &mut Self::Output {
        let count = self.cells.len();
        match self.cells.get_mut(room) {
            Some(cell) => cell,
            None => panic!("Room {} out of range for table of {} rooms", room, count),
        }
    }
}

/// Undirected adjacency between rooms.
///
/// Adding edge `(a, b)` always adds `(b, a)`. Edges are never removed.
/// Neighbours iterate in ascending room order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMap {
    neighbors: BTreeMap<RoomId, BTreeSet<RoomId>>,
}

impl RoomMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an undirected edge. Returns `true` if the edge was new.
    pub fn add_edge(&mut self, a: RoomId, b: RoomId) -> bool {
        let added = self.neighbors.entry(a).or_default().insert(b);
        self.neighbors.entry(b).or_default().insert(a);
        added
    }

    pub fn contains_edge(&self, a: RoomId, b: RoomId) -> bool {
        self.neighbors.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// Returns the neighbours of `room` in ascending order.
    pub fn neighbors(&self, room: RoomId) -> impl Iterator<Item = RoomId> + '_ {
        self.neighbors.get(&room).into_iter().flatten().copied()
    }

    /// Rooms that touch at least one edge.
    pub fn rooms(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.neighbors.keys().copied()
    }

    /// Each undirected edge once, as `(low, high)`.
    pub fn edges(&self) -> impl Iterator<Item = (RoomId, RoomId)> + '_ {
        self.neighbors
            .iter()
            .flat_map(|(&a, set)| set.iter().filter(move |&&b| a <= b).map(move |&b| (a, b)))
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_requires_exact_room_count() {
        assert!(RoomTable::from_vec(vec![Flag::Unknown; ROOM_COUNT]).is_some());
        assert!(RoomTable::from_vec(vec![Flag::Unknown; ROOM_COUNT - 1]).is_none());
        assert!(RoomTable::from_vec(vec![Flag::Unknown; ROOM_COUNT + 1]).is_none());
    }

    #[test]
    fn set_out_of_range_reports_error() {
        let mut table: RoomTable<bool> = RoomTable::default();
        assert_eq!(
            table.set(ROOM_COUNT, true),
            Err(RoomError::OutOfRange {
                room: ROOM_COUNT,
                count: ROOM_COUNT
            })
        );
        assert!(table.set(3, true).is_ok());
        assert!(table[3]);
    }

    #[test]
    fn first_true_picks_lowest_room() {
        let flags = RoomTable::from_generator(|room| Flag::from_bool(room == 4 || room == 6));
        assert_eq!(flags.first_true(), Some(4));
        assert_eq!(FlagVector::default().first_true(), None);
    }

    #[test]
    fn edges_are_symmetric() {
        let mut map = RoomMap::new();
        assert!(map.add_edge(0, 1));
        assert!(!map.add_edge(1, 0));
        map.add_edge(1, 2);
        assert!(map.contains_edge(1, 0));
        assert!(map.contains_edge(2, 1));
        assert_eq!(map.neighbors(1).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(map.edges().collect::<Vec<_>>(), vec![(0, 1), (1, 2)]);
        assert_eq!(map.edge_count(), 2);
    }
}
