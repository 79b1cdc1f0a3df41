use std::collections::{HashMap, VecDeque};

use crate::{
    RoomId, START_ROOM,
    map::{FlagVector, RoomMap},
};

/// Ordered rooms from a start room to a target, both inclusive. Empty means no path.
pub type Route = Vec<RoomId>;

/// Unweighted breadth-first search over the discovered adjacency.
///
/// Neighbours are expanded in enqueue order, so the first path found wins.
/// Returns an empty route when `goal` is unreachable.
pub fn shortest_path(map: &RoomMap, start: RoomId, goal: RoomId) -> Route {
    if start == goal {
        return vec![start];
    }

    let mut frontier = VecDeque::from([start]);
    let mut came_from: HashMap<RoomId, RoomId> = HashMap::new();
    let mut goal_reached = false;

    'search: while let Some(current) = frontier.pop_front() {
        for neighbor in map.neighbors(current) {
            if neighbor == start || came_from.contains_key(&neighbor) {
                continue;
            }
            came_from.insert(neighbor, current);
            if neighbor == goal {
                goal_reached = true;
                break 'search;
            }
            frontier.push_back(neighbor);
        }
    }

    if !goal_reached {
        return Vec::new();
    }

    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&previous) => {
                current = previous;
                path.push(current);
            }
            None => return Vec::new(),
        }
    }

    path.reverse();
    path
}

/// Rooms on `route` that are flagged locked, in route order.
pub fn locked_rooms_on(route: &[RoomId], locked: &FlagVector) -> Vec<RoomId> {
    route
        .iter()
        .copied()
        .filter(|&room| locked.is_true(room))
        .collect()
}

/// Plans the route the execution phase will replay.
///
/// Takes the direct shortest path to the exit unless a locked room sits on it
/// and the key lies off the path or after the first lock; then the route
/// detours through the key room.
pub fn plan_route(
    map: &RoomMap,
    locked: &FlagVector,
    exit_room: Option<RoomId>,
    key_room: Option<RoomId>,
) -> Route {
    let Some(exit) = exit_room else {
        return Vec::new();
    };

    let direct = shortest_path(map, START_ROOM, exit);
    if direct.is_empty() {
        return direct;
    }

    let Some(&first_lock) = locked_rooms_on(&direct, locked).first() else {
        return direct;
    };

    // No key known: walk the direct path anyway.
    let Some(key) = key_room else {
        return direct;
    };

    let lock_index = direct.iter().position(|&room| room == first_lock);
    let key_index = direct.iter().position(|&room| room == key);
    if let (Some(key_index), Some(lock_index)) = (key_index, lock_index) {
        if key_index < lock_index {
            return direct;
        }
    }

    let to_key = shortest_path(map, START_ROOM, key);
    let from_key = shortest_path(map, key, exit);
    if to_key.is_empty() || from_key.is_empty() {
        return direct;
    }

    let mut detour = to_key;
    detour.extend(from_key.into_iter().skip(1));
    detour
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Flag, ROOM_COUNT, map::RoomTable};
    use proptest::prelude::*;

    fn graph(edges: &[(RoomId, RoomId)]) -> RoomMap {
        let mut map = RoomMap::new();
        for &(a, b) in edges {
            map.add_edge(a, b);
        }
        map
    }

    fn locked(rooms: &[RoomId]) -> FlagVector {
        RoomTable::from_generator(|room| Flag::from_bool(rooms.contains(&room)))
    }

    #[test]
    fn path_to_self_is_single_room() {
        assert_eq!(shortest_path(&RoomMap::new(), 3, 3), vec![3]);
    }

    #[test]
    fn finds_shortest_of_two_routes() {
        let map = graph(&[(0, 1), (1, 2), (2, 3), (0, 4), (4, 3)]);
        assert_eq!(shortest_path(&map, 0, 3), vec![0, 4, 3]);
    }

    #[test]
    fn ties_follow_expansion_order() {
        let map = graph(&[(0, 2), (0, 1), (1, 3), (2, 3)]);
        assert_eq!(shortest_path(&map, 0, 3), vec![0, 1, 3]);
    }

    #[test]
    fn unreachable_goal_yields_empty_route() {
        let map = graph(&[(0, 1), (2, 3)]);
        assert!(shortest_path(&map, 0, 3).is_empty());
    }

    #[test]
    fn no_exit_means_no_route() {
        let map = graph(&[(0, 1)]);
        assert!(plan_route(&map, &locked(&[]), None, None).is_empty());
    }

    #[test]
    fn unlocked_route_is_direct() {
        let map = graph(&[(0, 1), (1, 2)]);
        assert_eq!(plan_route(&map, &locked(&[]), Some(2), None), vec![0, 1, 2]);
    }

    #[test]
    fn key_before_lock_keeps_direct_route() {
        let map = graph(&[(0, 1), (1, 2), (2, 3)]);
        let route = plan_route(&map, &locked(&[2]), Some(3), Some(1));
        assert_eq!(route, vec![0, 1, 2, 3]);
    }

    #[test]
    fn key_off_route_forces_detour() {
        // 0 - 1 - 2(exit), key hangs off room 0 at room 3.
        let map = graph(&[(0, 1), (1, 2), (0, 3)]);
        let route = plan_route(&map, &locked(&[1]), Some(2), Some(3));
        assert_eq!(route, vec![0, 3, 0, 1, 2]);
    }

    #[test]
    fn key_beyond_exit_detours_back() {
        let map = graph(&[(0, 1), (1, 2), (2, 3)]);
        let route = plan_route(&map, &locked(&[1]), Some(2), Some(3));
        assert_eq!(route, vec![0, 1, 2, 3, 2]);
    }

    #[test]
    fn lock_without_known_key_walks_direct_path() {
        let map = graph(&[(0, 1), (1, 2)]);
        assert_eq!(plan_route(&map, &locked(&[1]), Some(2), None), vec![0, 1, 2]);
    }

    #[test]
    fn unreachable_key_falls_back_to_direct_path() {
        let map = graph(&[(0, 1), (1, 2)]);
        assert_eq!(plan_route(&map, &locked(&[1]), Some(2), Some(5)), vec![0, 1, 2]);
    }

    fn arb_edges() -> impl Strategy<Value = Vec<(RoomId, RoomId)>> {
        prop::collection::vec((0..ROOM_COUNT, 0..ROOM_COUNT), 0..16)
    }

    proptest! {
        #[test]
        fn reachability_is_symmetric(edges in arb_edges(), a in 0..ROOM_COUNT, b in 0..ROOM_COUNT) {
            let map = graph(&edges);
            let forward = shortest_path(&map, a, b);
            let backward = shortest_path(&map, b, a);
            prop_assert_eq!(forward.is_empty(), backward.is_empty());
            prop_assert_eq!(forward.len(), backward.len());
        }

        #[test]
        fn found_paths_walk_existing_edges(edges in arb_edges(), goal in 0..ROOM_COUNT) {
            let map = graph(&edges);
            let path = shortest_path(&map, START_ROOM, goal);
            if let (Some(first), Some(last)) = (path.first(), path.last()) {
                prop_assert_eq!(*first, START_ROOM);
                prop_assert_eq!(*last, goal);
                for step in path.windows(2) {
                    prop_assert!(map.contains_edge(step[0], step[1]));
                }
            }
        }
    }
}
