use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::map::{ConnectionId, LocationId, Map, ResourceId};

#[derive(Debug, PartialEq, Eq)]
struct Visit {
    distance: u64,
    location: LocationId,
}

impl Ord for Visit {
    fn cmp(&self, other: &Visit) -> Ordering {
        // Flipped on purpose to turn the max-heap into a min-heap. Equal
        // distances compare by location id, lowest first, so routes are
        // deterministic for a fixed input file.
        other
            .distance
            .cmp(&self.distance)
            .then_with(|| other.location.cmp(&self.location))
    }
}

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Visit) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest-time route from `origin` to `destination`, excluding every
/// location and connection in `avoid`.
///
/// Returns an empty route when `origin == destination`, and `None` when
/// either end is avoided or the destination is unreachable in the filtered
/// subgraph. The result lists connections in travel order; each connection's
/// stored endpoint pair may face either way. Reads the map only, never
/// touches any lock.
pub fn route(
    map: &Map,
    origin: LocationId,
    destination: LocationId,
    avoid: &HashSet<ResourceId>,
) -> Option<Vec<ConnectionId>> {
    if avoid.contains(&map.location_resource(origin))
        || avoid.contains(&map.location_resource(destination))
    {
        return None;
    }
    if origin == destination {
        return Some(Vec::new());
    }

    let mut distance: Vec<Option<u64>> = vec![None; map.locations().len()];
    let mut reached_via: Vec<Option<(ConnectionId, LocationId)>> = vec![None; map.locations().len()];
    let mut settled = vec![false; map.locations().len()];
    let mut queue = BinaryHeap::new();

    distance[origin.0] = Some(0);
    queue.push(Visit { distance: 0, location: origin });

    while let Some(Visit { distance: d, location }) = queue.pop() {
        if settled[location.0] {
            continue;
        }
        settled[location.0] = true;
        if location == destination {
            break;
        }
        for &(connection, next) in map.neighbours(location) {
            if settled[next.0]
                || avoid.contains(&map.connection_resource(connection))
                || avoid.contains(&map.location_resource(next))
            {
                continue;
            }
            let via = d + map.connection(connection).time;
            if distance[next.0].map(|best| via < best).unwrap_or(true) {
                distance[next.0] = Some(via);
                reached_via[next.0] = Some((connection, location));
                queue.push(Visit { distance: via, location: next });
            }
        }
    }

    if !settled[destination.0] {
        return None;
    }

    let mut path = Vec::new();
    let mut at = destination;
    while at != origin {
        let (connection, prev) = reached_via[at.0].unwrap();
        path.push(connection);
        at = prev;
    }
    path.reverse();
    Some(path)
}
