use std::collections::HashMap;
use log::*;

/// Dense handle of a location, its index into [`Map::locations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct LocationId(pub usize);

/// Dense handle of a connection, its index into [`Map::connections`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ConnectionId(pub usize);

/// Position of a resource in the single global lock order. Locations occupy
/// the low range, connections follow. Every train sorts by this id before
/// acquiring, which is what makes the locking protocol deadlock-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ResourceId(pub usize);

/// Parking capacity of a location. `Infinite` marks a station, `Bounded(0)`
/// a crossing (through-traffic only), `Bounded(k)` with `k > 0` a siding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Capacity {
    Infinite,
    Bounded(u32),
}

impl Capacity {
    /// Interprets the integer encoding of the input files: `-1` is infinite,
    /// non-negative values are taken literally, anything below `-1` is invalid.
    pub fn from_file_value(value: i64) -> Option<Capacity> {
        match value {
            -1 => Some(Capacity::Infinite),
            v if v >= 0 => Some(Capacity::Bounded(v as u32)),
            _ => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Capacity::Infinite)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Location {
    pub name: String,
    pub capacity: Capacity,
    pub x: i64,
    pub y: i64,
}

impl Location {
    pub fn is_station(&self) -> bool {
        self.capacity.is_infinite()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Connection {
    pub first: LocationId,
    pub second: LocationId,
    /// Travel time in milliseconds.
    pub time: u64,
}

impl Connection {
    /// The endpoint reached when entering from `from`, or `None` if the
    /// connection does not touch `from`. Connections are undirected; a
    /// train traverses them in whichever direction it arrives from.
    pub fn other_end(&self, from: LocationId) -> Option<LocationId> {
        if self.first == from {
            Some(self.second)
        } else if self.second == from {
            Some(self.first)
        } else {
            None
        }
    }
}

/// Static rail network: named locations and the undirected connections
/// between them. Holds topology and capacities only; where trains are and
/// who owns which resource lives in the interlocking, not here.
pub struct Map {
    name: String,
    locations: Vec<Location>,
    connections: Vec<Connection>,
    adjacency: Vec<Vec<(ConnectionId, LocationId)>>,
    by_name: HashMap<String, LocationId>,
}

impl Map {
    pub fn new(name: impl Into<String>, locations: Vec<Location>, connections: Vec<Connection>) -> Map {
        let mut adjacency = vec![Vec::new(); locations.len()];
        for (i, connection) in connections.iter().enumerate() {
            adjacency[connection.first.0].push((ConnectionId(i), connection.second));
            adjacency[connection.second.0].push((ConnectionId(i), connection.first));
        }
        let by_name = locations
            .iter()
            .enumerate()
            .map(|(i, l)| (l.name.clone(), LocationId(i)))
            .collect();
        let map = Map { name: name.into(), locations, connections, adjacency, by_name };
        trace!(
            "map {} with {} locations, {} connections",
            map.name,
            map.locations.len(),
            map.connections.len()
        );
        map
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn location(&self, id: LocationId) -> &Location {
        &self.locations[id.0]
    }

    pub fn connection(&self, id: ConnectionId) -> &Connection {
        &self.connections[id.0]
    }

    /// Connections incident to `location`, each paired with the far endpoint.
    pub fn neighbours(&self, location: LocationId) -> &[(ConnectionId, LocationId)] {
        &self.adjacency[location.0]
    }

    pub fn location_by_name(&self, name: &str) -> Option<LocationId> {
        self.by_name.get(name).copied()
    }

    pub fn location_resource(&self, id: LocationId) -> ResourceId {
        ResourceId(id.0)
    }

    pub fn connection_resource(&self, id: ConnectionId) -> ResourceId {
        ResourceId(self.locations.len() + id.0)
    }

    pub fn num_resources(&self) -> usize {
        self.locations.len() + self.connections.len()
    }

    pub fn location_label(&self, id: LocationId) -> String {
        let location = self.location(id);
        match location.capacity {
            Capacity::Infinite => location.name.clone(),
            Capacity::Bounded(k) => format!("{}({})", location.name, k),
        }
    }

    pub fn connection_label(&self, id: ConnectionId) -> String {
        let connection = self.connection(id);
        format!(
            "{}<-({})->{}",
            self.location_label(connection.first),
            connection.time,
            self.location_label(connection.second)
        )
    }

    /// Name of whatever resource `id` refers to, for diagnostics.
    pub fn resource_label(&self, id: ResourceId) -> String {
        if id.0 < self.locations.len() {
            self.location_label(LocationId(id.0))
        } else {
            self.connection_label(ConnectionId(id.0 - self.locations.len()))
        }
    }
}
