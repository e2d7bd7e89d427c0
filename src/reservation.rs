use std::sync::{Condvar, Mutex};

use log::*;
use velcro::iter;

use crate::map::{Capacity, ConnectionId, LocationId, Map, ResourceId};

pub type TrainId = usize;

enum Acquire {
    /// The lock was free and now belongs to the caller.
    Taken,
    /// The caller already owned the lock (its parked location).
    AlreadyOwned,
    /// Another train owns the lock.
    Busy,
}

/// Exclusive lock on one resource. Remembers the owning train so a
/// reservation can skip resources the caller still holds from parking, and
/// wakes blocked acquirers on release instead of leaving them to poll.
struct ResourceLock {
    owner: Mutex<Option<TrainId>>,
    freed: Condvar,
}

impl ResourceLock {
    fn new() -> ResourceLock {
        ResourceLock { owner: Mutex::new(None), freed: Condvar::new() }
    }

    fn try_acquire(&self, train: TrainId) -> Acquire {
        let mut owner = self.owner.lock().unwrap();
        match *owner {
            None => {
                *owner = Some(train);
                Acquire::Taken
            }
            Some(t) if t == train => Acquire::AlreadyOwned,
            Some(_) => Acquire::Busy,
        }
    }

    fn acquire(&self, train: TrainId) {
        let mut owner = self.owner.lock().unwrap();
        loop {
            match *owner {
                None => {
                    *owner = Some(train);
                    return;
                }
                Some(t) if t == train => return,
                Some(_) => owner = self.freed.wait(owner).unwrap(),
            }
        }
    }

    fn release(&self, train: TrainId) {
        let mut owner = self.owner.lock().unwrap();
        assert_eq!(*owner, Some(train), "resource released by a train that does not own it");
        *owner = None;
        drop(owner);
        self.freed.notify_all();
    }

    fn owner(&self) -> Option<TrainId> {
        *self.owner.lock().unwrap()
    }
}

/// The reservation service. Owns one lock per resource of the map (locations
/// first, connections after, in the map's dense id order) and the parking
/// counters of the finite-capacity locations.
///
/// Reservations acquire every resource a route touches in ascending
/// [`ResourceId`] order. All trains share that total order, so no cycle of
/// waiting trains can form.
pub struct Interlocking<'a> {
    map: &'a Map,
    locks: Vec<ResourceLock>,
    parking: Vec<Mutex<u32>>,
}

impl<'a> Interlocking<'a> {
    pub fn new(map: &'a Map) -> Interlocking<'a> {
        Interlocking {
            map,
            locks: (0..map.num_resources()).map(|_| ResourceLock::new()).collect(),
            parking: map.locations().iter().map(|_| Mutex::new(0)).collect(),
        }
    }

    /// Every resource the route touches: each connection plus every location
    /// visited when following the route from `start`, sorted into the global
    /// acquisition order. Panics if the route does not chain from `start`;
    /// callers are expected to pass routes produced for `start`.
    fn route_resources(&self, route: &[ConnectionId], start: LocationId) -> Vec<ResourceId> {
        let mut visited = vec![start];
        let mut at = start;
        for &connection in route {
            at = self
                .map
                .connection(connection)
                .other_end(at)
                .expect("route does not chain from its start location");
            visited.push(at);
        }
        let mut resources: Vec<ResourceId> = iter![
            ..route.iter().map(|&c| self.map.connection_resource(c)),
            ..visited.iter().map(|&l| self.map.location_resource(l)),
        ]
        .collect();
        resources.sort_unstable();
        resources
    }

    /// All-or-nothing reservation. `None` means every resource on the route
    /// is now held by `train`; `Some(r)` means `r` was unavailable and
    /// nothing new is held. Never blocks.
    pub fn try_reserve(
        &self,
        route: &[ConnectionId],
        start: LocationId,
        train: TrainId,
    ) -> Option<ResourceId> {
        let resources = self.route_resources(route, start);
        let mut taken = Vec::with_capacity(resources.len());
        for &resource in &resources {
            match self.locks[resource.0].try_acquire(train) {
                Acquire::Taken => taken.push(resource),
                Acquire::AlreadyOwned => {}
                Acquire::Busy => {
                    for &held in &taken {
                        self.locks[held.0].release(train);
                    }
                    trace!(
                        "train {} reservation failed on {}",
                        train,
                        self.map.resource_label(resource)
                    );
                    return Some(resource);
                }
            }
        }
        trace!("train {} reserved {} resources", train, resources.len());
        None
    }

    /// Blocking variant for the parking fallback: acquires the same resource
    /// set in the same order, waiting at each lock until it frees up. Only
    /// safe against deadlock because every train waits in ascending id order.
    pub fn reserve_blocking(&self, route: &[ConnectionId], start: LocationId, train: TrainId) {
        let resources = self.route_resources(route, start);
        debug!(
            "train {} waiting to reserve {} resources towards parking",
            train,
            resources.len()
        );
        for &resource in &resources {
            self.locks[resource.0].acquire(train);
        }
    }

    /// Unlocks one location. Must be called exactly once per acquisition, by
    /// the owning train, when it vacates the location.
    pub fn release_location(&self, location: LocationId, train: TrainId) {
        self.locks[self.map.location_resource(location).0].release(train);
    }

    /// Unlocks one connection once the train has finished crossing it.
    pub fn release_connection(&self, connection: ConnectionId, train: TrainId) {
        self.locks[self.map.connection_resource(connection).0].release(train);
    }

    pub fn resource_owner(&self, resource: ResourceId) -> Option<TrainId> {
        self.locks[resource.0].owner()
    }

    /// Claims one unit of parking capacity. Stations always have room,
    /// crossings never do, sidings while below their capacity.
    pub fn try_park(&self, location: LocationId) -> bool {
        match self.map.location(location).capacity {
            Capacity::Infinite => true,
            Capacity::Bounded(0) => false,
            Capacity::Bounded(limit) => {
                let mut reserved = self.parking[location.0].lock().unwrap();
                if *reserved < limit {
                    *reserved += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Returns a previously claimed parking unit. No-op for stations.
    pub fn unpark(&self, location: LocationId) {
        if let Capacity::Bounded(_) = self.map.location(location).capacity {
            let mut reserved = self.parking[location.0].lock().unwrap();
            assert!(*reserved > 0, "parking released at a location with no parked trains");
            *reserved -= 1;
        }
    }

    pub fn reserved_parking(&self, location: LocationId) -> u32 {
        *self.parking[location.0].lock().unwrap()
    }
}
