use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use log::*;

use crate::map::{ConnectionId, LocationId, Map};
use crate::problem::TrainSchedule;
use crate::recorder::{Recorder, RecorderError};
use crate::reservation::Interlocking;
use crate::routing;

/// Unrecoverable failure of a single train. Never unwinds into other trains;
/// the driver aggregates these into overall simulation failure.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("no route from {from} to {to} even on the unrestricted network")]
    NoRoute { from: String, to: String },
    #[error("no free parking capacity anywhere along the route from {from}")]
    NoParking { from: String },
    #[error("route contains a connection that does not touch the train's location")]
    DetachedConnection,
    #[error(transparent)]
    Rejected(#[from] RecorderError),
}

/// One train working through its schedule: route, reserve, drive, repeat,
/// with the parking fallback when the whole network ahead is claimed.
pub struct Train<'a> {
    schedule: &'a TrainSchedule,
    map: &'a Map,
    interlocking: &'a Interlocking<'a>,
    recorder: &'a dyn Recorder,
    current: LocationId,
    parked: bool,
    /// Outstanding lock count; zero again whenever the train stands
    /// unparked, and at finish.
    held: usize,
}

impl<'a> Train<'a> {
    pub fn new(
        schedule: &'a TrainSchedule,
        map: &'a Map,
        interlocking: &'a Interlocking<'a>,
        recorder: &'a dyn Recorder,
    ) -> Train<'a> {
        Train {
            schedule,
            map,
            interlocking,
            recorder,
            current: schedule.origin,
            parked: false,
            held: 0,
        }
    }

    fn id(&self) -> usize {
        self.schedule.id
    }

    /// Runs the schedule to completion or to the first unrecoverable error.
    pub fn run(&mut self) -> Result<(), TrainError> {
        self.recorder.start(self.schedule)?;
        while self.current != self.schedule.destination {
            let direct = self.direct_route()?;
            match self.interlocking.try_reserve(&direct, self.current, self.id()) {
                None => {
                    self.note_reserved(&direct);
                    self.drive(&direct)?;
                }
                Some(conflict) => self.reroute_around(conflict)?,
            }
        }
        self.recorder.finish(self.schedule)?;
        debug_assert_eq!(self.held, 0, "train finished with outstanding locks");
        debug!("train {} finished at {}", self.id(), self.map.location_label(self.current));
        Ok(())
    }

    /// Retry loop after a failed reservation: grow the avoid-set by each
    /// conflicting resource and re-route around it until either a reservation
    /// succeeds or no route is left, in which case the train falls back to
    /// the nearest location with free parking capacity and waits for it.
    fn reroute_around(&mut self, first_conflict: crate::map::ResourceId) -> Result<(), TrainError> {
        let mut avoid = HashSet::new();
        avoid.insert(first_conflict);
        loop {
            match routing::route(self.map, self.current, self.schedule.destination, &avoid) {
                Some(alternative) => {
                    match self.interlocking.try_reserve(&alternative, self.current, self.id()) {
                        None => {
                            self.note_reserved(&alternative);
                            self.drive(&alternative)?;
                            return Ok(());
                        }
                        Some(conflict) => {
                            trace!(
                                "train {} avoiding {}",
                                self.id(),
                                self.map.resource_label(conflict)
                            );
                            avoid.insert(conflict);
                        }
                    }
                }
                None => {
                    // Everything towards the destination is claimed. Take the
                    // unrestricted route, cut it at the first location that
                    // still has parking capacity, and wait for that prefix.
                    let direct = self.direct_route()?;
                    let prefix = self.claim_nearest_parking(&direct)?;
                    debug!(
                        "train {} waiting for a {}-connection route to parking",
                        self.id(),
                        prefix.len()
                    );
                    self.interlocking.reserve_blocking(&prefix, self.current, self.id());
                    self.note_reserved(&prefix);
                    self.drive(&prefix)?;
                    return Ok(());
                }
            }
        }
    }

    fn direct_route(&self) -> Result<Vec<ConnectionId>, TrainError> {
        routing::route(self.map, self.current, self.schedule.destination, &HashSet::new())
            .ok_or_else(|| TrainError::NoRoute {
                from: self.map.location_label(self.current),
                to: self.map.location_label(self.schedule.destination),
            })
    }

    /// Walks `route` outward from the current location and claims one unit
    /// of parking capacity at the first location that has room. Returns the
    /// prefix of the route ending there. The destination is a station, so a
    /// full walk always ends in a claimable location; failure means the
    /// network is saturated beyond the schedule's reach.
    fn claim_nearest_parking(
        &self,
        route: &[ConnectionId],
    ) -> Result<Vec<ConnectionId>, TrainError> {
        let mut prefix = Vec::new();
        let mut at = self.current;
        for &connection in route {
            at = self
                .map
                .connection(connection)
                .other_end(at)
                .ok_or(TrainError::DetachedConnection)?;
            prefix.push(connection);
            if self.interlocking.try_park(at) {
                return Ok(prefix);
            }
        }
        Err(TrainError::NoParking { from: self.map.location_label(self.current) })
    }

    /// Account for a reservation that just succeeded: every connection plus
    /// every visited location, minus the current location's lock when the
    /// train was parked and already owned it.
    fn note_reserved(&mut self, route: &[ConnectionId]) {
        self.held += 2 * route.len() + 1;
        if self.parked {
            self.held -= 1;
        }
    }

    /// Drives a fully reserved route, releasing each resource as the train
    /// vacates it. Ends parked when the final location is not a station.
    fn drive(&mut self, route: &[ConnectionId]) -> Result<(), TrainError> {
        if self.parked {
            self.interlocking.unpark(self.current);
            self.recorder.resume(self.schedule, self.current)?;
            self.parked = false;
        }
        for &connection in route {
            self.recorder.leave(self.schedule, self.current)?;
            self.interlocking.release_location(self.current, self.id());
            self.held -= 1;

            self.recorder.travel(self.schedule, connection)?;
            let section = self.map.connection(connection);
            thread::sleep(Duration::from_millis(section.time));
            let next = section.other_end(self.current).ok_or(TrainError::DetachedConnection)?;

            self.recorder.arrive(self.schedule, next)?;
            self.current = next;
            self.interlocking.release_connection(connection, self.id());
            self.held -= 1;
        }
        if self.map.location(self.current).is_station() {
            self.interlocking.release_location(self.current, self.id());
            self.held -= 1;
        } else {
            // The exclusive lock and the parking unit stay held while parked;
            // both are given up when the train departs.
            self.recorder.pause(self.schedule, self.current)?;
            self.parked = true;
        }
        Ok(())
    }
}
