use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::map::{Capacity, ConnectionId, LocationId};
use crate::problem::{Problem, TrainSchedule};
use crate::recorder::{Recorder, RecorderError};

/// Recorder that checks the recorded actions for functional correctness and
/// rejects on the first inconsistency: trains must announce transitions in
/// order, a connection carries one train at a time, a non-station location
/// holds one standing train, travel takes at least the connection's time,
/// siding capacities are never exceeded, crossings never host a pause, and
/// every schedule starts and finishes exactly once between stations.
pub struct Validator<'a> {
    problem: &'a Problem,
    state: Mutex<State>,
}

struct State {
    to_start: Vec<(LocationId, LocationId)>,
    /// Remaining free parking units per non-station location.
    free_parking: HashMap<LocationId, u32>,
    started: HashSet<usize>,
    finished: HashSet<usize>,
    /// Trains standing at a location (arrived or started, not yet left).
    position: HashMap<usize, LocationId>,
    /// Trains that announced leave but not yet travel.
    leaving: HashMap<usize, LocationId>,
    /// Trains on a connection.
    travelling: HashMap<usize, ConnectionId>,
    /// The location each travelling train must arrive at next.
    arriving: HashMap<usize, LocationId>,
    /// Trains parked at a non-station location.
    pausing: HashMap<usize, LocationId>,
    /// Earliest permitted arrival per travelling train.
    eta: HashMap<usize, Instant>,
}

fn check(condition: bool, action: &'static str, reason: &str) -> Result<(), RecorderError> {
    if condition {
        Ok(())
    } else {
        Err(RecorderError::new(action, reason.to_string()))
    }
}

impl<'a> Validator<'a> {
    pub fn new(problem: &'a Problem) -> Validator<'a> {
        let free_parking = problem
            .map()
            .locations()
            .iter()
            .enumerate()
            .filter_map(|(i, location)| match location.capacity {
                Capacity::Infinite => None,
                Capacity::Bounded(k) => Some((LocationId(i), k)),
            })
            .collect();
        Validator {
            problem,
            state: Mutex::new(State {
                to_start: problem
                    .schedules()
                    .iter()
                    .map(|s| (s.origin, s.destination))
                    .collect(),
                free_parking,
                started: HashSet::new(),
                finished: HashSet::new(),
                position: HashMap::new(),
                leaving: HashMap::new(),
                travelling: HashMap::new(),
                arriving: HashMap::new(),
                pausing: HashMap::new(),
                eta: HashMap::new(),
            }),
        }
    }

    fn is_station(&self, location: LocationId) -> bool {
        self.problem.map().location(location).is_station()
    }
}

impl<'a> Recorder for Validator<'a> {
    fn start(&self, schedule: &TrainSchedule) -> Result<(), RecorderError> {
        let mut state = self.state.lock().unwrap();
        check(!state.started.contains(&schedule.id), "start", "train started twice")?;
        check(self.is_station(schedule.origin), "start", "origin is not a station")?;

        let slot = state
            .to_start
            .iter()
            .position(|&(origin, destination)| {
                origin == schedule.origin && destination == schedule.destination
            });
        match slot {
            Some(index) => {
                state.to_start.swap_remove(index);
            }
            None => return Err(RecorderError::new("start", "no such schedule left to start")),
        }

        state.started.insert(schedule.id);
        state.position.insert(schedule.id, schedule.origin);
        Ok(())
    }

    fn leave(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        let mut state = self.state.lock().unwrap();
        check(state.started.contains(&schedule.id), "leave", "train never started")?;
        check(
            state.position.get(&schedule.id) == Some(&location),
            "leave",
            "train left a location it was not standing at",
        )?;
        state.position.remove(&schedule.id);
        state.leaving.insert(schedule.id, location);
        Ok(())
    }

    fn travel(
        &self,
        schedule: &TrainSchedule,
        connection: ConnectionId,
    ) -> Result<(), RecorderError> {
        let mut state = self.state.lock().unwrap();
        check(state.started.contains(&schedule.id), "travel", "train never started")?;
        check(
            !state.travelling.values().any(|&c| c == connection),
            "travel",
            "connection already carries another train",
        )?;

        let left = match state.leaving.get(&schedule.id) {
            Some(&left) => left,
            None => return Err(RecorderError::new("travel", "travel without leave")),
        };
        let section = self.problem.map().connection(connection);
        let next = match section.other_end(left) {
            Some(next) => next,
            None => {
                return Err(RecorderError::new(
                    "travel",
                    "connection does not touch the left location",
                ))
            }
        };
        check(
            !state.arriving.values().any(|&l| l == next),
            "travel",
            "another train is already headed for that location",
        )?;

        state.leaving.remove(&schedule.id);
        state.arriving.insert(schedule.id, next);
        state.travelling.insert(schedule.id, connection);
        state
            .eta
            .insert(schedule.id, Instant::now() + Duration::from_millis(section.time));
        Ok(())
    }

    fn arrive(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        let mut state = self.state.lock().unwrap();
        check(state.started.contains(&schedule.id), "arrive", "train never started")?;
        check(
            state.arriving.get(&schedule.id) == Some(&location),
            "arrive",
            "arrived somewhere else than announced",
        )?;
        check(state.travelling.contains_key(&schedule.id), "arrive", "arrive without travel")?;
        check(
            self.is_station(location) || !state.position.values().any(|&l| l == location),
            "arrive",
            "another train is standing at this non-station location",
        )?;
        let eta = match state.eta.get(&schedule.id) {
            Some(&eta) => eta,
            None => return Err(RecorderError::new("arrive", "no travel in progress")),
        };
        check(eta <= Instant::now(), "arrive", "arrived faster than the connection allows")?;

        state.arriving.remove(&schedule.id);
        state.eta.remove(&schedule.id);
        state.travelling.remove(&schedule.id);
        state.position.insert(schedule.id, location);
        Ok(())
    }

    fn pause(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        let mut state = self.state.lock().unwrap();
        check(state.started.contains(&schedule.id), "pause", "train never started")?;
        check(
            state.position.get(&schedule.id) == Some(&location),
            "pause",
            "train paused at a location it is not standing at",
        )?;
        check(!self.is_station(location), "pause", "stations are never paused at")?;

        let free = match state.free_parking.get(&location) {
            Some(&free) => free,
            None => return Err(RecorderError::new("pause", "no capacity record")),
        };
        check(free > 0, "pause", "location is already parked to capacity")?;

        state.position.remove(&schedule.id);
        state.pausing.insert(schedule.id, location);
        state.free_parking.insert(location, free - 1);
        Ok(())
    }

    fn resume(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        let mut state = self.state.lock().unwrap();
        check(state.started.contains(&schedule.id), "resume", "train never started")?;
        check(
            state.pausing.get(&schedule.id) == Some(&location),
            "resume",
            "train resumed where it was not pausing",
        )?;
        check(!self.is_station(location), "resume", "stations are never resumed from")?;

        let capacity = match self.problem.map().location(location).capacity {
            Capacity::Bounded(k) => k,
            Capacity::Infinite => 0,
        };
        let free = state.free_parking.get(&location).copied().unwrap_or(0);
        check(free < capacity, "resume", "resume without a matching pause")?;

        state.pausing.remove(&schedule.id);
        state.position.insert(schedule.id, location);
        state.free_parking.insert(location, free + 1);
        Ok(())
    }

    fn finish(&self, schedule: &TrainSchedule) -> Result<(), RecorderError> {
        let mut state = self.state.lock().unwrap();
        check(state.started.contains(&schedule.id), "finish", "train never started")?;
        check(!state.finished.contains(&schedule.id), "finish", "train finished twice")?;
        check(!state.travelling.contains_key(&schedule.id), "finish", "still travelling")?;
        check(!state.leaving.contains_key(&schedule.id), "finish", "still leaving")?;
        check(!state.arriving.contains_key(&schedule.id), "finish", "still arriving")?;
        check(!state.eta.contains_key(&schedule.id), "finish", "still en route")?;
        check(
            state.position.get(&schedule.id) == Some(&schedule.destination),
            "finish",
            "finished away from the scheduled destination",
        )?;
        check(self.is_station(schedule.destination), "finish", "destination is not a station")?;

        state.finished.insert(schedule.id);
        Ok(())
    }

    fn done(&self) -> Result<(), RecorderError> {
        let state = self.state.lock().unwrap();
        check(
            state.finished.len() == self.problem.schedules().len(),
            "done",
            "not every schedule finished",
        )
    }
}
