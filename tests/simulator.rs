use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use lockrail::map::{Capacity, Connection, ConnectionId, Location, LocationId, Map};
use lockrail::problem::{Problem, TrainSchedule};
use lockrail::recorder::{CatRecorder, EventLog, Recorder, RecorderError, TrainEvent};
use lockrail::simulation;
use lockrail::validation::Validator;

fn station(name: &str) -> Location {
    Location { name: name.into(), capacity: Capacity::Infinite, x: 0, y: 0 }
}

fn siding(name: &str, capacity: u32) -> Location {
    Location { name: name.into(), capacity: Capacity::Bounded(capacity), x: 0, y: 0 }
}

fn crossing(name: &str) -> Location {
    Location { name: name.into(), capacity: Capacity::Bounded(0), x: 0, y: 0 }
}

fn conn(a: usize, b: usize, time: u64) -> Connection {
    Connection { first: LocationId(a), second: LocationId(b), time }
}

/// Five stations in a row, A through E, one unit of travel time each.
fn chain_map(time: u64) -> Map {
    Map::new(
        "chain",
        vec![station("A"), station("B"), station("C"), station("D"), station("E")],
        vec![conn(0, 1, time), conn(1, 2, time), conn(2, 3, time), conn(3, 4, time)],
    )
}

fn run_validated(problem: &Problem) -> bool {
    let validator = Validator::new(problem);
    simulation::run(problem, &validator)
}

/// Counts pause and resume calls per location, nothing else.
#[derive(Default)]
struct ParkingCounter {
    pauses: Mutex<HashMap<LocationId, u32>>,
    resumes: Mutex<HashMap<LocationId, u32>>,
}

impl ParkingCounter {
    fn pause_calls(&self, location: LocationId) -> u32 {
        *self.pauses.lock().unwrap().get(&location).unwrap_or(&0)
    }
    fn resume_calls(&self, location: LocationId) -> u32 {
        *self.resumes.lock().unwrap().get(&location).unwrap_or(&0)
    }
}

impl Recorder for ParkingCounter {
    fn start(&self, _: &TrainSchedule) -> Result<(), RecorderError> {
        Ok(())
    }
    fn leave(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn travel(&self, _: &TrainSchedule, _: ConnectionId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn arrive(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn pause(&self, _: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        *self.pauses.lock().unwrap().entry(location).or_insert(0) += 1;
        Ok(())
    }
    fn resume(&self, _: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        *self.resumes.lock().unwrap().entry(location).or_insert(0) += 1;
        Ok(())
    }
    fn finish(&self, _: &TrainSchedule) -> Result<(), RecorderError> {
        Ok(())
    }
    fn done(&self) -> Result<(), RecorderError> {
        Ok(())
    }
}

/// Rejects every travel call.
struct ExceptionRecorder;

impl Recorder for ExceptionRecorder {
    fn start(&self, _: &TrainSchedule) -> Result<(), RecorderError> {
        Ok(())
    }
    fn leave(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn travel(&self, _: &TrainSchedule, _: ConnectionId) -> Result<(), RecorderError> {
        Err(RecorderError::new("travel", "rejected for testing"))
    }
    fn arrive(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn pause(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn resume(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn finish(&self, _: &TrainSchedule) -> Result<(), RecorderError> {
        Ok(())
    }
    fn done(&self) -> Result<(), RecorderError> {
        Ok(())
    }
}

/// Rejects everything except `done`, which it counts. An empty problem must
/// trigger nothing but a single `done`.
#[derive(Default)]
struct EmptyScheduleRecorder {
    done_called: AtomicBool,
    fail_done: bool,
}

impl Recorder for EmptyScheduleRecorder {
    fn start(&self, _: &TrainSchedule) -> Result<(), RecorderError> {
        Err(RecorderError::new("start", "nothing may start"))
    }
    fn leave(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Err(RecorderError::new("leave", "nothing may leave"))
    }
    fn travel(&self, _: &TrainSchedule, _: ConnectionId) -> Result<(), RecorderError> {
        Err(RecorderError::new("travel", "nothing may travel"))
    }
    fn arrive(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Err(RecorderError::new("arrive", "nothing may arrive"))
    }
    fn pause(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Err(RecorderError::new("pause", "nothing may pause"))
    }
    fn resume(&self, _: &TrainSchedule, _: LocationId) -> Result<(), RecorderError> {
        Err(RecorderError::new("resume", "nothing may resume"))
    }
    fn finish(&self, _: &TrainSchedule) -> Result<(), RecorderError> {
        Err(RecorderError::new("finish", "nothing may finish"))
    }
    fn done(&self) -> Result<(), RecorderError> {
        self.done_called.store(true, Ordering::SeqCst);
        if self.fail_done {
            Err(RecorderError::new("done", "rejected for testing"))
        } else {
            Ok(())
        }
    }
}

#[test]
fn single_train() {
    let problem = Problem::new(chain_map(1), vec![(LocationId(4), LocationId(0))]);
    assert!(run_validated(&problem));
}

#[test]
fn two_trains_same_schedule() {
    let problem = Problem::new(
        chain_map(1),
        vec![(LocationId(4), LocationId(0)), (LocationId(4), LocationId(0))],
    );
    assert!(run_validated(&problem));
}

#[test]
fn two_trains_opposing() {
    let problem = Problem::new(
        chain_map(1),
        vec![(LocationId(4), LocationId(0)), (LocationId(0), LocationId(4))],
    );
    assert!(run_validated(&problem));
}

#[test]
fn all_pairs_storm() {
    // Every ordered pair of the five chain stations gets a train.
    let mut journeys = Vec::new();
    for a in 0..5 {
        for b in 0..5 {
            if a != b {
                journeys.push((LocationId(a), LocationId(b)));
            }
        }
    }
    let problem = Problem::new(chain_map(1), journeys);
    assert!(run_validated(&problem));
}

#[test]
fn connection_listed_backwards() {
    // The last connection is stored as (D, C) but traversed C -> D.
    let map = Map::new(
        "m",
        vec![station("A"), crossing("B"), crossing("C"), station("D")],
        vec![conn(0, 1, 1), conn(1, 2, 1), conn(3, 2, 1)],
    );
    let problem = Problem::new(map, vec![(LocationId(0), LocationId(3)), (LocationId(0), LocationId(3))]);
    assert!(run_validated(&problem));
}

#[test]
fn rejected_recorder_call_fails_the_run() {
    let map = Map::new("m", vec![station("A"), station("B")], vec![conn(0, 1, 1)]);
    let problem = Problem::new(map, vec![(LocationId(0), LocationId(1))]);
    assert!(!simulation::run(&problem, &ExceptionRecorder));
}

#[test]
fn empty_problem_reports_done_once() {
    let map = Map::new("m", vec![], vec![]);
    let problem = Problem::new(map, vec![]);
    let recorder = EmptyScheduleRecorder::default();
    assert!(simulation::run(&problem, &recorder));
    assert!(recorder.done_called.load(Ordering::SeqCst));
}

#[test]
fn empty_problem_with_rejecting_done_fails() {
    let map = Map::new("m", vec![], vec![]);
    let problem = Problem::new(map, vec![]);
    let recorder = EmptyScheduleRecorder { fail_done: true, ..Default::default() };
    assert!(!simulation::run(&problem, &recorder));
}

#[test]
fn disjoint_trains_run_concurrently() {
    // Four unrelated 1000 ms hops; running them in sequence would take 4 s.
    let map = Map::new(
        "m",
        vec![
            station("A"), station("B"), station("C"), station("D"),
            station("E"), station("F"), station("G"), station("H"),
        ],
        vec![conn(0, 1, 1000), conn(2, 3, 1000), conn(4, 5, 1000), conn(6, 7, 1000)],
    );
    let problem = Problem::new(
        map,
        vec![
            (LocationId(0), LocationId(1)),
            (LocationId(2), LocationId(3)),
            (LocationId(4), LocationId(5)),
            (LocationId(6), LocationId(7)),
        ],
    );

    let start = Instant::now();
    assert!(run_validated(&problem));
    let elapsed = start.elapsed().as_millis();
    assert!((1000..2000).contains(&elapsed), "elapsed {}ms", elapsed);
}

#[test]
fn blocked_train_takes_the_alternative_route() {
    // Both trains prefer the fast path through crossing C; the loser must
    // take the 1500 ms detour through D instead of waiting 1001 ms twice.
    let map = Map::new(
        "m",
        vec![station("A"), station("B"), crossing("C"), crossing("D"), station("E"), station("F")],
        vec![
            conn(0, 2, 1000),
            conn(0, 3, 750),
            conn(1, 2, 1000),
            conn(1, 3, 750),
            conn(2, 4, 1),
            conn(2, 5, 1),
            conn(3, 4, 750),
            conn(3, 5, 750),
        ],
    );
    let problem =
        Problem::new(map, vec![(LocationId(0), LocationId(4)), (LocationId(1), LocationId(5))]);

    let start = Instant::now();
    assert!(run_validated(&problem));
    let elapsed = start.elapsed().as_millis();
    assert!((1500..2400).contains(&elapsed), "elapsed {}ms", elapsed);
}

#[test]
fn second_train_waits_for_the_shared_connection() {
    let map = Map::new(
        "m",
        vec![station("A"), station("B"), station("C")],
        vec![conn(0, 1, 1000), conn(1, 2, 750), conn(2, 1, 750)],
    );
    let problem =
        Problem::new(map, vec![(LocationId(0), LocationId(1)), (LocationId(0), LocationId(1))]);

    let start = Instant::now();
    assert!(run_validated(&problem));
    let elapsed = start.elapsed().as_millis();
    assert!((2000..3200).contains(&elapsed), "elapsed {}ms", elapsed);
}

#[test]
fn two_trains_through_station_chain() {
    // A --1000ms-- B --750ms-- C, both trains A -> C. The connections are
    // exclusive, so the second train enters A-B only once the first has
    // arrived at B: it finishes at the earliest after 2750 ms.
    let map = Map::new(
        "m",
        vec![station("A"), station("B"), station("C")],
        vec![conn(0, 1, 1000), conn(1, 2, 750)],
    );
    let problem =
        Problem::new(map, vec![(LocationId(0), LocationId(2)), (LocationId(0), LocationId(2))]);

    let start = Instant::now();
    assert!(run_validated(&problem));
    let elapsed = start.elapsed().as_millis();
    assert!((2750..3700).contains(&elapsed), "elapsed {}ms", elapsed);
}

#[test]
fn siding_parks_exactly_one_train() {
    // A --1000ms-- B(1) --1000ms-- C, both trains A -> C. The loser of the
    // full-route reservation parks at the siding B and follows.
    let map = Map::new(
        "m",
        vec![station("A"), siding("B", 1), station("C")],
        vec![conn(0, 1, 1000), conn(1, 2, 1000)],
    );
    let problem =
        Problem::new(map, vec![(LocationId(0), LocationId(2)), (LocationId(0), LocationId(2))]);

    let validator = Validator::new(&problem);
    let parking = ParkingCounter::default();
    let log = EventLog::new();
    let recorder = CatRecorder::new(vec![&validator, &parking, &log]);

    let start = Instant::now();
    assert!(simulation::run(&problem, &recorder));
    let elapsed = start.elapsed().as_millis();
    assert!((3000..3900).contains(&elapsed), "elapsed {}ms", elapsed);

    assert_eq!(parking.pause_calls(LocationId(1)), 1);
    assert_eq!(parking.resume_calls(LocationId(1)), 1);

    // The pausing train may only occupy B after the through train left it.
    let entries = log.entries();
    let pausing_train = entries
        .iter()
        .find_map(|e| match e.event {
            TrainEvent::Pause { train, .. } => Some(train),
            _ => None,
        })
        .unwrap();
    let winner_leaves_b = entries
        .iter()
        .position(|e| {
            e.event
                == TrainEvent::Leave { train: 1 - pausing_train, location: LocationId(1) }
        })
        .unwrap();
    let loser_arrives_b = entries
        .iter()
        .position(|e| {
            e.event == TrainEvent::Arrive { train: pausing_train, location: LocationId(1) }
        })
        .unwrap();
    assert!(winner_leaves_b < loser_arrives_b);
}

#[test]
fn crossings_are_transited_not_parked() {
    // The only stop between the stations is a crossing; the waiting train
    // must fall back to a prefix that ends at a station, never at X.
    let map = Map::new(
        "m",
        vec![station("A"), crossing("X"), station("B")],
        vec![conn(0, 1, 50), conn(1, 2, 50)],
    );
    let problem = Problem::new(
        map,
        vec![
            (LocationId(0), LocationId(2)),
            (LocationId(2), LocationId(0)),
            (LocationId(0), LocationId(2)),
        ],
    );

    let validator = Validator::new(&problem);
    let parking = ParkingCounter::default();
    let recorder = CatRecorder::new(vec![&validator, &parking]);
    assert!(simulation::run(&problem, &recorder));
    assert_eq!(parking.pause_calls(LocationId(1)), 0);
}

#[test]
fn sidings_chain_under_pressure() {
    // Three trains squeeze through two single-slot sidings, parking as the
    // ones ahead clear the track.
    let map = Map::new(
        "m",
        vec![station("A"), siding("B", 1), siding("C", 1), station("D")],
        vec![conn(0, 1, 50), conn(1, 2, 50), conn(2, 3, 50)],
    );
    let problem = Problem::new(
        map,
        vec![
            (LocationId(0), LocationId(3)),
            (LocationId(0), LocationId(3)),
            (LocationId(0), LocationId(3)),
        ],
    );
    assert!(run_validated(&problem));
}

#[test]
fn ring_contention_makes_progress() {
    // Four trains chase each other around a ring of four stations.
    let map = Map::new(
        "ring",
        vec![station("A"), station("B"), station("C"), station("D")],
        vec![conn(0, 1, 10), conn(1, 2, 10), conn(2, 3, 10), conn(3, 0, 10)],
    );
    let problem = Problem::new(
        map,
        vec![
            (LocationId(0), LocationId(2)),
            (LocationId(2), LocationId(0)),
            (LocationId(1), LocationId(3)),
            (LocationId(3), LocationId(1)),
        ],
    );
    assert!(run_validated(&problem));
}

#[test]
fn unreachable_destination_fails_cleanly() {
    let map = Map::new("m", vec![station("A"), station("B")], vec![]);
    let problem = Problem::new(map, vec![(LocationId(0), LocationId(1))]);
    let log = EventLog::new();
    assert!(!simulation::run(&problem, &log));
    // The train started but could never move or finish.
    let events: Vec<TrainEvent> = log.entries().iter().map(|e| e.event).collect();
    assert_eq!(events, vec![TrainEvent::Start { train: 0 }]);
}
