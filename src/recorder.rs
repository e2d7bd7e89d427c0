use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use serde_json::json;

use crate::map::{ConnectionId, LocationId, Map};
use crate::problem::TrainSchedule;

/// Failure signaled by a recorder. Fatal to the train making the call; for
/// [`Recorder::done`], fatal to the whole run.
#[derive(Debug, Clone, thiserror::Error)]
#[error("recorder rejected {action}: {reason}")]
pub struct RecorderError {
    pub action: &'static str,
    pub reason: String,
}

impl RecorderError {
    pub fn new(action: &'static str, reason: impl Into<String>) -> RecorderError {
        RecorderError { action, reason: reason.into() }
    }
}

/// Receives every state transition a train makes. Calls arrive per train in
/// the order start, then any number of leave/travel/arrive and pause/resume,
/// then finish; calls from different trains interleave arbitrarily. The
/// driver calls `done` once after all trains have finished.
pub trait Recorder: Send + Sync {
    fn start(&self, schedule: &TrainSchedule) -> Result<(), RecorderError>;
    fn leave(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError>;
    fn travel(&self, schedule: &TrainSchedule, connection: ConnectionId)
        -> Result<(), RecorderError>;
    fn arrive(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError>;
    fn pause(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError>;
    fn resume(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError>;
    fn finish(&self, schedule: &TrainSchedule) -> Result<(), RecorderError>;
    fn done(&self) -> Result<(), RecorderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrainEvent {
    Start { train: usize },
    Leave { train: usize, location: LocationId },
    Travel { train: usize, connection: ConnectionId },
    Arrive { train: usize, location: LocationId },
    Pause { train: usize, location: LocationId },
    Resume { train: usize, location: LocationId },
    Finish { train: usize },
    Done,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct LogEntry {
    /// Milliseconds since the log was created.
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub event: TrainEvent,
}

impl LogEntry {
    pub fn describe(&self, map: &Map) -> String {
        let body = match self.event {
            TrainEvent::Start { train } => format!("train {} start", train),
            TrainEvent::Leave { train, location } => {
                format!("train {} leave {}", train, map.location_label(location))
            }
            TrainEvent::Travel { train, connection } => {
                format!("train {} travel {}", train, map.connection_label(connection))
            }
            TrainEvent::Arrive { train, location } => {
                format!("train {} arrive {}", train, map.location_label(location))
            }
            TrainEvent::Pause { train, location } => {
                format!("train {} pause {}", train, map.location_label(location))
            }
            TrainEvent::Resume { train, location } => {
                format!("train {} resume {}", train, map.location_label(location))
            }
            TrainEvent::Finish { train } => format!("train {} finish", train),
            TrainEvent::Done => "done".to_string(),
        };
        format!("[{:>6}ms] {}", self.timestamp_ms, body)
    }
}

/// Recorder that appends every call to a timestamped in-memory log, for
/// replaying a run or exporting it as JSON.
pub struct EventLog {
    epoch: Instant,
    entries: Mutex<Vec<LogEntry>>,
}

impl EventLog {
    pub fn new() -> EventLog {
        EventLog { epoch: Instant::now(), entries: Mutex::new(Vec::new()) }
    }

    fn push(&self, event: TrainEvent) {
        let timestamp_ms = self.epoch.elapsed().as_millis() as u64;
        self.entries.lock().unwrap().push(LogEntry { timestamp_ms, event });
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn write_json(&self, filename: &Path, map: &Map) -> std::io::Result<()> {
        std::fs::write(filename, serde_json::to_string_pretty(&self.log_json(map))?)?;
        Ok(())
    }

    fn log_json(&self, map: &Map) -> serde_json::Value {
        let events = self
            .entries()
            .iter()
            .map(|entry| {
                let mut value = serde_json::to_value(entry).unwrap();
                let resolved = match entry.event {
                    TrainEvent::Leave { location, .. }
                    | TrainEvent::Arrive { location, .. }
                    | TrainEvent::Pause { location, .. }
                    | TrainEvent::Resume { location, .. } => {
                        Some(map.location(location).name.clone())
                    }
                    TrainEvent::Travel { connection, .. } => {
                        Some(map.connection_label(connection))
                    }
                    _ => None,
                };
                if let Some(name) = resolved {
                    value["at"] = json!(name);
                }
                value
            })
            .collect::<Vec<_>>();
        json!({ "map": map.name(), "events": events })
    }
}

impl Default for EventLog {
    fn default() -> EventLog {
        EventLog::new()
    }
}

impl Recorder for EventLog {
    fn start(&self, schedule: &TrainSchedule) -> Result<(), RecorderError> {
        self.push(TrainEvent::Start { train: schedule.id });
        Ok(())
    }
    fn leave(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        self.push(TrainEvent::Leave { train: schedule.id, location });
        Ok(())
    }
    fn travel(
        &self,
        schedule: &TrainSchedule,
        connection: ConnectionId,
    ) -> Result<(), RecorderError> {
        self.push(TrainEvent::Travel { train: schedule.id, connection });
        Ok(())
    }
    fn arrive(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        self.push(TrainEvent::Arrive { train: schedule.id, location });
        Ok(())
    }
    fn pause(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        self.push(TrainEvent::Pause { train: schedule.id, location });
        Ok(())
    }
    fn resume(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        self.push(TrainEvent::Resume { train: schedule.id, location });
        Ok(())
    }
    fn finish(&self, schedule: &TrainSchedule) -> Result<(), RecorderError> {
        self.push(TrainEvent::Finish { train: schedule.id });
        Ok(())
    }
    fn done(&self) -> Result<(), RecorderError> {
        self.push(TrainEvent::Done);
        Ok(())
    }
}

/// Fans every call out to a list of recorders; the first rejection wins.
pub struct CatRecorder<'a> {
    recorders: Vec<&'a dyn Recorder>,
}

impl<'a> CatRecorder<'a> {
    pub fn new(recorders: Vec<&'a dyn Recorder>) -> CatRecorder<'a> {
        CatRecorder { recorders }
    }
}

impl<'a> Recorder for CatRecorder<'a> {
    fn start(&self, schedule: &TrainSchedule) -> Result<(), RecorderError> {
        self.recorders.iter().try_for_each(|r| r.start(schedule))
    }
    fn leave(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        self.recorders.iter().try_for_each(|r| r.leave(schedule, location))
    }
    fn travel(
        &self,
        schedule: &TrainSchedule,
        connection: ConnectionId,
    ) -> Result<(), RecorderError> {
        self.recorders.iter().try_for_each(|r| r.travel(schedule, connection))
    }
    fn arrive(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        self.recorders.iter().try_for_each(|r| r.arrive(schedule, location))
    }
    fn pause(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        self.recorders.iter().try_for_each(|r| r.pause(schedule, location))
    }
    fn resume(&self, schedule: &TrainSchedule, location: LocationId) -> Result<(), RecorderError> {
        self.recorders.iter().try_for_each(|r| r.resume(schedule, location))
    }
    fn finish(&self, schedule: &TrainSchedule) -> Result<(), RecorderError> {
        self.recorders.iter().try_for_each(|r| r.finish(schedule))
    }
    fn done(&self) -> Result<(), RecorderError> {
        self.recorders.iter().try_for_each(|r| r.done())
    }
}

/// Ignores everything. Useful for throughput runs and tests that only care
/// about the outcome.
pub struct NopRecorder;

impl Recorder for NopRecorder {
    fn start(&self, _schedule: &TrainSchedule) -> Result<(), RecorderError> {
        Ok(())
    }
    fn leave(&self, _schedule: &TrainSchedule, _location: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn travel(
        &self,
        _schedule: &TrainSchedule,
        _connection: ConnectionId,
    ) -> Result<(), RecorderError> {
        Ok(())
    }
    fn arrive(&self, _schedule: &TrainSchedule, _location: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn pause(&self, _schedule: &TrainSchedule, _location: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn resume(&self, _schedule: &TrainSchedule, _location: LocationId) -> Result<(), RecorderError> {
        Ok(())
    }
    fn finish(&self, _schedule: &TrainSchedule) -> Result<(), RecorderError> {
        Ok(())
    }
    fn done(&self) -> Result<(), RecorderError> {
        Ok(())
    }
}
