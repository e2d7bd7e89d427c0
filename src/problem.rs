use crate::map::{LocationId, Map};

/// Origin and destination of one train. Schedules are created once at
/// problem-load time and read-only afterwards; ids follow construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TrainSchedule {
    pub id: usize,
    pub origin: LocationId,
    pub destination: LocationId,
}

/// A map plus the train schedules to simulate on it.
pub struct Problem {
    map: Map,
    schedules: Vec<TrainSchedule>,
}

impl Problem {
    pub fn new(map: Map, journeys: Vec<(LocationId, LocationId)>) -> Problem {
        let schedules = journeys
            .into_iter()
            .enumerate()
            .map(|(id, (origin, destination))| TrainSchedule { id, origin, destination })
            .collect();
        Problem { map, schedules }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn schedules(&self) -> &[TrainSchedule] {
        &self.schedules
    }
}
