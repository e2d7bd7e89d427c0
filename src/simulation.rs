use log::*;

use crate::problem::Problem;
use crate::recorder::Recorder;
use crate::reservation::Interlocking;
use crate::train::Train;

/// Runs the whole problem: one thread per schedule, all started together,
/// joined at the end. Returns true iff every train reached its destination
/// and no recorder call was rejected. `done` is called exactly once, also
/// for the empty problem; a failed run is reported without it.
pub fn run(problem: &Problem, recorder: &dyn Recorder) -> bool {
    let interlocking = Interlocking::new(problem.map());
    let mut failed = false;

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for schedule in problem.schedules() {
            let interlocking = &interlocking;
            handles.push(scope.spawn(move || {
                Train::new(schedule, problem.map(), interlocking, recorder).run()
            }));
        }
        for (schedule, handle) in problem.schedules().iter().zip(handles) {
            match handle.join() {
                Ok(Ok(())) => trace!("train {} joined", schedule.id),
                Ok(Err(e)) => {
                    warn!("train {} failed: {}", schedule.id, e);
                    failed = true;
                }
                Err(_) => {
                    error!("train {} panicked", schedule.id);
                    failed = true;
                }
            }
        }
    });

    if failed {
        return false;
    }
    if let Err(e) = recorder.done() {
        warn!("simulation rejected at done: {}", e);
        return false;
    }
    true
}
