//! Concurrent railway simulation with deadlock-free track locking.
//!
//! Every track connection and every stopping point on the map is an exclusive
//! resource. One thread drives each train: it computes a shortest route,
//! reserves every resource on it atomically in a fixed global order, travels,
//! and releases resources as it vacates them. When no full route can be
//! reserved the train falls back to the nearest location with free parking
//! capacity and waits there.

pub mod map;
pub mod parser;
pub mod problem;
pub mod recorder;
pub mod reservation;
pub mod routing;
pub mod simulation;
pub mod tikz;
pub mod train;
pub mod validation;
