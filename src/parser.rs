//! Map and problem file parsing.
//!
//! Map files name the map on the first line, then list locations and
//! connections, one per line:
//!
//! ```text
//! example
//! Saarbruecken:-1:(4923,700)
//! Paris:-1:(4886,235)
//! Saarbruecken-Paris:7200000
//! ```
//!
//! A capacity of `-1` marks a station, `0` a crossing, anything positive a
//! siding. Problem files repeat the map name and list one `origin->destination`
//! schedule per line.

use std::path::Path;

use regex::Regex;

use crate::map::{Capacity, Connection, Location, Map};
use crate::problem::Problem;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("could not read input file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {text:?} is not a valid line here")]
    BadLine { line: usize, text: String },
    #[error("the file must start with a name, {0:?} is not one")]
    BadName(String),
    #[error("location name {0:?} is declared twice")]
    DuplicateLocation(String),
    #[error("capacity {0} is out of range (-1 for stations, otherwise non-negative)")]
    BadCapacity(i64),
    #[error("travel time {0} is negative")]
    NegativeTime(i64),
    #[error("unknown location {0:?}")]
    UnknownLocation(String),
    #[error("the map is named {map:?} but the problem refers to {problem:?}")]
    NameMismatch { map: String, problem: String },
}

fn parse_name(lines: &mut std::iter::Enumerate<std::str::Lines<'_>>) -> Result<String, ParseError> {
    let name_re = Regex::new(r"^\w+$").unwrap();
    match lines.next() {
        Some((_, line)) if name_re.is_match(line) => Ok(line.to_string()),
        Some((_, line)) => Err(ParseError::BadName(line.to_string())),
        None => Err(ParseError::BadName(String::new())),
    }
}

pub fn parse_map(text: &str) -> Result<Map, ParseError> {
    let location_re =
        Regex::new(r"^(?P<name>\w+):(?P<capacity>[-+]?\d+):\((?P<x>[-+]?\d+),(?P<y>[-+]?\d+)\)$")
            .unwrap();
    let connection_re =
        Regex::new(r"^(?P<first>\w+)-(?P<second>\w+):(?P<time>[-+]?\d+)$").unwrap();

    let mut lines = text.lines().enumerate();
    let name = parse_name(&mut lines)?;

    let mut locations: Vec<Location> = Vec::new();
    let mut connections = Vec::new();
    let mut in_locations = true;

    for (index, line) in lines {
        if in_locations {
            if let Some(captures) = location_re.captures(line) {
                let name = captures["name"].to_string();
                if locations.iter().any(|l| l.name == name) {
                    return Err(ParseError::DuplicateLocation(name));
                }
                let capacity: i64 = captures["capacity"].parse().unwrap();
                let capacity =
                    Capacity::from_file_value(capacity).ok_or(ParseError::BadCapacity(capacity))?;
                locations.push(Location {
                    name,
                    capacity,
                    x: captures["x"].parse().unwrap(),
                    y: captures["y"].parse().unwrap(),
                });
                continue;
            }
            in_locations = false;
        }
        let captures = connection_re
            .captures(line)
            .ok_or_else(|| ParseError::BadLine { line: index + 1, text: line.to_string() })?;
        let find = |name: &str| {
            locations
                .iter()
                .position(|l| l.name == name)
                .map(crate::map::LocationId)
                .ok_or_else(|| ParseError::UnknownLocation(name.to_string()))
        };
        let first = find(&captures["first"])?;
        let second = find(&captures["second"])?;
        let time: i64 = captures["time"].parse().unwrap();
        if time < 0 {
            return Err(ParseError::NegativeTime(time));
        }
        connections.push(Connection { first, second, time: time as u64 });
    }

    Ok(Map::new(name, locations, connections))
}

pub fn parse_problem(text: &str, map: Map) -> Result<Problem, ParseError> {
    let schedule_re = Regex::new(r"^(?P<origin>\w+)->(?P<destination>\w+)$").unwrap();

    let mut lines = text.lines().enumerate();
    let name = parse_name(&mut lines)?;
    if name != map.name() {
        return Err(ParseError::NameMismatch { map: map.name().to_string(), problem: name });
    }

    let mut journeys = Vec::new();
    for (index, line) in lines {
        let captures = schedule_re
            .captures(line)
            .ok_or_else(|| ParseError::BadLine { line: index + 1, text: line.to_string() })?;
        let find = |name: &str| {
            map.location_by_name(name).ok_or_else(|| ParseError::UnknownLocation(name.to_string()))
        };
        journeys.push((find(&captures["origin"])?, find(&captures["destination"])?));
    }

    Ok(Problem::new(map, journeys))
}

/// Reads and parses a map file and a problem file into one [`Problem`].
pub fn parse_files(map_path: &Path, problem_path: &Path) -> Result<Problem, ParseError> {
    let map = parse_map(&std::fs::read_to_string(map_path)?)?;
    parse_problem(&std::fs::read_to_string(problem_path)?, map)
}
