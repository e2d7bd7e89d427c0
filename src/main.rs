use log::*;

use std::path::PathBuf;
use structopt::StructOpt;

use lockrail::parser;
use lockrail::recorder::{CatRecorder, EventLog, Recorder};
use lockrail::simulation;
use lockrail::tikz;
use lockrail::validation::Validator;

#[derive(Debug, StructOpt)]
#[structopt(name = "lockrail", about = "Concurrent railway simulator with exclusive track locking.")]
struct Opt {
    /// Map file
    #[structopt(name = "MAP")]
    #[structopt(parse(from_os_str))]
    map: PathBuf,

    /// Problem file with the train schedules to simulate
    #[structopt(name = "PROBLEM")]
    #[structopt(parse(from_os_str))]
    problem: PathBuf,

    /// Write the event log as JSON
    #[structopt(short, long)]
    #[structopt(parse(from_os_str))]
    json: Option<PathBuf>,

    /// Export the map as a TikZ document instead of simulating
    #[structopt(long)]
    #[structopt(parse(from_os_str))]
    tikz: Option<PathBuf>,

    /// Run without the validating recorder
    #[structopt(long)]
    no_validate: bool,

    /// Activate debug mode
    #[structopt(short, long)]
    verbose: bool,
}

fn main() {
    let _h1 = hprof::enter("init");

    let opt = Opt::from_args();
    let level = if opt.verbose {
        if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    } else {
        LevelFilter::Error
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .unwrap();
    info!("{:#?}", opt);
    drop(_h1);

    let problem = {
        let _h = hprof::enter("parse");
        match parser::parse_files(&opt.map, &opt.problem) {
            Ok(problem) => problem,
            Err(e) => {
                error!("{}", e);
                eprintln!("Error: {}", e);
                std::process::exit(2);
            }
        }
    };
    info!(
        "Simulating {} trains on {} ({} locations, {} connections)",
        problem.schedules().len(),
        problem.map().name(),
        problem.map().locations().len(),
        problem.map().connections().len()
    );

    if let Some(tex) = opt.tikz {
        std::fs::write(&tex, tikz::tikz_map(problem.map())).unwrap();
        info!("Wrote TikZ map to {}", tex.to_str().unwrap());
        return;
    }

    let ok = {
        let _h = hprof::enter("simulate");

        let log = EventLog::new();
        let validator = Validator::new(&problem);
        let mut recorders: Vec<&dyn Recorder> = vec![&log];
        if !opt.no_validate {
            recorders.push(&validator);
        }
        let recorder = CatRecorder::new(recorders);

        let ok = simulation::run(&problem, &recorder);

        for entry in log.entries() {
            println!("{}", entry.describe(problem.map()));
        }
        if let Some(json) = opt.json {
            log.write_json(&json, problem.map()).unwrap();
            info!("Wrote event log to {}", json.to_str().unwrap());
        }
        ok
    };

    hprof::end_frame();
    hprof::profiler().print_timing();

    if ok {
        info!("All trains reached their destinations.");
    } else {
        println!("Simulation failed.");
        std::process::exit(1);
    }
}
