//! Loads a dataset from the database and reports how each sensor resolves.
//!
//! Usage: oceanval <config.toml> <dataset_id>

use oceanval::config::load_config;
use oceanval::{db, logging, ListRegistry};
use std::collections::HashSet;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: {} <config.toml> <dataset_id>", args[0]);
        return ExitCode::from(2);
    }

    match run(&args[1], &args[2]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str, dataset_arg: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    logging::init_from_config(&config.logging);

    let dataset_id: i64 = dataset_arg.parse()?;
    let assignments = config.sensor_assignments();
    let columns: Vec<_> = config.columns.iter().map(|c| c.column_id).collect();

    let mut client = db::connect()?;
    let store = Arc::new(db::load_dataset(&mut client, dataset_id, assignments)?);

    let mut registry =
        ListRegistry::with_config(store.clone(), columns.iter().copied(), config.resolution)?;
    let configured: HashSet<_> = columns.iter().copied().collect();
    registry.add_all(
        store
            .iter()
            .filter(|v| configured.contains(&v.column_id()))
            .cloned(),
    )?;

    for (_, list) in registry.iter_mut() {
        let mode = list.measurement_mode();
        let raw = list.raw_size();
        let name = list.sensor_type().name.clone();
        match list.values_size() {
            Ok(size) => println!("{}: {} readings, {}, {} values", name, raw, mode, size),
            Err(e) => println!("{}: {} readings, {}, not resolvable: {}", name, raw, mode, e),
        }
    }

    Ok(())
}
