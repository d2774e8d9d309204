use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use rayon::prelude::*;

extern crate envelope_sim_core;
use envelope_sim_core::prelude::*;

/// Runs train envelope simulations.
/// After running `cargo build --release`, run with
/// ```bash
/// ./target/release/envelope-sim-cli --scenario-file demos/flat_mareco.yaml
/// ```
/// Several scenario files run in parallel and produce one summary line each.
/// The points of the final envelope of a single scenario can be exported with
/// ```bash
/// ./target/release/envelope-sim-cli --scenario-file demos/flat_mareco.yaml --points-file points.csv
/// ```
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct EnvelopeSimApi {
    /// Path to a scenario file (yaml or json), may be repeated
    #[clap(long, value_parser, required = true)]
    scenario_file: Vec<PathBuf>,
    /// How to print results
    #[clap(long, value_enum, default_value = "text")]
    res_fmt: ResultFormat,
    /// Writes the `time,position,speed` points of the final envelope as csv
    #[clap(long, value_parser)]
    points_file: Option<PathBuf>,
    /// Writes all computed envelopes (yaml or json, by extension)
    #[clap(long, value_parser)]
    envelope_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ResultFormat {
    Text,
    Json,
    Csv,
}

/// Name of the scenario, or the stem of its file when it has none
fn scenario_name(scenario: &Scenario, path: &Path) -> String {
    if !scenario.name.is_empty() {
        return scenario.name.clone();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn run_file(path: &Path) -> anyhow::Result<(ScenarioSummary, ScenarioOutput)> {
    let scenario = Scenario::from_file(path)
        .with_context(|| format!("Could not load scenario file {path:?}"))?;
    let name = scenario_name(&scenario, path);
    debug!("running scenario {name:?} from {path:?}");
    let output = scenario.run()?;
    let summary = output.summary(&name);
    info!(
        "scenario {name:?}: {:.1} s over {:.0} m",
        summary.total_time, summary.distance
    );
    Ok((summary, output))
}

fn print_summaries(summaries: &[ScenarioSummary], res_fmt: ResultFormat) -> anyhow::Result<()> {
    match res_fmt {
        ResultFormat::Text => {
            for summary in summaries {
                let target = summary
                    .target_time
                    .map_or_else(|| "-".to_string(), |time| format!("{time:.1}"));
                println!(
                    "{}: distance {:.0} m, base time {:.1} s, target time {} s, total time {:.1} s, max speed {:.2} m/s",
                    summary.name,
                    summary.distance,
                    summary.base_time,
                    target,
                    summary.total_time,
                    summary.max_speed
                );
            }
        }
        ResultFormat::Json => println!("{}", serde_json::to_string(summaries)?),
        ResultFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for summary in summaries {
                wtr.serialize(summary)?;
            }
            wtr.flush()?;
        }
    }
    Ok(())
}

pub fn main() -> anyhow::Result<()> {
    env_logger::init();
    let api = EnvelopeSimApi::parse();

    let exports = api.points_file.is_some() || api.envelope_file.is_some();
    ensure!(
        !exports || api.scenario_file.len() == 1,
        "`--points-file` and `--envelope-file` need a single `--scenario-file`, got {}",
        api.scenario_file.len()
    );

    let results = api
        .scenario_file
        .par_iter()
        .map(|path| run_file(path))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let summaries: Vec<ScenarioSummary> = results.iter().map(|(summary, _)| summary.clone()).collect();
    print_summaries(&summaries, api.res_fmt)?;

    if let [(_, output)] = results.as_slice() {
        if let Some(points_file) = &api.points_file {
            let file = std::fs::File::create(points_file)
                .with_context(|| format!("Could not create file: {points_file:?}"))?;
            output.final_envelope().write_points_csv(file)?;
        }
        if let Some(envelope_file) = &api.envelope_file {
            output.to_file(envelope_file)?;
        }
    }
    Ok(())
}
