use std::path::{Path, PathBuf};
use std::process::ExitCode;

use log::{error, info, warn};
use tetfea_solver::postprocess::write_results;
use tetfea_solver::report::{Job, ResultsReport, write_nodal_table};
use tetfea_solver::{AnalysisPipeline, DEGENERATE_VOLUME};

const LOG_ENV: &str = "TETFEA_LOG";

fn usage() {
    eprintln!("usage:");
    eprintln!(
        "  tetfea-solver solve <job.json> [--output <report.json>] [--nodal-table <file>] [--element-table <file>]"
    );
    eprintln!("  tetfea-solver mesh-stats <job.json>");
    eprintln!();
    eprintln!("log level is read from {} (default: info)", LOG_ENV);
}

fn init_logging() -> Result<(), String> {
    let mut unknown_level = None;
    let level = match std::env::var(LOG_ENV) {
        Ok(value) => match value.parse::<log::LevelFilter>() {
            Ok(level) => level,
            Err(_) => {
                unknown_level = Some(value);
                log::LevelFilter::Info
            }
        },
        Err(_) => log::LevelFilter::Info,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, false),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .map_err(|e| format!("Unable to apply logger configuration ({:?})", e))?;

    if let Some(value) = unknown_level {
        error!(
            "Unknown log filter level '{}' in {}, using INFO instead.",
            value, LOG_ENV
        );
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq)]
struct SolveArgs {
    job: PathBuf,
    output: Option<PathBuf>,
    nodal_table: Option<PathBuf>,
    element_table: Option<PathBuf>,
}

fn parse_solve_args(args: &[String]) -> Option<SolveArgs> {
    let (job, rest) = args.split_first()?;
    let mut parsed = SolveArgs {
        job: PathBuf::from(job),
        ..Default::default()
    };

    let mut iter = rest.iter();
    while let Some(flag) = iter.next() {
        let value = PathBuf::from(iter.next()?);
        let slot = match flag.as_str() {
            "--output" | "-o" => &mut parsed.output,
            "--nodal-table" => &mut parsed.nodal_table,
            "--element-table" => &mut parsed.element_table,
            _ => return None,
        };
        if slot.replace(value).is_some() {
            return None;
        }
    }
    Some(parsed)
}

fn solve(args: &SolveArgs) -> Result<(), String> {
    let job = Job::from_json_file(&args.job).map_err(|e| format!("{}: {}", args.job.display(), e))?;
    let mesh = job.mesh().map_err(|e| e.to_string())?;

    info!("Running job {}", args.job.display());
    let pipeline = AnalysisPipeline::new(job.config.clone());
    let results = pipeline.run(&mesh).map_err(|e| format!("Solver error: {}", e))?;

    for warning in &results.warnings {
        warn!("{}", warning);
    }

    let report = ResultsReport::new(&mesh, &job.config, &results);
    match &args.output {
        Some(path) => {
            report.write_json(path).map_err(|e| e.to_string())?;
            info!("Report written to {}", path.display());
        }
        None => {
            report
                .write_json_to(std::io::stdout().lock())
                .map_err(|e| e.to_string())?;
            println!();
        }
    }

    if let Some(path) = &args.nodal_table {
        write_nodal_table(path, &results).map_err(|e| e.to_string())?;
        info!("Nodal table written to {}", path.display());
    }
    if let Some(path) = &args.element_table {
        write_results(path, &results.element_results, &results.statistics)
            .map_err(|e| e.to_string())?;
        info!("Element table written to {}", path.display());
    }

    Ok(())
}

fn mesh_stats(path: &Path) -> Result<String, String> {
    let job = Job::from_json_file(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let mesh = job.mesh().map_err(|e| e.to_string())?;
    let threshold = if job.config.degenerate_volume.is_finite() {
        job.config.degenerate_volume
    } else {
        DEGENERATE_VOLUME
    };
    Ok(mesh.statistics(threshold).format())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if let Err(err) = init_logging() {
        eprintln!("{err}");
    }

    match args.get(1).map(String::as_str) {
        Some("solve") if args.len() >= 3 => {
            let Some(solve_args) = parse_solve_args(&args[2..]) else {
                usage();
                return ExitCode::from(2);
            };
            match solve(&solve_args) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    error!("solve_error: {err}");
                    ExitCode::from(1)
                }
            }
        }
        Some("mesh-stats") if args.len() == 3 => match mesh_stats(Path::new(&args[2])) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("mesh_stats_error: {err}");
                ExitCode::from(1)
            }
        },
        _ => {
            usage();
            ExitCode::from(2)
        }
    }
}
