mod app;
mod config;
mod state;

use std::path::PathBuf;
use std::process::ExitCode;

use config::JobConfig;
use state::Report;

const USAGE: &str = "usage: injury-lab <job.json>";

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let job_path = match (args.next(), args.next()) {
        (Some(a), None) if a == "-h" || a == "--help" => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        (Some(a), None) => PathBuf::from(a),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    let result = JobConfig::load(&job_path).and_then(|job| {
        log::info!(
            "Running {:?} job with {} records, filter {}",
            job.mode,
            job.records.len(),
            job.channel_filter().label()
        );
        app::run(&job)
    });

    match result {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Job {} failed: {e:#}", job_path.display());
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(report: &Report) {
    match report {
        Report::Hic(r) => {
            if let Some(w) = &r.undersampling {
                println!("warning: {w}");
            }
            for w in &r.windows {
                let name = w
                    .window_ms
                    .map(|ms| format!("HIC{ms}"))
                    .unwrap_or_else(|| "HIC (unconstrained)".to_string());
                match w.assessment {
                    Some(a) => println!(
                        "{name}: {:.1} over [{:.2}, {:.2}] ms{}",
                        a.hic,
                        a.t0 * 1e3,
                        a.t1 * 1e3,
                        if a.passes { "" } else { "  EXCEEDS LIMIT" }
                    ),
                    None => println!("{name}: no interval"),
                }
            }
        }
        Report::Nij(r) => {
            if let Some(w) = &r.undersampling {
                println!("warning: {w}");
            }
            for p in &r.peaks {
                println!("{}: {:.3} at {:.2} ms", p.name, p.value, p.time_ms);
            }
            if let Some(g) = &r.governing {
                println!("Nij ({}): {:.3} ({})", r.dummy, g.value, g.name);
            }
        }
    }
}
