use gspi_orchestrator::{OrchestratorConfig, run_self_test};
use gspi_runtime::machine::RunReport;
use std::env;
use std::path::Path;
use std::process::ExitCode;

fn usage(program: &str) -> ExitCode {
    eprintln!("Usage: {program} <config.toml>");
    ExitCode::from(2)
}

fn summary(run: usize, report: &RunReport) -> String {
    let verdict = if report.passed() { "PASS" } else { "FAIL" };
    let path = report
        .visited
        .iter()
        .map(|mode| format!("{mode:?}"))
        .collect::<Vec<_>>()
        .join(" -> ");
    let mut line = format!("run {run}: {verdict} [{path}]");
    if let Some(failure) = &report.failure {
        line.push_str(&format!(" {failure}"));
    }
    for comparison in report.mismatches() {
        if let Err(e) = &comparison.result {
            line.push_str(&format!(" {:?}: {e}", comparison.phase));
        }
    }
    if !report.completed() {
        line.push_str(" (did not complete)");
    }
    line
}

fn main() -> ExitCode {
    env_logger::init();

    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "gspi_loopback".to_string());

    let Some(path) = args.next() else {
        return usage(&program);
    };
    if args.next().is_some() {
        return usage(&program);
    }
    if Path::new(&path).extension().and_then(|ext| ext.to_str()) != Some("toml") {
        eprintln!("Expected a .toml config path, got: {path}");
        return ExitCode::from(2);
    }

    let config = match OrchestratorConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let reports = match run_self_test(&config) {
        Ok(reports) => reports,
        Err(e) => {
            log::error!("self-test aborted: {e}");
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    for (i, report) in reports.iter().enumerate() {
        println!("{}", summary(i + 1, report));
    }
    if reports.iter().all(RunReport::passed) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
