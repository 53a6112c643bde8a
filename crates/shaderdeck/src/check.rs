//! `shaderdeck check`: compile every stage with naga, then drive the engine
//! against the counting backend and confirm it releases what it created.

use anyhow::{bail, Result};
use renderer::compile::validate_glsl;
use renderer::engine::{start_with_clock, Status, TickOutcome};
use renderer::program::ProgramBuilder;
use renderer::{
    EventHub, HeadlessSurface, ManualScheduler, ManualTimeSource, ShaderStage, Viewport,
    VisualizationSpec,
};
use tracing::{error, info};

use crate::cli::{CheckArgs, GlobalArgs};
use crate::session::{self, Session};

/// Counters gathered while driving one visualization headlessly.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HeadlessReport {
    pub drawn: usize,
    pub deferred: usize,
    pub recovered: usize,
    pub leaked: usize,
    pub invalid_calls: usize,
}

pub fn check(global: &GlobalArgs, args: CheckArgs) -> Result<()> {
    let session = Session::open(global)?;
    let names: Vec<String> = match &args.name {
        Some(name) => vec![name.clone()],
        None => session
            .catalog()
            .entries()
            .into_iter()
            .map(|entry| entry.name)
            .collect(),
    };
    let overrides = session::overrides(&args.tuning, None);
    let viewport = Viewport::new(
        f64::from(args.size.width),
        f64::from(args.size.height),
        args.device_pixel_ratio,
    );

    let mut failures = 0usize;
    for name in &names {
        let prepared = match session.prepare(name, &overrides) {
            Ok(prepared) => prepared,
            Err(err) => {
                error!(visualization = %name, error = %err, "failed to load");
                println!("FAIL {name}: {err:#}");
                failures += 1;
                continue;
            }
        };

        if args.print_source {
            let builder = ProgramBuilder::from_spec(&prepared.spec);
            println!("// ---- {name} (fragment) ----");
            println!("{}", builder.fragment_source());
        }

        if let Err(log) = validate_stages(&prepared.spec) {
            error!(visualization = %name, "shader validation failed:\n{log}");
            println!("FAIL {name}: shader validation failed");
            failures += 1;
            continue;
        }

        match run_headless(prepared.spec, viewport, args.frames) {
            Ok(report) if report.leaked == 0 && report.invalid_calls == 0 => {
                info!(visualization = %name, ?report, "check passed");
                println!(
                    "ok   {name}: {} drawn, {} deferred, {} recovered",
                    report.drawn, report.deferred, report.recovered
                );
            }
            Ok(report) => {
                error!(visualization = %name, ?report, "resources not released cleanly");
                println!(
                    "FAIL {name}: {} objects leaked, {} invalid calls",
                    report.leaked, report.invalid_calls
                );
                failures += 1;
            }
            Err(reason) => {
                error!(visualization = %name, %reason, "headless run failed");
                println!("FAIL {name}: {reason}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} visualization(s) failed checks", names.len());
    }
    Ok(())
}

/// Runs both wrapped stages through naga, returning the first diagnostic.
pub fn validate_stages(spec: &VisualizationSpec) -> Result<(), String> {
    let builder = ProgramBuilder::from_spec(spec);
    validate_glsl(ShaderStage::Vertex, builder.vertex_source())
        .map_err(|log| format!("vertex stage:\n{log}"))?;
    validate_glsl(ShaderStage::Fragment, builder.fragment_source())
        .map_err(|log| format!("fragment stage:\n{log}"))?;
    Ok(())
}

/// Mounts `spec` on the counting backend and delivers `frames` refreshes.
pub fn run_headless(
    spec: VisualizationSpec,
    viewport: Viewport,
    frames: u32,
) -> Result<HeadlessReport, String> {
    let host = HeadlessSurface::new(viewport);
    let scheduler = ManualScheduler::new();
    let time = ManualTimeSource::new();
    let mut visualization = start_with_clock(
        &host,
        spec,
        scheduler.clone(),
        EventHub::new(),
        Box::new(time.clone()),
    );
    if let Status::Failed(err) = visualization.status() {
        return Err(err.to_string());
    }

    let mut report = HeadlessReport::default();
    let interval = scheduler.refresh_interval();
    for _ in 0..frames {
        time.advance(interval);
        for token in scheduler.advance(interval) {
            match visualization.on_frame(token) {
                TickOutcome::Drawn => report.drawn += 1,
                TickOutcome::Deferred => report.deferred += 1,
                TickOutcome::Recovered => report.recovered += 1,
                TickOutcome::Stale => {}
                TickOutcome::Failed => {
                    let reason = match visualization.status() {
                        Status::Failed(err) => err.to_string(),
                        other => format!("frame failed with status {other:?}"),
                    };
                    return Err(reason);
                }
            }
        }
    }

    visualization.stop();
    let stats = host.stats();
    report.leaked = stats.live_objects();
    report.invalid_calls = stats.invalid_calls;
    Ok(report)
}
