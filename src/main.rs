use fix_acquisition::platform::{MockPermissionGate, MockPositionProvider};
use fix_acquisition::{
    AcquisitionConfig, AcquisitionService, AcquisitionStart, ConfigurationManager,
    OutcomeFormatter, PositionSample, ServiceConfig, SessionEnd,
};
use log::{info, warn};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Window used when no config file is given, short enough for a demo run
const DEMO_WINDOW_MS: u64 = 5_000;

/// Interval between simulated fixes
const DEMO_FIX_INTERVAL_MS: u64 = 400;

/// Simulated receiver: converges on a point with slowly shrinking, jittery error
fn simulated_fix(index: u64, elapsed_ms: u64) -> Option<PositionSample> {
    let jitter = ((index * 7919) % 13) as f64;
    let error_m = 60.0 / (1.0 + index as f64 * 0.4) + jitter;
    let offset = (jitter - 6.0) * 1e-5;
    PositionSample::new(47.3769 + offset, 8.5417 - offset, error_m, elapsed_ms)
        .map(|sample| sample.with_altitude(408.0 + jitter))
        .ok()
}

fn usage(program: &str) -> String {
    format!("Usage: {} [config.json] [--json]", program)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("fix-acquisition", |s| s.as_str());
    let json_output = args.iter().skip(1).any(|arg| arg == "--json");
    let paths: Vec<&String> = args.iter().skip(1).filter(|arg| !arg.starts_with("--")).collect();

    if args.iter().skip(1).any(|arg| arg == "--help" || arg == "-h") || paths.len() > 1 {
        eprintln!("{}", usage(program));
        return Ok(());
    }

    let config = match paths.first() {
        Some(path) => ConfigurationManager::from_file(path)?.get_config().clone(),
        None => AcquisitionConfig::default().with_window(DEMO_WINDOW_MS),
    };
    info!(
        "acquiring for {} ms, tick {} ms, threshold {} m",
        config.window_duration_ms, config.progress_tick_ms, config.accuracy_threshold_m
    );

    let provider = MockPositionProvider::new();
    let service = AcquisitionService::spawn(
        MockPermissionGate::granting(),
        provider.clone(),
        ServiceConfig::default(),
    );

    let mut ticket = match service.start(config).await? {
        AcquisitionStart::Started(ticket) => ticket,
        AcquisitionStart::AlreadyActive(session) => {
            warn!("session {} already running", session);
            service.shutdown().await;
            return Ok(());
        }
    };

    let feeder_stop = CancellationToken::new();
    let feeder = {
        let stop = feeder_stop.clone();
        let provider = provider.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(Duration::from_millis(DEMO_FIX_INTERVAL_MS));
            let mut index = 0u64;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = interval.tick() => {
                        let elapsed_ms = started.elapsed().as_millis() as u64;
                        if let Some(sample) = simulated_fix(index, elapsed_ms) {
                            provider.emit_sample(sample);
                        }
                        index += 1;
                    }
                }
            }
        })
    };

    let mut last_percent = None;
    while let Some(update) = ticket.progress.recv().await {
        let percent = (update.fraction * 100.0).floor() as u32;
        if !json_output && last_percent != Some(percent / 10) {
            println!("[{:>3}%] {}", percent, update.message);
            last_percent = Some(percent / 10);
        }
    }

    let end = ticket.outcome().await;
    feeder_stop.cancel();
    let _ = feeder.await;
    service.shutdown().await;

    let formatter = OutcomeFormatter::new();
    match end {
        SessionEnd::Finished(outcome) => {
            if json_output {
                println!("{}", formatter.format_json_pretty(&outcome)?);
            } else {
                println!("{}", formatter.format_text(&outcome));
            }
        }
        SessionEnd::Cancelled => println!("acquisition cancelled"),
    }

    if provider.live_subscriptions() != 0 {
        warn!("{} subscription(s) still open", provider.live_subscriptions());
    }
    Ok(())
}
