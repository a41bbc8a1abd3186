use anyhow::Result;
use clap::Parser;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod cli;
mod config;
mod export;
mod lookup;
mod prefs;
mod probe;
mod registry;
mod run;
mod safety;
mod server;
mod sim;
mod state;
mod tui;

use cli::Args;
use config::Config;
use export::{export_csv, export_json, generate_report};
use lookup::asn::AsnLookup;
use prefs::Prefs;
use registry::VantagePoint;
use run::{ProbeClient, RunEngine};
use safety::{check_target_once, SafetyValidator};
use server::NodeIdentity;
use state::{Session, TargetSpec};
use tui::{run_tui, Theme};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Edge-node mode serves the dispatcher and nothing else
    if args.serve {
        tracing_subscriber::fmt().init();
        let identity = NodeIdentity {
            colo: args.colo.clone(),
            placement: args.placement.clone(),
        };
        return server::serve(&args.bind, identity).await;
    }

    let config = Config::from(&args);
    let vps: Vec<&'static VantagePoint> = match registry::select(&config.regions) {
        Ok(vps) => vps,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let host = args.host.clone().unwrap_or_default();
    let session = Arc::new(RwLock::new(Session::new(
        TargetSpec::new(host, args.port),
        config.clone(),
        &vps,
    )));
    let client = Arc::new(ProbeClient::new(
        config.domain.clone(),
        config.local_endpoint.clone(),
        config.timeout,
    )?);

    // Cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel_clone.cancel();
    });

    if args.is_batch_mode() {
        run_batch_mode(args, config, vps, session, client, cancel).await
    } else if args.no_tui {
        run_streaming_mode(config, vps, session, client, cancel).await
    } else {
        run_interactive_mode(args, config, vps, session, client, cancel).await
    }
}

/// Block the start on the one-shot target safety check.
/// Lookup failures fail open; a positive operator-ASN match aborts.
async fn gate_target(config: &Config, host: &str) -> Result<()> {
    if !config.asn_guard {
        return Ok(());
    }
    let lookup = AsnLookup::new()?;
    if let Err(e) = check_target_once(&lookup, config.operator_asn, host).await {
        anyhow::bail!(e);
    }
    Ok(())
}

async fn run_interactive_mode(
    args: Args,
    config: Config,
    vps: Vec<&'static VantagePoint>,
    session: Arc<RwLock<Session>>,
    client: Arc<ProbeClient>,
    cancel: CancellationToken,
) -> Result<()> {
    let lookup = Arc::new(AsnLookup::new()?);
    let validator = Arc::new(SafetyValidator::new(
        lookup,
        config.operator_asn,
        config.asn_guard,
    ));

    // Pre-validate a host given on the command line
    let initial_host = session.read().target.host.clone();
    if !initial_host.is_empty() {
        validator.submit(initial_host);
    }

    // Load saved preferences; CLI override > saved preference > default
    let prefs = Prefs::load();
    let theme_name = if args.theme != "default" {
        args.theme.clone()
    } else {
        prefs.theme.clone().unwrap_or_else(|| "default".to_string())
    };
    let theme = Theme::by_name(&theme_name);

    let final_theme = run_tui(
        config,
        vps,
        session,
        client,
        validator,
        cancel.clone(),
        theme,
    )
    .await?;

    // Save theme preference (best effort, don't fail on save error)
    let mut prefs = Prefs::load();
    prefs.theme = Some(final_theme);
    let _ = prefs.save();

    cancel.cancel();
    Ok(())
}

async fn run_batch_mode(
    args: Args,
    config: Config,
    vps: Vec<&'static VantagePoint>,
    session: Arc<RwLock<Session>>,
    client: Arc<ProbeClient>,
    cancel: CancellationToken,
) -> Result<()> {
    let host = session.read().target.host.clone();
    gate_target(&config, &host).await?;

    let engine = RunEngine::new(
        config.clone(),
        vps,
        session.clone(),
        client,
        cancel.child_token(),
    );
    engine.run().await?;

    // Wait for final responses to settle
    tokio::time::sleep(config.timeout + Duration::from_millis(500)).await;

    let session = session.read();
    if args.json {
        export_json(&session, std::io::stdout())?;
    } else if args.csv {
        export_csv(&session, std::io::stdout())?;
    } else if args.report {
        generate_report(&session, std::io::stdout())?;
    }

    Ok(())
}

async fn run_streaming_mode(
    config: Config,
    vps: Vec<&'static VantagePoint>,
    session: Arc<RwLock<Session>>,
    client: Arc<ProbeClient>,
    cancel: CancellationToken,
) -> Result<()> {
    let host = session.read().target.host.clone();
    gate_target(&config, &host).await?;

    let engine_cancel = cancel.child_token();
    let engine = RunEngine::new(
        config.clone(),
        vps,
        session.clone(),
        client,
        engine_cancel.clone(),
    );
    let engine_handle = tokio::spawn(async move { engine.run().await });

    // Print results as they come in
    let mut last_total: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    let linger = config.timeout + Duration::from_millis(500);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            }
            _ = engine_cancel.cancelled() => {
                // Round count reached; let stragglers land before the
                // final print
                tokio::time::sleep(linger).await;
                print_progress(&session, &mut last_total);
                break;
            }
            _ = interval.tick() => {
                print_progress(&session, &mut last_total);
            }
        }
    }

    engine_handle.await??;
    Ok(())
}

fn print_progress(session: &Arc<RwLock<Session>>, last_total: &mut u64) {
    let session = session.read();
    let total = session.total_sent();
    if total == *last_total {
        return;
    }

    for record in &session.records {
        if record.sent == 0 {
            continue;
        }
        let latency = record
            .last_ms()
            .map(|ms| format!("{:>5}ms", ms))
            .unwrap_or_else(|| "    -  ".to_string());
        println!(
            "{:<6} {:<26} {}  {:>5.1}% loss{}",
            record.id,
            record.display_name,
            latency,
            record.loss_pct(),
            record
                .last_error
                .as_deref()
                .map(|e| format!("  [{}]", e))
                .unwrap_or_default()
        );
    }
    println!("---");
    *last_total = total;
}
