use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use tracing::info;

use blendtrack::batch::{BatchFilter, BatchRepository, BatchStatus, QcResult};
use blendtrack::catalog::available_lines;
use blendtrack::cli::{Cli, Command};
use blendtrack::clock::{ManualClock, SystemClock};
use blendtrack::config::BlendtrackConfig;
use blendtrack::error::MesError;
use blendtrack::{logging, sample, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => {
            anyhow::ensure!(path.exists(), "config file {} not found", path.display());
            BlendtrackConfig::load_from(path)?
        }
        None => BlendtrackConfig::load()?,
    };
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if cli.no_jitter {
        config.jitter = false;
    }

    let filter = cli.command.filter();
    match cli.command {
        Command::Demo => run_demo(&config)?,
        Command::Kpi { json } => {
            let repo = fleet(&config)?;
            let dashboard = config.kpi_aggregator().dashboard(&repo.snapshot());
            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                ui::print_dashboard(&dashboard);
            }
        }
        Command::List { .. } => {
            let repo = fleet(&config)?;
            ui::print_batches(&repo.query(&filter), repo.catalog());
        }
        Command::Trace { batch_number } => {
            let repo = fleet(&config)?;
            let batch = repo
                .find_by_number(&batch_number)
                .ok_or_else(|| MesError::NotFound {
                    entity: "Batch",
                    id: batch_number.clone(),
                })?;
            ui::print_timeline(batch, &batch.timeline(repo.catalog()));
        }
        Command::Watch {
            batch_number,
            ticks,
        } => watch(&config, batch_number, ticks).await?,
        Command::Lines => {
            let catalog = config.catalog()?;
            ui::print_lines(catalog.as_ref());
        }
    }

    Ok(())
}

/// The sample plant floor on the wall clock.
fn fleet(config: &BlendtrackConfig) -> Result<BatchRepository> {
    let repo = sample::demo_repository(
        config.catalog()?,
        Arc::new(SystemClock),
        config.batch_defaults(),
    )
    .context("seeding sample batches")?;
    Ok(repo)
}

async fn watch(config: &BlendtrackConfig, batch_number: Option<String>, ticks: Option<u32>) -> Result<()> {
    let repo = fleet(config)?;
    let batch = match batch_number {
        Some(number) => repo
            .find_by_number(&number)
            .cloned()
            .ok_or(MesError::NotFound {
                entity: "Batch",
                id: number,
            })?,
        None => repo
            .query(&BatchFilter::default().status(BatchStatus::InProgress))
            .into_iter()
            .next()
            .context("no batch is blending")?,
    };

    let mut monitor = repo.watch_blending(
        &batch.id,
        config.simulator(),
        config.poll_interval(),
        config.rng(),
    );
    let gauge = ui::BlendGauge::start(&batch.batch_number);
    let mut seen = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            reading = monitor.next_reading() => {
                let Some(reading) = reading else { break };
                gauge.update(&reading);
                seen += 1;
                if ticks.is_some_and(|n| seen >= n) {
                    break;
                }
            }
        }
    }
    gauge.finish();
    monitor.stop().await;
    Ok(())
}

/// Runs one batch through every stage on a scripted clock, including the
/// rejections a careless operator would hit.
fn run_demo(config: &BlendtrackConfig) -> Result<()> {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let mut repo = BatchRepository::new(config.catalog()?)
        .with_clock(clock.clone())
        .with_defaults(config.batch_defaults());
    let simulator = config.simulator();
    let mut rng = config.rng();
    let engineer = "user_3";

    println!("Blendtrack demo");
    let batch = repo.create_batch("prod_1", 10.0)?;
    ui::step("create batch (10 KL)", &batch);
    let id = batch.id.clone();

    if let Err(e) = repo.create_batch("prod_1", 0.0) {
        ui::rejected("create batch (0 KL)", &e);
    }
    if let Err(e) = repo.complete_blending(&id) {
        ui::rejected("complete blending", &e);
    }

    ui::step("start blending", &repo.start_blending(&id)?);
    clock.advance(Duration::seconds(30));
    ui::print_reading(&repo.blending_progress(&id, &simulator, &mut rng));
    clock.advance(Duration::minutes(45));
    ui::step("complete blending", &repo.complete_blending(&id)?);

    clock.advance(Duration::minutes(20));
    ui::step("record QC FAIL", &repo.record_qc(&id, QcResult::Fail, engineer)?);

    clock.advance(Duration::minutes(30));
    ui::step("start blending (rework)", &repo.start_blending(&id)?);
    clock.advance(Duration::minutes(45));
    ui::step("complete blending", &repo.complete_blending(&id)?);

    clock.advance(Duration::minutes(15));
    ui::step("record QC HOLD", &repo.record_qc(&id, QcResult::Hold, engineer)?);
    clock.advance(Duration::minutes(30));
    ui::step("record QC PASS", &repo.record_qc(&id, QcResult::Pass, engineer)?);

    if let Err(e) = repo.start_filling(&id, "line_9") {
        ui::rejected("start filling on line_9", &e);
    }
    let line = available_lines(repo.catalog())
        .first()
        .map(|l| l.id.clone())
        .context("no filling line is available")?;
    clock.advance(Duration::minutes(10));
    ui::step(&format!("start filling on {line}"), &repo.start_filling(&id, &line)?);
    clock.advance(Duration::minutes(40));
    ui::step("complete filling (9.8 KL)", &repo.complete_filling(&id, 9.8)?);

    if let Err(e) = repo.start_blending(&id) {
        ui::rejected("start blending", &e);
    }

    let batch = repo.get(&id).context("demo batch vanished")?;
    ui::print_timeline(batch, &batch.timeline(repo.catalog()));
    ui::print_dashboard(&config.kpi_aggregator().dashboard(&repo.snapshot()));
    Ok(())
}
