//! Terminal rendering: batch tables, timelines, the KPI dashboard and a
//! live blend gauge.
//!
//! Styling goes through `console`; the gauge is an `indicatif` bar.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::{Batch, BatchStatus, StageRecord, StageState};
use crate::catalog::{ReferenceCatalog, available_lines};
use crate::error::MesError;
use crate::kpi::Dashboard;
use crate::simulator::BlendReading;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

fn status_style(status: BatchStatus) -> Style {
    match status {
        BatchStatus::Planned => Style::new().dim(),
        BatchStatus::InProgress => Style::new().cyan(),
        BatchStatus::ReadyForQc => Style::new().yellow(),
        BatchStatus::ReadyForFilling => Style::new().blue(),
        BatchStatus::Filling => Style::new().magenta(),
        BatchStatus::Dispatched => Style::new().green(),
    }
}

fn heading(text: &str) {
    println!();
    println!("{}", Style::new().bold().apply_to(format!("─── {text} ───")));
}

pub fn print_batches(batches: &[Batch], catalog: &dyn ReferenceCatalog) {
    if batches.is_empty() {
        println!("  {}", Style::new().dim().apply_to("no batches"));
        return;
    }
    println!(
        "{}",
        Style::new().bold().apply_to(format!(
            "{:<15} {:<24} {:>9} {:>9} {:<5} {:<18}",
            "BATCH", "PRODUCT", "PLAN KL", "ACT KL", "SHIFT", "STATUS"
        ))
    );
    for batch in batches {
        let product = catalog
            .product(&batch.product_id)
            .map(|p| p.name.as_str())
            .unwrap_or(&batch.product_id);
        // Pad before styling so escape codes don't skew the columns.
        let status = format!("{:<18}", batch.status.to_string());
        println!(
            "{:<15} {:<24} {:>9.1} {:>9.1} {:<5} {}",
            batch.batch_number,
            product,
            batch.planned_qty_kl,
            batch.actual_qty_kl,
            batch.shift,
            status_style(batch.status).apply_to(status),
        );
    }
}

pub fn print_timeline(batch: &Batch, timeline: &[StageRecord]) {
    heading(&format!("Trace {}", batch.batch_number));
    for record in timeline {
        let (mark, style) = match record.state {
            StageState::Complete => ("✓", Style::new().green()),
            StageState::InProgress => ("●", Style::new().cyan()),
            StageState::Pending => ("○", Style::new().dim()),
        };
        let when = match (record.started, record.ended) {
            (Some(start), Some(end)) => {
                format!("{} → {}", start.format(TIME_FORMAT), end.format(TIME_FORMAT))
            }
            (Some(start), None) => start.format(TIME_FORMAT).to_string(),
            _ => String::new(),
        };
        println!(
            "  {} {:<12} {:<35} {}",
            style.apply_to(mark),
            record.stage.to_string(),
            when,
            record.detail.as_deref().unwrap_or("")
        );
    }
    for (i, attempt) in batch.rework_history.iter().enumerate() {
        println!(
            "    {} attempt {} blended {} → {}, failed QC {}",
            Style::new().red().apply_to("✗"),
            i + 1,
            attempt.blending_start.format(TIME_FORMAT),
            attempt.blending_end.format(TIME_FORMAT),
            attempt.failed_at.format(TIME_FORMAT),
        );
    }
}

pub fn print_dashboard(dashboard: &Dashboard) {
    let k = &dashboard.kpis;
    heading("KPIs");
    println!("  Yield              {:>6} %", k.yield_pct);
    println!("  Quality loss       {:>6} %", k.quality_loss_pct);
    println!("  Avg cycle time     {:>6.1} h", k.avg_cycle_time_hours);
    println!("  Energy             {:>6.2} kWh/KL", k.energy_per_kl);
    println!("  Batches            {:>6} planned, {} completed", k.batches_planned, k.batches_completed);
    println!("  QC pass rate       {:>6} %", dashboard.qc_pass_rate_pct);
    println!(
        "  Volume             {:>6.1} KL planned, {:.1} KL dispatched",
        dashboard.summary.planned_kl, dashboard.summary.dispatched_kl
    );

    heading("Status");
    for (status, count) in &dashboard.status_counts {
        let label = format!("{:<18}", status.to_string());
        println!("  {} {count:>3}", status_style(*status).apply_to(label));
    }

    heading("Shifts");
    for shift in &dashboard.shifts {
        println!(
            "  Shift {}  {}/{} dispatched ({:.0} %)",
            shift.shift,
            shift.completed,
            shift.total,
            shift.completion_pct()
        );
    }

    heading("Product mix");
    for (product, count) in &dashboard.product_mix {
        println!("  {product:<10} {count:>3}");
    }
}

pub fn print_lines(catalog: &dyn ReferenceCatalog) {
    let available = available_lines(catalog);
    for line in catalog.filling_lines() {
        let style = if available.iter().any(|l| l.id == line.id) {
            Style::new().green()
        } else {
            Style::new().red()
        };
        println!("  {:<8} {:<18} {}", line.id, line.name, style.apply_to(line.status));
    }
}

/// One line of a scripted walkthrough.
pub fn step(action: &str, batch: &Batch) {
    println!(
        "  {} {action:<28} {} is {}",
        Style::new().green().bold().apply_to("✓"),
        batch.batch_number,
        status_style(batch.status).apply_to(batch.status)
    );
}

pub fn rejected(action: &str, err: &MesError) {
    println!(
        "  {} {action:<28} rejected ({}): {err}",
        Style::new().red().bold().apply_to("✗"),
        err.kind()
    );
}

pub fn print_reading(reading: &BlendReading) {
    println!(
        "    {:>3.0}%  base {:.1}%  A {:.1}%  B {:.1}%  {:.1} °C  {:.2} bar",
        reading.progress * 100.0,
        reading.base_oil_pct,
        reading.additive_a_pct,
        reading.additive_b_pct,
        reading.temperature_c,
        reading.pressure_bar
    );
}

/// Live progress bar for a blending batch.
pub struct BlendGauge {
    pb: ProgressBar,
}

impl BlendGauge {
    pub fn start(batch_number: &str) -> Self {
        let pb = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
        pb.set_prefix(batch_number.to_string());
        Self { pb }
    }

    pub fn update(&self, reading: &BlendReading) {
        if reading.is_rest() {
            self.pb.set_message("not blending");
            return;
        }
        self.pb.set_position((reading.progress * 100.0).round() as u64);
        self.pb.set_message(format!(
            "{:.1} °C  {:.2} bar  base {:.1}%",
            reading.temperature_c, reading.pressure_bar, reading.base_oil_pct
        ));
    }

    pub fn finish(&self) {
        self.pb.finish();
    }
}
