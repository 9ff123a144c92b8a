//! Human or JSON rendering of command results.

use std::io::{self, Write};

use haul_core::ScanResolution;
use haul_core::app::{DeliveryReceipt, Reconciliation, StatusCounts};
use haul_core::domain::{
    ActivityLogEntry, CustomerContainer, FillEntry, Task, TaskStatus, WarehouseContainer,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Write `value` as pretty JSON, or through `human` otherwise.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human: impl FnOnce(&mut dyn Write, &T) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Human => human(&mut out, value)?,
    }
    Ok(())
}

pub fn task_line(w: &mut dyn Write, task: &Task) -> io::Result<()> {
    let driver = task
        .assigned_to
        .map_or_else(|| "-".to_string(), |d| d.to_string());
    writeln!(
        w,
        "{:<34} {:<10} {:<8} {:>6} {:<4} {:<12} {}",
        task.id,
        task.status,
        task.priority,
        task.actual_quantity.unwrap_or(task.planned_quantity),
        task.unit,
        task.material_type,
        driver
    )
}

pub fn task_detail(w: &mut dyn Write, task: &Task) -> io::Result<()> {
    writeln!(w, "{:<12} {}", "id:", task.id)?;
    writeln!(w, "{:<12} {}", "status:", task.status)?;
    writeln!(w, "{:<12} {}", "container:", task.customer_container_id)?;
    if let Some(target) = task.target_warehouse_id {
        writeln!(w, "{:<12} {}", "target:", target)?;
    }
    writeln!(w, "{:<12} {} {}", "planned:", task.planned_quantity, task.unit)?;
    if let Some(actual) = task.actual_quantity {
        writeln!(w, "{:<12} {} {}", "actual:", actual, task.unit)?;
    }
    if let Some(driver) = task.assigned_to {
        writeln!(w, "{:<12} {}", "driver:", driver)?;
    }
    for status in TaskStatus::ALL {
        if let Some(at) = task.timestamps.get(status) {
            writeln!(w, "{:<12} {}", format!("{}:", status.as_str().to_ascii_lowercase()), at)?;
        }
    }
    if let Some(reason) = &task.cancellation_reason {
        writeln!(w, "{:<12} {}", "reason:", reason)?;
    }
    if let Some(previous) = task.reopened_from {
        writeln!(w, "{:<12} {}", "reopened:", previous)?;
    }
    Ok(())
}

pub fn resolution(w: &mut dyn Write, resolution: &ScanResolution) -> io::Result<()> {
    let verb = match resolution {
        ScanResolution::AwaitingPickup { .. } => "pick up",
        ScanResolution::AlreadyPickedUp { .. } => "already picked up",
        ScanResolution::Delivery { .. } => "deliver",
    };
    let task = resolution.task();
    writeln!(w, "{verb}: task {} ({}) at {}", task.id, task.status, resolution.container())
}

pub fn receipt(w: &mut dyn Write, receipt: &DeliveryReceipt) -> io::Result<()> {
    writeln!(
        w,
        "task {} {}; {} now holds {}/{}",
        receipt.task.id,
        receipt.task.status,
        receipt.container.qr_code,
        receipt.container.current_amount,
        receipt.container.max_capacity
    )
}

#[derive(Debug, Serialize)]
pub struct Containers {
    pub customer: Vec<CustomerContainer>,
    pub warehouse: Vec<WarehouseContainer>,
}

pub fn containers(w: &mut dyn Write, all: &Containers) -> io::Result<()> {
    for c in &all.customer {
        let state = if c.active { "active" } else { "inactive" };
        writeln!(w, "customer  {:<12} {:<12} {:<8} {}", c.qr_code, c.material_type, state, c.location)?;
    }
    for c in &all.warehouse {
        let state = if c.active { "active" } else { "inactive" };
        writeln!(
            w,
            "warehouse {:<12} {:<12} {:<8} {}/{}",
            c.qr_code, c.material_type, state, c.current_amount, c.max_capacity
        )?;
    }
    Ok(())
}

pub fn fill(w: &mut dyn Write, entries: &[FillEntry]) -> io::Result<()> {
    for entry in entries {
        writeln!(w, "{} +{:<6} task {}", entry.recorded_at, entry.amount_added, entry.task_id)?;
    }
    Ok(())
}

pub fn activity(w: &mut dyn Write, entries: &[ActivityLogEntry]) -> io::Result<()> {
    for entry in entries {
        writeln!(w, "{} {:<30} {}", entry.created_at, entry.kind, entry.message)?;
    }
    Ok(())
}

pub fn counts(w: &mut dyn Write, counts: &StatusCounts) -> io::Result<()> {
    for status in TaskStatus::ALL {
        writeln!(w, "{:<10} {}", status, counts.get(status))?;
    }
    writeln!(w, "{:<10} {}", "open", counts.open())
}

pub fn reconciliation(w: &mut dyn Write, rec: &Reconciliation) -> io::Result<()> {
    let verdict = if rec.is_consistent() { "consistent" } else { "DRIFT" };
    writeln!(
        w,
        "{}: baseline {} + ledger {} vs current {} (max {}) {verdict}",
        rec.container_id, rec.baseline, rec.ledger_total, rec.current_amount, rec.max_capacity
    )
}
