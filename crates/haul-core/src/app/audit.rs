//! AuditEmitter - 遷移から Activity log を組み立てる
//!
//! 書き込みはしません。返した entry は呼び出し側が遷移と同じ
//! `UnitOfWork` に積みます。メッセージは task の状態だけから決まります。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::{
    ActivityKind, ActivityLogEntry, ContainerRef, ScanEventId, Task, TaskStatus, UserId,
};
use crate::ports::IdGenerator;

/// Who and what a single audit entry refers to besides the task.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditRefs {
    pub actor: Option<UserId>,
    pub container: Option<ContainerRef>,
    pub scan_event: Option<ScanEventId>,
}

impl AuditRefs {
    pub fn by(actor: UserId) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }

    pub fn with_container(mut self, container: ContainerRef) -> Self {
        self.container = Some(container);
        self
    }

    pub fn with_scan(mut self, scan_event: ScanEventId) -> Self {
        self.scan_event = Some(scan_event);
        self
    }
}

pub struct AuditEmitter {
    ids: Arc<dyn IdGenerator>,
}

impl AuditEmitter {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// Build the entry for `kind` as observed on `task` after the change.
    pub fn emit(
        &self,
        kind: ActivityKind,
        task: &Task,
        refs: AuditRefs,
        at: DateTime<Utc>,
    ) -> ActivityLogEntry {
        let mut details = json!({
            "status": task.status,
            "material_type": task.material_type,
            "planned_quantity": task.planned_quantity,
            "actual_quantity": task.actual_quantity,
            "unit": task.unit,
            "assigned_to": task.assigned_to,
        });
        // TASK_ASSIGNED covers both directions; the feed tells them apart here.
        if kind == ActivityKind::TaskAssigned {
            details["change"] = json!(if task.assigned_to.is_some() {
                "assigned"
            } else {
                "unassigned"
            });
        }

        ActivityLogEntry {
            id: self.ids.generate_activity_id(),
            kind,
            task_id: Some(task.id),
            container: refs.container,
            user_id: refs.actor,
            scan_event_id: refs.scan_event,
            message: message(kind, task, &refs),
            details,
            created_at: at,
        }
    }

    /// Entry for the status `task` has just entered.
    pub fn emit_status(&self, task: &Task, refs: AuditRefs, at: DateTime<Utc>) -> ActivityLogEntry {
        self.emit(ActivityKind::for_status(task.status), task, refs, at)
    }
}

fn message(kind: ActivityKind, task: &Task, refs: &AuditRefs) -> String {
    let id = task.id;
    let container = refs
        .container
        .map_or_else(|| "unknown container".to_string(), |c| c.to_string());
    match kind {
        ActivityKind::TaskCreated => format!(
            "Task {id} created: {} {} of {}",
            task.planned_quantity, task.unit, task.material_type
        ),
        ActivityKind::TaskAssigned => match (task.status, task.assigned_to) {
            (TaskStatus::Assigned, Some(driver)) => format!("Task {id} assigned to {driver}"),
            _ => format!("Task {id} unassigned"),
        },
        ActivityKind::TaskAccepted => format!("Task {id} accepted"),
        ActivityKind::TaskPickedUp => format!("Task {id} picked up"),
        ActivityKind::TaskInTransit => format!("Task {id} in transit"),
        ActivityKind::TaskDelivered => format!("Task {id} delivered to {container}"),
        ActivityKind::TaskCompleted => format!("Task {id} completed"),
        ActivityKind::TaskCancelled => format!(
            "Task {id} cancelled: {}",
            task.cancellation_reason.as_deref().unwrap_or("")
        ),
        ActivityKind::ContainerScannedAtCustomer => {
            format!("Container {container} scanned at customer for task {id}")
        }
        ActivityKind::ContainerScannedAtWarehouse => {
            format!("Container {container} scanned at warehouse for task {id}")
        }
        ActivityKind::WeightRecorded => format!(
            "Weight recorded for task {id}: {} {}",
            task.actual_quantity.unwrap_or(task.planned_quantity),
            task.unit
        ),
    }
}
