//! Report lifecycle rules.
//!
//! ```text
//!   pending ──────────────► resolved
//!      │  ▲                    ▲
//!      ▼  │                    │
//!   inProgress ────────────────┘
//! ```
//!
//! `resolved` is terminal. Reaching it requires a resolution photo, and
//! assigning a department always lands the report in `inProgress`. A report
//! with a department never goes back to `pending`.

use crate::core::error::{AppError, Result};
use crate::features::reports::models::{Department, Report, ReportPatch, ReportStatus};

/// A lifecycle event requested against a single report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    SetStatus(ReportStatus),
    AssignDepartment(Department),
    Resolve { photo_ref: String },
}

/// Outcome of a permitted event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The report already reflects the event; nothing to dispatch
    Noop,
    /// Fields to change, applied together as one mutation
    Apply(ReportPatch),
}

pub struct ReportStateMachine;

impl ReportStateMachine {
    /// Compute the effect of `event` on `report` without mutating anything
    pub fn transition(report: &Report, event: &ReportEvent) -> Result<Transition> {
        if report.status.is_terminal() {
            return Err(match event {
                ReportEvent::SetStatus(target) => AppError::InvalidTransition(format!(
                    "report {} is resolved and cannot move to {}",
                    report.id, target
                )),
                ReportEvent::AssignDepartment(_) | ReportEvent::Resolve { .. } => {
                    AppError::AlreadyResolved(report.id.clone())
                }
            });
        }

        match event {
            ReportEvent::SetStatus(ReportStatus::Resolved) => Err(AppError::InvalidTransition(
                format!(
                    "report {} can only be resolved with a resolution photo",
                    report.id
                ),
            )),
            ReportEvent::SetStatus(target) if *target == report.status => Ok(Transition::Noop),
            ReportEvent::SetStatus(ReportStatus::Pending) if report.assigned_department.is_some() => {
                Err(AppError::InvalidTransition(format!(
                    "report {} is assigned to a department and cannot return to pending",
                    report.id
                )))
            }
            ReportEvent::SetStatus(target) => Ok(Transition::Apply(ReportPatch::status(*target))),
            ReportEvent::AssignDepartment(department) => {
                if report.assigned_department == Some(*department)
                    && report.status == ReportStatus::InProgress
                {
                    Ok(Transition::Noop)
                } else {
                    Ok(Transition::Apply(ReportPatch::assignment(*department)))
                }
            }
            ReportEvent::Resolve { photo_ref } => {
                if photo_ref.trim().is_empty() {
                    return Err(AppError::InvalidMedia(
                        "a resolution photo reference is required".to_string(),
                    ));
                }
                Ok(Transition::Apply(ReportPatch::resolution(photo_ref.clone())))
            }
        }
    }
}
