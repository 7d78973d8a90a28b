// Declared status pipelines. A status may only move to one of the targets its
// table lists; everything else is rejected before any state changes.

use std::fmt::Display;

use crate::core::{AppError, Result};

/// A status with a fixed table of legal successors
pub trait PipelineStatus: Copy + Eq + Display + 'static {
    /// Entity name used in error messages, e.g. `order`
    const ENTITY: &'static str;

    /// Every status in the pipeline
    fn all() -> &'static [Self];

    /// Legal targets from this status; empty for terminal statuses
    fn allowed_transitions(&self) -> &'static [Self];

    fn can_transition_to(&self, target: Self) -> bool {
        self.allowed_transitions().contains(&target)
    }

    fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Move `status` to `target`, or fail with `IllegalTransition` leaving it unchanged
pub fn transition<S: PipelineStatus>(status: &mut S, target: S) -> Result<()> {
    ensure_transition(*status, target)?;
    *status = target;
    Ok(())
}

/// Check a transition without applying it
pub fn ensure_transition<S: PipelineStatus>(from: S, target: S) -> Result<()> {
    if from.can_transition_to(target) {
        Ok(())
    } else {
        Err(AppError::IllegalTransition {
            entity: S::ENTITY,
            from: from.to_string(),
            to: target.to_string(),
        })
    }
}
