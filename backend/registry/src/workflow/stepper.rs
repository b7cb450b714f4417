//! Progress stepper — walks a progress value through one phase.

use std::time::Duration;

use crate::errors::{RegistryError, Result};
use crate::workflow::timer::{Timer, Wait};

pub const PROGRESS_MAX: u8 = 100;

/// A contiguous slice of the 0–100 progress range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    from: u8,
    to: u8,
    increment: u8,
    delay: Duration,
}

impl Phase {
    pub fn new(from: u8, to: u8, increment: u8, delay: Duration) -> Result<Self> {
        if increment == 0 {
            return Err(RegistryError::InvalidPhase(
                "increment must be positive".to_string(),
            ));
        }
        if from > to || to > PROGRESS_MAX {
            return Err(RegistryError::InvalidPhase(format!(
                "bounds {from}..={to} outside 0..={PROGRESS_MAX}"
            )));
        }
        Ok(Self {
            from,
            to,
            increment,
            delay,
        })
    }

    /// Progress values emitted by this phase, in order.
    ///
    /// Starts at `from`, climbs by `increment` and always ends with exactly
    /// `to`, even when the increment does not divide the range.
    pub fn values(&self) -> Vec<u8> {
        let mut values: Vec<u8> = (self.from..=self.to)
            .step_by(self.increment as usize)
            .collect();
        if values.last() != Some(&self.to) {
            values.push(self.to);
        }
        values
    }
}

/// Emit every value of `phase` through `on_step`, waiting the phase delay
/// after each one.
///
/// Stops early with [`Wait::Cancelled`] when the timer is cancelled, or with
/// the callback's error when an update is refused.
pub async fn advance<F>(phase: &Phase, timer: &Timer, mut on_step: F) -> Result<Wait>
where
    F: FnMut(u8) -> Result<()>,
{
    for value in phase.values() {
        if timer.is_cancelled() {
            return Ok(Wait::Cancelled);
        }
        on_step(value)?;
        if timer.wait(phase.delay).await.is_cancelled() {
            return Ok(Wait::Cancelled);
        }
    }
    Ok(Wait::Elapsed)
}
