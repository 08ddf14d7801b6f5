//! Exclusive use of a database for the length of a search
//!
//! The session owns the driver. `release` performs the final reset and
//! reports its outcome; a session dropped without `release` (early return,
//! panic unwinding) still attempts the reset and logs any failure.

use crate::observability::{log_event_with_fields, Event, Logger};

use super::errors::DriverResult;
use super::retry::RetryPolicy;
use super::DatabaseDriver;

/// What the final reset does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    pub drop_indexes: bool,
    pub restart: bool,
}

/// Owns a driver and guarantees a final reset
pub struct ExclusiveSession<D: DatabaseDriver> {
    driver: Option<D>,
    reset: ResetPolicy,
    retry: RetryPolicy,
}

impl<D: DatabaseDriver> ExclusiveSession<D> {
    pub fn acquire(driver: D, reset: ResetPolicy, retry: RetryPolicy) -> Self {
        Logger::info("SESSION_ACQUIRED", &[("engine", driver.engine())]);
        Self {
            driver: Some(driver),
            reset,
            retry,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// The wrapped driver
    pub fn driver(&mut self) -> &mut D {
        // Only `release` and `drop` take the driver, and both consume the session
        match self.driver.as_mut() {
            Some(driver) => driver,
            None => unreachable!("session driver taken before release"),
        }
    }

    /// Perform the final reset and hand the driver back
    pub fn release(mut self) -> DriverResult<D> {
        let mut driver = match self.driver.take() {
            Some(driver) => driver,
            None => unreachable!("session released twice"),
        };
        final_reset(&mut driver, self.reset, self.retry)?;
        Ok(driver)
    }
}

impl<D: DatabaseDriver> Drop for ExclusiveSession<D> {
    fn drop(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = final_reset(&mut driver, self.reset, self.retry) {
                Logger::error(
                    "SESSION_RESET_FAILED",
                    &[("code", e.code()), ("error", &e.to_string())],
                );
            }
        }
    }
}

fn final_reset<D: DatabaseDriver>(
    driver: &mut D,
    reset: ResetPolicy,
    retry: RetryPolicy,
) -> DriverResult<()> {
    retry.run("final_reset", || driver.reset_state(reset.drop_indexes, reset.restart))?;
    log_event_with_fields(
        Event::StateReset,
        &[
            ("scope", "final"),
            ("drop_indexes", &reset.drop_indexes.to_string()),
            ("restart", &reset.restart.to_string()),
        ],
    );
    Ok(())
}
