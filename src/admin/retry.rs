// Sequential retry policy
//
// Runs an operation up to a fixed number of attempts, one at a time, waiting
// between attempts for whatever the backoff schedule yields. The wait itself
// is injected so callers (and tests) decide how time passes.

use backoff::backoff::{Backoff, Constant};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    /// 1-based attempt that produced `value`
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn schedule(&self) -> Constant {
        Constant::new(self.interval)
    }

    pub async fn run<T, E, Op, Fut, D, DFut>(&self, op: Op, delay: D) -> Result<Attempted<T>, RetryExhausted<E>>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        D: FnMut(Duration) -> DFut,
        DFut: Future<Output = ()>,
    {
        retry_sequential(self.max_attempts, self.schedule(), delay, op).await
    }
}

/// `op` receives the 1-based attempt number. A schedule that stops early
/// ends the loop with the latest error.
pub async fn retry_sequential<T, E, B, Op, Fut, D, DFut>(
    max_attempts: u32,
    mut schedule: B,
    mut delay: D,
    mut op: Op,
) -> Result<Attempted<T>, RetryExhausted<E>>
where
    B: Backoff,
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: FnMut(Duration) -> DFut,
    DFut: Future<Output = ()>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(Attempted { value, attempt }),
            Err(last_error) => {
                let wait = if attempt < max_attempts { schedule.next_backoff() } else { None };
                match wait {
                    Some(wait) => delay(wait).await,
                    None => {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last_error,
                        })
                    }
                }
            }
        }
        attempt += 1;
    }
}
