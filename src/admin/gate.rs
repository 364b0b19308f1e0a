// Admin access gate
// This file drives the admin-claim check as a small state machine:
// Idle -> Attempting(n) -> Authorized | Denied. Freshly granted claims may
// take a moment to propagate, so a negative answer is retried a bounded
// number of times before the gate settles on Denied.
//
// Numan Thabit 2025 Nov

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use crate::config::AdminConfig;
use crate::errors::AuthError;
use crate::metrics::ADMIN_ATTEMPTS;

/// Source of the caller's admin claim.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider: Send + Sync {
    async fn is_admin(&self) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCheckState {
    Idle,
    Attempting { attempt: u32 },
    Authorized { attempt: u32 },
    Denied { attempts: u32, error_message: String },
}

impl AdminCheckState {
    pub fn attempt(&self) -> u32 {
        match self {
            AdminCheckState::Idle => 0,
            AdminCheckState::Attempting { attempt } | AdminCheckState::Authorized { attempt } => *attempt,
            AdminCheckState::Denied { attempts, .. } => *attempts,
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, AdminCheckState::Authorized { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            AdminCheckState::Denied { error_message, .. } => Some(error_message),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AdminCheckState::Authorized { .. } | AdminCheckState::Denied { .. })
    }
}

pub type DelayFn = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct AdminAccessGate<I> {
    identity: I,
    policy: RetryPolicy,
    delay: DelayFn,
    state: watch::Sender<AdminCheckState>,
    // one check sequence at a time
    running: Mutex<()>,
}

impl<I: IdentityProvider> AdminAccessGate<I> {
    pub fn new(identity: I, config: &AdminConfig) -> Self {
        Self::with_policy(identity, RetryPolicy::new(config.max_attempts, config.retry_delay()))
    }

    pub fn with_policy(identity: I, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(AdminCheckState::Idle);
        Self {
            identity,
            policy,
            delay: Arc::new(|d| tokio::time::sleep(d).boxed()),
            state,
            running: Mutex::new(()),
        }
    }

    /// Replace the wait between attempts, e.g. with a no-op in tests.
    pub fn with_delay<F, Fut>(mut self, delay: F) -> Self
    where
        F: Fn(Duration) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.delay = Arc::new(move |d| delay(d).boxed());
        self
    }

    pub fn state(&self) -> AdminCheckState {
        self.state.borrow().clone()
    }

    /// Observe every transition, including intermediate attempts.
    pub fn watch(&self) -> watch::Receiver<AdminCheckState> {
        self.state.subscribe()
    }

    /// Run the check unless the gate already settled, in which case the
    /// settled outcome is returned again. Returns the authorizing attempt.
    #[tracing::instrument(skip_all, fields(max_attempts = self.policy.max_attempts))]
    pub async fn check(&self) -> Result<u32, AuthError> {
        let _guard = self.running.lock().await;
        if let Some(settled) = settled_outcome(&self.state()) {
            return settled;
        }

        let identity = &self.identity;
        let state = &self.state;
        let delay = self.delay.clone();
        let outcome = self
            .policy
            .run(
                |attempt| {
                    state.send_replace(AdminCheckState::Attempting { attempt });
                    async move {
                        let verdict = match identity.is_admin().await {
                            Ok(true) => Ok(()),
                            Ok(false) => Err("not an admin".to_string()),
                            Err(err) => Err(err.to_string()),
                        };
                        let label = if verdict.is_ok() { "granted" } else { "refused" };
                        ADMIN_ATTEMPTS.with_label_values(&[label]).inc();
                        if let Err(reason) = &verdict {
                            debug!(attempt, reason = %reason, "admin check attempt failed");
                        }
                        verdict
                    }
                },
                |d| delay(d),
            )
            .await;

        match outcome {
            Ok(done) => {
                info!(attempt = done.attempt, "admin access granted");
                self.state.send_replace(AdminCheckState::Authorized { attempt: done.attempt });
                Ok(done.attempt)
            }
            Err(exhausted) => {
                warn!(
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "admin access denied"
                );
                self.state.send_replace(AdminCheckState::Denied {
                    attempts: exhausted.attempts,
                    error_message: exhausted.last_error.clone(),
                });
                Err(AuthError::Exhausted {
                    attempts: exhausted.attempts,
                    last_error: exhausted.last_error,
                })
            }
        }
    }

    /// Back to Idle so a new sequence can start.
    pub async fn reset(&self) {
        let _guard = self.running.lock().await;
        self.state.send_replace(AdminCheckState::Idle);
    }
}

fn settled_outcome(state: &AdminCheckState) -> Option<Result<u32, AuthError>> {
    match state {
        AdminCheckState::Authorized { attempt } => Some(Ok(*attempt)),
        AdminCheckState::Denied { attempts, error_message } => Some(Err(AuthError::Exhausted {
            attempts: *attempts,
            last_error: error_message.clone(),
        })),
        _ => None,
    }
}
