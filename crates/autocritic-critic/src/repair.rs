use autocritic_gateway::{ChatMessage, Gateway, GatewayError, Usage};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::{corrected_section, find_action_token, ActionCode, CallSink, CallStats, CritiquePrompts};

/// Longest pause between repair attempts
const MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("Gateway error during repair: {0}")]
    Gateway(#[from] GatewayError),

    #[error("No valid action in repair reply: {0:?}")]
    NoActionFound(String),

    #[error("Repair gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<RepairError>,
    },
}

/// Attempt ceiling and pacing for the repair exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairPolicy {
    pub max_attempts: usize,
    /// Pause before the second attempt; doubled for each later one
    pub backoff: Duration,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::ZERO,
        }
    }
}

impl RepairPolicy {
    fn delay_before(&self, attempt: usize) -> Duration {
        if attempt <= 1 || self.backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1u32 << (attempt - 2).min(16);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// A recovered action and how many attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub action: ActionCode,
    pub attempts: usize,
}

/// Bounded secondary exchange that recovers an action when extraction fails
pub struct RepairExchange<'a> {
    gateway: &'a dyn Gateway,
    policy: RepairPolicy,
}

impl<'a> RepairExchange<'a> {
    pub fn new(gateway: &'a dyn Gateway, policy: RepairPolicy) -> Self {
        Self { gateway, policy }
    }

    /// Ask the gateway to restate the critique's decision as one action id.
    ///
    /// Every call made is reported to `sink`, including failed ones.
    pub async fn repair(
        &self,
        critique: &str,
        sink: &mut dyn CallSink,
    ) -> Result<Repaired, RepairError> {
        let prompt = CritiquePrompts::repair_message(corrected_section(critique));
        let messages = [ChatMessage::human(prompt)];
        let max_attempts = self.policy.max_attempts.max(1);

        let mut last = None;
        for attempt in 1..=max_attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&messages, sink).await {
                Ok(action) => {
                    info!(attempt, action = action.code(), "Repair recovered an action");
                    return Ok(Repaired {
                        action,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Repair attempt failed");
                    last = Some(e);
                }
            }
        }

        Err(RepairError::Exhausted {
            attempts: max_attempts,
            last: Box::new(last.unwrap_or_else(|| RepairError::NoActionFound(String::new()))),
        })
    }

    async fn attempt(
        &self,
        messages: &[ChatMessage],
        sink: &mut dyn CallSink,
    ) -> Result<ActionCode, RepairError> {
        let started = Instant::now();
        let reply = match self.gateway.submit(messages).await {
            Ok(reply) => reply,
            Err(e) => {
                // Failed calls still count toward llm_use, with no usage.
                sink.record_call(&CallStats {
                    duration: started.elapsed(),
                    usage: Usage::default(),
                });
                return Err(e.into());
            }
        };
        sink.record_call(&CallStats::from(&reply));
        info!(reply = %reply.text.trim(), "Output checking result");

        find_action_token(&reply.text).ok_or(RepairError::NoActionFound(reply.text))
    }
}
