use std::time::{Duration, Instant};

use autocritic_critic::{ActionCode, CallSink, CallStats, CritiqueInput};
use autocritic_ledger::RecordBuilder;
use autocritic_logging::{LogEvent, Logger};

/// Caller-supplied inputs for one critique invocation
#[derive(Debug, Clone)]
pub struct ReflectionInput {
    /// Scenario description the driver saw
    pub scenario: String,
    /// The driver's full decision text
    pub prior_response: String,
    /// Evaluation of the decision
    pub evaluation: String,
    /// Action the driver actually took
    pub prior_action: ActionCode,
}

impl ReflectionInput {
    pub fn new(
        scenario: impl Into<String>,
        prior_response: impl Into<String>,
        evaluation: impl Into<String>,
        prior_action: ActionCode,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            prior_response: prior_response.into(),
            evaluation: evaluation.into(),
            prior_action,
        }
    }

    pub fn critique_input(&self) -> CritiqueInput<'_> {
        CritiqueInput {
            scenario: &self.scenario,
            prior_response: &self.prior_response,
            evaluation: &self.evaluation,
        }
    }
}

/// Per-invocation state: identity, timing and the record being built
pub struct InvocationContext {
    pub id: String,
    pub builder: RecordBuilder,
    started_at: Instant,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string()[..8].to_string(),
            builder: RecordBuilder::new(),
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Call sink that folds every gateway call into this invocation's
    /// record and reports it to the logger
    pub fn sink<'a>(&'a mut self, logger: &'a Logger) -> InvocationSink<'a> {
        InvocationSink {
            invocation: &self.id,
            builder: &mut self.builder,
            logger,
        }
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InvocationSink<'a> {
    invocation: &'a str,
    builder: &'a mut RecordBuilder,
    logger: &'a Logger,
}

impl CallSink for InvocationSink<'_> {
    fn record_call(&mut self, call: &CallStats) {
        self.builder.record_call(call);
        self.logger.log(&LogEvent::GatewayCallCompleted {
            invocation: self.invocation.to_string(),
            call: self.builder.llm_use(),
            duration_secs: call.duration.as_secs_f64(),
            prompt_tokens: call.usage.prompt_tokens,
            completion_tokens: call.usage.completion_tokens,
            cost_usd: call.usage.cost_usd,
        });
    }
}
