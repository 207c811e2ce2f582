use std::sync::Arc;

use tracing::{debug, info, warn};

use autocritic_critic::{
    extract_action, ActionCode, CallSink, CritiqueExchange, RepairError, RepairExchange,
    RepairPolicy, DELIMITER,
};
use autocritic_gateway::Gateway;
use autocritic_ledger::{CritiqueRecord, LedgerStore};
use autocritic_logging::{LogEvent, Logger};

use crate::context::{InvocationContext, ReflectionInput};
use crate::error::ReflectError;
use crate::outcome::{Correction, Resolution};

/// Orchestrates critique, extraction, repair and persistence for each
/// invocation. Shareable across concurrent invocations.
pub struct ReflectionRunner {
    gateway: Arc<dyn Gateway>,
    ledger: Arc<LedgerStore>,
    logger: Arc<Logger>,
    policy: RepairPolicy,
}

impl ReflectionRunner {
    pub fn new(gateway: Arc<dyn Gateway>, ledger: Arc<LedgerStore>, logger: Arc<Logger>) -> Self {
        Self {
            gateway,
            ledger,
            logger,
            policy: RepairPolicy::default(),
        }
    }

    pub fn with_repair_policy(mut self, policy: RepairPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Critique a prior decision and return the corrected action, if any.
    ///
    /// Every terminal branch persists one record before returning. A gateway
    /// failure in the primary exchange aborts without persisting.
    pub async fn reflect(&self, input: &ReflectionInput) -> Result<Correction, ReflectError> {
        self.reflect_with_record(input)
            .await
            .map(|(correction, _)| correction)
    }

    /// Like [`reflect`](Self::reflect), also returning the persisted record
    pub async fn reflect_with_record(
        &self,
        input: &ReflectionInput,
    ) -> Result<(Correction, CritiqueRecord), ReflectError> {
        let mut ctx = InvocationContext::new();
        let invocation = ctx.id.clone();

        self.logger.log(&LogEvent::ReflectionStarted {
            invocation: invocation.clone(),
            gateway: self.gateway.name().to_string(),
            model: self.gateway.model().to_string(),
            prior_action: input.prior_action.code(),
            scenario_preview: input.scenario.chars().take(100).collect(),
        });

        let exchange = CritiqueExchange::new(self.gateway.as_ref());
        let critique = match exchange.critique(input.critique_input()).await {
            Ok(critique) => critique,
            Err(e) => {
                warn!(invocation = %invocation, error = %e, "Primary critique failed");
                self.logger.log(&LogEvent::ErrorEncountered {
                    invocation: invocation.clone(),
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        ctx.builder.set_question(critique.human_question.as_str());
        ctx.builder.set_reflection(critique.text.as_str());

        let resolution = {
            let mut sink = ctx.sink(&self.logger);
            sink.record_call(&critique.call);
            self.logger.log(&LogEvent::CritiqueReceived {
                invocation: invocation.clone(),
                lines: critique.text.lines().count(),
            });
            self.resolve(&invocation, &critique.text, &mut sink).await
        };

        let (correction, action, add_memory) = match resolution {
            Resolution::Exhausted(err) => {
                let attempts = match err {
                    RepairError::Exhausted { attempts, .. } => attempts,
                    _ => self.policy.max_attempts,
                };
                (Correction::Unrecoverable { attempts }, None, false)
            }
            Resolution::Extracted(action) => {
                let correction = Self::compare(input.prior_action, action, critique.text, false);
                let changed = correction.is_corrected();
                (correction, Some(action), changed)
            }
            Resolution::Repaired(repaired) => {
                let annotated = format!(
                    "{}\n{} Output checking result: {}",
                    critique.text, DELIMITER, repaired.action
                );
                let correction = Self::compare(input.prior_action, repaired.action, annotated, true);
                let changed = correction.is_corrected();
                (correction, Some(repaired.action), changed)
            }
        };

        let elapsed = ctx.elapsed();
        let record = ctx.builder.finish(action, add_memory);
        let record = self.persist(&invocation, record).await?;

        info!(
            invocation = %invocation,
            outcome = correction.label(),
            llm_use = record.llm_use,
            cost_usd = record.llm_cost.cost_usd,
            "Reflection finished"
        );
        self.logger.log(&LogEvent::ReflectionFinished {
            invocation: invocation.clone(),
            outcome: correction.label().to_string(),
            action: action.map(|a| a.code()),
            llm_use: record.llm_use,
            cost_usd: record.llm_cost.cost_usd,
            duration_secs: elapsed.as_secs_f64(),
        });

        Ok((correction, record))
    }

    /// Extract the final action, falling back to the repair exchange
    async fn resolve(
        &self,
        invocation: &str,
        critique: &str,
        sink: &mut dyn CallSink,
    ) -> Resolution {
        match extract_action(critique, DELIMITER) {
            Ok(action) => {
                self.logger.log(&LogEvent::ActionExtracted {
                    invocation: invocation.to_string(),
                    action: action.code(),
                });
                Resolution::Extracted(action)
            }
            Err(e) => {
                warn!(invocation, error = %e, "Critique output is not usable, checking it");
                self.logger.log(&LogEvent::ExtractionFailed {
                    invocation: invocation.to_string(),
                    reason: e.to_string(),
                });

                let repair = RepairExchange::new(self.gateway.as_ref(), self.policy);
                match repair.repair(critique, sink).await {
                    Ok(repaired) => {
                        self.logger.log(&LogEvent::RepairSucceeded {
                            invocation: invocation.to_string(),
                            action: repaired.action.code(),
                            attempts: repaired.attempts,
                        });
                        Resolution::Repaired(repaired)
                    }
                    Err(err) => {
                        let attempts = match &err {
                            RepairError::Exhausted { attempts, .. } => *attempts,
                            _ => self.policy.max_attempts,
                        };
                        self.logger.log(&LogEvent::RepairExhausted {
                            invocation: invocation.to_string(),
                            attempts,
                            error: err.to_string(),
                        });
                        Resolution::Exhausted(err)
                    }
                }
            }
        }
    }

    fn compare(
        prior: ActionCode,
        action: ActionCode,
        critique: String,
        repaired: bool,
    ) -> Correction {
        if action == prior {
            debug!(action = action.code(), "Critic kept the driver's action");
            Correction::Unchanged { action }
        } else {
            Correction::Corrected {
                critique,
                action,
                repaired,
            }
        }
    }

    async fn persist(
        &self,
        invocation: &str,
        record: CritiqueRecord,
    ) -> Result<CritiqueRecord, ReflectError> {
        let ledger = self.ledger.clone();
        let (records, record) =
            tokio::task::spawn_blocking(move || ledger.append(&record).map(|n| (n, record)))
                .await
                .map_err(|e| ReflectError::Task(e.to_string()))??;

        self.logger.log(&LogEvent::RecordPersisted {
            invocation: invocation.to_string(),
            path: self.ledger.path().to_path_buf(),
            records,
        });
        Ok(record)
    }
}
