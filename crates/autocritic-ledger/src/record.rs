use std::time::Duration;

use autocritic_critic::{ActionCode, CallSink, CallStats};
use serde::{Deserialize, Deserializer, Serialize};

/// Token and cost totals for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmCost {
    pub prompt_token: u64,
    pub completion_tokens: u64,
    #[serde(rename = "cost(USD)")]
    pub cost_usd: f64,
}

/// One finalized critique invocation, as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueRecord {
    pub human_question: String,
    pub reflection: String,
    /// Seconds spent inside gateway calls
    pub time_cost: f64,
    /// Gateway calls made
    pub llm_use: u32,
    pub llm_cost: LlmCost,
    /// Whether the critique changed the driver's decision
    pub add_memory: bool,
    /// None when no valid action could be recovered
    #[serde(default, deserialize_with = "lenient_action")]
    pub reflection_action: Option<ActionCode>,
}

/// Older ledgers store `0` (or other non-actions) for failed invocations;
/// read those as no action instead of rejecting the whole document.
fn lenient_action<'de, D>(deserializer: D) -> Result<Option<ActionCode>, D::Error>
where
    D: Deserializer<'de>,
{
    let code = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(code
        .as_ref()
        .and_then(serde_json::Value::as_i64)
        .and_then(ActionCode::from_code))
}

/// How an invocation ended, derived from a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Changed,
    Unchanged,
    Unrecoverable,
}

impl std::fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordOutcome::Changed => write!(f, "changed"),
            RecordOutcome::Unchanged => write!(f, "unchanged"),
            RecordOutcome::Unrecoverable => write!(f, "unrecoverable"),
        }
    }
}

impl std::str::FromStr for RecordOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "changed" | "corrected" => Ok(RecordOutcome::Changed),
            "unchanged" => Ok(RecordOutcome::Unchanged),
            "unrecoverable" | "failed" => Ok(RecordOutcome::Unrecoverable),
            _ => Err(format!("Unknown outcome: {}", s)),
        }
    }
}

impl CritiqueRecord {
    pub fn outcome(&self) -> RecordOutcome {
        match (self.reflection_action, self.add_memory) {
            (None, _) => RecordOutcome::Unrecoverable,
            (Some(_), true) => RecordOutcome::Changed,
            (Some(_), false) => RecordOutcome::Unchanged,
        }
    }

    /// Whether a repair exchange was needed
    pub fn was_repaired(&self) -> bool {
        self.llm_use > 1
    }
}

/// Per-invocation accumulator, threaded through each exchange and
/// finalized exactly once when the record is persisted.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    human_question: String,
    reflection: String,
    time_cost: Duration,
    llm_use: u32,
    llm_cost: LlmCost,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_question(&mut self, question: impl Into<String>) {
        self.human_question = question.into();
    }

    pub fn set_reflection(&mut self, reflection: impl Into<String>) {
        self.reflection = reflection.into();
    }

    pub fn llm_use(&self) -> u32 {
        self.llm_use
    }

    pub fn time_cost(&self) -> Duration {
        self.time_cost
    }

    pub fn llm_cost(&self) -> LlmCost {
        self.llm_cost
    }

    pub fn finish(self, action: Option<ActionCode>, add_memory: bool) -> CritiqueRecord {
        CritiqueRecord {
            human_question: self.human_question,
            reflection: self.reflection,
            time_cost: self.time_cost.as_secs_f64(),
            llm_use: self.llm_use,
            llm_cost: self.llm_cost,
            add_memory,
            reflection_action: action,
        }
    }
}

impl CallSink for RecordBuilder {
    fn record_call(&mut self, call: &CallStats) {
        self.time_cost += call.duration;
        self.llm_use += 1;
        // Unbilled calls still count as calls, but carry no token totals.
        if call.usage.billed {
            self.llm_cost.prompt_token += call.usage.prompt_tokens;
            self.llm_cost.completion_tokens += call.usage.completion_tokens;
            self.llm_cost.cost_usd += call.usage.cost_usd;
        }
    }
}

/// Filter parameters for listing records.
#[derive(Debug, Default)]
pub struct RecordFilter {
    pub outcome: Option<RecordOutcome>,
    pub action: Option<ActionCode>,
    /// Only records that needed a repair exchange
    pub repaired_only: bool,
}

impl RecordFilter {
    pub fn matches(&self, record: &CritiqueRecord) -> bool {
        if let Some(outcome) = self.outcome {
            if record.outcome() != outcome {
                return false;
            }
        }

        if let Some(action) = self.action {
            if record.reflection_action != Some(action) {
                return false;
            }
        }

        if self.repaired_only && !record.was_repaired() {
            return false;
        }

        true
    }
}

/// Aggregate statistics over the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_records: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub unrecoverable: usize,
    pub repaired: usize,
    pub total_calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_cost_usd: f64,
    pub avg_time_cost_secs: f64,
    pub by_action: Vec<ActionCount>,
}

/// Records resolved to a single action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCount {
    pub action: ActionCode,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocritic_gateway::Usage;

    fn call(billed: bool) -> CallStats {
        CallStats {
            duration: Duration::from_millis(1500),
            usage: Usage {
                prompt_tokens: 100,
                completion_tokens: 20,
                cost_usd: 0.5,
                billed,
            },
        }
    }

    #[test]
    fn test_builder_accumulates_calls() {
        let mut builder = RecordBuilder::new();
        builder.record_call(&call(true));
        builder.record_call(&call(true));
        builder.record_call(&call(false));

        let record = builder.finish(Some(ActionCode::Idle), true);
        assert_eq!(record.llm_use, 3);
        assert!((record.time_cost - 4.5).abs() < 1e-9);
        assert_eq!(record.llm_cost.prompt_token, 200);
        assert_eq!(record.llm_cost.completion_tokens, 40);
        assert!((record.llm_cost.cost_usd - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_serializes_with_ledger_field_names() {
        let mut builder = RecordBuilder::new();
        builder.set_question("q");
        builder.set_reflection("r");
        builder.record_call(&call(true));
        let json = serde_json::to_value(builder.finish(None, false)).unwrap();

        assert_eq!(json["human_question"], "q");
        assert_eq!(json["reflection"], "r");
        assert_eq!(json["llm_use"], 1);
        assert_eq!(json["llm_cost"]["prompt_token"], 100);
        assert_eq!(json["llm_cost"]["completion_tokens"], 20);
        assert_eq!(json["llm_cost"]["cost(USD)"], 0.5);
        assert_eq!(json["add_memory"], false);
        assert!(json["reflection_action"].is_null());
    }

    #[test]
    fn test_outcome_classification() {
        let base = RecordBuilder::new().finish(Some(ActionCode::Accelerate), true);
        assert_eq!(base.outcome(), RecordOutcome::Changed);

        let unchanged = RecordBuilder::new().finish(Some(ActionCode::Accelerate), false);
        assert_eq!(unchanged.outcome(), RecordOutcome::Unchanged);

        let failed = RecordBuilder::new().finish(None, false);
        assert_eq!(failed.outcome(), RecordOutcome::Unrecoverable);
    }

    #[test]
    fn test_filter_by_outcome_and_action() {
        let record = RecordBuilder::new().finish(Some(ActionCode::Decelerate), true);
        let filter = RecordFilter {
            outcome: Some(RecordOutcome::Changed),
            action: Some(ActionCode::Decelerate),
            repaired_only: false,
        };
        assert!(filter.matches(&record));

        let repaired = RecordFilter {
            repaired_only: true,
            ..Default::default()
        };
        assert!(!repaired.matches(&record));
    }
}
