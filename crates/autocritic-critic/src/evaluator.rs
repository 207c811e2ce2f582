use autocritic_gateway::{ChatMessage, Gateway, GatewayError, GatewayReply, Usage};
use std::time::Duration;
use tracing::{debug, info};

use crate::CritiquePrompts;

/// Cost and latency of a single gateway call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CallStats {
    pub duration: Duration,
    pub usage: Usage,
}

impl From<&GatewayReply> for CallStats {
    fn from(reply: &GatewayReply) -> Self {
        Self {
            duration: reply.duration,
            usage: reply.usage,
        }
    }
}

/// Receives accounting for every gateway call an exchange makes
pub trait CallSink: Send {
    fn record_call(&mut self, call: &CallStats);
}

/// Inputs to the primary critique exchange
#[derive(Clone, Copy)]
pub struct CritiqueInput<'a> {
    pub scenario: &'a str,
    pub prior_response: &'a str,
    pub evaluation: &'a str,
}

/// Result of the primary critique exchange
#[derive(Debug, Clone)]
pub struct PrimaryCritique {
    /// Human message that was submitted
    pub human_question: String,
    /// Raw critique text
    pub text: String,
    pub call: CallStats,
}

/// Runs the primary critique exchange against a gateway
pub struct CritiqueExchange<'a> {
    gateway: &'a dyn Gateway,
}

impl<'a> CritiqueExchange<'a> {
    pub fn new(gateway: &'a dyn Gateway) -> Self {
        Self { gateway }
    }

    /// Compose the two-message conversation for the given inputs
    pub fn build_messages(input: CritiqueInput<'_>) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(CritiquePrompts::system_message()),
            ChatMessage::human(CritiquePrompts::critique_message(
                input.scenario,
                input.prior_response,
                input.evaluation,
            )),
        ]
    }

    /// Submit the critique request exactly once. Gateway failures are not
    /// retried here.
    pub async fn critique(
        &self,
        input: CritiqueInput<'_>,
    ) -> Result<PrimaryCritique, CritiqueError> {
        for (field, value) in [
            ("scenario", input.scenario),
            ("prior response", input.prior_response),
            ("evaluation", input.evaluation),
        ] {
            if value.trim().is_empty() {
                return Err(CritiqueError::EmptyInput(field));
            }
        }

        let messages = Self::build_messages(input);
        let human_question = messages[1].content.clone();

        debug!(
            prompt_len = human_question.len(),
            gateway = self.gateway.name(),
            "Running primary critique"
        );

        let reply = self.gateway.submit(&messages).await?;

        info!(
            duration_secs = reply.duration.as_secs_f64(),
            prompt_tokens = reply.usage.prompt_tokens,
            completion_tokens = reply.usage.completion_tokens,
            lines = reply.text_lines(),
            "Critique received"
        );

        Ok(PrimaryCritique {
            human_question,
            call: CallStats::from(&reply),
            text: reply.text,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CritiqueError {
    #[error("Critique input is empty: {0}")]
    EmptyInput(&'static str),

    #[error("Gateway error during critique: {0}")]
    Gateway(#[from] GatewayError),
}
