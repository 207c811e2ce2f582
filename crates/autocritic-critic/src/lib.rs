mod action;
pub mod evaluator;
mod extract;
mod prompts;
pub mod repair;

pub use action::{is_valid, ActionCode};
pub use evaluator::{CallSink, CallStats, CritiqueError, CritiqueExchange, CritiqueInput, PrimaryCritique};
pub use extract::{
    corrected_section, extract_action, find_action_token, ExtractionError, CORRECTED_MARKER,
    DELIMITER,
};
pub use prompts::CritiquePrompts;
pub use repair::{RepairError, RepairExchange, RepairPolicy, Repaired};
