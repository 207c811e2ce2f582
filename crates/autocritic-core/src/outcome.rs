use autocritic_critic::{ActionCode, RepairError, Repaired};
use serde::Serialize;

/// How the final action was resolved after the primary critique
#[derive(Debug)]
pub enum Resolution {
    /// The critique's trailing answer was a valid action
    Extracted(ActionCode),
    /// Extraction failed and the repair exchange recovered an action
    Repaired(Repaired),
    /// Extraction failed and every repair attempt failed too
    Exhausted(RepairError),
}

impl Resolution {
    pub fn action(&self) -> Option<ActionCode> {
        match self {
            Resolution::Extracted(action) => Some(*action),
            Resolution::Repaired(repaired) => Some(repaired.action),
            Resolution::Exhausted(_) => None,
        }
    }
}

/// The result of one critique invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Correction {
    /// The critic agreed with the driver's action; nothing to learn
    Unchanged { action: ActionCode },
    /// The critic proposed a different action
    Corrected {
        critique: String,
        action: ActionCode,
        /// Whether the action came from the repair exchange
        repaired: bool,
    },
    /// No valid action could be recovered
    Unrecoverable { attempts: usize },
}

impl Correction {
    /// Collapse into `(critique, action)`, where both "unchanged" and
    /// "unrecoverable" read as `(None, None)`.
    pub fn into_pair(self) -> (Option<String>, Option<ActionCode>) {
        match self {
            Correction::Corrected {
                critique, action, ..
            } => (Some(critique), Some(action)),
            Correction::Unchanged { .. } | Correction::Unrecoverable { .. } => (None, None),
        }
    }

    pub fn action(&self) -> Option<ActionCode> {
        match self {
            Correction::Unchanged { action } | Correction::Corrected { action, .. } => {
                Some(*action)
            }
            Correction::Unrecoverable { .. } => None,
        }
    }

    pub fn is_corrected(&self) -> bool {
        matches!(self, Correction::Corrected { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Correction::Unchanged { .. } => "unchanged",
            Correction::Corrected { .. } => "corrected",
            Correction::Unrecoverable { .. } => "unrecoverable",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Correction::Unchanged { .. } | Correction::Corrected { .. } => 0,
            Correction::Unrecoverable { .. } => 3,
        }
    }
}
