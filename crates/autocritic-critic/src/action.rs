use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A discrete driving maneuver the decision agent can take.
///
/// Variants are declared in code order, so `Ord` sorts by code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionCode {
    Accelerate,
    Decelerate,
    TurnLeft,
    TurnRight,
    Idle,
}

impl ActionCode {
    /// Every valid action, in the order the vocabulary table lists them
    pub const ALL: [ActionCode; 5] = [
        ActionCode::TurnLeft,
        ActionCode::Idle,
        ActionCode::TurnRight,
        ActionCode::Accelerate,
        ActionCode::Decelerate,
    ];

    /// Integer code on the wire and in prompts
    pub fn code(&self) -> i64 {
        match self {
            ActionCode::Accelerate => 1,
            ActionCode::Decelerate => 2,
            ActionCode::TurnLeft => 3,
            ActionCode::TurnRight => 4,
            ActionCode::Idle => 8,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ActionCode::Accelerate),
            2 => Some(ActionCode::Decelerate),
            3 => Some(ActionCode::TurnLeft),
            4 => Some(ActionCode::TurnRight),
            8 => Some(ActionCode::Idle),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ActionCode::TurnLeft => "Turn-left: change lane to the left of the current lane",
            ActionCode::Idle => "IDLE: remain in the current lane with current speed",
            ActionCode::TurnRight => "Turn-right: change lane to the right of the current lane",
            ActionCode::Accelerate => "Acceleration: accelerate the vehicle",
            ActionCode::Decelerate => "Deceleration: decelerate the vehicle",
        }
    }

    /// Short name for logs and terminal output
    pub fn name(&self) -> &'static str {
        match self {
            ActionCode::Accelerate => "accelerate",
            ActionCode::Decelerate => "decelerate",
            ActionCode::TurnLeft => "turn-left",
            ActionCode::TurnRight => "turn-right",
            ActionCode::Idle => "idle",
        }
    }

    /// Markdown table of the vocabulary, as embedded in prompts
    pub fn table() -> String {
        let mut table = String::from(
            "| Action_id | Action Description |\n|-----------|--------------------|\n",
        );
        for action in Self::ALL {
            table.push_str(&format!(
                "| {} | {} |\n",
                action.code(),
                action.description()
            ));
        }
        table
    }

    /// Literal codes, e.g. "[3,8,4,1,2]"
    pub fn code_list() -> String {
        let codes: Vec<String> = Self::ALL.iter().map(|a| a.code().to_string()).collect();
        format!("[{}]", codes.join(","))
    }
}

/// Whether an integer is a member of the action vocabulary
pub fn is_valid(code: i64) -> bool {
    ActionCode::from_code(code).is_some()
}

impl std::fmt::Display for ActionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for ActionCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code)
                .ok_or_else(|| format!("{} is not a valid action code", code));
        }
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

impl Serialize for ActionCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for ActionCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = i64::deserialize(deserializer)?;
        ActionCode::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid action code {}", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_closed() {
        let valid: Vec<i64> = (-5..20).filter(|c| is_valid(*c)).collect();
        assert_eq!(valid, vec![1, 2, 3, 4, 8]);
    }

    #[test]
    fn test_code_round_trips_through_from_code() {
        for action in ActionCode::ALL {
            assert_eq!(ActionCode::from_code(action.code()), Some(action));
        }
    }

    #[test]
    fn test_ordering_follows_codes() {
        let mut sorted = ActionCode::ALL;
        sorted.sort();
        let codes: Vec<i64> = sorted.iter().map(|a| a.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 8]);
    }

    #[test]
    fn test_parse_by_code_or_name() {
        assert_eq!("4".parse::<ActionCode>(), Ok(ActionCode::TurnRight));
        assert_eq!("Idle".parse::<ActionCode>(), Ok(ActionCode::Idle));
        assert!("5".parse::<ActionCode>().is_err());
        assert!("brake".parse::<ActionCode>().is_err());
    }

    #[test]
    fn test_serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&ActionCode::Idle).unwrap(), "8");
        let parsed: ActionCode = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, ActionCode::Decelerate);
        assert!(serde_json::from_str::<ActionCode>("7").is_err());
    }

    #[test]
    fn test_table_lists_every_action() {
        let table = ActionCode::table();
        for action in ActionCode::ALL {
            assert!(table.contains(action.description()));
        }
        assert_eq!(ActionCode::code_list(), "[3,8,4,1,2]");
    }
}
