//! # autocritic-ledger
//!
//! Durable history of critique invocations.
//!
//! Each invocation produces one [`CritiqueRecord`], built incrementally by a
//! [`RecordBuilder`] while gateway calls complete and appended to the
//! [`LedgerStore`] once the invocation reaches a terminal state.
//!
//! ## Document layout
//!
//! ```json
//! {
//!     "reflection_data": [
//!         {
//!             "human_question": "...",
//!             "reflection": "...",
//!             "time_cost": 3.2,
//!             "llm_use": 1,
//!             "llm_cost": {"prompt_token": 812, "completion_tokens": 240, "cost(USD)": 0.0388},
//!             "add_memory": true,
//!             "reflection_action": 2
//!         }
//!     ]
//! }
//! ```

mod record;
mod store;

pub use record::{
    ActionCount, CritiqueRecord, LedgerStats, LlmCost, RecordBuilder, RecordFilter, RecordOutcome,
};
pub use store::{LedgerDocument, LedgerError, LedgerStore, DEFAULT_LEDGER_FILE};
