use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReflectError {
    #[error("Critique failed: {0}")]
    Critique(#[from] autocritic_critic::CritiqueError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] autocritic_ledger::LedgerError),

    #[error("Ledger task failed: {0}")]
    Task(String),
}
