use thiserror::Error;

use minuteman_core::DomainError;
use minuteman_db::repositories::RepositoryError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("generation backend error: {0}")]
    Backend(String),
    #[error("backend output failed schema validation: {0}")]
    SchemaValidation(String),
    #[error("could not parse capability selection: {0}")]
    SelectionParse(String),
    #[error("unknown capability `{0}`")]
    CapabilityNotFound(String),
    #[error("iteration cap of {0} reached before a final answer")]
    IterationCapExceeded(u32),
    #[error("run cancelled: the event consumer went away")]
    Cancelled,
    #[error(transparent)]
    Persistence(#[from] RepositoryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl AgentError {
    /// Whether the orchestrator may recover by re-prompting once instead of
    /// failing the run.
    pub fn is_recoverable_selection(&self) -> bool {
        matches!(self, Self::SelectionParse(_) | Self::CapabilityNotFound(_))
    }
}
