//! Agent runtime - transcript extraction and orchestration
//!
//! This crate is the "brain" of minuteman: a bounded ReAct-style loop that
//! turns meeting transcripts and user utterances into structured records by
//! selecting one extraction capability at a time, invoking it against a
//! schema-constrained generation backend, and feeding the observation back
//! into the next selection.
//!
//! # Architecture
//!
//! 1. **Capability registry** (`capability`) - the closed set of extraction
//!    steps and the guidance text the selection prompt sees
//! 2. **Structured extraction** (`extractor`) - one validated backend call
//!    per capability; malformed output is rejected, never defaulted
//! 3. **Preference reconciliation** (`reconcile`) - merge new categories
//!    into the user's existing set and upsert best-effort
//! 4. **Orchestration** (`runtime`) - the Selecting/Invoking/Observing loop
//!    with an iteration cap and a single terminal outcome
//! 5. **Event stream** (`events`) - token fragments and capability
//!    lifecycle multiplexed into one ordered channel per run
//! 6. **Mindmap generation** (`mindmap`) - a one-shot Markdown outline
//!    over saved conclusions, outside the loop
//!
//! # Safety principle
//!
//! The backend judges semantics (which capability fits, whether two
//! preference categories mean the same thing). Everything structural -
//! schema validation, deadline rules, iteration bounds, upsert keys - is
//! enforced deterministically here.

pub mod capability;
pub mod client;
pub mod error;
pub mod events;
pub mod extractor;
pub mod llm;
pub mod mindmap;
pub mod prompts;
pub mod reconcile;
pub mod record;
pub mod runtime;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use capability::{Capability, CapabilityDescriptor, CapabilityRegistry};
pub use client::OpenAiCompatibleClient;
pub use error::AgentError;
pub use events::{AgentEvent, EventSink};
pub use extractor::{CapabilityOutput, StructuredExtractor};
pub use llm::LlmClient;
pub use mindmap::MindmapGenerator;
pub use reconcile::{PersistStatus, PreferenceReconciler, ReconciledPreference};
pub use record::MeetingRecordBuilder;
pub use runtime::{AgentDeps, AgentRuntime, RunRequest};
pub use session::{AgentSessionState, AgentStep};
