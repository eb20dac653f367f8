pub mod config;
pub mod deadline;
pub mod domain;
pub mod errors;

pub use deadline::{Deadline, UNRESOLVED_SENTINEL};
pub use domain::meeting::{AgendaConclusion, BasicInfo, FollowUp, MeetingRecord, TodoItem};
pub use domain::preference::Preference;
pub use domain::todo::{NewTodo, TodoRecord, TodoStatus, TodoUpdate};
pub use errors::DomainError;
