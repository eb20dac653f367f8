pub mod meeting;
pub mod preference;
pub mod todo;
