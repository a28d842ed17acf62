pub mod add;
pub mod common;
pub mod completions;
pub mod duplicate;
pub mod edit;
pub mod list;
pub mod remove;
pub mod show;
pub mod sync;
