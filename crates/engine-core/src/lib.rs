pub mod connector;
pub mod error;
pub mod progress;
pub mod source;
pub mod state;
pub mod tracker;
