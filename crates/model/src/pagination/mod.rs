pub mod offset;
pub mod partition;
