pub mod baseline;
pub mod drift;
pub mod resource;
pub mod workflow;
