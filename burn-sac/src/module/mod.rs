pub mod actor;
pub mod actor_critic;
pub mod component;
pub mod critic;
pub mod distribution;
pub mod nn;
