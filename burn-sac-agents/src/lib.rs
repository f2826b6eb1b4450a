pub mod off_policy;
pub mod repeat_observation;
pub mod sac;
