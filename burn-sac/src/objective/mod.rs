pub mod sac;
pub mod temporal_difference;
