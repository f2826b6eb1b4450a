pub mod replay_buffer;
pub mod transition;
pub mod util;
