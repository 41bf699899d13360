pub mod attendance;
pub mod messages;
pub mod training_time;
