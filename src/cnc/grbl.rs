pub mod buffer;
pub mod messages;
pub mod parser;
pub mod realtime;
pub mod tracker;
