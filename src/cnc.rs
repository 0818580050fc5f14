pub mod connection;
pub mod gcode;
pub mod grbl;
pub mod simulator;
