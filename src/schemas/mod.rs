// Data structures read from plan files and the embedded profiles.

pub mod plan;
