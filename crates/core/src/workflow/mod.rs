pub mod log;
pub mod machine;
