pub mod ai;
pub mod log_sink;
pub mod proxy;
pub mod shell;
