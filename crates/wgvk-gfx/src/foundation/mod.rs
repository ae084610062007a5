pub mod chain;
pub mod debug_messenger;
