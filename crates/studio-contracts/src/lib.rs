pub mod chat;
pub mod errors;
pub mod operations;
pub mod session;
