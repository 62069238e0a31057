pub mod filter;
pub mod notification;
pub mod preference;
pub mod push;
pub mod session;
