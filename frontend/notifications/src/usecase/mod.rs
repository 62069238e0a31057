pub mod contracts;
pub mod error;
pub mod notifications;
pub mod polling;
pub mod provider;
pub mod push;
