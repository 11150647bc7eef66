pub mod action_token;
pub mod availability;
pub mod booking;
pub mod dispatch;
pub mod notify;
pub mod rate_limit;
pub mod slots;
pub mod webhook;
