//! sea-orm entities owned by the booking service.

pub mod action_tokens;
pub mod bookings;
pub mod business_hours;
pub mod scheduled_messages;
pub mod services;
