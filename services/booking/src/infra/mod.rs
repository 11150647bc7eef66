pub mod cache;
pub mod calendar;
pub mod db;
pub mod http;
pub mod mail;
pub mod meeting;
pub mod messaging;
