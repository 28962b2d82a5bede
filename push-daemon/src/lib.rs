//! push-daemon: relays HTTP push-notification requests to Firebase Cloud
//! Messaging and manages its own lifecycle as a user-level OS service.

pub mod config;
pub mod controller;
pub mod daemon;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
