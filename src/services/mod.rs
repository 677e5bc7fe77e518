//! Business-logic services shared by the HTTP routes.

pub mod billing;
pub mod conversation;
pub mod delivery;
pub mod download;
pub mod email_auth;
pub mod session;
pub mod sweeper;
pub mod usage;
pub mod webhook_cache;
