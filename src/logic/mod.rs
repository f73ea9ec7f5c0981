//! Business logic.
//!
//! > **Logic** is the "business (or domain) logic" of the application. The router will pull the
//! > necessary information out of the HTTP request, and call into this module as quickly as
//! > possible to do all the actual work.

pub mod auth;
pub mod flights;
pub mod gate;
pub mod lookup;
