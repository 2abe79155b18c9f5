//! Domain services used by HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the session state machine and the navigation guard so
//! route handlers stay focused on cookies and protocol translation.

pub mod guard;
pub mod session_store;
