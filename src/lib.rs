//! Two-layer route authorization gate.
//!
//! ARCHITECTURE
//! ============
//! Every navigation crosses two authorization layers that must agree on
//! outcomes while seeing different information at different times:
//!
//! - the **edge interceptor** runs before any content is produced and sees
//!   only credential presence ([`edge`]),
//! - the **route guard** runs once the session lookup settles and sees the
//!   resolved identity and role ([`guard`]).
//!
//! Both classify paths through the same static table ([`classify`]), read
//! session state from one observable store ([`session`]), and dispatch at
//! most one redirect per navigation ([`redirect`]).

pub mod classify;
pub mod config;
pub mod edge;
pub mod guard;
pub mod identity;
pub mod redirect;
pub mod routes;
pub mod session;
pub mod state;
