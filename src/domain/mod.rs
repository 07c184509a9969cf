//! Domain layer: deals, payment claims, users, the transition table and the
//! storage ports the application layer talks to.

pub mod deal;
pub mod lifecycle;
pub mod payment;
pub mod ports;
pub mod user;
