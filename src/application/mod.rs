//! Application layer orchestrating the conversation and the deal lifecycle.
//!
//! [`engine::EscrowEngine`] is the entry point: it serializes each user's turns
//! through [`session::SessionRegistry`], consults [`gate::Gate`] for privileged and
//! throttled actions, drives [`conversation::step`] and applies status changes via
//! [`lifecycle::DealLifecycle`].

pub mod action;
pub mod conversation;
pub mod engine;
pub mod gate;
pub mod lifecycle;
pub mod session;
pub mod view;
