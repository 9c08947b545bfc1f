// server/src/services/mod.rs

//! Collaborators behind the pipelines: payment gateway, document rendering and
//! storage, post-payment hooks, and invoice follow-ups.

pub mod billing;
pub mod gateway;
pub mod notifier;
pub mod renderer;
