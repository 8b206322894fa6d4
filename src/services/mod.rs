//! Business-logic services over `ProfileDb`. The request layer calls these;
//! they own the domain rules and transactional boundaries.

pub mod advisor;
pub mod chat;
pub mod events;
pub mod network;
pub mod progress;
