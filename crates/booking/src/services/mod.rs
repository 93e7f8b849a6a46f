//! Gateway contracts and their in-memory implementations.

pub mod agreement;
pub mod notification;
pub mod payment;
