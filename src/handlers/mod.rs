//! HTTP handlers

pub mod health;
pub mod cache;
pub mod predict;
pub mod routing;
