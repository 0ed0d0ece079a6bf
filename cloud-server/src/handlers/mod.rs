//! HTTP handlers

pub mod agent;
pub mod health;
pub mod operator;
