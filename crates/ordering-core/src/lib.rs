//! Ordering Core: shared event-sourcing abstractions.
//!
//! This crate defines the fundamental traits and types that the order
//! context, the event store, and the subscription publisher depend on. It
//! contains no infrastructure code.

pub mod aggregate;
pub mod broker;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod handler;
pub mod reconstruction;
pub mod repository;
pub mod subscription;
