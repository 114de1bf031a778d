//! # Core Module
//!
//! This module provides the stateless building blocks of the neural-network force bridge.
//!
//! ## Overview
//!
//! Everything in here is plain data or pure conversion logic. Nothing touches an
//! accelerator; the [`engine`](crate::engine) layer owns device state and drives these
//! types once per simulation step.
//!
//! - **Graph Description** ([`graph`]) - Immutable serialized graph bytes and periodicity flag
//! - **Tensor Contract** ([`tensor`]) - Tensor names, shapes, element types and host staging
//! - **Periodic Geometry** ([`pbc`]) - Reduced triclinic boxes and primary-cell wrapping
//! - **Force Description** ([`force`]) - The user-facing force object and its saved record
//! - **Step Totals** ([`state`]) - The host's additive per-step energy and force accumulator

pub mod force;
pub mod graph;
pub mod pbc;
pub mod state;
pub mod tensor;
