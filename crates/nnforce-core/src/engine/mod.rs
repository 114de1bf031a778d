//! # Engine Module
//!
//! This module implements the stateful side of the neural-network force bridge: everything
//! that owns accelerator resources or lives for the duration of a simulation context.
//!
//! ## Overview
//!
//! Once per simulation step the host calls into a [`force_impl::NeuralForceImpl`], which
//! forwards to a platform kernel resolved through the [`registry`]. On its first call the
//! kernel builds an [`execution::ExecutionContext`]: the graph is compiled once and its
//! input and output device buffers are allocated once. Every step afterwards the
//! [`marshal`] layer writes positions (and box vectors) into those buffers, the graph runs,
//! and the [`extract`] layer adds the resulting energy and forces into the host's totals.
//!
//! ## Architecture
//!
//! - **Accelerator Seam** ([`accelerator`]) - Traits implemented by a device/inference-engine pair
//! - **Configuration** ([`config`]) - Platform properties: device, precision and precision policy
//! - **Error Handling** ([`error`]) - The umbrella error returned across the engine
//! - **Execution** ([`execution`]) - Compiled graph plus persistent device buffers
//! - **Marshalling** ([`marshal`]) - Host coordinates into staged input tensors
//! - **Extraction** ([`extract`]) - Output tensors into additive host totals
//! - **Kernels** ([`kernel`]) - Lazily initialized per-context kernel state machine
//! - **Registry** ([`registry`]) - Kernel factories keyed by kernel name and platform
//! - **Force Binding** ([`force_impl`]) - One force bound to one kernel in one context

pub mod accelerator;
pub mod config;
pub mod error;
pub mod execution;
pub mod extract;
pub mod force_impl;
pub mod kernel;
pub mod marshal;
pub mod registry;
