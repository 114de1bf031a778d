//! # nnforce Core Library
//!
//! A bridging layer that lets a molecular-dynamics engine use a pre-trained computational
//! graph (a neural network potential) as an additive force term. Once per simulation step
//! the particle positions, and for periodic systems the box vectors, are marshalled into the
//! graph's input tensors, the graph is executed on an accelerator, and the resulting energy
//! and forces are added into the host's per-step totals.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless data: the immutable graph descriptor, the tensor
//!   contract shared with the inference engine, periodic box geometry, the user-facing force
//!   description and the host's per-step accumulator.
//!
//! - **[`engine`]: The Logic Core.** Stateful orchestration: the accelerator seam, the
//!   execution context that owns the compiled graph and its persistent device buffers, the
//!   coordinate marshaller and result extractor, and the kernel factory registry that binds
//!   a force to a platform-specific kernel for one simulation context.

pub mod core;
pub mod engine;
