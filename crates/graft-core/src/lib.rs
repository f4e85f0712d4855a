//! graft-core — the middle tier of a cross-compiler from a statically-typed,
//! class-based source language to a dynamically-typed prototype runtime.
//!
//! The core consumes resolved syntax trees produced by an external semantic
//! frontend (see [`front`]), builds an independent IR ([`ir`]), lowers every
//! frontend construct ([`build`], [`lower`]), and runs a pipeline of
//! whole-program analyses and rewrites to a fixed point ([`pipeline`],
//! [`passes`]). Final code-text emission is out of scope; the emission
//! boundary is the pruned, fully-lowered [`ir::Program`].

pub mod build;
pub mod diag;
pub mod entity;
pub mod error;
pub mod front;
pub mod ir;
pub mod lower;
pub mod passes;
pub mod pipeline;

pub use error::{CoreError, InternalError};
pub use pipeline::{compile, CompileOutput, Pass, PassConfig, PassPipeline, PassResult};
