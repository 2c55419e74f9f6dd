// orderflow/src/workflow/mod.rs

//! A small step pipeline used to orchestrate multi-step order operations.
//!
//! Steps run in declaration order against a shared [`ContextData`]. A step may
//! register a compensation handler; when a later step fails, the compensations
//! of every step that already completed run in reverse order before the error
//! is returned. This is how checkout and payment-session creation undo partial
//! work (a claimed payment slot, for example) without leaking it.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod error;
pub mod execution;
pub mod step;

pub use context_data::ContextData;
pub use control::{StepControl, WorkflowOutcome};
pub use definition::Pipeline;
pub use error::WorkflowError;
pub use step::{Compensator, Handler, StepDef};
