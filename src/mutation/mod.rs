//! Composed mutations with rollback.
//!
//! A [`ComposedMutation`] runs named steps against the [`Ports`](crate::ports::Ports),
//! either one after another or in concurrent groups. Each successful step may
//! register [`Compensation`]s. When a step fails, no later step runs; the
//! registered compensations are applied last-registered-first and the
//! original error is returned with a rollback report.
//!
//! ## Example
//!
//! ```ignore
//! use lab_booking_sync::mutation::{invalidation_step, step, ComposedMutation, StepContext};
//!
//! let mutation = ComposedMutation::sequential(
//!     ports,
//!     vec![
//!         step("validate", |ctx: StepContext<Input>| async move { validate(&ctx.vars) }),
//!         invalidation_step("invalidate", |vars: &Input| vec![booking_keys::by_user(&vars.user)]),
//!     ],
//! )
//! .named("create-booking");
//!
//! let outcome = mutation.run(input).await?;
//! ```

mod compensation;
mod engine;
mod error;
mod record;
mod step;

pub use compensation::{ApiMethod, Compensation};
pub use engine::{ComposedMutation, MutationOutcome};
pub use error::{CompletedStep, ComposedMutationError, RollbackResult, StepError};
pub use record::{ExecutionRecord, RollbackAction};
pub use step::{
    api_step, invalidation_step, optimistic_step, step, step_with_rollback, ApiStep, FnStep,
    InvalidationStep, OptimisticStep, Step, StepContext, StepHandle,
};
