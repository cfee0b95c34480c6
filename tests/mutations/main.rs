//! ComposedMutation integration tests: ordering, prior results, rollback.

mod support;
mod sequential;
mod parallel;
