//! Steps and step builders.
//!
//! A [`Step`] is one unit of a composed mutation. Most steps are built from
//! closures with the helpers in this module; anything more involved can
//! implement the trait directly.
//!
//! ## Example
//!
//! ```ignore
//! use lab_booking_sync::mutation::{step_with_rollback, Compensation, StepContext};
//!
//! async fn insert(ctx: StepContext<CreateBooking>) -> Result<Value, StepError> {
//!     let booking = ctx.ports.cache.bookings().add_optimistic_booking(&ctx.vars.input())?;
//!     Ok(serde_json::to_value(booking)?)
//! }
//!
//! let insert = step_with_rollback(
//!     "optimistic-insert",
//!     insert,
//!     |_vars, result| {
//!         Some(Compensation::RemoveOptimisticBooking {
//!             temp_id: result["id"].as_str()?.to_string(),
//!         })
//!     },
//! );
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::compensation::Compensation;
use super::error::StepError;
use crate::keys::QueryKey;
use crate::ports::Ports;

/// What a running step can reach: the ports, and a place to register
/// compensations.
pub struct StepHandle {
    ports: Ports,
    rollbacks: Vec<Compensation>,
}

impl StepHandle {
    pub(crate) fn new(ports: Ports) -> Self {
        Self {
            ports,
            rollbacks: Vec::new(),
        }
    }

    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    /// Register a compensation. It only takes effect if the step succeeds.
    pub fn register_rollback(&mut self, compensation: Compensation) {
        self.rollbacks.push(compensation);
    }

    pub(crate) fn into_rollbacks(self) -> Vec<Compensation> {
        self.rollbacks
    }
}

#[async_trait]
pub trait Step<V>: Send + Sync {
    fn name(&self) -> &str;

    /// Run the step. `prior` holds the results of every step completed so
    /// far, in completion order.
    async fn execute(
        &self,
        variables: Arc<V>,
        prior: Vec<Value>,
        handle: &mut StepHandle,
    ) -> Result<Value, StepError>;
}

/// Owned inputs handed to closure-built steps.
pub struct StepContext<V> {
    pub vars: Arc<V>,
    pub prior: Vec<Value>,
    pub ports: Ports,
}

impl<V> StepContext<V> {
    /// Result of the completed step at `index`, or `Null`.
    pub fn prior_result(&self, index: usize) -> &Value {
        self.prior.get(index).unwrap_or(&Value::Null)
    }
}

type RollbackFn<V> = Box<dyn Fn(&V, &Value) -> Vec<Compensation> + Send + Sync>;

/// A step built from a closure, with an optional rollback derived from its
/// result.
pub struct FnStep<V, F> {
    name: String,
    run: F,
    rollback: Option<RollbackFn<V>>,
}

#[async_trait]
impl<V, F, Fut> Step<V> for FnStep<V, F>
where
    V: Send + Sync + 'static,
    F: Fn(StepContext<V>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, StepError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        variables: Arc<V>,
        prior: Vec<Value>,
        handle: &mut StepHandle,
    ) -> Result<Value, StepError> {
        let ctx = StepContext {
            vars: Arc::clone(&variables),
            prior,
            ports: handle.ports().clone(),
        };
        let result = (self.run)(ctx).await?;
        if let Some(rollback) = &self.rollback {
            for compensation in rollback(&variables, &result) {
                handle.register_rollback(compensation);
            }
        }
        Ok(result)
    }
}

/// A step with no compensation.
pub fn step<V, F, Fut>(name: &str, run: F) -> Box<dyn Step<V>>
where
    V: Send + Sync + 'static,
    F: Fn(StepContext<V>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
{
    Box::new(FnStep {
        name: name.to_string(),
        run,
        rollback: None,
    })
}

/// A step whose compensations are computed from its variables and result
/// once it succeeds. `rollback` may return an `Option` or a `Vec`; several
/// compensations are unwound in reverse.
pub fn step_with_rollback<V, F, Fut, R, I>(name: &str, run: F, rollback: R) -> Box<dyn Step<V>>
where
    V: Send + Sync + 'static,
    F: Fn(StepContext<V>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    R: Fn(&V, &Value) -> I + Send + Sync + 'static,
    I: IntoIterator<Item = Compensation>,
{
    Box::new(FnStep {
        name: name.to_string(),
        run,
        rollback: Some(Box::new(move |vars: &V, result: &Value| {
            rollback(vars, result).into_iter().collect()
        })),
    })
}

/// Snapshots a cache entry, writes the patched value, and registers a
/// restore of the snapshot.
pub struct OptimisticStep<K, P> {
    name: String,
    key: K,
    patch: P,
}

#[async_trait]
impl<V, K, P> Step<V> for OptimisticStep<K, P>
where
    V: Send + Sync + 'static,
    K: Fn(&V) -> QueryKey + Send + Sync,
    P: Fn(&V, Option<Value>) -> Value + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        variables: Arc<V>,
        _prior: Vec<Value>,
        handle: &mut StepHandle,
    ) -> Result<Value, StepError> {
        let key = (self.key)(&variables);
        let cache = &handle.ports().cache;
        let snapshot = cache.get_query_data(&key)?;
        let patched = (self.patch)(&variables, snapshot.clone());
        cache.set_query_data(&key, patched.clone())?;
        handle.register_rollback(Compensation::restore(key, snapshot));
        Ok(patched)
    }
}

pub fn optimistic_step<V, K, P>(name: &str, key: K, patch: P) -> Box<dyn Step<V>>
where
    V: Send + Sync + 'static,
    K: Fn(&V) -> QueryKey + Send + Sync + 'static,
    P: Fn(&V, Option<Value>) -> Value + Send + Sync + 'static,
{
    Box::new(OptimisticStep {
        name: name.to_string(),
        key,
        patch,
    })
}

/// Invalidates a set of keys. Invalidation is never rolled back.
pub struct InvalidationStep<K> {
    name: String,
    keys: K,
}

#[async_trait]
impl<V, K> Step<V> for InvalidationStep<K>
where
    V: Send + Sync + 'static,
    K: Fn(&V) -> Vec<QueryKey> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        variables: Arc<V>,
        _prior: Vec<Value>,
        handle: &mut StepHandle,
    ) -> Result<Value, StepError> {
        let mut invalidated = 0;
        for key in (self.keys)(&variables) {
            invalidated += handle.ports().cache.invalidate_queries(&key)?;
        }
        Ok(json!({ "invalidated": invalidated }))
    }
}

pub fn invalidation_step<V, K>(name: &str, keys: K) -> Box<dyn Step<V>>
where
    V: Send + Sync + 'static,
    K: Fn(&V) -> Vec<QueryKey> + Send + Sync + 'static,
{
    Box::new(InvalidationStep {
        name: name.to_string(),
        keys,
    })
}

/// POSTs a body built from the variables. With a compensating path, a
/// successful call registers a DELETE of the same body.
pub struct ApiStep<B> {
    name: String,
    path: String,
    body: B,
    compensating: Option<String>,
}

#[async_trait]
impl<V, B> Step<V> for ApiStep<B>
where
    V: Send + Sync + 'static,
    B: Fn(&V, &[Value]) -> Value + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        variables: Arc<V>,
        prior: Vec<Value>,
        handle: &mut StepHandle,
    ) -> Result<Value, StepError> {
        let body = (self.body)(&variables, &prior);
        let response = handle.ports().api.post(&self.path, body.clone()).await?;
        if let Some(path) = &self.compensating {
            handle.register_rollback(Compensation::delete(path.clone(), body));
        }
        Ok(response)
    }
}

pub fn api_step<V, B>(name: &str, path: &str, body: B, compensating: Option<&str>) -> Box<dyn Step<V>>
where
    V: Send + Sync + 'static,
    B: Fn(&V, &[Value]) -> Value + Send + Sync + 'static,
{
    Box::new(ApiStep {
        name: name.to_string(),
        path: path.to_string(),
        body,
        compensating: compensating.map(str::to_string),
    })
}
