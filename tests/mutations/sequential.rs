use lab_booking_sync::cache::QueryCache;
use lab_booking_sync::keys::booking_keys;
use lab_booking_sync::mutation::{
    api_step, optimistic_step, step, step_with_rollback, Compensation, ComposedMutation,
    StepContext, StepError,
};
use serde_json::{json, Value};

use crate::support::{fixture, slot};

struct Vars {
    seed: i64,
}

async fn double(ctx: StepContext<Vars>) -> Result<Value, StepError> {
    Ok(json!(ctx.vars.seed * 2))
}

async fn add_prior(ctx: StepContext<Vars>) -> Result<Value, StepError> {
    let prior = ctx.prior_result(0).as_i64().unwrap_or_default();
    Ok(json!(prior + 1))
}

async fn explode(_ctx: StepContext<Vars>) -> Result<Value, StepError> {
    Err(StepError::Other("step c exploded".into()))
}

#[tokio::test]
async fn later_steps_see_earlier_results() {
    let f = fixture();
    let mutation = ComposedMutation::sequential(
        f.ports.clone(),
        vec![step("double", double), step("add-prior", add_prior)],
    );

    let outcome = mutation.run(Vars { seed: 21 }).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.results, vec![json!(42), json!(43)]);
    assert_eq!(outcome.completed_steps[1].step, "add-prior");
}

#[tokio::test]
async fn failure_unwinds_in_reverse_and_reports_the_cause() {
    let f = fixture();
    f.cache.set_query_data(&slot("a"), json!("original-a")).unwrap();

    let mutation = ComposedMutation::sequential(
        f.ports.clone(),
        vec![
            optimistic_step("a", |_: &Vars| slot("a"), |_: &Vars, _| json!("patched-a")),
            step_with_rollback("b", double, |_: &Vars, _: &Value| {
                Some(Compensation::restore(slot("b"), None))
            }),
            api_step("c-api", "/things", |v: &Vars, _: &[Value]| json!({ "seed": v.seed }), Some("/things/undo")),
            step("c", explode),
            step("never", double),
        ],
    )
    .named("abc");

    let err = mutation.run(Vars { seed: 1 }).await.unwrap_err();

    assert_eq!(err.step, "c");
    assert_eq!(err.to_string(), "step c exploded");
    let unwound: Vec<&str> = err.rollback_results.iter().map(|r| r.step.as_str()).collect();
    assert_eq!(unwound, ["c-api", "b", "a"]);
    assert!(err.rolled_back_cleanly());
    let completed: Vec<&str> = err.completed_steps.iter().map(|s| s.step.as_str()).collect();
    assert_eq!(completed, ["a", "b", "c-api"]);

    assert_eq!(f.cache.get_query_data(&slot("a")).unwrap(), Some(json!("original-a")));
    let undo = f.api.calls_to("/things/undo");
    assert_eq!(undo.len(), 1);
    assert_eq!(undo[0].method, "DELETE");
    assert_eq!(undo[0].body, json!({ "seed": 1 }));
}

#[tokio::test]
async fn failing_compensations_are_reported_not_fatal() {
    let f = fixture();
    f.api.set(
        "/undo",
        Err(lab_booking_sync::ports::ApiError::status(503, "undo unavailable")),
    );
    f.cache.set_query_data(&slot("a"), json!(1)).unwrap();

    let mutation = ComposedMutation::sequential(
        f.ports.clone(),
        vec![
            optimistic_step("a", |_: &Vars| slot("a"), |_: &Vars, _| json!(2)),
            api_step("b", "/do", |_: &Vars, _: &[Value]| json!({}), Some("/undo")),
            step("c", explode),
        ],
    );

    let err = mutation.run(Vars { seed: 0 }).await.unwrap_err();

    assert!(!err.rolled_back_cleanly());
    assert_eq!(err.rollback_results[0].step, "b");
    assert_eq!(err.rollback_results[0].error.as_deref(), Some("undo unavailable"));
    assert!(err.rollback_results[1].success);
    assert_eq!(f.cache.get_query_data(&slot("a")).unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn restoring_an_absent_key_leaves_child_keys_alone() {
    let f = fixture();
    f.cache.set_query_data(&booking_keys::by_user("0xa"), json!([{ "reservationKey": "u" }])).unwrap();
    f.cache.set_query_data(&booking_keys::by_lab("7"), json!([{ "reservationKey": "l" }])).unwrap();

    let mutation = ComposedMutation::sequential(
        f.ports.clone(),
        vec![
            optimistic_step("all", |_: &Vars| booking_keys::all(), |_: &Vars, _| json!([])),
            step("c", explode),
        ],
    );

    let err = mutation.run(Vars { seed: 0 }).await.unwrap_err();

    assert!(err.rolled_back_cleanly());
    assert_eq!(f.cache.get_query_data(&booking_keys::all()).unwrap(), None);
    assert_eq!(
        f.cache.get_query_data(&booking_keys::by_user("0xa")).unwrap(),
        Some(json!([{ "reservationKey": "u" }]))
    );
    assert_eq!(
        f.cache.get_query_data(&booking_keys::by_lab("7")).unwrap(),
        Some(json!([{ "reservationKey": "l" }]))
    );
}
