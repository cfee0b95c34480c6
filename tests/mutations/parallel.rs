use lab_booking_sync::cache::QueryCache;
use lab_booking_sync::mutation::{optimistic_step, step, ComposedMutation, StepContext, StepError};
use serde_json::{json, Value};

use crate::support::{fixture, slot};

async fn ok(_ctx: StepContext<()>) -> Result<Value, StepError> {
    Ok(json!("ok"))
}

async fn count_prior(ctx: StepContext<()>) -> Result<Value, StepError> {
    Ok(json!(ctx.prior.len()))
}

async fn fail(_ctx: StepContext<()>) -> Result<Value, StepError> {
    Err(StepError::validation("group two failed"))
}

#[tokio::test]
async fn groups_run_in_order_and_share_prior_results() {
    let f = fixture();
    let mutation = ComposedMutation::parallel(
        f.ports.clone(),
        vec![
            vec![step("one", ok), step("two", ok)],
            vec![step("three", count_prior), step("four", count_prior)],
        ],
    );

    let outcome = mutation.run(()).await.unwrap();
    assert_eq!(outcome.results, vec![json!("ok"), json!("ok"), json!(2), json!(2)]);
}

#[tokio::test]
async fn failure_in_a_group_unwinds_siblings_and_earlier_groups() {
    let f = fixture();
    for name in ["first", "sibling"] {
        f.cache.set_query_data(&slot(name), json!("before")).unwrap();
    }

    let mutation = ComposedMutation::parallel(
        f.ports.clone(),
        vec![
            vec![optimistic_step("first", |_: &()| slot("first"), |_: &(), _| json!("after"))],
            vec![
                optimistic_step("sibling", |_: &()| slot("sibling"), |_: &(), _| json!("after")),
                step("broken", fail),
            ],
        ],
    );

    let err = mutation.run(()).await.unwrap_err();

    assert_eq!(err.step, "broken");
    assert_eq!(err.to_string(), "group two failed");
    let unwound: Vec<&str> = err.rollback_results.iter().map(|r| r.step.as_str()).collect();
    assert_eq!(unwound, ["sibling", "first"]);
    for name in ["first", "sibling"] {
        assert_eq!(f.cache.get_query_data(&slot(name)).unwrap(), Some(json!("before")));
    }
}
