//! register_provider: off-chain record is deleted when the contract refuses.

use lab_booking_sync::cache::{QueryCache, QueryCacheExt};
use lab_booking_sync::keys::provider_keys;
use lab_booking_sync::lab::Provider;
use lab_booking_sync::workflows::{register_provider, RegisterProviderRequest};
use serde_json::json;

use crate::support::Harness;

fn request() -> RegisterProviderRequest {
    RegisterProviderRequest {
        name: " Remote Labs Uni ".into(),
        email: "labs@uni.edu".into(),
        country: "ES".into(),
        account: "0xPROV".into(),
    }
}

fn existing() -> Vec<Provider> {
    vec![Provider {
        account: "0xother".into(),
        name: "Other".into(),
        email: "o@x.org".into(),
        country: "PT".into(),
    }]
}

#[tokio::test]
async fn registers_and_lists_the_provider() {
    let h = Harness::new();
    h.cache.set_typed(&provider_keys::list(), &existing()).unwrap();

    register_provider(&h.ports(), &h.config, request()).await.unwrap();

    let saved = h.api.calls_to(&h.config.paths.provider_registration);
    assert_eq!(saved[0].body["name"], json!("Remote Labs Uni"));
    let added = h.contract.calls_to(&h.config.contract.add_provider);
    assert_eq!(added[0].args[1], json!("0xPROV"));

    let providers: Vec<Provider> = h.cache.get_typed(&provider_keys::list()).unwrap().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[1].name, "Remote Labs Uni");
    assert!(h.cache.is_stale(&provider_keys::list()).unwrap());
}

#[tokio::test]
async fn contract_revert_deletes_the_saved_registration() {
    let h = Harness::new();
    h.cache.set_typed(&provider_keys::list(), &existing()).unwrap();
    h.contract.set(
        &h.config.contract.add_provider,
        Err(lab_booking_sync::ports::ContractError::Reverted("already a provider".into())),
    );

    let err = register_provider(&h.ports(), &h.config, request()).await.unwrap_err();

    assert_eq!(err.step, "contract-add-provider");
    let deleted = h.api.calls_to(&h.config.paths.provider_registration_delete);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].method, "DELETE");
    assert_eq!(deleted[0].body["wallet"], json!("0xPROV"));

    let providers: Vec<Provider> = h.cache.get_typed(&provider_keys::list()).unwrap().unwrap();
    assert_eq!(providers, existing());
}

#[tokio::test]
async fn invalid_email_is_rejected_before_any_call() {
    let h = Harness::new();
    let mut req = request();
    req.email = "not-an-email".into();

    let err = register_provider(&h.ports(), &h.config, req).await.unwrap_err();
    assert_eq!(err.to_string(), "A valid email address is required");
    assert!(h.api.calls().is_empty());
}
