//! create_lab: metadata, optimistic listing, mint.

use lab_booking_sync::cache::QueryCacheExt;
use lab_booking_sync::keys::lab_keys;
use lab_booking_sync::lab::{Lab, LabMetadata};
use lab_booking_sync::ports::{ContractError, TxReceipt};
use lab_booking_sync::workflows::{create_lab, CreateLabRequest};
use serde_json::json;

use crate::support::Harness;

fn request() -> CreateLabRequest {
    CreateLabRequest {
        lab: Lab {
            uri: "Lab-remote-optics.json".into(),
            price: "1500".into(),
            auth: "https://auth.uni.edu".into(),
            access_uri: "https://labs.uni.edu/optics".into(),
            access_key: "optics".into(),
            ..Default::default()
        },
        metadata: LabMetadata {
            name: "Remote Optics".into(),
            description: "Interferometry bench".into(),
            image: "/img/optics.png".into(),
            attributes: Vec::new(),
        },
        provider_address: "0xPROV".into(),
    }
}

fn listed(h: &Harness) -> Vec<Lab> {
    h.cache.get_typed(&lab_keys::list()).unwrap().unwrap_or_default()
}

#[tokio::test]
async fn minted_lab_replaces_the_placeholder() {
    let h = Harness::new();
    h.contract.set(
        &h.config.contract.add_lab,
        Ok(TxReceipt {
            tx_hash: "0xlab".into(),
            token_id: Some("12".into()),
            ..Default::default()
        }),
    );

    create_lab(&h.ports(), &h.config, request()).await.unwrap();

    let saved = h.api.calls_to(&h.config.paths.lab_metadata);
    assert_eq!(saved[0].body["uri"], json!("Lab-remote-optics.json"));
    assert_eq!(saved[0].body["data"]["name"], json!("Remote Optics"));

    let labs = listed(&h);
    assert_eq!(labs.len(), 1);
    assert_eq!(labs[0].id, "12");
    assert!(!labs[0].is_optimistic);
    assert_eq!(labs[0].provider_address.as_deref(), Some("0xPROV"));
    let by_id: Lab = h.cache.get_typed(&lab_keys::by_id("12")).unwrap().unwrap();
    assert_eq!(by_id.access_uri, "https://labs.uni.edu/optics");

    let minted = h.contract.calls_to(&h.config.contract.add_lab);
    assert_eq!(minted[0].args[1], json!("1500"));
}

#[tokio::test]
async fn failed_mint_removes_metadata_and_placeholder() {
    let h = Harness::new();
    h.contract.set(
        &h.config.contract.add_lab,
        Err(ContractError::Reverted("not a provider".into())),
    );

    let err = create_lab(&h.ports(), &h.config, request()).await.unwrap_err();

    assert_eq!(err.step, "contract-add-lab");
    assert!(listed(&h).is_empty());
    let deleted = h.api.calls_to(&h.config.paths.lab_metadata_delete);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].body["uri"], json!("Lab-remote-optics.json"));
}

#[tokio::test]
async fn price_must_be_numeric() {
    let h = Harness::new();
    let mut req = request();
    req.lab.price = "cheap".into();

    let err = create_lab(&h.ports(), &h.config, req).await.unwrap_err();
    assert_eq!(err.step, "validate-lab");
    assert!(h.api.calls().is_empty());
}
