//! Lab, provider and metadata records plus display enrichment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// On-chain lab listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lab {
    pub id: String,
    #[serde(default)]
    pub uri: String,
    /// Price per hour in the token's smallest unit, as a decimal string.
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub auth: String,
    #[serde(default, rename = "accessURI")]
    pub access_uri: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_address: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_optimistic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_pending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub account: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub country: String,
}

/// NFT-style `{ trait_type, value }` attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    pub trait_type: String,
    pub value: Value,
}

/// Off-chain lab metadata document referenced by `Lab::uri`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<MetadataAttribute>,
}

/// Attributes pulled out of [`LabMetadata::attributes`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabAttributes {
    pub category: Option<String>,
    pub keywords: Vec<String>,
    pub time_slots: Vec<u32>,
    pub opens: Option<i64>,
    pub closes: Option<i64>,
    pub docs: Vec<String>,
    pub additional_images: Vec<String>,
}

impl LabMetadata {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|a| a.trait_type.eq_ignore_ascii_case(name))
            .map(|a| &a.value)
    }

    pub fn parse_attributes(&self) -> LabAttributes {
        LabAttributes {
            category: self.attribute("category").and_then(as_text),
            keywords: self.attribute("keywords").map(as_text_list).unwrap_or_default(),
            time_slots: self
                .attribute("timeSlots")
                .map(as_text_list)
                .unwrap_or_default()
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect(),
            opens: self.attribute("opens").and_then(as_int),
            closes: self.attribute("closes").and_then(as_int),
            docs: self.attribute("docs").map(as_text_list).unwrap_or_default(),
            additional_images: self
                .attribute("additionalImages")
                .map(as_text_list)
                .unwrap_or_default(),
        }
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Arrays are taken element-wise; strings are split on commas.
fn as_text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        other => as_text(other).into_iter().collect(),
    }
}

/// Lab record enriched for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabView {
    pub lab: Lab,
    pub name: String,
    pub description: String,
    pub provider_name: Option<String>,
    pub images: Vec<String>,
    pub attributes: LabAttributes,
}

/// Combine a lab with its metadata and the provider registry.
pub fn enrich_lab(lab: &Lab, metadata: Option<&LabMetadata>, providers: &[Provider]) -> LabView {
    let provider_name = lab.provider_address.as_deref().and_then(|address| {
        providers
            .iter()
            .find(|p| p.account.eq_ignore_ascii_case(address))
            .map(|p| p.name.clone())
    });

    let Some(metadata) = metadata else {
        return LabView {
            lab: lab.clone(),
            name: format!("Lab {}", lab.id),
            provider_name,
            ..Default::default()
        };
    };

    let attributes = metadata.parse_attributes();
    let mut images: Vec<String> = Vec::new();
    for image in std::iter::once(&metadata.image).chain(attributes.additional_images.iter()) {
        if !image.is_empty() && !images.contains(image) {
            images.push(image.clone());
        }
    }

    LabView {
        lab: lab.clone(),
        name: if metadata.name.is_empty() {
            format!("Lab {}", lab.id)
        } else {
            metadata.name.clone()
        },
        description: metadata.description.clone(),
        provider_name,
        images,
        attributes,
    }
}
