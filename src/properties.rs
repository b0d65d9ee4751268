use crate::model::{AlgorithmDefinition, Properties};
use serde::{Deserialize, Serialize};

pub const ROTATION: &str = "ROTATION";
pub const HORIZONTAL_FLIP: &str = "HORIZONTAL_FLIP";
pub const SEARCH_REGION_TOP_LEFT_X: &str = "SEARCH_REGION_TOP_LEFT_X_DETECTION";
pub const SEARCH_REGION_TOP_LEFT_Y: &str = "SEARCH_REGION_TOP_LEFT_Y_DETECTION";
pub const SEARCH_REGION_BOTTOM_RIGHT_X: &str = "SEARCH_REGION_BOTTOM_RIGHT_X_DETECTION";
pub const SEARCH_REGION_BOTTOM_RIGHT_Y: &str = "SEARCH_REGION_BOTTOM_RIGHT_Y_DETECTION";
pub const SEARCH_REGION_ENABLE: &str = "SEARCH_REGION_ENABLE_DETECTION";
pub const AUTO_ROTATE: &str = "AUTO_ROTATE";
pub const AUTO_FLIP: &str = "AUTO_FLIP";

pub const FRAME_INTERVAL: &str = "FRAME_INTERVAL";
pub const FRAME_RATE_CAP: &str = "FRAME_RATE_CAP";
pub const COMPUTED_FRAME_INTERVAL: &str = "COMPUTED_FRAME_INTERVAL";
pub const TARGET_SEGMENT_LENGTH: &str = "TARGET_SEGMENT_LENGTH";
pub const MINIMUM_SEGMENT_LENGTH: &str = "MINIMUM_SEGMENT_LENGTH";
pub const MINIMUM_GAP_BETWEEN_SEGMENTS: &str = "MINIMUM_GAP_BETWEEN_SEGMENTS";

/// Rotation, flip and region-of-interest settings. Overridden as a group.
pub const TRANSFORM_PROPERTIES: [&str; 9] = [
    ROTATION,
    HORIZONTAL_FLIP,
    SEARCH_REGION_TOP_LEFT_X,
    SEARCH_REGION_TOP_LEFT_Y,
    SEARCH_REGION_BOTTOM_RIGHT_X,
    SEARCH_REGION_BOTTOM_RIGHT_Y,
    SEARCH_REGION_ENABLE,
    AUTO_ROTATE,
    AUTO_FLIP,
];

/// The five precedence layers for one action on one medium, lowest first.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyLayers<'a> {
    pub algorithm_defaults: Option<&'a Properties>,
    pub action: Option<&'a Properties>,
    pub job: Option<&'a Properties>,
    pub job_algorithm: Option<&'a Properties>,
    pub medium: Option<&'a Properties>,
}

/// One name/value pair as carried in a work-unit payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmProperty {
    pub name: String,
    pub value: String,
}

/// Merge the layers in precedence order. Before each of the three override
/// layers is merged, a layer that names any key in `transform_keys` clears
/// every transform key accumulated from the layers below it.
pub fn resolve_with(layers: &PropertyLayers<'_>, transform_keys: &[&str]) -> Properties {
    let mut resolved = Properties::new();

    if let Some(defaults) = layers.algorithm_defaults {
        merge(&mut resolved, defaults);
    }
    if let Some(action) = layers.action {
        merge(&mut resolved, action);
    }

    for layer in [layers.job, layers.job_algorithm, layers.medium]
        .into_iter()
        .flatten()
    {
        if defines_any(layer, transform_keys) {
            for key in transform_keys {
                resolved.remove(*key);
            }
        }
        merge(&mut resolved, layer);
    }

    resolved
}

/// [`resolve_with`] using [`TRANSFORM_PROPERTIES`].
pub fn resolve(layers: &PropertyLayers<'_>) -> Properties {
    resolve_with(layers, &TRANSFORM_PROPERTIES)
}

/// Defaults layer for an algorithm. A missing definition contributes nothing.
pub fn algorithm_defaults(definition: Option<&AlgorithmDefinition>) -> Properties {
    definition
        .map(|def| {
            def.properties
                .iter()
                .map(|p| (p.name.clone(), p.default_value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

pub fn to_algorithm_properties(properties: &Properties) -> Vec<AlgorithmProperty> {
    properties
        .iter()
        .map(|(name, value)| AlgorithmProperty {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn defines_any(layer: &Properties, keys: &[&str]) -> bool {
    keys.iter().any(|k| layer.contains_key(*k))
}

fn merge(into: &mut Properties, layer: &Properties) {
    into.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
}
