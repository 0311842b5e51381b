//! Buffer-layer tagged union and its dynamic form schema.
//!
//! The buffer section of the configuration is a union over six spatial
//! buffering strategies, discriminated by `buffer_type`. Every strategy has
//! its own disjoint field set, so the union is modelled as an exhaustive sum
//! type and `resolve` rebuilds the exposed field schema whenever the
//! discriminator changes, reconciling stored values against the new variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::SchemaError;

/// Geometry of the layer the buffer applies to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Point,
    Polygon,
    LineString,
    MultiPolygon,
}

/// Street-network flavour for isochrone and network buffers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    Walk,
    Bike,
    Drive,
}

impl NetworkType {
    pub const CHOICES: [&'static str; 3] = ["walk", "bike", "drive"];
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkType::Walk => "walk",
            NetworkType::Bike => "bike",
            NetworkType::Drive => "drive",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for NetworkType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "walk" => Ok(NetworkType::Walk),
            "bike" => Ok(NetworkType::Bike),
            "drive" => Ok(NetworkType::Drive),
            other => Err(SchemaError::InvalidFieldValue {
                field: "network_type".to_string(),
                reason: format!("expected one of walk, bike, drive; got {}", other),
            }),
        }
    }
}

/// The discriminator over the six buffer strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    Circular,
    Grid,
    Isochrone,
    Network,
    Zones,
    ZonesGrid,
}

impl BufferType {
    pub const ALL: [BufferType; 6] = [
        BufferType::Circular,
        BufferType::Grid,
        BufferType::Isochrone,
        BufferType::Network,
        BufferType::Zones,
        BufferType::ZonesGrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BufferType::Circular => "circular",
            BufferType::Grid => "grid",
            BufferType::Isochrone => "isochrone",
            BufferType::Network => "network",
            BufferType::Zones => "zones",
            BufferType::ZonesGrid => "zones_grid",
        }
    }

    /// Freshly-constructed parameters carrying the variant defaults.
    pub fn default_params(&self) -> BufferParams {
        match self {
            BufferType::Circular => BufferParams::Circular { distance: 1000.0 },
            BufferType::Grid => BufferParams::Grid {
                wide: 1000.0,
                length: 1000.0,
            },
            BufferType::ZonesGrid => BufferParams::ZonesGrid {
                wide: 1000.0,
                length: 1000.0,
            },
            BufferType::Isochrone => BufferParams::Isochrone {
                travel_time: vec![5.0],
                speed: 4.5,
                network_type: NetworkType::Walk,
                network_buffer: 2000.0,
            },
            BufferType::Network => BufferParams::Network {
                distance: 500.0,
                network_type: NetworkType::Walk,
                osm_file: None,
            },
            BufferType::Zones => BufferParams::Zones,
        }
    }

    /// Field schema for exactly this variant's fields, no more, no fewer.
    pub fn field_schema(&self) -> Vec<FieldSchema> {
        match self {
            BufferType::Circular => vec![FieldSchema::required(
                "distance",
                FieldKind::Number,
                Value::from(1000.0),
            )],
            BufferType::Grid | BufferType::ZonesGrid => vec![
                FieldSchema::required("wide", FieldKind::Number, Value::from(1000.0)),
                FieldSchema::required("length", FieldKind::Number, Value::from(1000.0)),
            ],
            BufferType::Isochrone => vec![
                FieldSchema::required(
                    "travel_time",
                    FieldKind::NumberList,
                    Value::from(vec![5.0]),
                ),
                FieldSchema::required("speed", FieldKind::Number, Value::from(4.5)),
                FieldSchema::required(
                    "network_type",
                    FieldKind::Choice(&NetworkType::CHOICES),
                    Value::from("walk"),
                ),
                FieldSchema::required("network_buffer", FieldKind::Number, Value::from(2000.0)),
            ],
            BufferType::Network => vec![
                FieldSchema::required("distance", FieldKind::Number, Value::from(500.0)),
                FieldSchema::required(
                    "network_type",
                    FieldKind::Choice(&NetworkType::CHOICES),
                    Value::from("walk"),
                ),
                FieldSchema::optional("osm_file", FieldKind::Text, Value::Null),
            ],
            BufferType::Zones => Vec::new(),
        }
    }
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BufferType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "circular" => Ok(BufferType::Circular),
            "grid" => Ok(BufferType::Grid),
            "isochrone" => Ok(BufferType::Isochrone),
            "network" => Ok(BufferType::Network),
            "zones" => Ok(BufferType::Zones),
            "zones_grid" => Ok(BufferType::ZonesGrid),
            other => Err(SchemaError::UnknownBufferType(other.to_string())),
        }
    }
}

/// Variant parameters for one buffer strategy. The union is exclusive by
/// construction: fields of other variants cannot be present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "buffer_type", rename_all = "snake_case")]
pub enum BufferParams {
    Circular {
        distance: f64,
    },
    Grid {
        wide: f64,
        length: f64,
    },
    ZonesGrid {
        wide: f64,
        length: f64,
    },
    Isochrone {
        travel_time: Vec<f64>,
        speed: f64,
        network_type: NetworkType,
        network_buffer: f64,
    },
    Network {
        distance: f64,
        network_type: NetworkType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        osm_file: Option<String>,
    },
    Zones,
}

impl BufferParams {
    pub fn buffer_type(&self) -> BufferType {
        match self {
            BufferParams::Circular { .. } => BufferType::Circular,
            BufferParams::Grid { .. } => BufferType::Grid,
            BufferParams::ZonesGrid { .. } => BufferType::ZonesGrid,
            BufferParams::Isochrone { .. } => BufferType::Isochrone,
            BufferParams::Network { .. } => BufferType::Network,
            BufferParams::Zones => BufferType::Zones,
        }
    }

    /// Assign one field from a dynamic form edit. Field names outside the
    /// active variant and ill-typed or non-positive values fail loudly.
    pub fn set_field(&mut self, field: &str, value: &Value) -> Result<(), SchemaError> {
        match (self, field) {
            (BufferParams::Circular { distance }, "distance") => {
                *distance = positive_number(field, value)?;
            }
            (BufferParams::Grid { wide, .. }, "wide")
            | (BufferParams::ZonesGrid { wide, .. }, "wide") => {
                *wide = positive_number(field, value)?;
            }
            (BufferParams::Grid { length, .. }, "length")
            | (BufferParams::ZonesGrid { length, .. }, "length") => {
                *length = positive_number(field, value)?;
            }
            (BufferParams::Isochrone { travel_time, .. }, "travel_time") => {
                *travel_time = positive_number_list(field, value)?;
            }
            (BufferParams::Isochrone { speed, .. }, "speed") => {
                *speed = positive_number(field, value)?;
            }
            (BufferParams::Isochrone { network_type, .. }, "network_type")
            | (BufferParams::Network { network_type, .. }, "network_type") => {
                *network_type = network_choice(value)?;
            }
            (BufferParams::Isochrone { network_buffer, .. }, "network_buffer") => {
                *network_buffer = positive_number(field, value)?;
            }
            (BufferParams::Network { distance, .. }, "distance") => {
                *distance = positive_number(field, value)?;
            }
            (BufferParams::Network { osm_file, .. }, "osm_file") => {
                *osm_file = match value {
                    Value::Null => None,
                    Value::String(s) if s.is_empty() => None,
                    Value::String(s) => Some(s.clone()),
                    other => {
                        return Err(SchemaError::InvalidFieldValue {
                            field: field.to_string(),
                            reason: format!("expected a string, got {}", other),
                        })
                    }
                };
            }
            (params, _) => {
                return Err(SchemaError::UnknownField {
                    buffer_type: params.buffer_type().to_string(),
                    field: field.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn positive_number(field: &str, value: &Value) -> Result<f64, SchemaError> {
    let n = value
        .as_f64()
        .ok_or_else(|| SchemaError::InvalidFieldValue {
            field: field.to_string(),
            reason: format!("expected a number, got {}", value),
        })?;
    if !n.is_finite() || n <= 0.0 {
        return Err(SchemaError::InvalidFieldValue {
            field: field.to_string(),
            reason: format!("expected a positive number, got {}", n),
        });
    }
    Ok(n)
}

fn positive_number_list(field: &str, value: &Value) -> Result<Vec<f64>, SchemaError> {
    let items = value
        .as_array()
        .ok_or_else(|| SchemaError::InvalidFieldValue {
            field: field.to_string(),
            reason: format!("expected a list of numbers, got {}", value),
        })?;
    if items.is_empty() {
        return Err(SchemaError::InvalidFieldValue {
            field: field.to_string(),
            reason: "expected at least one value".to_string(),
        });
    }
    items
        .iter()
        .map(|item| positive_number(field, item))
        .collect()
}

fn network_choice(value: &Value) -> Result<NetworkType, SchemaError> {
    let s = value
        .as_str()
        .ok_or_else(|| SchemaError::InvalidFieldValue {
            field: "network_type".to_string(),
            reason: format!("expected a string, got {}", value),
        })?;
    s.parse()
}

/// One entry of the regenerated form schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Value,
}

impl FieldSchema {
    fn required(name: &'static str, kind: FieldKind, default: Value) -> Self {
        FieldSchema {
            name,
            kind,
            required: true,
            default,
        }
    }

    fn optional(name: &'static str, kind: FieldKind, default: Value) -> Self {
        FieldSchema {
            name,
            kind,
            required: false,
            default,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Number,
    NumberList,
    Choice(&'static [&'static str]),
    Text,
}

/// Output of a discriminator change: the new field schema, its required
/// subset, and parameters reconciled against the new variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub schema: Vec<FieldSchema>,
    pub required: Vec<&'static str>,
    pub params: BufferParams,
}

/// Rebuild the schema for `buffer_type` and reconcile `current` against it.
///
/// Reconciliation always starts from the variant defaults when the
/// discriminator actually changes; switching away from a variant and back
/// never resurrects the dropped values. Field names are disjoint across
/// variants, so no value can accidentally carry over. Pure function, no
/// side effects.
pub fn resolve(buffer_type: BufferType, current: &BufferParams) -> Resolution {
    let params = if current.buffer_type() == buffer_type {
        current.clone()
    } else {
        buffer_type.default_params()
    };
    let schema = buffer_type.field_schema();
    let required = schema
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name)
        .collect();
    Resolution {
        schema,
        required,
        params,
    }
}

/// The buffer section of the configuration: one named input layer, its
/// geometry, and the active strategy's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferLayerConfig {
    pub layer_name: String,
    pub geometry_type: GeometryType,
    pub params: BufferParams,
}

impl BufferLayerConfig {
    /// Backend cache/variant key, e.g. `circular_buffer_500m`,
    /// `grid_buffer_1000m_1000m`, `isochrone_buffer_walk_15min`.
    pub fn variant_key(&self) -> String {
        match &self.params {
            BufferParams::Circular { distance } => {
                format!("circular_buffer_{}m", format_length(*distance))
            }
            BufferParams::Grid { wide, length } => format!(
                "grid_buffer_{}m_{}m",
                format_length(*wide),
                format_length(*length)
            ),
            BufferParams::ZonesGrid { wide, length } => format!(
                "zones_grid_buffer_{}m_{}m",
                format_length(*wide),
                format_length(*length)
            ),
            BufferParams::Isochrone {
                travel_time,
                network_type,
                ..
            } => {
                let longest = travel_time.iter().copied().fold(0.0, f64::max);
                format!(
                    "isochrone_buffer_{}_{}min",
                    network_type,
                    format_length(longest)
                )
            }
            BufferParams::Network {
                distance,
                network_type,
                ..
            } => format!(
                "network_buffer_{}_{}m",
                network_type,
                format_length(*distance)
            ),
            BufferParams::Zones => "zones_buffer".to_string(),
        }
    }
}

// Whole-number lengths render without a decimal point: 500.0 -> "500".
fn format_length(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_names(buffer_type: BufferType) -> Vec<&'static str> {
        buffer_type.field_schema().iter().map(|f| f.name).collect()
    }

    #[test]
    fn test_field_sets_per_variant() {
        assert_eq!(field_names(BufferType::Circular), vec!["distance"]);
        assert_eq!(field_names(BufferType::Grid), vec!["wide", "length"]);
        assert_eq!(field_names(BufferType::ZonesGrid), vec!["wide", "length"]);
        assert_eq!(
            field_names(BufferType::Isochrone),
            vec!["travel_time", "speed", "network_type", "network_buffer"]
        );
        assert_eq!(
            field_names(BufferType::Network),
            vec!["distance", "network_type", "osm_file"]
        );
        assert!(field_names(BufferType::Zones).is_empty());
    }

    #[test]
    fn test_osm_file_is_the_only_optional_field() {
        for buffer_type in BufferType::ALL {
            for field in buffer_type.field_schema() {
                assert_eq!(field.required, field.name != "osm_file");
            }
        }
    }

    #[test]
    fn test_resolve_same_type_preserves_values() {
        let current = BufferParams::Circular { distance: 250.0 };
        let resolution = resolve(BufferType::Circular, &current);
        assert_eq!(resolution.params, current);
    }

    #[test]
    fn test_resolve_switch_and_back_resets_to_defaults() {
        let mut params = BufferParams::Circular { distance: 250.0 };
        params = resolve(BufferType::Grid, &params).params;
        assert_eq!(
            params,
            BufferParams::Grid {
                wide: 1000.0,
                length: 1000.0
            }
        );
        params = resolve(BufferType::Circular, &params).params;
        assert_eq!(params, BufferParams::Circular { distance: 1000.0 });
    }

    #[test]
    fn test_resolve_required_subset() {
        let resolution = resolve(BufferType::Network, &BufferParams::Zones);
        assert_eq!(resolution.required, vec!["distance", "network_type"]);
    }

    #[test]
    fn test_set_field_accepts_variant_fields() {
        let mut params = BufferType::Isochrone.default_params();
        params
            .set_field("travel_time", &json!([5, 10, 15]))
            .unwrap();
        params.set_field("network_type", &json!("bike")).unwrap();
        match params {
            BufferParams::Isochrone {
                travel_time,
                network_type,
                ..
            } => {
                assert_eq!(travel_time, vec![5.0, 10.0, 15.0]);
                assert_eq!(network_type, NetworkType::Bike);
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[test]
    fn test_set_field_rejects_foreign_field() {
        let mut params = BufferType::Circular.default_params();
        let err = params.set_field("wide", &json!(100)).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownField { .. }));
    }

    #[test]
    fn test_set_field_rejects_non_positive_values() {
        let mut params = BufferType::Circular.default_params();
        assert!(params.set_field("distance", &json!(0)).is_err());
        assert!(params.set_field("distance", &json!(-5)).is_err());
        assert!(params.set_field("distance", &json!("far")).is_err());
    }

    #[test]
    fn test_unknown_buffer_type_fails_loudly() {
        let err = "voronoi".parse::<BufferType>().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownBufferType(_)));
    }

    #[test]
    fn test_variant_keys() {
        let mut layer = BufferLayerConfig {
            layer_name: "bixi_stations".to_string(),
            geometry_type: GeometryType::Point,
            params: BufferParams::Circular { distance: 500.0 },
        };
        assert_eq!(layer.variant_key(), "circular_buffer_500m");

        layer.params = BufferParams::Grid {
            wide: 1000.0,
            length: 1000.0,
        };
        assert_eq!(layer.variant_key(), "grid_buffer_1000m_1000m");

        layer.params = BufferParams::Isochrone {
            travel_time: vec![5.0, 15.0],
            speed: 4.5,
            network_type: NetworkType::Walk,
            network_buffer: 2000.0,
        };
        assert_eq!(layer.variant_key(), "isochrone_buffer_walk_15min");

        layer.params = BufferParams::Network {
            distance: 500.0,
            network_type: NetworkType::Walk,
            osm_file: None,
        };
        assert_eq!(layer.variant_key(), "network_buffer_walk_500m");

        layer.params = BufferParams::Zones;
        assert_eq!(layer.variant_key(), "zones_buffer");
    }

    #[test]
    fn test_params_serialize_with_discriminator() {
        let params = BufferParams::Network {
            distance: 500.0,
            network_type: NetworkType::Walk,
            osm_file: None,
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            json!({"buffer_type": "network", "distance": 500.0, "network_type": "walk"})
        );
    }
}
