//! Wire format exchanged with the analysis backend.
//!
//! `WireConfig` is the YAML/JSON structure the backend consumes. The buffer
//! section is emitted as a single-key object keyed by the chosen layer name,
//! never as an array, and the variant field subset is re-derived from the
//! `BufferParams` sum type, so stale cross-variant fields cannot leak into
//! the output even if in-memory reconciliation was bypassed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bins;
use crate::buffer::{BufferLayerConfig, BufferParams, GeometryType};
use crate::config::{
    BarChartRequest, ChartAggregation, DataFileRef, HistogramRequest, MultiplyColumn,
    PipelineConfig, RatioColumn,
};
use crate::errors::{SchemaError, ValidationError};
use crate::filters::{FilterRegistry, GlobalFilter};

/// One buffer-layer entry in the wire format; the layer name is the key of
/// the enclosing single-entry map.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireBufferEntry {
    pub geometry_type: GeometryType,
    #[serde(flatten)]
    pub params: BufferParams,
}

/// Top-level wire configuration. Field order matches the documented key
/// order; keyed sections keep insertion order on round-trip.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct WireConfig {
    pub data_files: IndexMap<String, String>,
    pub buffer_layer: IndexMap<String, WireBufferEntry>,
    pub filter_data_files: FilterRegistry,
    pub ratio_columns: IndexMap<String, RatioColumn>,
    pub multiply_columns: IndexMap<String, MultiplyColumn>,
    pub sum_columns: Vec<String>,
    pub max_columns: Vec<String>,
    pub min_columns: Vec<String>,
    pub mean_columns: Vec<String>,
    pub std_columns: Vec<String>,
    pub count_columns: Vec<String>,
    pub count_distinct_columns: Vec<String>,
    pub groupby_columns: Vec<String>,
    pub filter_global: Vec<GlobalFilter>,
    pub post_aggregation_metrics: Vec<String>,
    pub activate_visualisation: bool,
    pub join_layers: crate::config::JoinLayers,
    pub colors: IndexMap<String, String>,
}

/// Project the in-memory model into the wire shape. Total for any config
/// that satisfies the model invariants; absent optional fields are simply
/// omitted.
pub fn to_wire(config: &PipelineConfig) -> WireConfig {
    let mut buffer_layer = IndexMap::new();
    buffer_layer.insert(
        config.buffer_layer.layer_name.clone(),
        WireBufferEntry {
            geometry_type: config.buffer_layer.geometry_type,
            params: config.buffer_layer.params.clone(),
        },
    );
    WireConfig {
        data_files: config
            .data_files
            .iter()
            .map(|file| (file.name.clone(), file.path.clone()))
            .collect(),
        buffer_layer,
        filter_data_files: config.filter_data_files.clone(),
        ratio_columns: config.ratio_columns.clone(),
        multiply_columns: config.multiply_columns.clone(),
        sum_columns: config.sum_columns.clone(),
        max_columns: config.max_columns.clone(),
        min_columns: config.min_columns.clone(),
        mean_columns: config.mean_columns.clone(),
        std_columns: config.std_columns.clone(),
        count_columns: config.count_columns.clone(),
        count_distinct_columns: config.count_distinct_columns.clone(),
        groupby_columns: config.groupby_columns.clone(),
        filter_global: config.filter_global.clone(),
        post_aggregation_metrics: config.post_aggregation_metrics.clone(),
        activate_visualisation: config.activate_visualisation,
        join_layers: config.join_layers,
        colors: config.colors.clone(),
    }
}

/// Rebuild the in-memory model from a wire configuration. The buffer
/// section must carry exactly one entry; extra entries beyond the first
/// are ignored.
pub fn from_wire(wire: WireConfig) -> Result<PipelineConfig, SchemaError> {
    let (layer_name, entry) = wire
        .buffer_layer
        .into_iter()
        .next()
        .ok_or(SchemaError::MissingBufferLayer)?;
    Ok(PipelineConfig {
        data_files: wire
            .data_files
            .into_iter()
            .map(|(name, path)| DataFileRef { name, path })
            .collect(),
        buffer_layer: BufferLayerConfig {
            layer_name,
            geometry_type: entry.geometry_type,
            params: entry.params,
        },
        filter_data_files: wire.filter_data_files,
        ratio_columns: wire.ratio_columns,
        multiply_columns: wire.multiply_columns,
        sum_columns: wire.sum_columns,
        max_columns: wire.max_columns,
        min_columns: wire.min_columns,
        mean_columns: wire.mean_columns,
        std_columns: wire.std_columns,
        count_columns: wire.count_columns,
        count_distinct_columns: wire.count_distinct_columns,
        groupby_columns: wire.groupby_columns,
        filter_global: wire.filter_global,
        post_aggregation_metrics: wire.post_aggregation_metrics,
        activate_visualisation: wire.activate_visualisation,
        join_layers: wire.join_layers,
        colors: wire.colors,
    })
}

/// Body for `POST /generate_histogram`: the authored request plus the
/// normalized bins, with infinity rendered as the `"Infinity"` token.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HistogramSubmission {
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groupby: Option<String>,
    pub aggregation: ChartAggregation,
    pub bins: Vec<Value>,
    pub labels: Vec<String>,
}

/// Body for `POST /generate_barchart`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BarChartSubmission {
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groupby: Option<String>,
    pub aggregation: ChartAggregation,
}

/// Normalize the raw bin and label strings of `request` and assemble the
/// histogram wire body.
pub fn histogram_submission(
    request: &HistogramRequest,
) -> Result<HistogramSubmission, ValidationError> {
    let spec = bins::normalize(&request.custom_bins, &request.custom_labels)?;
    Ok(HistogramSubmission {
        columns: request.columns.clone(),
        groupby: request.groupby.clone(),
        aggregation: request.aggregation.clone(),
        bins: spec.wire_edges(),
        labels: spec.labels,
    })
}

pub fn barchart_submission(request: &BarChartRequest) -> BarChartSubmission {
    BarChartSubmission {
        columns: request.columns.clone(),
        groupby: request.groupby.clone(),
        aggregation: request.aggregation.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferType, NetworkType};
    use indexmap::indexmap;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
data_files:
  bus_stops: "./data/input/geojson/stm_bus_stops.geojson"
  bixi_stations: "./data/input/geojson/stations_bixi.geojson"

buffer_layer:
  bixi_stations:
    geometry_type: "Point"
    buffer_type: "circular"
    distance: 500

filter_data_files:
  bus_stops: {}
  bixi_stations:
    column: "capacity"
    value: 0
    operator: ">="

ratio_columns:
  permis_perslogi_ratio:
    numerator: "permis"
    denominator: "perslogi"

sum_columns:
  - "permis as total_permis"

count_columns:
  - "stop_id as count_arret_bus"

groupby_columns:
  - "buffer_id"
  - "name"

filter_global:
  - column: "count_arret_bus_count"
    value: 0
    operator: ">"

activate_visualisation: false

join_layers:
  points:
    type: "contains"
  polygons:
    type: "intersects"
  multipolygons:
    type: "intersects"
  linestrings:
    type: "intersects"

colors:
  bus_stops: "[0, 200, 0, 160]"
  bixi_stations: "[200, 30, 0, 160]"
"#;

    #[test]
    fn test_wire_round_trip() {
        let wire: WireConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let config = from_wire(wire.clone()).unwrap();
        assert_eq!(to_wire(&config), wire);
    }

    #[test]
    fn test_sample_deserializes_into_model() {
        let wire: WireConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let config = from_wire(wire).unwrap();
        assert_eq!(config.buffer_layer.layer_name, "bixi_stations");
        assert_eq!(
            config.buffer_layer.params,
            BufferParams::Circular { distance: 500.0 }
        );
        assert_eq!(config.data_files.len(), 2);
        assert_eq!(config.data_files[0].name, "bus_stops");
        assert!(config
            .filter_data_files
            .get("bus_stops")
            .is_some_and(|spec| !spec.is_complete()));
    }

    #[test]
    fn test_circular_emits_no_foreign_fields() {
        let mut config = PipelineConfig::default();
        config.seed_catalog(&indexmap! {
            "a".to_string() => "./a.geojson".to_string(),
        });
        let wire = to_wire(&config);
        let value = serde_json::to_value(&wire).unwrap();
        let entry = &value["buffer_layer"]["a"];
        assert_eq!(entry["buffer_type"], "circular");
        assert_eq!(entry["distance"], 1000.0);
        for foreign in [
            "wide",
            "length",
            "travel_time",
            "speed",
            "network_type",
            "network_buffer",
            "osm_file",
        ] {
            assert!(
                entry.get(foreign).is_none(),
                "unexpected field {} in {}",
                foreign,
                entry
            );
        }
    }

    #[test]
    fn test_network_without_osm_file_is_omitted() {
        let mut config = PipelineConfig::default();
        config.seed_catalog(&indexmap! {
            "a".to_string() => "./a.geojson".to_string(),
        });
        config.buffer_layer.params = BufferParams::Network {
            distance: 500.0,
            network_type: NetworkType::Walk,
            osm_file: None,
        };
        let value = serde_json::to_value(to_wire(&config)).unwrap();
        assert!(value["buffer_layer"]["a"].get("osm_file").is_none());
    }

    #[test]
    fn test_missing_buffer_layer_is_an_error() {
        let wire = WireConfig::default();
        assert!(matches!(
            from_wire(wire),
            Err(SchemaError::MissingBufferLayer)
        ));
    }

    #[test]
    fn test_wire_yaml_top_level_key_order() {
        let mut config = PipelineConfig::default();
        config.seed_catalog(&indexmap! {
            "a".to_string() => "./a.geojson".to_string(),
        });
        let yaml = serde_yaml::to_string(&to_wire(&config)).unwrap();
        let keys: Vec<&str> = yaml
            .lines()
            .filter(|line| !line.starts_with([' ', '-']) && line.contains(':'))
            .map(|line| line.split(':').next().unwrap())
            .collect();
        assert_eq!(
            keys,
            vec![
                "data_files",
                "buffer_layer",
                "filter_data_files",
                "ratio_columns",
                "multiply_columns",
                "sum_columns",
                "max_columns",
                "min_columns",
                "mean_columns",
                "std_columns",
                "count_columns",
                "count_distinct_columns",
                "groupby_columns",
                "filter_global",
                "post_aggregation_metrics",
                "activate_visualisation",
                "join_layers",
                "colors"
            ]
        );
    }

    #[test]
    fn test_histogram_submission_carries_infinity_token() {
        let request = HistogramRequest {
            columns: vec!["capacity".to_string()],
            groupby: None,
            aggregation: ChartAggregation::default(),
            custom_bins: "0,10,20".to_string(),
            custom_labels: "0-9,10-19,20+".to_string(),
        };
        let submission = histogram_submission(&request).unwrap();
        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(value["bins"][3], "Infinity");
        assert_eq!(value["aggregation"]["type"], "count");
        assert!(value.get("groupby").is_none());
    }

    #[test]
    fn test_histogram_submission_propagates_bin_errors() {
        let request = HistogramRequest {
            custom_bins: "5".to_string(),
            custom_labels: "anything".to_string(),
            ..HistogramRequest::default()
        };
        assert!(matches!(
            histogram_submission(&request),
            Err(ValidationError::InsufficientBins { .. })
        ));
    }

    #[test]
    fn test_grid_switch_end_to_end_wire_shape() {
        let mut config = PipelineConfig::default();
        config.seed_catalog(&indexmap! {
            "a".to_string() => "./a.geojson".to_string(),
            "b".to_string() => "./b.geojson".to_string(),
        });
        config.buffer_layer.params = crate::buffer::resolve(
            BufferType::Grid,
            &config.buffer_layer.params,
        )
        .params;
        let value = serde_json::to_value(to_wire(&config)).unwrap();
        let entry = &value["buffer_layer"]["a"];
        assert_eq!(entry["buffer_type"], "grid");
        assert_eq!(entry["geometry_type"], "Point");
        assert_eq!(entry["wide"], 1000.0);
        assert_eq!(entry["length"], 1000.0);
        assert!(entry.get("distance").is_none());
    }
}
