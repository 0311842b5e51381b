//! Editing session: schema synchronization and snapshot store.
//!
//! All model mutations flow through `ConfigSession::apply` as discrete
//! `Edit`s. Each apply clones the current snapshot, mutates the clone, and
//! swaps it in wholesale, so asynchronous callbacks never observe a torn
//! config. A buffer-type edit is the only transition that regenerates the
//! exposed field schema; every other edit is a self-transition. Late
//! responses from superseded backend requests are discarded via
//! `RequestToken`.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::buffer::{self, FieldSchema, GeometryType, Resolution};
use crate::config::{
    AggregationKind, JoinGeometry, JoinPredicate, MultiplyColumn, PipelineConfig, RatioColumn,
};
use crate::errors::{SessionError, ValidationError};
use crate::filters::{FilterSpec, GlobalFilter};
use crate::wire::{self, WireConfig};

/// One discrete mutation of the configuration.
#[derive(Debug, Clone)]
pub enum Edit {
    /// Apply the backend file catalog (the uninitialized -> known-catalog
    /// transition).
    SeedCatalog(IndexMap<String, String>),
    /// Change the buffer discriminator. The raw string comes from the UI;
    /// unknown values fail loudly.
    SetBufferType(String),
    /// Assign one field of the active buffer variant.
    SetBufferField { field: String, value: Value },
    SetBufferLayer(String),
    SetGeometryType(GeometryType),
    AddFilter(String),
    RemoveFilter(String),
    SetFilter { file: String, spec: FilterSpec },
    AddRatioColumn { name: String, ratio: RatioColumn },
    RemoveRatioColumn(String),
    AddMultiplyColumn { name: String, multiply: MultiplyColumn },
    RemoveMultiplyColumn(String),
    SetColumns { kind: AggregationKind, entries: Vec<String> },
    SetGroupby(Vec<String>),
    SetGlobalFilters(Vec<GlobalFilter>),
    SetPostAggregationMetrics(Vec<String>),
    SetActivateVisualisation(bool),
    SetJoinRule { geometry: JoinGeometry, predicate: JoinPredicate },
    SetColor { layer: String, rgba: String },
}

/// Identifies the session state a backend request was issued against.
/// A response whose token is no longer current must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

/// The live editing session: one configuration snapshot, the current
/// buffer-field schema, and a revision counter.
#[derive(Debug, Clone)]
pub struct ConfigSession {
    current: PipelineConfig,
    resolution: Resolution,
    revision: u64,
}

impl ConfigSession {
    /// Start a session on the built-in default configuration (circular
    /// buffer, catalog not yet known).
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Start a session on a previously loaded configuration.
    pub fn with_config(config: PipelineConfig) -> Self {
        let resolution = buffer::resolve(
            config.buffer_layer.params.buffer_type(),
            &config.buffer_layer.params,
        );
        ConfigSession {
            current: config,
            resolution,
            revision: 0,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.current
    }

    /// The field schema currently exposed for the buffer section.
    pub fn schema(&self) -> &[FieldSchema] {
        &self.resolution.schema
    }

    pub fn required_fields(&self) -> &[&'static str] {
        &self.resolution.required
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn token(&self) -> RequestToken {
        RequestToken(self.revision)
    }

    /// Whether a response issued under `token` may still be applied.
    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.revision
    }

    /// Apply one edit. The snapshot is replaced wholesale; on error the
    /// session is left exactly as it was.
    pub fn apply(&mut self, edit: Edit) -> Result<&PipelineConfig, SessionError> {
        let mut next = self.current.clone();
        let mut resolution = None;

        match edit {
            Edit::SeedCatalog(catalog) => {
                info!("Seeding catalog with {} files", catalog.len());
                next.seed_catalog(&catalog);
            }
            Edit::SetBufferType(raw) => {
                let buffer_type = raw.parse().map_err(SessionError::Schema)?;
                let old = next.buffer_layer.params.buffer_type();
                let resolved = buffer::resolve(buffer_type, &next.buffer_layer.params);
                next.buffer_layer.params = resolved.params.clone();
                if old != buffer_type {
                    debug!("Buffer type changed: {} -> {}", old, buffer_type);
                }
                resolution = Some(resolved);
            }
            Edit::SetBufferField { field, value } => {
                next.buffer_layer
                    .params
                    .set_field(&field, &value)
                    .map_err(SessionError::Schema)?;
            }
            Edit::SetBufferLayer(layer) => {
                next.buffer_layer.layer_name = layer;
            }
            Edit::SetGeometryType(geometry) => {
                next.buffer_layer.geometry_type = geometry;
            }
            Edit::AddFilter(file) => {
                next.filter_data_files.add(&file)?;
            }
            Edit::RemoveFilter(file) => {
                next.filter_data_files.remove(&file);
            }
            Edit::SetFilter { file, spec } => {
                next.filter_data_files.set(&file, spec);
            }
            Edit::AddRatioColumn { name, ratio } => {
                next.add_ratio_column(&name, ratio)?;
            }
            Edit::RemoveRatioColumn(name) => {
                next.remove_ratio_column(&name);
            }
            Edit::AddMultiplyColumn { name, multiply } => {
                next.add_multiply_column(&name, multiply)?;
            }
            Edit::RemoveMultiplyColumn(name) => {
                next.remove_multiply_column(&name);
            }
            Edit::SetColumns { kind, entries } => {
                *next.columns_mut(kind) = entries;
            }
            Edit::SetGroupby(entries) => {
                next.groupby_columns = entries;
            }
            Edit::SetGlobalFilters(filters) => {
                next.filter_global = filters;
            }
            Edit::SetPostAggregationMetrics(metrics) => {
                next.post_aggregation_metrics = metrics;
            }
            Edit::SetActivateVisualisation(active) => {
                next.activate_visualisation = active;
            }
            Edit::SetJoinRule {
                geometry,
                predicate,
            } => {
                next.join_rule_mut(geometry).predicate = predicate;
            }
            Edit::SetColor { layer, rgba } => {
                next.colors.insert(layer, rgba);
            }
        }

        self.current = next;
        if let Some(resolved) = resolution {
            self.resolution = resolved;
        }
        self.revision += 1;
        Ok(&self.current)
    }

    /// Validate the snapshot and project it into the wire format for
    /// submission. The snapshot itself is not consumed; a transport
    /// failure downstream needs no re-entry.
    pub fn submit_config(&self) -> Result<WireConfig, ValidationError> {
        self.current.validate()?;
        Ok(wire::to_wire(&self.current))
    }
}

impl Default for ConfigSession {
    fn default() -> Self {
        Self::new()
    }
}
