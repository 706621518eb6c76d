// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::store::SpecificationStore;
use crate::table::SpecTable;
use locoqc_core::{
    Bounds, CURRENT_SCHEMA_VERSION, LocoError, PhaseGrid, PhasePoint, RangeSource, UnknownFields,
    VariableRange, validate_schema_version,
};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Declarative bootstrap source injected into [`SpecificationStore::from_source`].
pub trait SpecificationSource {
    fn phase_grid(&self) -> Result<PhaseGrid, LocoError>;
    fn load_ranges(&self) -> Result<Vec<VariableRange>, LocoError>;
}

/// In-memory list of ranges.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticSource {
    pub grid: PhaseGrid,
    pub ranges: Vec<VariableRange>,
}

impl StaticSource {
    pub fn new(grid: PhaseGrid, ranges: Vec<VariableRange>) -> Self {
        Self { grid, ranges }
    }
}

impl SpecificationSource for StaticSource {
    fn phase_grid(&self) -> Result<PhaseGrid, LocoError> {
        Ok(self.grid.clone())
    }

    fn load_ranges(&self) -> Result<Vec<VariableRange>, LocoError> {
        Ok(self.ranges.clone())
    }
}

/// One flat, hand-editable range entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeEntryWire {
    pub task: String,
    pub variable: String,
    pub phase_percent: f64,
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typical_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typical_max: Option<f64>,
    #[serde(default)]
    pub units: String,
    /// Citation text, or the derivation description when `derived` is set.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub derived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
}

impl RangeEntryWire {
    fn from_runtime(range: &VariableRange) -> Self {
        let (source, derived) = match &range.source {
            RangeSource::Citation(text) => (text.clone(), false),
            RangeSource::Derived(text) => (text.clone(), true),
        };
        Self {
            task: range.key.task.clone(),
            variable: range.key.variable.clone(),
            phase_percent: range.key.phase_point.percent(),
            min: range.min,
            max: range.max,
            typical_min: range.typical.map(|t| t.min),
            typical_max: range.typical.map(|t| t.max),
            units: range.units.clone(),
            source,
            derived,
            sample_size: range.sample_size,
        }
    }

    fn to_runtime(&self) -> Result<VariableRange, LocoError> {
        let phase = PhasePoint::from_percent(self.phase_percent)?;
        let mut range = VariableRange::new(
            self.task.clone(),
            self.variable.clone(),
            phase,
            self.min,
            self.max,
        )
        .with_units(self.units.clone())
        .with_source(if self.derived {
            RangeSource::Derived(self.source.clone())
        } else {
            RangeSource::Citation(self.source.clone())
        });
        match (self.typical_min, self.typical_max) {
            (Some(min), Some(max)) => range = range.with_typical(Bounds::new(min, max)),
            (None, None) => {}
            _ => {
                return Err(LocoError::invalid_input(format!(
                    "{} must set both typical_min and typical_max or neither",
                    range.key
                )));
            }
        }
        if let Some(sample_size) = self.sample_size {
            range = range.with_sample_size(sample_size);
        }
        Ok(range)
    }
}

/// Versioned JSON document holding a whole specification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecificationWire {
    pub schema_version: u32,
    pub phase_points_percent: Vec<f64>,
    pub ranges: Vec<RangeEntryWire>,
    #[serde(default, flatten)]
    pub unknown_fields: UnknownFields,
}

impl SpecificationWire {
    pub fn from_table(table: &SpecTable) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            phase_points_percent: table.grid().iter().map(PhasePoint::percent).collect(),
            ranges: table.iter().map(RangeEntryWire::from_runtime).collect(),
            unknown_fields: UnknownFields::new(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, LocoError> {
        serde_json::to_string_pretty(self).map_err(|err| {
            LocoError::invalid_input(format!("specification could not be serialized: {err}"))
        })
    }
}

/// JSON-backed specification source.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonSpecificationSource {
    wire: SpecificationWire,
}

impl JsonSpecificationSource {
    pub fn from_wire(wire: SpecificationWire) -> Self {
        Self { wire }
    }

    pub fn from_json_str(json: &str) -> Result<Self, LocoError> {
        let wire = serde_json::from_str(json).map_err(|err| {
            LocoError::specification_init(format!("specification JSON is invalid: {err}"))
        })?;
        Ok(Self { wire })
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, LocoError> {
        let wire = serde_json::from_reader(reader).map_err(|err| {
            LocoError::specification_init(format!("specification JSON is invalid: {err}"))
        })?;
        Ok(Self { wire })
    }

    pub fn unknown_fields(&self) -> &UnknownFields {
        &self.wire.unknown_fields
    }
}

impl SpecificationSource for JsonSpecificationSource {
    fn phase_grid(&self) -> Result<PhaseGrid, LocoError> {
        validate_schema_version(self.wire.schema_version, "Specification")?;
        PhaseGrid::from_percentages(&self.wire.phase_points_percent)
    }

    fn load_ranges(&self) -> Result<Vec<VariableRange>, LocoError> {
        self.wire
            .ranges
            .iter()
            .map(RangeEntryWire::to_runtime)
            .collect()
    }
}

impl SpecificationStore {
    /// Exports the current table in the editable wire form.
    pub fn to_wire(&self) -> SpecificationWire {
        SpecificationWire::from_table(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonSpecificationSource, SpecificationSource, StaticSource};
    use crate::SpecificationStore;
    use locoqc_core::{PhaseGrid, PhasePoint, RangeSource, VariableRange};

    const SPEC_JSON: &str = r#"{
        "schema_version": 1,
        "phase_points_percent": [0, 25, 50, 75],
        "ranges": [
            { "task": "walking", "variable": "knee_flexion_angle", "phase_percent": 0,
              "min": -0.1, "max": 1.5, "units": "rad", "source": "Winter 2009",
              "typical_min": 0.0, "typical_max": 0.3 },
            { "task": "walking", "variable": "knee_flexion_angle", "phase_percent": 25,
              "min": 0.0, "max": 0.8, "units": "rad" },
            { "task": "running", "variable": "ankle_moment", "phase_percent": 50,
              "min": -0.5, "max": 3.2, "units": "Nm/kg", "derived": true,
              "source": "percentile c=0.95", "sample_size": 420 }
        ],
        "maintainer": "gait lab"
    }"#;

    #[test]
    fn json_source_bootstraps_store() {
        let source = JsonSpecificationSource::from_json_str(SPEC_JSON).expect("json should parse");
        assert!(source.unknown_fields().contains_key("maintainer"));
        let store = SpecificationStore::from_source(&source).expect("store should load");
        assert_eq!(store.known_tasks().len(), 2);
        let knee = store
            .get_range("walking", "knee_flexion_angle", PhasePoint::whole_percent(0))
            .expect("knee range exists");
        assert_eq!(knee.units, "rad");
        assert!(knee.typical.is_some());
        let ankle = store
            .get_range("running", "ankle_moment", PhasePoint::whole_percent(50))
            .expect("ankle range exists");
        assert_eq!(ankle.source, RangeSource::Derived("percentile c=0.95".to_string()));
        assert_eq!(ankle.sample_size, Some(420));
    }

    #[test]
    fn wire_export_reloads_to_identical_table() {
        let source = JsonSpecificationSource::from_json_str(SPEC_JSON).expect("json should parse");
        let store = SpecificationStore::from_source(&source).expect("store should load");
        let json = store.to_wire().to_json_pretty().expect("export should serialize");
        let reloaded = SpecificationStore::from_source(
            &JsonSpecificationSource::from_json_str(&json).expect("export should parse"),
        )
        .expect("export should load");
        assert_eq!(*reloaded.snapshot(), *store.snapshot());
    }

    #[test]
    fn unsupported_schema_fails_initialization() {
        let json = SPEC_JSON.replace("\"schema_version\": 1", "\"schema_version\": 9");
        let source = JsonSpecificationSource::from_json_str(&json).expect("json should parse");
        let err = SpecificationStore::from_source(&source).expect_err("v9 unsupported");
        assert!(err.to_string().contains("schema_version=9 is unsupported"));
    }

    #[test]
    fn half_specified_typical_range_fails_initialization() {
        let json = SPEC_JSON.replace("\"typical_max\": 0.3", "\"note\": 0.3");
        let source = JsonSpecificationSource::from_json_str(&json).expect("json should parse");
        let err = SpecificationStore::from_source(&source).expect_err("typical half missing");
        assert!(err.to_string().starts_with("specification store failed to initialize"));
    }

    #[test]
    fn static_source_reports_its_grid_and_ranges() {
        let source = StaticSource::new(
            PhaseGrid::canonical(),
            vec![VariableRange::new(
                "walking",
                "hip_flexion_angle",
                PhasePoint::whole_percent(50),
                -0.4,
                0.3,
            )],
        );
        assert_eq!(source.phase_grid().expect("grid"), PhaseGrid::canonical());
        assert_eq!(source.load_ranges().expect("ranges").len(), 1);
    }
}
