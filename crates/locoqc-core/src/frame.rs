// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Columnar in-memory table handed over by format converters, and its
//! grouping into per-stride records.

use crate::phase::{PhaseGrid, PhasePoint};
use crate::stride::{Dataset, StrideId, StrideRecord};
use crate::LocoError;
use std::collections::{BTreeMap, HashMap};

const DEFAULT_SUBJECT_COLUMN: &str = "subject_id";
const DEFAULT_TRIAL_COLUMN: &str = "trial_id";
const DEFAULT_CYCLE_COLUMN: &str = "cycle_id";
const DEFAULT_TASK_COLUMN: &str = "task";
const DEFAULT_PHASE_COLUMN: &str = "phase_percent";
/// Absorbs rounding when a grid point sits exactly between two samples.
const PHASE_SLACK: f64 = 1.0e-9;

/// One column of a [`Frame`].
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Text(Vec<String>),
    Numeric(Vec<f64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(values) => values.len(),
            Self::Numeric(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell rendered as an identity key; integral numbers drop the decimal.
    fn key_at(&self, row: usize) -> Option<String> {
        match self {
            Self::Text(values) => values.get(row).filter(|v| !v.is_empty()).cloned(),
            Self::Numeric(values) => {
                let value = *values.get(row)?;
                if !value.is_finite() {
                    return None;
                }
                if value.fract() == 0.0 && value.abs() < 1.0e15 {
                    Some(format!("{}", value as i64))
                } else {
                    Some(format!("{value}"))
                }
            }
        }
    }

    fn numeric_at(&self, row: usize) -> Option<f64> {
        match self {
            Self::Numeric(values) => values.get(row).copied(),
            Self::Text(_) => None,
        }
    }
}

/// Columnar table with equally long columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    columns: BTreeMap<String, Column>,
    rows: usize,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column; every column must have the same length.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self, LocoError> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.rows {
            return Err(LocoError::structure(format!(
                "column '{name}' has {} rows, expected {}",
                column.len(),
                self.rows
            )));
        }
        self.rows = column.len();
        self.columns.insert(name, column);
        Ok(self)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// How the phase position of each row is expressed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhaseColumn {
    /// Percent of the gait cycle in `[0, 100)`.
    Percent(String),
    /// Zero-based sample index within the cycle.
    Index(String),
}

impl PhaseColumn {
    fn name(&self) -> &str {
        match self {
            Self::Percent(name) | Self::Index(name) => name,
        }
    }
}

/// Names of the identity and phase columns in a [`Frame`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    pub subject_column: String,
    pub trial_column: String,
    pub cycle_column: String,
    pub task_column: String,
    pub phase: PhaseColumn,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            subject_column: DEFAULT_SUBJECT_COLUMN.to_string(),
            trial_column: DEFAULT_TRIAL_COLUMN.to_string(),
            cycle_column: DEFAULT_CYCLE_COLUMN.to_string(),
            task_column: DEFAULT_TASK_COLUMN.to_string(),
            phase: PhaseColumn::Percent(DEFAULT_PHASE_COLUMN.to_string()),
        }
    }
}

impl FrameLayout {
    fn is_reserved(&self, name: &str) -> bool {
        name == self.subject_column
            || name == self.trial_column
            || name == self.cycle_column
            || name == self.task_column
            || name == self.phase.name()
    }
}

struct StrideGroup {
    id: StrideId,
    task: String,
    rows: Vec<usize>,
}

impl Dataset {
    /// Groups frame rows by `(subject_id, trial_id, cycle_id)` into strides.
    ///
    /// Every numeric column that is not an identity or phase column becomes a
    /// variable. Each variable is sampled at the grid phase points using the
    /// row whose phase is nearest, provided it lies within half a sample
    /// spacing (`50 / expected_samples` percent); otherwise the phase point
    /// stays missing. `expected_samples` also converts a phase index column
    /// to percent. The group size is kept as the stride's phase sample count
    /// so the structural check can run later.
    pub fn from_frame(
        name: impl Into<String>,
        frame: &Frame,
        layout: &FrameLayout,
        grid: &PhaseGrid,
        expected_samples: usize,
    ) -> Result<Self, LocoError> {
        if expected_samples == 0 {
            return Err(LocoError::invalid_input("expected_samples must be >= 1"));
        }
        let name = name.into();
        let subject = required_column(frame, &layout.subject_column)?;
        let trial = required_column(frame, &layout.trial_column)?;
        let cycle = required_column(frame, &layout.cycle_column)?;
        let task = required_column(frame, &layout.task_column)?;
        let phase = required_column(frame, layout.phase.name())?;

        let phase_percent = (0..frame.rows())
            .map(|row| {
                let raw = phase.numeric_at(row).ok_or_else(|| {
                    LocoError::structure(format!(
                        "phase column '{}' must be numeric",
                        layout.phase.name()
                    ))
                })?;
                if !raw.is_finite() {
                    return Err(LocoError::structure(format!(
                        "phase column '{}' has a non-finite value at row {row}",
                        layout.phase.name()
                    )));
                }
                Ok(match layout.phase {
                    PhaseColumn::Percent(_) => raw,
                    PhaseColumn::Index(_) => raw * 100.0 / expected_samples as f64,
                })
            })
            .collect::<Result<Vec<f64>, LocoError>>()?;

        let groups = group_rows(frame.rows(), subject, trial, cycle, task, layout)?;
        let max_distance = 50.0 / expected_samples as f64 + PHASE_SLACK;

        let variable_columns: Vec<(&str, &[f64])> = frame
            .columns
            .iter()
            .filter(|(column_name, _)| !layout.is_reserved(column_name))
            .filter_map(|(column_name, column)| match column {
                Column::Numeric(values) => Some((column_name.as_str(), values.as_slice())),
                Column::Text(_) => None,
            })
            .collect();

        let strides = groups
            .into_iter()
            .map(|group| {
                let mut stride = StrideRecord::new(group.id, group.task)
                    .with_phase_sample_count(group.rows.len());
                for &(variable, values) in &variable_columns {
                    if group.rows.iter().all(|&row| values[row].is_nan()) {
                        continue;
                    }
                    stride.mark_measured(variable);
                    for point in grid.iter() {
                        if let Some(row) =
                            nearest_row(&group.rows, &phase_percent, point, max_distance)
                        {
                            stride.insert(variable, point, values[row]);
                        }
                    }
                }
                stride
            })
            .collect();

        let variables = variable_columns
            .iter()
            .map(|(variable, _)| variable.to_string())
            .collect();
        Ok(Dataset::new(name, variables, strides))
    }
}

fn required_column<'a>(frame: &'a Frame, name: &str) -> Result<&'a Column, LocoError> {
    frame.column(name).ok_or_else(|| {
        LocoError::structure(format!(
            "cannot determine stride grouping: missing column '{name}'"
        ))
    })
}

fn group_rows(
    rows: usize,
    subject: &Column,
    trial: &Column,
    cycle: &Column,
    task: &Column,
    layout: &FrameLayout,
) -> Result<Vec<StrideGroup>, LocoError> {
    let mut groups: Vec<StrideGroup> = Vec::new();
    let mut index: HashMap<StrideId, usize> = HashMap::new();

    for row in 0..rows {
        let key = |column: &Column, column_name: &str| {
            column.key_at(row).ok_or_else(|| {
                LocoError::structure(format!(
                    "cannot determine stride grouping: column '{column_name}' is empty at row {row}"
                ))
            })
        };
        let id = StrideId::new(
            key(subject, &layout.subject_column)?,
            key(trial, &layout.trial_column)?,
            key(cycle, &layout.cycle_column)?,
        );
        let row_task = key(task, &layout.task_column)?;

        match index.get(&id) {
            Some(&slot) => {
                let group = &mut groups[slot];
                if group.task != row_task {
                    return Err(LocoError::structure(format!(
                        "stride {} mixes tasks '{}' and '{row_task}'",
                        group.id, group.task
                    )));
                }
                group.rows.push(row);
            }
            None => {
                index.insert(id.clone(), groups.len());
                groups.push(StrideGroup {
                    id,
                    task: row_task,
                    rows: vec![row],
                });
            }
        }
    }

    Ok(groups)
}

fn nearest_row(
    rows: &[usize],
    phase_percent: &[f64],
    point: PhasePoint,
    max_distance: f64,
) -> Option<usize> {
    let target = point.percent();
    let mut best: Option<(usize, f64)> = None;
    for &row in rows {
        let distance = (phase_percent[row] - target).abs();
        if distance <= max_distance && best.is_none_or(|(_, nearest)| distance < nearest) {
            best = Some((row, distance));
        }
    }
    best.map(|(row, _)| row)
}
