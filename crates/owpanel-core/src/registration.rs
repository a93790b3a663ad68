//! Registration of new devices with the hub
//!
//! The panel posts one selector per row, named [`selection_field`]. The
//! chosen values are written back into the new-device rows and flattened
//! into the argument set of a single `create` request:
//! `Rom{i}`, `Dev{i}`, `Typ{i}` for i = 1..N, followed by `cnt`.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::tables::{DeviceCapabilities, NewDeviceList, TableError, TableKey};

/// Hub function that creates devices
pub const CREATE_FUNCT: &str = "create";

/// Form field prefix of the per-row type selector
pub const SELECTION_FIELD_PREFIX: &str = "OWVar-";

/// Hidden form field naming the panel opening the form was rendered for
pub const GENERATION_FIELD: &str = "generation";

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Selection refers to unknown row {0}")]
    UnknownRow(usize),
    #[error("Type {service} is not offered for row {row}")]
    InvalidSelection { row: usize, service: TableKey },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Form field name of the selector for row `index`
pub fn selection_field(index: usize) -> String {
    format!("{}{}", SELECTION_FIELD_PREFIX, index)
}

/// Selector values keyed by row index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections(BTreeMap<usize, TableKey>);

impl Selections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect selector values from submitted form fields
    ///
    /// Fields that are not row selectors are ignored.
    pub fn from_form<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let selections = fields
            .into_iter()
            .filter_map(|(name, value)| {
                let index = name
                    .as_ref()
                    .strip_prefix(SELECTION_FIELD_PREFIX)?
                    .parse::<usize>()
                    .ok()?;
                Some((index, TableKey::new(value.as_ref())))
            })
            .collect();
        Self(selections)
    }

    pub fn select(&mut self, row: usize, service: impl Into<TableKey>) {
        self.0.insert(row, service.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A posted panel form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmittedForm {
    /// Panel opening the form belongs to; `None` when absent or unreadable
    pub generation: Option<u64>,
    pub selections: Selections,
}

impl SubmittedForm {
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let fields: Vec<(K, V)> = fields.into_iter().collect();
        let generation = fields
            .iter()
            .find(|(name, _)| name.as_ref() == GENERATION_FIELD)
            .and_then(|(_, value)| value.as_ref().parse().ok());
        Self {
            generation,
            selections: Selections::from_form(fields),
        }
    }
}

/// Overwrite each selected row's type with the submitted value
///
/// Nothing is modified unless every selection is valid. Rows without a
/// submitted value keep their current type.
pub fn apply_selections(
    devices: &mut NewDeviceList,
    capabilities: &DeviceCapabilities,
    selections: &Selections,
) -> Result<(), RegistrationError> {
    for (&row, service) in &selections.0 {
        let device = devices.get(row).ok_or(RegistrationError::UnknownRow(row))?;
        let capability = capabilities
            .get(&device.device)
            .ok_or_else(|| TableError::UnknownDeviceClass(device.device.clone()))?;
        if !capability.offers(service) {
            return Err(RegistrationError::InvalidSelection {
                row,
                service: service.clone(),
            });
        }
    }

    for (&row, service) in &selections.0 {
        if let Some(device) = devices.get_mut(row) {
            device.service_type = service.clone();
        }
    }

    debug!(selections = selections.len(), "Applied row selections");
    Ok(())
}

/// A single row of a `create` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRow {
    pub rom_id: String,
    pub device: TableKey,
    pub service_type: TableKey,
}

/// Arguments of the hub's `create` function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationRequest {
    rows: Vec<RegistrationRow>,
}

impl RegistrationRequest {
    pub fn from_devices(devices: &NewDeviceList) -> Self {
        let rows = devices
            .iter()
            .map(|d| RegistrationRow {
                rom_id: d.rom_id.clone(),
                device: d.device.clone(),
                service_type: d.service_type.clone(),
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[RegistrationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Flatten into query parameters, numbering rows from 1
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.rows.len() * 3 + 1);
        for (i, row) in self.rows.iter().enumerate() {
            let n = i + 1;
            params.push((format!("Rom{}", n), row.rom_id.clone()));
            params.push((format!("Dev{}", n), row.device.to_string()));
            params.push((format!("Typ{}", n), row.service_type.to_string()));
        }
        params.push(("cnt".to_string(), self.rows.len().to_string()));
        params
    }
}
