//! Hub tables - service types, device capabilities, and newly discovered devices
//!
//! The hub answers `gettypes`, `getdevcap` and `getnew` with JSON documents
//! built from Lua tables. Keys may be encoded either as JSON strings or as
//! JSON integers, and mappings must be read as key/value maps rather than
//! indexed arrays.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde::ser::Serializer;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to parse {table} table: {source}")]
    Json {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Device class {0} is not a known device capability")]
    UnknownDeviceClass(TableKey),
    #[error("Device class {device} lists unknown service type {service}")]
    UnknownServiceType { device: TableKey, service: TableKey },
}

/// Key into one of the hub tables
///
/// `1` and `"1"` denote the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TableKey(pub String);

impl TableKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TableKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl<'de> Deserialize<'de> for TableKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = TableKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or integer table key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TableKey, E> {
                Ok(TableKey(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<TableKey, E> {
                Ok(TableKey(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<TableKey, E> {
                Ok(TableKey(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TableKey, E> {
                Ok(TableKey(v.to_string()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

/// Key/value entries in document order
///
/// A repeated key replaces the earlier value in place.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entries<V>(Vec<(TableKey, V)>);

impl<V> Default for Entries<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> Entries<V> {
    fn get(&self, key: &TableKey) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn insert(&mut self, key: TableKey, value: V) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((key, value)),
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&TableKey, &V)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

impl<V: Serialize> Serialize for Entries<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a keyed table")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Entries<V>, A::Error> {
                let mut entries = Entries(Vec::with_capacity(map.size_hint().unwrap_or(0)));
                while let Some((key, value)) = map.next_entry::<TableKey, V>()? {
                    entries.insert(key, value);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// A measurement/service type the hub knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceType {
    #[serde(rename = "Name")]
    pub name: String,
}

/// `gettypes` response: service type key -> display name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTable(Entries<ServiceType>);

impl TypeTable {
    /// Parse the hub's `gettypes` body
    pub fn from_json(body: &str) -> Result<Self, TableError> {
        serde_json::from_str(body).map_err(|source| TableError::Json {
            table: "type",
            source,
        })
    }

    pub fn get(&self, key: &TableKey) -> Option<&ServiceType> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &TableKey) -> bool {
        self.0.get(key).is_some()
    }

    /// Entries in document order
    pub fn iter(&self) -> impl Iterator<Item = (&TableKey, &ServiceType)> {
        self.0.iter()
    }

    pub fn insert(&mut self, key: impl Into<TableKey>, name: impl Into<String>) {
        self.0.insert(key.into(), ServiceType { name: name.into() });
    }

    pub fn len(&self) -> usize {
        self.0.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.0.is_empty()
    }
}

/// Template describing one device class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapability {
    /// Chip family shown in the panel (e.g. "DS18B20")
    #[serde(rename = "Device")]
    pub device: String,
    /// Display name of the device class
    #[serde(rename = "Name")]
    pub name: String,
    /// Service types this class can expose, in selector order
    #[serde(rename = "Services", default)]
    pub services: Vec<TableKey>,
}

impl DeviceCapability {
    pub fn offers(&self, service: &TableKey) -> bool {
        self.services.contains(service)
    }
}

/// `getdevcap` response: device class key -> capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCapabilities(Entries<DeviceCapability>);

impl DeviceCapabilities {
    /// Parse the hub's `getdevcap` body
    pub fn from_json(body: &str) -> Result<Self, TableError> {
        serde_json::from_str(body).map_err(|source| TableError::Json {
            table: "device capability",
            source,
        })
    }

    pub fn get(&self, key: &TableKey) -> Option<&DeviceCapability> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<TableKey>, capability: DeviceCapability) {
        self.0.insert(key.into(), capability);
    }

    /// Entries in document order
    pub fn iter(&self) -> impl Iterator<Item = (&TableKey, &DeviceCapability)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.0.is_empty()
    }

    /// Check that every service listed by every capability exists in `types`
    ///
    /// Reports the first violation in document order.
    pub fn validate(&self, types: &TypeTable) -> Result<(), TableError> {
        for (key, capability) in self.0.iter() {
            if let Some(missing) = capability.services.iter().find(|s| !types.contains(s)) {
                return Err(TableError::UnknownServiceType {
                    device: key.clone(),
                    service: missing.clone(),
                });
            }
        }
        Ok(())
    }
}

/// One discovered hardware channel awaiting registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    /// 1-Wire ROM serial, shared by all channels of one physical sensor
    #[serde(rename = "ROMId")]
    pub rom_id: String,
    /// Key into [`DeviceCapabilities`]
    #[serde(rename = "Device")]
    pub device: TableKey,
    /// Key into [`TypeTable`]; overwritten by the user's selection
    #[serde(rename = "Type")]
    pub service_type: TableKey,
}

/// `getnew` response, in hub order
///
/// Accepts either a JSON array or a JSON object keyed by row; object rows
/// are kept in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NewDeviceList(Vec<NewDevice>);

impl NewDeviceList {
    /// Parse the hub's `getnew` body
    pub fn from_json(body: &str) -> Result<Self, TableError> {
        serde_json::from_str(body).map_err(|source| TableError::Json {
            table: "new device",
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NewDevice> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NewDevice> {
        self.0.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut NewDevice> {
        self.0.get_mut(index)
    }

    /// Drop all rows once the hub has taken ownership of them
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Check that every row refers to a known device class
    pub fn validate(&self, capabilities: &DeviceCapabilities) -> Result<(), TableError> {
        match self.0.iter().find(|d| capabilities.get(&d.device).is_none()) {
            Some(device) => Err(TableError::UnknownDeviceClass(device.device.clone())),
            None => Ok(()),
        }
    }
}

impl From<Vec<NewDevice>> for NewDeviceList {
    fn from(devices: Vec<NewDevice>) -> Self {
        Self(devices)
    }
}

impl<'a> IntoIterator for &'a NewDeviceList {
    type Item = &'a NewDevice;
    type IntoIter = std::slice::Iter<'a, NewDevice>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for NewDeviceList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RowsVisitor;

        impl<'de> Visitor<'de> for RowsVisitor {
            type Value = NewDeviceList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list or keyed map of new devices")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<NewDeviceList, A::Error> {
                let mut rows = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(row) = seq.next_element()? {
                    rows.push(row);
                }
                Ok(NewDeviceList(rows))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<NewDeviceList, A::Error> {
                let mut rows = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((_key, row)) = map.next_entry::<TableKey, NewDevice>()? {
                    rows.push(row);
                }
                Ok(NewDeviceList(rows))
            }
        }

        deserializer.deserialize_any(RowsVisitor)
    }
}
