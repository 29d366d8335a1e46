//! Device records built from the account's metadevice listing.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::Error;
use crate::error::Result;

/// `typeId` of metadevices that are actual devices (as opposed to rooms or homes).
const DEVICE_TYPE_ID: &str = "metadevice.device";

/// One reported value, keyed by function class and optional instance.
///
/// This is both the shape the vendor reports state in and the shape it
/// accepts state changes in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateValue {
    pub function_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_instance: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<i64>,
}

impl StateValue {
    pub fn new(function_class: &str, function_instance: Option<&str>, value: impl Into<Value>) -> Self {
        Self {
            function_class: function_class.to_string(),
            function_instance: function_instance.map(str::to_string),
            value: value.into(),
            last_update_time: None,
        }
    }

    fn is_key(&self, class: &str, instance: Option<&str>) -> bool {
        self.function_class == class && self.function_instance.as_deref() == instance
    }
}

/// A capability the device declares, with the named values it accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub class: String,
    pub instance: Option<String>,
    pub kind: Option<String>,
    /// Named values, sorted.
    pub values: Vec<String>,
}

/// Immutable snapshot of one device as reported in a single poll.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// Metadevice id, the stable key for the device.
    pub id: String,
    /// Physical device id. Several metadevices may share one.
    pub device_id: Option<String>,
    pub name: String,
    /// Vendor device-type tag, e.g. `ceiling-fan` or `power-outlet`.
    pub device_class: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub children: Vec<String>,
    pub functions: Vec<Function>,
    pub state: Vec<StateValue>,
}

impl DeviceRecord {
    /// Value for an exact function class and instance.
    pub fn state(&self, class: &str, instance: Option<&str>) -> Option<&Value> {
        self.state
            .iter()
            .find(|s| s.is_key(class, instance))
            .map(|s| &s.value)
    }

    /// Value for a function class, whatever the instance.
    ///
    /// Warns when the class has more than one instance and uses the first.
    pub fn first_state(&self, class: &str) -> Option<&Value> {
        let mut matching = self.state.iter().filter(|s| s.function_class == class);
        let first = matching.next()?;
        if matching.next().is_some() {
            warn!(
                "Device {} reports more than one {} value, using the first",
                self.id, class
            );
        }
        Some(&first.value)
    }

    /// All reported values of a function class.
    pub fn states_of<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a StateValue> + 'a {
        self.state.iter().filter(move |s| s.function_class == class)
    }

    pub fn function(&self, class: &str, instance: Option<&str>) -> Option<&Function> {
        self.functions
            .iter()
            .find(|f| f.class == class && f.instance.as_deref() == instance)
    }

    pub fn functions_of<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Function> + 'a {
        self.functions.iter().filter(move |f| f.class == class)
    }

    /// A copy of this record with `values` applied on top of its state.
    ///
    /// Values for keys the record already reports replace the old ones, new
    /// keys are appended.
    pub fn with_values(&self, values: &[StateValue]) -> DeviceRecord {
        let mut next = self.clone();
        for value in values {
            let key_instance = value.function_instance.as_deref();
            match next
                .state
                .iter_mut()
                .find(|s| s.is_key(&value.function_class, key_instance))
            {
                Some(existing) => *existing = value.clone(),
                None => next.state.push(value.clone()),
            }
        }
        next
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadevice {
    id: String,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    friendly_name: Option<String>,
    description: RawDescription,
    #[serde(default)]
    state: RawState,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDescription {
    device: RawDeviceDescription,
    #[serde(default)]
    functions: Vec<RawFunction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeviceDescription {
    device_class: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    manufacturer_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFunction {
    function_class: String,
    #[serde(default)]
    function_instance: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    values: Vec<RawFunctionValue>,
}

#[derive(Debug, Deserialize)]
struct RawFunctionValue {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawState {
    #[serde(default)]
    values: Vec<StateValue>,
}

impl From<RawMetadevice> for DeviceRecord {
    fn from(raw: RawMetadevice) -> Self {
        let functions = raw
            .description
            .functions
            .into_iter()
            .map(|f| {
                let mut values: Vec<String> = f.values.into_iter().filter_map(|v| v.name).collect();
                values.sort();
                Function {
                    class: f.function_class,
                    instance: f.function_instance,
                    kind: f.kind,
                    values,
                }
            })
            .collect();

        let device_class = raw.description.device.device_class;
        DeviceRecord {
            name: raw.friendly_name.unwrap_or_else(|| device_class.clone()),
            id: raw.id,
            device_id: raw.device_id,
            device_class,
            model: raw.description.device.model,
            manufacturer: raw.description.device.manufacturer_name,
            children: raw.children,
            functions,
            state: raw.state.values,
        }
    }
}

/// Parse the body of `GET /accounts/{id}/metadevices?expansions=state`.
///
/// Entries that are not devices are dropped. If any device entry is malformed
/// the whole listing is rejected, so callers never see a partial snapshot.
pub fn parse_metadevices(body: &str) -> Result<Vec<DeviceRecord>> {
    let entries: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("metadevice listing is not a JSON array: {}", e)))?;

    let mut devices = Vec::new();
    for (idx, entry) in entries.into_iter().enumerate() {
        if entry.get("typeId").and_then(Value::as_str) != Some(DEVICE_TYPE_ID) {
            continue;
        }
        let raw: RawMetadevice = serde_json::from_value(entry)
            .map_err(|e| Error::Parse(format!("metadevice #{}: {}", idx, e)))?;
        devices.push(DeviceRecord::from(raw));
    }

    Ok(devices)
}
