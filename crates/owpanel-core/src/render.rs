//! Panel HTML rendering
//!
//! Everything taken from the hub tables goes through askama's HTML escaping.

use askama::Template;
use thiserror::Error;
use tracing::debug;

use crate::registration::{selection_field, GENERATION_FIELD};
use crate::tables::{DeviceCapabilities, NewDeviceList, TableError, TypeTable};

/// Shown instead of the table when `getnew` returns no rows
pub const NO_NEW_DEVICES: &str = "No new devices to add";

/// Shown after the hub accepted a `create` request
pub const REGISTRATION_SENT: &str =
    "Configuration has been sent to Vera. LuaPnP will restart and the new devices should take effect...";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Failed to render panel template: {0}")]
    Template(#[from] askama::Error),
}

/// Boundary drawn above a device row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// First channel of a new physical sensor
    Sensor,
    /// Further channel of the same sensor
    Channel,
}

impl Separator {
    pub fn style(&self) -> &'static str {
        match self {
            Separator::Sensor => "border-top:3px solid green;margin:2px;",
            Separator::Channel => "border-top:1px solid blue;margin:2px;",
        }
    }
}

struct SelectOption<'a> {
    value: &'a str,
    label: &'a str,
    selected: bool,
}

struct DeviceRow<'a> {
    field: String,
    separator: Separator,
    device: &'a str,
    rom_id: &'a str,
    name: &'a str,
    options: Vec<SelectOption<'a>>,
}

#[derive(Template)]
#[template(path = "panel.html")]
struct PanelTemplate<'a> {
    generation_field: &'static str,
    generation: u64,
    total: usize,
    rows: Vec<DeviceRow<'a>>,
}

#[derive(Template)]
#[template(path = "message.html")]
struct MessageTemplate<'a> {
    message: &'a str,
}

/// Render a plain status message in place of the device table
pub fn render_message(message: &str) -> Result<String, RenderError> {
    Ok(MessageTemplate { message }.render()?)
}

/// Render the new-device selection form
///
/// One row per new device: the capability's chip family, the ROM id, the
/// capability name, and a selector listing the capability's services by
/// type name. A heavier separator is drawn whenever the ROM id changes from
/// the previous row; the first row always gets it. With no new devices the
/// [`NO_NEW_DEVICES`] message is rendered instead.
///
/// `generation` is echoed back by the form in a hidden field so a post can be
/// matched to the panel opening that produced it.
pub fn render_device_list(
    types: &TypeTable,
    capabilities: &DeviceCapabilities,
    devices: &NewDeviceList,
    generation: u64,
) -> Result<String, RenderError> {
    if devices.is_empty() {
        return render_message(NO_NEW_DEVICES);
    }

    let mut rows = Vec::with_capacity(devices.len());
    let mut last_rom_id: Option<&str> = None;

    for (index, device) in devices.iter().enumerate() {
        let capability = capabilities
            .get(&device.device)
            .ok_or_else(|| TableError::UnknownDeviceClass(device.device.clone()))?;

        let separator = if last_rom_id == Some(device.rom_id.as_str()) {
            Separator::Channel
        } else {
            Separator::Sensor
        };
        last_rom_id = Some(device.rom_id.as_str());

        let options = capability
            .services
            .iter()
            .map(|service| {
                let service_type =
                    types
                        .get(service)
                        .ok_or_else(|| TableError::UnknownServiceType {
                            device: device.device.clone(),
                            service: service.clone(),
                        })?;
                Ok::<_, TableError>(SelectOption {
                    value: service.as_str(),
                    label: service_type.name.as_str(),
                    selected: *service == device.service_type,
                })
            })
            .collect::<Result<Vec<_>, TableError>>()?;

        rows.push(DeviceRow {
            field: selection_field(index),
            separator,
            device: &capability.device,
            rom_id: &device.rom_id,
            name: &capability.name,
            options,
        });
    }

    let html = PanelTemplate {
        generation_field: GENERATION_FIELD,
        generation,
        total: devices.len(),
        rows,
    }
    .render()?;
    debug!(rows = devices.len(), generation, "Rendered new-device panel");
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (TypeTable, DeviceCapabilities) {
        let types = TypeTable::from_json(r#"{"1":{"Name":"Temp"},"2":{"Name":"Humidity"}}"#).unwrap();
        let caps = DeviceCapabilities::from_json(
            r#"{
                "5":{"Device":"DS18B20","Name":"Thermometer","Services":[1]},
                "7":{"Device":"DS2438","Name":"Multi sensor","Services":[1,2]}
            }"#,
        )
        .unwrap();
        (types, caps)
    }

    #[test]
    fn test_single_row_single_option() {
        let (types, caps) = tables();
        let devices =
            NewDeviceList::from_json(r#"[{"ROMId":"28FF...","Device":5,"Type":1}]"#).unwrap();

        let html = render_device_list(&types, &caps, &devices, 1).unwrap();

        assert_eq!(html.matches("<select").count(), 1);
        assert_eq!(html.matches("<option").count(), 1);
        assert!(html.contains(r#"<option value="1" selected>Temp</option>"#));
        assert!(html.contains("Device: DS18B20"));
        assert!(html.contains("28FF..."));
        assert!(html.contains("Thermometer"));
        assert!(html.contains("Total NEW devices: <b>1</b>"));
        assert!(html.contains(r#"name="OWVar-0""#));
    }

    #[test]
    fn test_separator_follows_rom_id() {
        let (types, caps) = tables();
        let devices = NewDeviceList::from_json(
            r#"[
                {"ROMId":"26AA","Device":7,"Type":1},
                {"ROMId":"26AA","Device":7,"Type":2},
                {"ROMId":"28FF","Device":5,"Type":1}
            ]"#,
        )
        .unwrap();

        let html = render_device_list(&types, &caps, &devices, 1).unwrap();

        let styles: Vec<&str> = html
            .match_indices("class=\"owpanel-row\" style=\"")
            .map(|(at, m)| {
                let rest = &html[at + m.len()..];
                &rest[..rest.find('"').unwrap()]
            })
            .collect();
        assert_eq!(
            styles,
            vec![
                Separator::Sensor.style(),
                Separator::Channel.style(),
                Separator::Sensor.style(),
            ]
        );
    }

    #[test]
    fn test_first_row_gets_heavy_separator() {
        let (types, caps) = tables();
        let devices = NewDeviceList::from_json(
            r#"[{"ROMId":"","Device":5,"Type":1},{"ROMId":"","Device":5,"Type":1}]"#,
        )
        .unwrap();

        let html = render_device_list(&types, &caps, &devices, 1).unwrap();

        let first = html.find(Separator::Sensor.style()).unwrap();
        let second = html.find(Separator::Channel.style()).unwrap();
        assert!(first < second);
        assert_eq!(html.matches(Separator::Sensor.style()).count(), 1);
    }

    #[test]
    fn test_form_carries_generation() {
        let (types, caps) = tables();
        let devices =
            NewDeviceList::from_json(r#"[{"ROMId":"28FF","Device":5,"Type":1}]"#).unwrap();

        let html = render_device_list(&types, &caps, &devices, 7).unwrap();

        assert!(html.contains(r#"<input type="hidden" name="generation" value="7">"#));
    }

    #[test]
    fn test_current_type_is_preselected() {
        let (types, caps) = tables();
        let devices =
            NewDeviceList::from_json(r#"[{"ROMId":"26AA","Device":7,"Type":2}]"#).unwrap();

        let html = render_device_list(&types, &caps, &devices, 1).unwrap();

        assert!(html.contains(r#"<option value="1">Temp</option>"#));
        assert!(html.contains(r#"<option value="2" selected>Humidity</option>"#));
    }

    #[test]
    fn test_empty_list_renders_message() {
        let (types, caps) = tables();
        let html = render_device_list(&types, &caps, &NewDeviceList::default(), 1).unwrap();

        assert!(html.contains(NO_NEW_DEVICES));
        assert!(!html.contains("<table"));
    }

    #[test]
    fn test_hub_text_is_escaped() {
        let (types, caps) = tables();
        let devices = NewDeviceList::from_json(
            r#"[{"ROMId":"<script>alert(1)</script>","Device":5,"Type":1}]"#,
        )
        .unwrap();

        let html = render_device_list(&types, &caps, &devices, 1).unwrap();

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_unknown_device_class_is_an_error() {
        let (types, caps) = tables();
        let devices =
            NewDeviceList::from_json(r#"[{"ROMId":"28FF","Device":99,"Type":1}]"#).unwrap();

        let err = render_device_list(&types, &caps, &devices, 1).unwrap_err();
        assert!(matches!(err, RenderError::Table(TableError::UnknownDeviceClass(_))));
    }
}
