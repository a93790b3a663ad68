//! Device registration panel session
//!
//! A session loads the hub tables in a fixed order, renders the selection
//! form, and later turns the user's selections into a single `create`
//! request:
//!
//! `Idle -> TypesLoaded -> CapabilitiesLoaded -> NewDevicesLoaded -> Rendered -> Submitted`
//!
//! Any failure moves the session to `Failed` and replaces the panel with a
//! short message. Nothing is retried; the user reopens the panel.

use owpanel_core::{
    apply_selections, render_device_list, render_message, DeviceCapabilities, NewDeviceList,
    RegistrationError, RegistrationRequest, RenderError, Selections, TableError, TypeTable,
    REGISTRATION_SENT,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::hub::{Hub, HubError};

/// Receives the HTML shown in the panel's display region
pub trait PanelSink {
    fn set_panel_html(&self, html: String);
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    TypesLoaded,
    CapabilitiesLoaded,
    NewDevicesLoaded,
    Rendered,
    Submitted,
    Failed,
}

/// Hub exchange a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Types,
    Capabilities,
    NewDevices,
    Create,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Types => "service types",
            Step::Capabilities => "device capabilities",
            Step::NewDevices => "new devices",
            Step::Create => "device registration",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Failed to exchange {step} with hub: {source}")]
    Hub {
        step: Step,
        #[source]
        source: HubError,
    },
    #[error("Hub sent unusable {step}: {source}")]
    Table {
        step: Step,
        #[source]
        source: TableError,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl PanelError {
    fn hub(step: Step) -> impl FnOnce(HubError) -> Self {
        move |source| PanelError::Hub { step, source }
    }

    fn table(step: Step) -> impl FnOnce(TableError) -> Self {
        move |source| PanelError::Table { step, source }
    }

    /// Text shown in the panel in place of the device list
    pub fn user_message(&self) -> &'static str {
        match self {
            PanelError::Hub {
                step: Step::Create, ..
            } => "Unable to send the configuration to Vera.",
            PanelError::Hub {
                step: Step::NewDevices,
                ..
            } => "Unable to load the list of new devices from the hub.",
            PanelError::Hub { .. } => "Unable to load the device tables from the hub.",
            PanelError::Table {
                source: TableError::Json { .. },
                step: Step::NewDevices,
            } => "Unable to read the list of new devices from the hub.",
            PanelError::Table {
                source: TableError::Json { .. },
                ..
            } => "Unable to read the device tables from the hub.",
            PanelError::Table { .. } | PanelError::Render(RenderError::Table(_)) => {
                "The hub returned inconsistent device tables."
            }
            PanelError::Render(_) => "Unable to display the list of new devices.",
            PanelError::Registration(_) => {
                "The selected device types are not valid. Reopen the panel and check all entries."
            }
        }
    }
}

/// Result of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No rows were loaded, nothing was sent
    NothingToRegister,
    /// The hub accepted this many rows
    Registered(usize),
}

/// State of one panel opening
#[derive(Debug, Clone, Default)]
pub struct PanelSession {
    generation: u64,
    phase: Phase,
    types: TypeTable,
    capabilities: DeviceCapabilities,
    devices: NewDeviceList,
}

impl PanelSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panel opening this session belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn devices(&self) -> &NewDeviceList {
        &self.devices
    }

    /// Open the panel: load all tables, render, and hand the HTML to `sink`
    ///
    /// On failure the sink receives the error's user message instead and the
    /// session is returned in the `Failed` phase alongside the error. The
    /// rendered form is stamped with `generation`.
    pub async fn open<H: Hub, S: PanelSink>(
        hub: &H,
        sink: &S,
        generation: u64,
    ) -> (Self, Result<(), PanelError>) {
        let mut session = Self {
            generation,
            ..Self::new()
        };
        let result = match session.bootstrap(hub).await {
            Ok(html) => {
                sink.set_panel_html(html);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Panel bootstrap failed");
                session.fail(&e, sink);
                Err(e)
            }
        };
        (session, result)
    }

    async fn bootstrap<H: Hub>(&mut self, hub: &H) -> Result<String, PanelError> {
        self.load_types(hub).await?;
        self.load_capabilities(hub).await?;
        self.load_new_devices(hub).await?;
        self.render()
    }

    /// Step 1: `gettypes`
    pub async fn load_types<H: Hub>(&mut self, hub: &H) -> Result<(), PanelError> {
        let body = hub.get_types().await.map_err(PanelError::hub(Step::Types))?;
        self.types = TypeTable::from_json(&body).map_err(PanelError::table(Step::Types))?;
        self.phase = Phase::TypesLoaded;
        debug!(types = self.types.len(), "Loaded service types");
        Ok(())
    }

    /// Step 2: `getdevcap`, checked against the type table
    pub async fn load_capabilities<H: Hub>(&mut self, hub: &H) -> Result<(), PanelError> {
        let body = hub
            .get_capabilities()
            .await
            .map_err(PanelError::hub(Step::Capabilities))?;
        let capabilities =
            DeviceCapabilities::from_json(&body).map_err(PanelError::table(Step::Capabilities))?;
        capabilities
            .validate(&self.types)
            .map_err(PanelError::table(Step::Capabilities))?;
        self.capabilities = capabilities;
        self.phase = Phase::CapabilitiesLoaded;
        debug!(capabilities = self.capabilities.len(), "Loaded device capabilities");
        Ok(())
    }

    /// Step 3: `getnew`, checked against the capability table
    pub async fn load_new_devices<H: Hub>(&mut self, hub: &H) -> Result<(), PanelError> {
        let body = hub
            .get_new_devices()
            .await
            .map_err(PanelError::hub(Step::NewDevices))?;
        let devices = NewDeviceList::from_json(&body).map_err(PanelError::table(Step::NewDevices))?;
        devices
            .validate(&self.capabilities)
            .map_err(PanelError::table(Step::NewDevices))?;
        self.devices = devices;
        self.phase = Phase::NewDevicesLoaded;
        info!(devices = self.devices.len(), "Loaded new devices");
        Ok(())
    }

    /// Step 4: build the selection form
    pub fn render(&mut self) -> Result<String, PanelError> {
        let html = render_device_list(
            &self.types,
            &self.capabilities,
            &self.devices,
            self.generation,
        )?;
        self.phase = Phase::Rendered;
        Ok(html)
    }

    /// Register the loaded devices with the selected types
    ///
    /// Sends nothing when no rows are loaded. On success the confirmation
    /// message replaces the panel and the rows are dropped; the hub owns
    /// them from here on.
    pub async fn submit<H: Hub, S: PanelSink>(
        &mut self,
        hub: &H,
        selections: &Selections,
        sink: &S,
    ) -> Result<SubmitOutcome, PanelError> {
        if self.devices.is_empty() {
            debug!("No new devices loaded, nothing to register");
            return Ok(SubmitOutcome::NothingToRegister);
        }

        match self.register(hub, selections).await {
            Ok(count) => {
                sink.set_panel_html(render_message(REGISTRATION_SENT)?);
                Ok(SubmitOutcome::Registered(count))
            }
            Err(e) => {
                error!(error = %e, "Device registration failed");
                self.fail(&e, sink);
                Err(e)
            }
        }
    }

    async fn register<H: Hub>(&mut self, hub: &H, selections: &Selections) -> Result<usize, PanelError> {
        apply_selections(&mut self.devices, &self.capabilities, selections)?;
        let request = RegistrationRequest::from_devices(&self.devices);

        hub.create(&request).await.map_err(PanelError::hub(Step::Create))?;

        info!(devices = request.len(), "Registered new devices with hub");
        self.devices.clear();
        self.phase = Phase::Submitted;
        Ok(request.len())
    }

    fn fail<S: PanelSink>(&mut self, err: &PanelError, sink: &S) {
        self.phase = Phase::Failed;
        let message = err.user_message();
        let html = render_message(message).unwrap_or_else(|_| message.to_string());
        sink.set_panel_html(html);
    }
}
