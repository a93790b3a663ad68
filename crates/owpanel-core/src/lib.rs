//! OWPanel Core - Hub tables, panel rendering, and device registration
//!
//! This crate provides the IO-free parts of the OWServer registration panel:
//! - Typed records for the hub's type, capability, and new-device tables
//! - Shape validation of those tables on receipt
//! - HTML rendering of the selection form and status messages
//! - Translation of the user's selections into `create` arguments

pub mod registration;
pub mod render;
pub mod tables;

pub use registration::{
    apply_selections, selection_field, RegistrationError, RegistrationRequest, RegistrationRow,
    Selections, SubmittedForm, CREATE_FUNCT, GENERATION_FIELD,
};
pub use render::{
    render_device_list, render_message, RenderError, Separator, NO_NEW_DEVICES,
    REGISTRATION_SENT,
};
pub use tables::{
    DeviceCapabilities, DeviceCapability, NewDevice, NewDeviceList, ServiceType, TableError,
    TableKey, TypeTable,
};
