//! Application state management

use anyhow::Result;
use owpanel_core::{render_message, NewDeviceList, SubmittedForm};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::hub::HubClient;
use crate::panel::{PanelSession, PanelSink, Phase};

/// Shown when a form is posted before the panel was opened
const NO_SESSION: &str = "The panel is not open. Reload the page to look for new devices.";

/// Shown when a form from an earlier opening is posted
pub const FORM_OUTDATED: &str =
    "The panel was reopened after this form was loaded, so nothing was sent. Reload the page and check all entries again.";

/// Returned to an opening that finished after a newer one had started
pub const SUPERSEDED: &str =
    "The panel was reopened while this list was loading. Reload the page to see the current list.";

fn message(text: &str) -> String {
    render_message(text).unwrap_or_else(|_| text.to_string())
}

/// Latest panel HTML, as shown in the panel's display region
#[derive(Debug, Default)]
pub struct PanelView {
    html: RwLock<String>,
}

impl PanelView {
    pub fn html(&self) -> String {
        self.html
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl PanelSink for PanelView {
    fn set_panel_html(&self, html: String) {
        *self
            .html
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = html;
    }
}

/// Shared application state
pub struct AppState {
    /// Hub client
    pub hub: HubClient,
    /// Configuration
    pub config: Config,
    /// Panel display region
    pub view: PanelView,
    /// Session of the latest panel opening
    session: Mutex<Option<PanelSession>>,
    /// Incremented on every opening; older bootstraps are discarded
    generation: AtomicU64,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let hub = HubClient::new(&config.hub)?;
        Ok(Arc::new(Self {
            hub,
            config,
            view: PanelView::default(),
            session: Mutex::new(None),
            generation: AtomicU64::new(0),
        }))
    }

    /// Open the panel with a fresh session and return its HTML
    ///
    /// If the panel is reopened while this bootstrap is still running, the
    /// result of this one is dropped and the newer panel is kept.
    pub async fn open_panel(&self) -> String {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, "Opening panel");

        let staging = PanelView::default();
        let (session, _) = PanelSession::open(&self.hub, &staging, generation).await;
        self.install(session, staging).await
    }

    /// Make `session` current unless a newer opening has started since
    async fn install(&self, session: PanelSession, staging: PanelView) -> String {
        let mut current = self.session.lock().await;
        let latest = self.generation.load(Ordering::SeqCst);
        if session.generation() != latest {
            debug!(
                generation = session.generation(),
                latest, "Discarding stale panel session"
            );
            return message(SUPERSEDED);
        }
        let html = staging.html();
        *current = Some(session);
        self.view.set_panel_html(html.clone());
        html
    }

    /// Register the current session's devices and return the resulting HTML
    ///
    /// A form rendered by an earlier opening is refused without contacting
    /// the hub; its row indices belong to a list the hub may since have
    /// changed.
    pub async fn register(&self, form: SubmittedForm) -> String {
        let mut current = self.session.lock().await;
        match current.as_mut() {
            Some(session) if form.generation != Some(session.generation()) => {
                warn!(
                    form = ?form.generation,
                    current = session.generation(),
                    "Registration posted from an outdated panel"
                );
                return message(FORM_OUTDATED);
            }
            Some(session) => {
                if let Err(e) = session
                    .submit(&self.hub, &form.selections, &self.view)
                    .await
                {
                    debug!(error = %e, "Registration ended without creating devices");
                }
            }
            None => {
                warn!("Registration posted with no open panel");
                self.view.set_panel_html(message(NO_SESSION));
            }
        }
        self.view.html()
    }

    /// Phase and rows of the current session
    pub async fn snapshot(&self) -> (Phase, NewDeviceList) {
        match self.session.lock().await.as_ref() {
            Some(session) => (session.phase(), session.devices().clone()),
            None => (Phase::Idle, NewDeviceList::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{GET_CAPABILITIES_FUNCT, GET_NEW_FUNCT, GET_TYPES_FUNCT};
    use crate::testing::{MockHub, CAPABILITIES, NEWER_DEVICES, NEW_DEVICES, TYPES};
    use axum::http::StatusCode;
    use owpanel_core::{Selections, CREATE_FUNCT, REGISTRATION_SENT};

    async fn hub() -> MockHub {
        MockHub::start()
            .await
            .respond(GET_TYPES_FUNCT, StatusCode::OK, TYPES)
            .respond(GET_CAPABILITIES_FUNCT, StatusCode::OK, CAPABILITIES)
            .respond(GET_NEW_FUNCT, StatusCode::OK, NEW_DEVICES)
            .respond(CREATE_FUNCT, StatusCode::OK, "OK")
    }

    fn state(hub: &MockHub) -> Arc<AppState> {
        let config = Config {
            hub: hub.config(),
            ..Config::default()
        };
        AppState::new(config).unwrap()
    }

    fn creates(hub: &MockHub) -> Vec<Vec<(String, String)>> {
        hub.requests()
            .into_iter()
            .filter(|params| params.contains(&("funct".to_string(), CREATE_FUNCT.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn test_stale_open_is_discarded() {
        let hub = hub().await;
        let state = state(&hub);

        // An opening starts, then a newer one completes before it finishes
        let stale_generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let stale_view = PanelView::default();
        let (stale, _) = PanelSession::open(&state.hub, &stale_view, stale_generation).await;

        hub.set_response(GET_NEW_FUNCT, StatusCode::OK, NEWER_DEVICES);
        let current = state.open_panel().await;
        assert!(current.contains("30BB00000003"));

        let returned = state.install(stale, stale_view).await;

        assert!(returned.contains(SUPERSEDED));
        assert!(!returned.contains("26AA00000001"));
        assert_eq!(state.view.html(), current);
        let session = state.session.lock().await;
        assert_eq!(session.as_ref().unwrap().generation(), stale_generation + 1);
        assert_eq!(session.as_ref().unwrap().devices().get(0).unwrap().rom_id, "30BB00000003");
    }

    #[tokio::test]
    async fn test_each_open_gets_a_new_generation() {
        let hub = hub().await;
        let state = state(&hub);

        let first = state.open_panel().await;
        let second = state.open_panel().await;

        assert!(first.contains(r#"name="generation" value="1""#));
        assert!(second.contains(r#"name="generation" value="2""#));
        assert_eq!(state.view.html(), second);
    }

    #[tokio::test]
    async fn test_form_from_earlier_opening_is_refused() {
        let hub = hub().await;
        let state = state(&hub);
        state.open_panel().await;
        hub.set_response(GET_NEW_FUNCT, StatusCode::OK, NEWER_DEVICES);
        let reopened = state.open_panel().await;

        let fields = [("generation", "1"), ("OWVar-0", "2"), ("OWVar-1", "3"), ("OWVar-2", "1")];
        let html = state.register(SubmittedForm::from_fields(fields)).await;

        assert!(html.contains(FORM_OUTDATED));
        assert!(creates(&hub).is_empty());
        assert_eq!(state.view.html(), reopened);
        assert_eq!(state.snapshot().await.1.len(), 3);
    }

    #[tokio::test]
    async fn test_form_without_generation_is_refused() {
        let hub = hub().await;
        let state = state(&hub);
        state.open_panel().await;

        let form = SubmittedForm {
            generation: None,
            selections: Selections::from_form([("OWVar-0", "2")]),
        };
        let html = state.register(form).await;

        assert!(html.contains(FORM_OUTDATED));
        assert!(creates(&hub).is_empty());
    }

    #[tokio::test]
    async fn test_form_from_current_opening_registers() {
        let hub = hub().await;
        let state = state(&hub);
        state.open_panel().await;

        let html = state
            .register(SubmittedForm::from_fields([("generation", "1"), ("OWVar-0", "2")]))
            .await;

        assert!(html.contains(REGISTRATION_SENT));
        let creates = creates(&hub);
        assert_eq!(creates.len(), 1);
        assert!(creates[0].contains(&("Rom1".to_string(), "26AA00000001".to_string())));
        assert!(creates[0].contains(&("Typ1".to_string(), "2".to_string())));
    }
}
