//! Chat widget runtime: configuration resolution, the consent gate, panel
//! visibility and the message exchange, driven over a [`RenderSurface`].

pub mod config;
pub mod responder;
pub mod surface;
pub mod transport;

pub use config::{ConfigLayer, MountElement, WidgetConfig, WidgetOptions};
pub use responder::{DemoResponder, ResponseProvider};
pub use surface::{Element, MemorySurface, MountLayout, RenderSurface};
pub use transport::{HttpTransport, TransportError, WidgetTransport};

use crate::build::css::transform_stylesheet;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Element looked up when the caller does not pass one.
pub const DEFAULT_MOUNT_ID: &str = "civic-chat";
pub const AUTO_SHOW_DELAY: Duration = Duration::from_millis(500);
pub const CONSENT_THANKS: &str = "Thank you! How can I help you today?";

const STYLESHEET: &str = include_str!("../../assets/widget.css");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    /// Mounted, consent not yet checked.
    Uninitialized,
    /// Consent prompt displayed; input disabled.
    AwaitingConsent,
    Ready,
}

/// User interactions the host surface forwards to the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    SendClicked,
    EnterPressed,
    CloseClicked,
    ToggleClicked,
    ConsentAccepted,
    EscapePressed,
}

#[derive(Clone)]
pub struct WidgetServices {
    pub transport: Arc<dyn WidgetTransport>,
    pub responder: Arc<dyn ResponseProvider>,
}

impl WidgetServices {
    pub fn new(transport: Arc<dyn WidgetTransport>, responder: Arc<dyn ResponseProvider>) -> Self {
        Self {
            transport,
            responder,
        }
    }
}

fn widget_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("civic-{}", &raw[..9])
}

pub struct ChatWidget<S: RenderSurface> {
    id: String,
    config: WidgetConfig,
    surface: S,
    services: WidgetServices,
    state: ConsentState,
    open: bool,
    messages: Vec<Message>,
    awaiting_reply: bool,
    auto_show_at: Option<Instant>,
}

/// A bot reply in flight. Holds no borrow of the widget, so the host keeps
/// dispatching events while it resolves.
pub struct PendingReply {
    text: String,
    responder: Arc<dyn ResponseProvider>,
}

impl PendingReply {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub async fn resolve(self) -> String {
        self.responder.respond(&self.text).await
    }
}

impl<S: RenderSurface> ChatWidget<S> {
    /// Build the DOM structure in its initial state: closed, input disabled,
    /// consent prompt hidden.
    pub fn mount(mut surface: S, config: WidgetConfig, services: WidgetServices) -> Self {
        let id = widget_id();
        surface.mount(&MountLayout {
            id: &id,
            title: &config.title,
            lang: &config.lang,
        });
        if !config.use_external_css {
            let css = transform_stylesheet(STYLESHEET);
            surface.inject_styles(&css, config.nonce.as_deref());
        }
        surface.set_text(Element::Toggle, "💬");
        surface.set_attribute(Element::Toggle, "aria-label", "Open chat");
        surface.set_attribute(Element::Toggle, "aria-expanded", "false");
        surface.set_visible(Element::Container, false);
        surface.set_visible(Element::ConsentSection, false);
        surface.set_disabled(Element::Input, true);
        surface.set_disabled(Element::SendButton, true);
        debug!(%id, "widget mounted");

        Self {
            id,
            config,
            surface,
            services,
            state: ConsentState::Uninitialized,
            open: false,
            messages: Vec::new(),
            awaiting_reply: false,
            auto_show_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn state(&self) -> ConsentState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// When the scheduled auto-show fires, if one is pending.
    pub fn auto_show_at(&self) -> Option<Instant> {
        self.auto_show_at
    }

    /// Open the panel for a pending auto-show. Returns whether it opened.
    pub fn fire_auto_show(&mut self) -> bool {
        if self.auto_show_at.take().is_none() || self.state != ConsentState::Ready {
            return false;
        }
        self.show();
        true
    }

    /// Wait for the scheduled auto-show, then fire it.
    pub async fn auto_show(&mut self) -> bool {
        let Some(at) = self.auto_show_at else {
            return false;
        };
        tokio::time::sleep_until(at).await;
        self.fire_auto_show()
    }

    /// Resolve consent. Without a consent endpoint the widget is ready at
    /// once; a failed check falls back to prompting.
    pub async fn check_consent(&mut self) {
        let Some(endpoint) = self.config.consent_endpoint.clone() else {
            self.become_ready(self.config.welcome_message.clone());
            return;
        };
        match self.services.transport.check_consent(&endpoint).await {
            Ok(true) => self.become_ready(self.config.welcome_message.clone()),
            Ok(false) => self.prompt_consent(),
            Err(err) => {
                warn!(%err, "consent check failed");
                self.prompt_consent();
            }
        }
    }

    /// Record consent. Returns whether the widget is ready afterwards; on
    /// failure the prompt stays up.
    pub async fn accept_consent(&mut self) -> bool {
        if self.state != ConsentState::AwaitingConsent {
            return self.state == ConsentState::Ready;
        }
        let Some(endpoint) = self.config.consent_endpoint.clone() else {
            return false;
        };
        match self.services.transport.record_consent(&endpoint).await {
            Ok(true) => {
                info!(id = %self.id, "consent recorded");
                self.become_ready(CONSENT_THANKS.to_string());
                true
            }
            Ok(false) => {
                warn!(%endpoint, "consent endpoint rejected the request");
                false
            }
            Err(err) => {
                warn!(%err, "failed to record consent");
                false
            }
        }
    }

    fn prompt_consent(&mut self) {
        self.state = ConsentState::AwaitingConsent;
        self.surface.set_visible(Element::ConsentSection, true);
        self.set_input_enabled(false);
    }

    fn become_ready(&mut self, greeting: String) {
        self.state = ConsentState::Ready;
        self.surface.set_visible(Element::ConsentSection, false);
        self.set_input_enabled(true);
        self.add_message(Sender::Bot, greeting);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.surface.set_disabled(Element::Input, !enabled);
        self.surface.set_disabled(Element::SendButton, !enabled);
    }

    fn add_message(&mut self, sender: Sender, text: String) {
        let message = Message::new(sender, text);
        self.surface.append_message(&message);
        self.messages.push(message);
    }

    /// Open the panel. Does nothing until consent has been checked.
    pub fn show(&mut self) {
        if self.state == ConsentState::Uninitialized {
            debug!(id = %self.id, "show before consent check; ignoring");
            return;
        }
        self.open = true;
        self.surface.set_visible(Element::Container, true);
        self.surface.set_text(Element::Toggle, "✕");
        self.surface.set_attribute(Element::Toggle, "aria-label", "Close chat");
        self.surface.set_attribute(Element::Toggle, "aria-expanded", "true");
        let target = match self.state {
            ConsentState::Ready => Element::Input,
            _ => Element::ConsentButton,
        };
        self.surface.focus(target);
    }

    pub fn hide(&mut self) {
        self.open = false;
        self.surface.set_visible(Element::Container, false);
        self.surface.set_text(Element::Toggle, "💬");
        self.surface.set_attribute(Element::Toggle, "aria-label", "Open chat");
        self.surface.set_attribute(Element::Toggle, "aria-expanded", "false");
        self.surface.focus(Element::Toggle);
    }

    pub fn toggle(&mut self) {
        if self.open {
            self.hide();
        } else {
            self.show();
        }
    }

    /// Post the trimmed text as a user message and hand back the reply to
    /// await. `None` for empty text, a widget without consent, or while an
    /// earlier reply is still pending.
    pub fn begin_send(&mut self, text: &str) -> Option<PendingReply> {
        let text = text.trim();
        if text.is_empty() || self.state != ConsentState::Ready || self.awaiting_reply {
            return None;
        }
        self.add_message(Sender::User, text.to_string());
        self.surface.clear_input();
        self.set_input_enabled(false);
        self.surface.set_typing(true);
        self.awaiting_reply = true;
        Some(PendingReply {
            text: text.to_string(),
            responder: Arc::clone(&self.services.responder),
        })
    }

    /// Render the reply for the pending send and unlock the input.
    pub fn complete_send(&mut self, reply: String) {
        if !self.awaiting_reply {
            debug!(id = %self.id, "reply without a pending send; dropping it");
            return;
        }
        self.awaiting_reply = false;
        self.surface.set_typing(false);
        self.set_input_enabled(true);
        self.add_message(Sender::Bot, reply);
        if self.open {
            self.surface.focus(Element::Input);
        }
    }

    /// [`Self::begin_send`], await the reply, [`Self::complete_send`].
    pub async fn send_message(&mut self, text: &str) {
        if let Some(pending) = self.begin_send(text) {
            let reply = pending.resolve().await;
            self.complete_send(reply);
        }
    }

    pub async fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::SendClicked | UiEvent::EnterPressed => {
                let text = self.surface.input_value();
                self.send_message(&text).await;
            }
            UiEvent::CloseClicked => self.hide(),
            UiEvent::ToggleClicked => self.toggle(),
            UiEvent::ConsentAccepted => {
                self.accept_consent().await;
            }
            UiEvent::EscapePressed => {
                if self.open {
                    self.hide();
                }
            }
        }
    }

    /// Remove the widget from the surface and hand the surface back.
    pub fn destroy(mut self) -> S {
        self.surface.unmount();
        debug!(id = %self.id, "widget destroyed");
        self.surface
    }
}

/// Fetch the remote config layer, degrading to an empty layer on failure.
pub async fn load_remote_config(transport: &dyn WidgetTransport, url: &str) -> ConfigLayer {
    match transport.fetch_config(url).await {
        Ok(value) => ConfigLayer::from_remote(value),
        Err(err) => {
            warn!(%err, "failed to load remote widget config");
            ConfigLayer::default()
        }
    }
}

/// Create a widget on `surface`. Returns `None` when no mount element can be
/// found. With `autoShow` on a ready widget, an auto-show is scheduled
/// [`AUTO_SHOW_DELAY`] out; drive it with [`ChatWidget::auto_show`].
pub async fn init<S: RenderSurface>(
    surface: S,
    options: WidgetOptions,
    services: WidgetServices,
) -> Option<ChatWidget<S>> {
    let Some(el) = options
        .el
        .or_else(|| surface.query_mount(DEFAULT_MOUNT_ID))
    else {
        warn!("no mount element for the chat widget");
        return None;
    };

    let attributes = ConfigLayer::from_element(&el);
    let config_url = options
        .overrides
        .config_url
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| attributes.config_url.clone());
    let remote = match config_url {
        Some(url) => load_remote_config(services.transport.as_ref(), &url).await,
        None => ConfigLayer::default(),
    };
    let config = options.overrides.over(remote).over(attributes).resolve();

    let mut widget = ChatWidget::mount(surface, config, services);
    widget.check_consent().await;

    if widget.config.auto_show && widget.state == ConsentState::Ready {
        widget.auto_show_at = Some(Instant::now() + AUTO_SHOW_DELAY);
    }
    Some(widget)
}
