//! The rendering surface the widget draws on. Browsers back it with the DOM;
//! [`MemorySurface`] keeps everything in memory for headless use and tests.

use super::Message;
use super::config::MountElement;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Parts of the widget the runtime addresses individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Element {
    Toggle,
    Container,
    Title,
    Messages,
    Input,
    SendButton,
    CloseButton,
    ConsentSection,
    ConsentButton,
}

#[derive(Debug, Clone, Copy)]
pub struct MountLayout<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub lang: &'a str,
}

pub trait RenderSurface {
    /// Look up a host element by id.
    fn query_mount(&self, id: &str) -> Option<MountElement>;
    /// Build the toggle button and the widget container.
    fn mount(&mut self, layout: &MountLayout<'_>);
    /// Add the widget stylesheet once; returns false if it was already there.
    fn inject_styles(&mut self, css: &str, nonce: Option<&str>) -> bool;
    fn set_text(&mut self, el: Element, text: &str);
    fn set_attribute(&mut self, el: Element, name: &str, value: &str);
    fn set_visible(&mut self, el: Element, visible: bool);
    fn set_disabled(&mut self, el: Element, disabled: bool);
    /// Render a message at the end of the list and scroll to it.
    fn append_message(&mut self, message: &Message);
    fn set_typing(&mut self, typing: bool);
    fn input_value(&self) -> String;
    fn clear_input(&mut self);
    fn focus(&mut self, el: Element);
    /// Remove everything [`RenderSurface::mount`] created.
    fn unmount(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedStyles {
    pub css: String,
    pub nonce: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemorySurface {
    pub page: HashMap<String, MountElement>,
    pub mounted_id: Option<String>,
    pub lang: Option<String>,
    pub styles: Option<InjectedStyles>,
    pub text: BTreeMap<Element, String>,
    pub attributes: BTreeMap<(Element, String), String>,
    pub hidden: BTreeSet<Element>,
    pub disabled: BTreeSet<Element>,
    pub rendered: Vec<Message>,
    pub typing: bool,
    pub input: String,
    pub focused: Option<Element>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page containing `el`, findable by its id.
    pub fn with_page_element(mut self, el: MountElement) -> Self {
        self.page.insert(el.id.clone(), el);
        self
    }

    pub fn type_input(&mut self, text: &str) {
        self.input = text.to_string();
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted_id.is_some()
    }

    pub fn is_visible(&self, el: Element) -> bool {
        self.is_mounted() && !self.hidden.contains(&el)
    }

    pub fn is_disabled(&self, el: Element) -> bool {
        self.disabled.contains(&el)
    }

    pub fn text_of(&self, el: Element) -> Option<&str> {
        self.text.get(&el).map(String::as_str)
    }

    pub fn attribute(&self, el: Element, name: &str) -> Option<&str> {
        self.attributes
            .get(&(el, name.to_string()))
            .map(String::as_str)
    }
}

impl RenderSurface for MemorySurface {
    fn query_mount(&self, id: &str) -> Option<MountElement> {
        self.page.get(id).cloned()
    }

    fn mount(&mut self, layout: &MountLayout<'_>) {
        self.mounted_id = Some(layout.id.to_string());
        self.lang = Some(layout.lang.to_string());
        self.text.insert(Element::Title, layout.title.to_string());
    }

    fn inject_styles(&mut self, css: &str, nonce: Option<&str>) -> bool {
        if self.styles.is_some() {
            return false;
        }
        self.styles = Some(InjectedStyles {
            css: css.to_string(),
            nonce: nonce.map(str::to_string),
        });
        true
    }

    fn set_text(&mut self, el: Element, text: &str) {
        self.text.insert(el, text.to_string());
    }

    fn set_attribute(&mut self, el: Element, name: &str, value: &str) {
        self.attributes
            .insert((el, name.to_string()), value.to_string());
    }

    fn set_visible(&mut self, el: Element, visible: bool) {
        if visible {
            self.hidden.remove(&el);
        } else {
            self.hidden.insert(el);
        }
    }

    fn set_disabled(&mut self, el: Element, disabled: bool) {
        if disabled {
            self.disabled.insert(el);
        } else {
            self.disabled.remove(&el);
        }
    }

    fn append_message(&mut self, message: &Message) {
        self.rendered.push(message.clone());
    }

    fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }

    fn input_value(&self) -> String {
        self.input.clone()
    }

    fn clear_input(&mut self) {
        self.input.clear();
    }

    fn focus(&mut self, el: Element) {
        self.focused = Some(el);
    }

    fn unmount(&mut self) {
        self.mounted_id = None;
        self.text.clear();
        self.attributes.clear();
        self.hidden.clear();
        self.disabled.clear();
        self.rendered.clear();
        self.typing = false;
        self.focused = None;
    }
}
