//! Live DOM element view

use pg_core::element::{ControlInfo, DescendantKind, ElementView, Rect};
use pg_core::url::extract_host;
use pg_core::ExtractionError;
use wasm_bindgen::JsCast;
use web_sys::{Element, NodeList, Window};

/// Descendants tested as close controls.
const CONTROL_SELECTOR: &str = "button, [role=\"button\"], a, [aria-label], [title], \
     [class*=\"close\" i], [class*=\"dismiss\" i]";
/// Cap on controls read per element.
const MAX_CONTROLS: u32 = 64;

/// A `web_sys::Element` read through computed style and layout.
pub struct WebElement {
    element: Element,
    window: Option<Window>,
    inserted_at: Option<u64>,
}

impl WebElement {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            window: web_sys::window(),
            inserted_at: None,
        }
    }

    /// Insertion time reported by the page's mutation observer.
    pub fn with_inserted_at(mut self, inserted_at: Option<u64>) -> Self {
        self.inserted_at = inserted_at;
        self
    }

    fn connected(&self) -> Result<(), ExtractionError> {
        if self.element.is_connected() {
            Ok(())
        } else {
            Err(ExtractionError::Detached)
        }
    }

    fn select(&self, selector: &str) -> Result<NodeList, ExtractionError> {
        self.element
            .query_selector_all(selector)
            .map_err(|_| ExtractionError::InvalidSelector(selector.to_string()))
    }

    fn select_elements(&self, selector: &str, limit: u32) -> Vec<Element> {
        let Ok(list) = self.select(selector) else {
            return Vec::new();
        };
        (0..list.length().min(limit))
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }
}

fn rect_of(element: &Element) -> Rect {
    let r = element.get_bounding_client_rect();
    Rect::new(r.x(), r.y(), r.width(), r.height())
}

impl ElementView for WebElement {
    fn tag_name(&self) -> Result<String, ExtractionError> {
        Ok(self.element.tag_name())
    }

    fn id(&self) -> String {
        self.element.id()
    }

    fn class_name(&self) -> String {
        self.element.class_name()
    }

    fn style(&self, property: &str) -> Result<String, ExtractionError> {
        self.connected()?;
        let window = self
            .window
            .as_ref()
            .ok_or_else(|| ExtractionError::StyleUnavailable(property.to_string()))?;
        let value = window
            .get_computed_style(&self.element)
            .ok()
            .flatten()
            .and_then(|decl| decl.get_property_value(property).ok())
            .unwrap_or_default();
        if value.is_empty() {
            return Err(ExtractionError::StyleUnavailable(property.to_string()));
        }
        Ok(value)
    }

    fn bounding_rect(&self) -> Result<Rect, ExtractionError> {
        self.connected()?;
        Ok(rect_of(&self.element))
    }

    fn text_content(&self) -> Option<String> {
        self.element.text_content()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.element.get_attribute(name)
    }

    fn children_count(&self) -> usize {
        self.element.child_element_count() as usize
    }

    fn sibling_count(&self) -> usize {
        self.element
            .parent_element()
            .map(|p| p.child_element_count().saturating_sub(1) as usize)
            .unwrap_or(0)
    }

    fn parent_tag_name(&self) -> Option<String> {
        self.element.parent_element().map(|p| p.tag_name())
    }

    fn count_descendants(&self, kind: DescendantKind) -> Result<usize, ExtractionError> {
        Ok(self.select(kind.selector())?.length() as usize)
    }

    fn link_hrefs(&self) -> Vec<String> {
        self.select_elements(DescendantKind::Link.selector(), u32::MAX)
            .iter()
            .filter_map(|a| a.get_attribute("href"))
            .collect()
    }

    fn controls(&self) -> Vec<ControlInfo> {
        self.select_elements(CONTROL_SELECTOR, MAX_CONTROLS)
            .iter()
            .map(|el| ControlInfo {
                tag_name: el.tag_name().to_ascii_lowercase(),
                text: el.text_content().unwrap_or_default(),
                aria_label: el.get_attribute("aria-label").unwrap_or_default(),
                title: el.get_attribute("title").unwrap_or_default(),
                class_name: el.class_name(),
                id: el.id(),
                rect: Some(rect_of(el)),
            })
            .collect()
    }

    fn document_host(&self) -> Option<String> {
        let url = self.element.owner_document()?.url().ok()?;
        extract_host(&url).map(|h| h.to_ascii_lowercase())
    }

    fn inserted_at(&self) -> Option<u64> {
        self.inserted_at
    }
}
