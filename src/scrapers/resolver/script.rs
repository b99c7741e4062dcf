//! In-page JavaScript used by automation adapters.
//!
//! Both CDP backends evaluate the same expressions so element lookups
//! behave identically regardless of which backend drives the page.

use super::{ElementState, Locator};

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Expression evaluating to the first element matching `locator`, or null.
fn lookup(locator: &Locator) -> String {
    match locator {
        Locator::XPath(xpath) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            js_string(xpath)
        ),
        Locator::Css(css) => format!("document.querySelector({})", js_string(css)),
    }
}

fn with_element(locator: &Locator, body: &str) -> String {
    format!(
        "(() => {{ const el = {}; {} }})()",
        lookup(locator),
        body
    )
}

/// Evaluates to "missing", "hidden" or "visible".
pub fn element_state(locator: &Locator) -> String {
    with_element(
        locator,
        "if (!el) return 'missing'; \
         const style = window.getComputedStyle(el); \
         const shown = style.visibility !== 'hidden' && style.display !== 'none' \
           && (el.offsetParent !== null || el.getClientRects().length > 0); \
         return shown ? 'visible' : 'hidden';",
    )
}

pub fn parse_element_state(value: Option<&serde_json::Value>) -> ElementState {
    match value.and_then(|v| v.as_str()) {
        Some("visible") => ElementState::Visible,
        Some("hidden") => ElementState::Hidden,
        _ => ElementState::Missing,
    }
}

/// Evaluates to the attribute value, or null when the element or attribute is absent.
pub fn attribute(locator: &Locator, name: &str) -> String {
    with_element(
        locator,
        &format!("return el ? el.getAttribute({}) : null;", js_string(name)),
    )
}

/// Scripted click; evaluates to whether an element was found.
pub fn click(locator: &Locator) -> String {
    with_element(locator, "if (!el) return false; el.click(); return true;")
}

pub fn scroll_into_view(locator: &Locator) -> String {
    with_element(
        locator,
        "if (!el) return false; el.scrollIntoView({block: 'center'}); return true;",
    )
}

pub fn focus(locator: &Locator) -> String {
    with_element(locator, "if (!el) return false; el.focus(); return true;")
}

/// Focus and empty an input before typing into it.
pub fn focus_and_clear(locator: &Locator) -> String {
    with_element(
        locator,
        "if (!el) return false; el.focus(); el.value = ''; return true;",
    )
}

/// Assign an input value directly and fire the events frameworks listen to.
pub fn assign_value(locator: &Locator, value: &str) -> String {
    with_element(
        locator,
        &format!(
            "if (!el) return false; \
             el.value = {}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true;",
            js_string(value)
        ),
    )
}

/// Interpret a boolean script result, treating anything else as failure.
pub fn expect_found(value: Option<&serde_json::Value>, what: &str, locator: &Locator) -> anyhow::Result<()> {
    match value.and_then(|v| v.as_bool()) {
        Some(true) => Ok(()),
        _ => Err(anyhow::anyhow!("{} failed: element not found ({})", what, locator)),
    }
}
