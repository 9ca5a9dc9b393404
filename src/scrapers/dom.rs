use scraper::{Html, Selector};
use tracing::warn;

/// Script returning the outer HTML of the first element matching `selector`
pub fn outer_html_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? el.outerHTML : ''; }})()",
        js_string(selector)
    )
}

/// Script reporting whether `selector` is fully inside the viewport
pub fn visibility_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         const r = el.getBoundingClientRect(); \
         return r.top >= 0 && r.bottom <= window.innerHeight; }})()",
        js_string(selector)
    )
}

/// Script scrolling `selector` to its full height; reports whether it was found
pub fn scroll_to_end_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         el.scrollTo(0, el.scrollHeight); return true; }})()",
        js_string(selector)
    )
}

/// Count result cards in a snapshot of the results panel
pub fn count_snippets(panel_html: &str, snippet_selector: &str) -> usize {
    let selector = match Selector::parse(snippet_selector) {
        Ok(selector) => selector,
        Err(e) => {
            warn!("Invalid snippet selector {:?}: {}", snippet_selector, e);
            return 0;
        }
    };
    Html::parse_fragment(panel_html).select(&selector).count()
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_snippet_titles_in_panel() {
        let html = r#"
            <div class="scroll__container">
              <ul>
                <li><div class="search-business-snippet-view__title">Arena</div></li>
                <li><div class="search-business-snippet-view__title">Cyber Zone</div></li>
                <li class="add-business-view">Add a business</li>
              </ul>
            </div>"#;
        assert_eq!(count_snippets(html, ".search-business-snippet-view__title"), 2);
        assert_eq!(count_snippets("", ".search-business-snippet-view__title"), 0);
    }

    #[test]
    fn invalid_selector_counts_nothing() {
        assert_eq!(count_snippets("<div></div>", "[[["), 0);
    }

    #[test]
    fn selectors_are_quoted_into_scripts() {
        let script = scroll_to_end_script(".scroll__container");
        assert!(script.contains(r#"document.querySelector(".scroll__container")"#));
        let script = visibility_script(r#"a[title="x"]"#);
        assert!(script.contains(r#"document.querySelector("a[title=\"x\"]")"#));
    }
}
