//! Site layout knowledge: URLs, product-link rules and locators.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::Locator;

pub const HOME_URL: &str = "https://brain.com.ua/";

/// Recognizes product pages: a trailing `-p<digits>.html`, optionally followed by a query.
static PRODUCT_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-p\d+\.html(?:$|\?)").expect("valid product URL regex"));

/// Raw HTML scan for product hrefs when DOM lookups fail.
static PRODUCT_HREF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href=["']([^"']*-p\d+\.html[^"']*)["']"#).expect("valid product href regex")
});

/// Upper bound on how much page HTML the fallback scan reads.
pub const HTML_SCAN_LIMIT: usize = 200_000;

/// First non-empty anchor pointing at a product page, in document order.
pub const PRODUCT_LINK: Locator = Locator::XPath(
    "//a[contains(@href,'-p') and contains(@href,'.html') and normalize-space(string(.))!=''][1]",
);

/// Full-page loading overlay shown while the home page hydrates.
pub const PAGE_PRELOADER: Locator = Locator::XPath("//*[@id='page-preloader']");

/// Header search input; the site renders one of two header layouts.
pub const SEARCH_INPUT: Locator =
    Locator::XPath("/html/body/header/div[1]/div/div/div[2]/form/input[1]");
pub const SEARCH_INPUT_FALLBACK: Locator =
    Locator::XPath("/html/body/header/div[2]/div/div/div[2]/form/input[1]");

pub const SEARCH_SUBMIT: Locator =
    Locator::XPath("/html/body/header/div[1]/div/div/div[2]/form/input[2]");
pub const SEARCH_SUBMIT_FALLBACK: Locator =
    Locator::XPath("/html/body/header/div[2]/div/div/div[2]/form/input[2]");

/// Cookie banners and modal close buttons, tried in order.
pub const OVERLAY_CLOSERS: &[Locator] = &[
    Locator::Css("button.cookie__agree"),
    Locator::Css("button.cookie-agree"),
    Locator::Css("button#cookie-accept"),
    Locator::Css("button[aria-label='Accept cookies']"),
    Locator::XPath("//button[contains(normalize-space(.),'Приймаю')]"),
    Locator::XPath("//button[contains(normalize-space(.),'Принять')]"),
    Locator::XPath("//button[contains(normalize-space(.),'Accept')]"),
    Locator::Css(".modal__close"),
    Locator::Css(".popup-close"),
    Locator::Css("[aria-label='Close']"),
    Locator::Css(".fancybox-close"),
];

/// Marker present in the URL once search results are shown.
pub const SEARCH_PATH_MARKER: &str = "/search/";

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0";

/// Extra request headers sent by automated browsers.
pub const BROWSER_EXTRA_HEADERS: &[(&str, &str)] = &[
    ("Accept-Language", "en-US,en;q=0.9"),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
    ),
    ("Referer", "https://www.google.com/"),
    ("Cache-Control", "no-cache"),
    ("Pragma", "no-cache"),
    ("Upgrade-Insecure-Requests", "1"),
    ("DNT", "1"),
];

pub fn is_product_url(url: &str) -> bool {
    PRODUCT_URL_PATTERN.is_match(url)
}

/// Search results URL for a query (form-encoded, spaces as `+`).
pub fn search_url(query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{}ukr/search/?Search={}", HOME_URL, encoded)
}

/// Resolve an href found on the site against the home URL.
pub fn absolutize(href: &str) -> String {
    Url::parse(HOME_URL)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Find the first product href in raw HTML.
pub fn scan_product_href(html: &str) -> Option<String> {
    let window = match html.char_indices().nth(HTML_SCAN_LIMIT) {
        Some((idx, _)) => &html[..idx],
        None => html,
    };
    PRODUCT_HREF_PATTERN
        .captures(window)
        .and_then(|c| c.get(1))
        .map(|m| absolutize(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_product_url() {
        assert!(is_product_url(
            "https://brain.com.ua/ukr/Mobilniy_telefon_Apple_iPhone_15-p1045486.html"
        ));
        assert!(is_product_url("/ukr/x-p12.html?utm=1"));
        assert!(!is_product_url("https://brain.com.ua/ukr/search/?Search=iphone"));
        assert!(!is_product_url("/ukr/x-p12.html#reviews"));
    }

    #[test]
    fn test_search_url_encodes_query() {
        assert_eq!(
            search_url("Apple iPhone 15 128GB"),
            "https://brain.com.ua/ukr/search/?Search=Apple+iPhone+15+128GB"
        );
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("/ukr/phone-p42.html"),
            "https://brain.com.ua/ukr/phone-p42.html"
        );
        assert_eq!(
            absolutize("https://other.example/a-p1.html"),
            "https://other.example/a-p1.html"
        );
    }

    #[test]
    fn test_scan_product_href_first_in_document_order() {
        let html = r#"<a href="/ukr/cart">cart</a>
            <a href='/ukr/first-p100.html'>first</a>
            <a href="/ukr/second-p200.html">second</a>"#;
        assert_eq!(
            scan_product_href(html),
            Some("https://brain.com.ua/ukr/first-p100.html".to_string())
        );
        assert_eq!(scan_product_href("<p>nothing</p>"), None);
    }
}
