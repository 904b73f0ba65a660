//! Request construction for the upstream WTT API.
//!
//! Routes bundle method, URL, query params, and body; the header blob is
//! fixed and attached to the HTTP client once. Nothing downstream inspects
//! headers beyond passing them through.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

/// Production API host, fronted by Azure Front Door.
pub const API_BASE_URL: &str =
    "https://wtt-website-api-prod-3-frontdoor-bddnb2haduafdze9.a01.azurefd.net";

/// Header set captured from the public website's own calendar requests.
/// The `secapimkey` value ships in the site's client bundle.
const BASE_HEADERS: &[(&str, &str)] = &[
    ("accept", "application/json, text/plain, */*"),
    ("accept-language", "en-GB,en;q=0.9,es;q=0.8"),
    ("cache-control", "no-cache"),
    ("dnt", "1"),
    ("origin", "https://www.worldtabletennis.com"),
    ("pragma", "no-cache"),
    ("priority", "u=1, i"),
    ("referer", "https://www.worldtabletennis.com/"),
    (
        "sec-ch-ua",
        "\"Chromium\";v=\"140\", \"Not=A?Brand\";v=\"24\", \"Google Chrome\";v=\"140\"",
    ),
    ("sec-ch-ua-mobile", "?1"),
    ("sec-ch-ua-platform", "\"Android\""),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "cross-site"),
    ("secapimkey", "S_WTT_882jjh7basdj91834783mds8j2jsd81"),
    (
        "user-agent",
        "Mozilla/5.0 (Linux; Android 11.0; Surface Duo) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/140.0.0.0 Mobile Safari/537.36",
    ),
];

/// The fixed header blob for all API requests.
pub fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(BASE_HEADERS.len());
    for &(name, value) in BASE_HEADERS {
        let name = HeaderName::from_static(name);
        let value = HeaderValue::from_static(value);
        headers.insert(name, value);
    }
    headers
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// One ready-to-send API request.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub url: Url,
    /// Query string parameters (GET routes).
    pub params: Vec<(&'static str, String)>,
    /// JSON body (POST routes).
    pub json_payload: Option<Value>,
}

/// Route builder bound to an API base URL.
#[derive(Debug, Clone)]
pub struct Routes {
    base: Url,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            base: Url::parse(API_BASE_URL).expect("static base URL"),
        }
    }
}

impl Routes {
    /// Route builder against a non-default host (mock servers in tests).
    pub fn with_base(base: Url) -> Self {
        Self { base }
    }

    /// Calendar listing for one year.
    ///
    /// The endpoint filters via a `custom_filter` field holding a JSON
    /// document *as a string*, matching events that either start in the
    /// year or span into it.
    pub fn events_year(&self, year: i32) -> Route {
        let inner_filter = serde_json::json!([
            {
                "name": "StartDateTime",
                "value": year,
                "custom_handling": "multimatch_year_or_filter",
                "condition": "or_start"
            },
            {
                "name": "FromStartDate",
                "value": year,
                "custom_handling": "multimatch_year_or_filter",
                "condition": "or_end"
            }
        ]);

        Route {
            method: Method::POST,
            url: self.join("api/eventcalendar"),
            params: Vec::new(),
            json_payload: Some(serde_json::json!({
                "custom_filter": inner_filter.to_string()
            })),
        }
    }

    /// Match list for one event.
    pub fn event_matches(&self, event_id: i64) -> Route {
        Route {
            method: Method::GET,
            url: self.join("api/eventmatches"),
            params: vec![("eventId", event_id.to_string())],
            json_payload: None,
        }
    }

    fn join(&self, path: &str) -> Url {
        self.base.join(path).expect("static route path")
    }
}
