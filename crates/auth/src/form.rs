//! HTML form harvesting and submission for the scripted login.
//!
//! Documents are parsed synchronously into owned values so that no parser state
//! is held across an `.await`.

use crate::error::AuthResult;
use regex::Regex;
use reqwest::{Client, Method, Response};
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub action: Option<String>,
    pub method: Method,
    fields: Vec<(String, String)>,
}

impl Form {
    /// Finds `<form id="...">` in `html` and harvests every named hidden input.
    pub fn find(html: &str, id: &str) -> Option<Self> {
        let document = Html::parse_document(html);
        let form_selector = Selector::parse(&format!("form[id=\"{}\"]", id)).ok()?;
        let input_selector = Selector::parse("input").ok()?;

        let form = document.select(&form_selector).next()?;
        let action = form
            .value()
            .attr("action")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from);
        let method = match form.value().attr("method") {
            Some(m) if m.eq_ignore_ascii_case("get") => Method::GET,
            _ => Method::POST,
        };

        let fields = form
            .select(&input_selector)
            .filter(|input| {
                input
                    .value()
                    .attr("type")
                    .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
            })
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or("");
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Some(Self {
            action,
            method,
            fields,
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the value of `name`, or appends the field when the form lacks it.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(field) => field.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Submits the fields to `target` using the form's declared method.
    pub async fn submit(&self, client: &Client, target: Url) -> AuthResult<Response> {
        let request = if self.method == Method::GET {
            client.get(target).query(&self.fields)
        } else {
            client.post(target).form(&self.fields)
        };
        Ok(request.send().await?)
    }
}

/// Resolves a form action against the identity host.
pub fn resolve_action(base: &str, action: &str) -> AuthResult<Url> {
    Ok(Url::parse(base)?.join(action)?)
}

/// Values the provider embeds in inline scripts (`window._IDK = {...}`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptValues {
    pub hmac: Option<String>,
    pub relay_state: Option<String>,
}

fn hmac_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""hmac"\s*:\s*"([^"]*)""#).expect("valid hmac regex"))
}

fn relay_state_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""relayState"\s*:\s*"([^"]*)""#).expect("valid relayState regex")
    })
}

impl ScriptValues {
    pub fn scan(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut values = Self::default();
        let Ok(script_selector) = Selector::parse("script") else {
            return values;
        };

        for script in document.select(&script_selector) {
            let body: String = script.text().collect();
            if values.hmac.is_none() {
                values.hmac = capture(hmac_pattern(), &body);
            }
            if values.relay_state.is_none() {
                values.relay_state = capture(relay_state_pattern(), &body);
            }
        }
        values
    }
}

fn capture(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|v| !v.is_empty())
}
