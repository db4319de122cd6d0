//! Callback URL resolution for indirect clients.

use crate::context::WebContext;
use crate::util::add_parameter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default query parameter carrying the client name.
pub const CLIENT_NAME_PARAMETER: &str = "client_name";

/// How the client name is encoded into (and recognized from) a callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallbackUrlResolver {
    /// `?client_name=<name>` plus custom pass-through parameters
    QueryParameter {
        /// Parameter carrying the client name
        parameter_name: String,
        /// Extra parameters appended to every callback URL
        #[serde(default)]
        custom_parameters: BTreeMap<String, String>,
    },
    /// `/<name>` appended to the callback path
    PathParameter,
    /// The callback URL is used as is
    None,
}

impl Default for CallbackUrlResolver {
    fn default() -> Self {
        Self::QueryParameter {
            parameter_name: CLIENT_NAME_PARAMETER.to_string(),
            custom_parameters: BTreeMap::new(),
        }
    }
}

impl CallbackUrlResolver {
    /// Add a pass-through parameter. Only query parameter resolvers carry them.
    pub fn with_custom_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::QueryParameter {
            custom_parameters, ..
        } = &mut self
        {
            custom_parameters.insert(name.into(), value.into());
        }
        self
    }

    /// Compute the final callback URL of `client_name` for this request.
    ///
    /// Relative URLs are resolved against the request's base URL.
    pub fn compute(&self, url: &str, client_name: &str, ctx: &dyn WebContext) -> String {
        let url = absolute_url(url, ctx);
        match self {
            Self::QueryParameter {
                parameter_name,
                custom_parameters,
            } => {
                let mut url = if has_parameter(&url, parameter_name) {
                    url
                } else {
                    add_parameter(&url, parameter_name, client_name)
                };
                for (name, value) in custom_parameters {
                    url = add_parameter(&url, name, value);
                }
                url
            }
            Self::PathParameter => {
                let (path, query) = match url.split_once('?') {
                    Some((path, query)) => (path, Some(query)),
                    None => (url.as_str(), None),
                };
                let mut result = format!(
                    "{}/{}",
                    path.trim_end_matches('/'),
                    urlencoding::encode(client_name)
                );
                if let Some(query) = query {
                    result.push('?');
                    result.push_str(query);
                }
                result
            }
            Self::None => url,
        }
    }

    /// Check if the request is a callback for `client_name`.
    pub fn matches(&self, client_name: &str, ctx: &dyn WebContext) -> bool {
        match self {
            Self::QueryParameter { parameter_name, .. } => ctx
                .request_parameter(parameter_name)
                .is_some_and(|v| v.eq_ignore_ascii_case(client_name)),
            Self::PathParameter => {
                let path = ctx.path();
                let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
                last.eq_ignore_ascii_case(client_name)
            }
            Self::None => false,
        }
    }
}

fn absolute_url(url: &str, ctx: &dyn WebContext) -> String {
    if url.contains("://") {
        return url.to_string();
    }
    let base = ctx.base_url();
    let base = base.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{base}{url}")
    } else {
        format!("{base}/{url}")
    }
}

fn has_parameter(url: &str, name: &str) -> bool {
    url.split_once('?').is_some_and(|(_, query)| {
        query
            .split('&')
            .any(|pair| pair.split('=').next() == Some(name))
    })
}
