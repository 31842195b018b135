//! HTTP requests from templates.

use std::collections::BTreeMap;
use std::sync::Arc;

use miette::{IntoDiagnostic, miette};
use reqwest::header::USER_AGENT;
use serde_json::{Map, Value, json};
use templar_core::caps::CapabilityFn;

use crate::{CapContext, args};

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>, ctx: &CapContext) {
    {
        let ctx = ctx.clone();
        funcs.insert(
            "http_get",
            Arc::new(move |argv: Vec<Value>| {
                let ctx = ctx.clone();
                Box::pin(async move {
                    let url = args::string("http_get", &argv, 0, "url")?;
                    let headers = args::opt_object("http_get", &argv, 1, "headers")?;
                    request("GET".to_string(), url, headers, None, &ctx).await
                })
            }),
        );
    }
    {
        let ctx = ctx.clone();
        funcs.insert(
            "http_request",
            Arc::new(move |argv: Vec<Value>| {
                let ctx = ctx.clone();
                Box::pin(async move {
                    let method = args::string("http_request", &argv, 0, "method")?;
                    let url = args::string("http_request", &argv, 1, "url")?;
                    let headers = args::opt_object("http_request", &argv, 2, "headers")?;
                    let body = args::opt_string("http_request", &argv, 3, "body")?;
                    request(method, url, headers, body, &ctx).await
                })
            }),
        );
    }
}

/// Performs the request and reports `{status_code, status, headers, body}`.
/// Any response, 2xx or not, is a result; only transport failures and
/// cancellation are errors. Repeated response headers become arrays.
async fn request(
    method: String,
    url: String,
    headers: Option<Map<String, Value>>,
    body: Option<String>,
    ctx: &CapContext,
) -> miette::Result<Value> {
    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| miette!("invalid HTTP method: {method}"))?;
    let client = reqwest::Client::builder()
        .timeout(ctx.http_timeout)
        .build()
        .into_diagnostic()?;

    let mut builder = client.request(method, &url);
    let mut has_user_agent = false;
    if let Some(headers) = &headers {
        for (name, value) in headers {
            let value = value
                .as_str()
                .ok_or_else(|| miette!("header {name} must be a string"))?;
            if name.eq_ignore_ascii_case("user-agent") {
                has_user_agent = true;
            }
            builder = builder.header(name.as_str(), value);
        }
    }
    if !has_user_agent {
        builder = builder.header(USER_AGENT, ctx.user_agent.as_str());
    }
    if let Some(body) = body {
        builder = builder.body(body);
    }

    let response = tokio::select! {
        response = builder.send() => {
            response.map_err(|e| miette!("request failed: {e}"))?
        }
        _ = ctx.cancel.cancelled() => {
            return Err(miette!("request was cancelled"));
        }
    };

    let status = response.status();
    let status_line = match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    };
    let mut header_obj = Map::new();
    for name in response.headers().keys() {
        let mut values: Vec<Value> = response
            .headers()
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let entry = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        header_obj.insert(name.as_str().to_string(), entry);
    }
    let body = response
        .text()
        .await
        .map_err(|e| miette!("failed to read response body: {e}"))?;

    Ok(json!({
        "status_code": status.as_u16(),
        "status": status_line,
        "headers": header_obj,
        "body": body,
    }))
}
