//! Binary-to-text encodings.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde_json::Value;
use templar_core::caps::{CapabilityFn, sync_cap};

use crate::args;

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>) {
    funcs.insert(
        "base64",
        sync_cap(|argv| {
            let data = args::string("base64", argv, 0, "data")?;
            Ok(Value::String(STANDARD.encode(data.as_bytes())))
        }),
    );
    funcs.insert(
        "base64url",
        sync_cap(|argv| {
            let data = args::string("base64url", argv, 0, "data")?;
            Ok(Value::String(URL_SAFE.encode(data.as_bytes())))
        }),
    );
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    async fn call(name: &str, args: Vec<Value>) -> miette::Result<Value> {
        crate::Builder::new().build().call(name, args).await
    }

    #[tokio::test]
    async fn test_base64_standard() {
        assert_eq!(call("base64", vec![json!("hello")]).await.unwrap(), json!("aGVsbG8="));
    }

    #[tokio::test]
    async fn test_base64url_uses_url_safe_alphabet() {
        // The standard alphabet would produce '/' and '+' here.
        assert_eq!(call("base64", vec![json!("<<???>>")]).await.unwrap(), json!("PDw/Pz8+Pg=="));
        assert_eq!(
            call("base64url", vec![json!("<<???>>")]).await.unwrap(),
            json!("PDw_Pz8-Pg==")
        );
    }

    #[tokio::test]
    async fn test_non_string_data_is_an_error() {
        let error = call("base64", vec![json!(["a"])]).await.unwrap_err();
        assert_eq!(error.to_string(), "base64: data must be a string");
    }
}
