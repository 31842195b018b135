//! Host capability functions exposed to template engines.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

/// Future returned by every capability call.
pub type CapFuture = BoxFuture<'static, miette::Result<Value>>;

/// A host function callable from a template. Arguments arrive positionally
/// as JSON values; omitted optional arguments are `null`.
pub type CapabilityFn = Arc<dyn Fn(Vec<Value>) -> CapFuture + Send + Sync>;

/// Immutable name-to-function map, assembled once per invocation and handed
/// to the engine alongside the job.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    funcs: Arc<BTreeMap<&'static str, CapabilityFn>>,
}

impl CapabilityRegistry {
    pub fn from_map(funcs: BTreeMap<&'static str, CapabilityFn>) -> Self {
        Self {
            funcs: Arc::new(funcs),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityFn> {
        self.funcs.get(name)
    }

    /// Looks up and invokes a function. Unknown names are an error.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> miette::Result<Value> {
        match self.funcs.get(name) {
            Some(func) => func(args).await,
            None => Err(miette::miette!("unknown capability function: {name}")),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.funcs.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("functions", &self.funcs.len())
            .finish()
    }
}

/// Adapts a plain synchronous function to the async capability shape.
pub fn sync_cap<F>(func: F) -> CapabilityFn
where
    F: Fn(&[Value]) -> miette::Result<Value> + Send + Sync + 'static,
{
    Arc::new(move |args: Vec<Value>| {
        let result = func(&args);
        Box::pin(std::future::ready(result))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> CapabilityRegistry {
        let mut funcs: BTreeMap<&'static str, CapabilityFn> = BTreeMap::new();
        funcs.insert(
            "upper",
            sync_cap(|args| match args.first() {
                Some(Value::String(s)) => Ok(Value::String(s.to_uppercase())),
                _ => Err(miette::miette!("upper: text must be a string")),
            }),
        );
        funcs.insert("answer", sync_cap(|_args| Ok(json!(42))));
        CapabilityRegistry::from_map(funcs)
    }

    #[tokio::test]
    async fn test_call_invokes_function() {
        let registry = registry();
        let result = registry.call("upper", vec![json!("hi")]).await.unwrap();
        assert_eq!(result, json!("HI"));
    }

    #[tokio::test]
    async fn test_unknown_function_is_an_error() {
        let registry = registry();
        let error = registry.call("nope", vec![]).await.unwrap_err();
        assert!(error.to_string().contains("unknown capability function: nope"));
    }

    #[tokio::test]
    async fn test_argument_errors_surface() {
        let registry = registry();
        let error = registry.call("upper", vec![json!(7)]).await.unwrap_err();
        assert!(error.to_string().contains("must be a string"));
    }

    #[test]
    fn test_names_are_sorted() {
        let names: Vec<_> = registry().names().collect();
        assert_eq!(names, vec!["answer", "upper"]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = CapabilityRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("anything").is_none());
    }
}
