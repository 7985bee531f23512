use crate::{dom::{flat::{self, FlatNode}, DomTree, ElementNode, NodeHandle},
            error::{ExportError, Result},
            page::{MutationWatch, Page, ScrollOffset}};
use async_trait::async_trait;
use headless_chrome::Tab;
use serde::{de::DeserializeOwned, Deserialize};
use std::sync::Arc;

/// JavaScript half of the page bridge
const BRIDGE_JS: &str = include_str!("bridge.js");

/// Longest single wait inside the page before control returns to Rust
const WAIT_SLICE_MS: u64 = 250;

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    value: Option<T>,
    error: Option<String>,
}

/// Run one bridge call on the tab, installing the bridge first if the document has none
fn evaluate<T: DeserializeOwned>(tab: &Tab, call: &str, await_promise: bool) -> Result<Option<T>> {
    let script = format!("{}\n;window.__chatExport.{}", BRIDGE_JS, call);
    let remote = tab
        .evaluate(&script, await_promise)
        .map_err(|e| ExportError::EvaluationFailed(e.to_string()))?;

    let raw = remote
        .value
        .as_ref()
        .and_then(|value| value.as_str())
        .ok_or_else(|| ExportError::EvaluationFailed(format!("no reply from page bridge for {}", call)))?;

    let envelope: Envelope<T> = serde_json::from_str(raw)?;
    if envelope.ok {
        Ok(envelope.value)
    } else {
        Err(ExportError::EvaluationFailed(envelope.error.unwrap_or_else(|| "unknown bridge error".to_string())))
    }
}

/// [`evaluate`] off the async runtime; CDP calls block until the browser answers
async fn bridge_call<T>(tab: &Arc<Tab>, call: String, await_promise: bool) -> Result<Option<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let tab = Arc::clone(tab);
    tokio::task::spawn_blocking(move || evaluate(&tab, &call, await_promise))
        .await
        .map_err(|e| ExportError::EvaluationFailed(format!("bridge task failed: {}", e)))?
}

/// A live Chromium tab
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// URL of the document in the tab
    pub fn url(&self) -> String {
        self.tab.get_url()
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn snapshot(&self) -> Result<DomTree> {
        let nodes: Vec<FlatNode> = bridge_call(&self.tab, "snapshot()".to_string(), false)
            .await?
            .ok_or_else(|| ExportError::DomParseFailed("page has no document element".to_string()))?;
        let mut root = flat::unflatten(nodes)?;
        root.simplify();
        Ok(DomTree::new(root))
    }

    async fn element(&self, handle: NodeHandle) -> Result<Option<ElementNode>> {
        let nodes: Option<Vec<FlatNode>> = bridge_call(&self.tab, format!("element({})", handle.0), false).await?;
        nodes
            .map(|nodes| {
                let mut element = flat::unflatten(nodes)?;
                element.simplify();
                Ok(element)
            })
            .transpose()
    }

    async fn activate(&self, handle: NodeHandle) -> Result<()> {
        bridge_call::<bool>(&self.tab, format!("activate({})", handle.0), false)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                ExportError::EvaluationFailed(reason) => ExportError::ActivationFailed(reason),
                other => other,
            })
    }

    async fn watch(&self, handle: NodeHandle) -> Result<Box<dyn MutationWatch>> {
        let id: u64 = bridge_call(&self.tab, format!("watch({})", handle.0), false)
            .await?
            .ok_or_else(|| ExportError::EvaluationFailed(format!("no watch id for {}", handle)))?;

        Ok(Box::new(ChromeWatch {
            tab: Arc::clone(&self.tab),
            id,
            seen: 0,
        }))
    }

    async fn scroll_offset(&self) -> Result<ScrollOffset> {
        Ok(bridge_call(&self.tab, "scroll()".to_string(), false).await?.unwrap_or_default())
    }

    async fn scroll_to(&self, offset: ScrollOffset) -> Result<()> {
        bridge_call::<bool>(&self.tab, format!("scrollTo({}, {})", offset.x, offset.y), false).await?;
        Ok(())
    }

    fn detach(&self) -> Option<Arc<dyn Page>> {
        Some(Arc::new(ChromePage::new(Arc::clone(&self.tab))))
    }
}

/// A `MutationObserver` running in the page
struct ChromeWatch {
    tab: Arc<Tab>,
    id: u64,
    seen: u64,
}

#[async_trait]
impl MutationWatch for ChromeWatch {
    async fn changed(&mut self) -> Result<()> {
        loop {
            let call = format!("waitChange({}, {}, {})", self.id, self.seen, WAIT_SLICE_MS);
            let count: u64 = bridge_call(&self.tab, call, true).await?.unwrap_or(self.seen);
            if count > self.seen {
                self.seen = count;
                return Ok(());
            }
        }
    }
}

impl Drop for ChromeWatch {
    fn drop(&mut self) {
        let tab = Arc::clone(&self.tab);
        let call = format!("unwatch({})", self.id);
        let disconnect = move || {
            if let Err(e) = evaluate::<bool>(&tab, &call, false) {
                log::debug!("Failed to disconnect mutation observer: {}", e);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(disconnect);
            }
            Err(_) => disconnect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_ok() {
        let envelope: Envelope<u64> = serde_json::from_str(r#"{"ok":true,"value":3}"#).unwrap();
        assert!(envelope.ok);
        assert_eq!(envelope.value, Some(3));
    }

    #[test]
    fn test_envelope_null_value() {
        let envelope: Envelope<Vec<FlatNode>> = serde_json::from_str(r#"{"ok":true,"value":null}"#).unwrap();
        assert!(envelope.value.is_none());
    }

    #[test]
    fn test_envelope_error() {
        let envelope: Envelope<bool> =
            serde_json::from_str(r#"{"ok":false,"error":"element 4 is not attached"}"#).unwrap();
        assert!(!envelope.ok);
        assert_eq!(envelope.error.as_deref(), Some("element 4 is not attached"));
    }

    #[test]
    fn test_bridge_snapshot_shape() {
        let json = r#"{"ok":true,"value":[
            {"tag_name":"html","handle":1},
            {"tag_name":"model-response","attributes":{"class":"collapsed"},"handle":2,"parent":0,"host":true},
            {"text":"hi","parent":1,"shadow":true}
        ]}"#;
        let envelope: Envelope<Vec<FlatNode>> = serde_json::from_str(json).unwrap();
        let root = flat::unflatten(envelope.value.unwrap()).unwrap();

        let tree = DomTree::new(root);
        let response = tree.find(NodeHandle(2)).unwrap();
        assert!(response.has_class("collapsed"));
        assert_eq!(response.shadow_root.as_ref().unwrap().len(), 1);
        assert!(response.children.is_empty());
    }

    #[test]
    fn test_deep_bridge_reply() {
        let mut nodes = vec![serde_json::json!({"tag_name": "html", "handle": 1})];
        for depth in 0..200usize {
            nodes.push(serde_json::json!({"tag_name": "div", "handle": depth + 2, "parent": depth}));
        }
        let reply = serde_json::json!({"ok": true, "value": nodes}).to_string();

        let envelope: Envelope<Vec<FlatNode>> = serde_json::from_str(&reply).unwrap();
        let tree = DomTree::new(flat::unflatten(envelope.value.unwrap()).unwrap());
        assert_eq!(tree.count_elements(), 201);
        assert!(tree.find(NodeHandle(201)).is_some());
    }
}
