//! Render containers
//!
//! A `Container` is the host-side mount point a renderer writes into: an id
//! and an ordered list of child elements. Hosts that own a real document
//! mirror the children into it; tests and the CLI read them back directly.

use serde::Serialize;
use tokio::sync::RwLock;

/// A child element mounted in a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    pub tag: String,
    /// Attributes in insertion order, values unescaped
    pub attributes: Vec<(String, String)>,
    /// Trusted inner markup produced by the renderer
    pub inner_html: String,
}

impl Element {
    /// Create an empty element
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            inner_html: String::new(),
        }
    }

    /// Set an attribute, replacing an existing one of the same name
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    /// Set the inner markup
    pub fn inner_html(mut self, html: impl Into<String>) -> Self {
        self.inner_html = html.into();
        self
    }

    /// Attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize to markup
    pub fn to_html(&self) -> String {
        let mut out = format!("<{}", self.tag);
        for (name, value) in &self.attributes {
            out.push_str(&format!(r#" {}="{}""#, name, super::escape_attr(value)));
        }
        out.push('>');
        out.push_str(&self.inner_html);
        out.push_str(&format!("</{}>", self.tag));
        out
    }
}

/// Mount point for rendered artifacts
#[derive(Debug)]
pub struct Container {
    id: String,
    children: RwLock<Vec<Element>>,
}

impl Container {
    /// Create an empty container
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            children: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remove all children
    pub async fn clear(&self) {
        self.children.write().await.clear();
    }

    /// Replace all children with `element` under one write lock, so
    /// overlapping renders never leave more than one child behind.
    pub async fn replace(&self, element: Element) {
        let mut children = self.children.write().await;
        children.clear();
        children.push(element);
    }

    /// Move the children of `staged` into this container if `current` still
    /// holds once this container's write lock is taken. Returns whether the
    /// children were mounted.
    pub async fn adopt_if(&self, staged: &Container, current: impl FnOnce() -> bool) -> bool {
        let staged = std::mem::take(&mut *staged.children.write().await);
        let mut children = self.children.write().await;
        if !current() {
            return false;
        }
        *children = staged;
        true
    }

    /// Append a child
    pub async fn append(&self, element: Element) {
        self.children.write().await.push(element);
    }

    pub async fn child_count(&self) -> usize {
        self.children.read().await.len()
    }

    /// Snapshot of the children
    pub async fn children(&self) -> Vec<Element> {
        self.children.read().await.clone()
    }

    /// Children serialized to markup
    pub async fn to_html(&self) -> String {
        self.children
            .read()
            .await
            .iter()
            .map(Element::to_html)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_to_html_escapes_attributes() {
        let el = Element::new("iframe")
            .attr("srcdoc", r#"<p class="x">a & b</p>"#)
            .attr("sandbox", "allow-scripts");
        assert_eq!(
            el.to_html(),
            r#"<iframe srcdoc="&lt;p class=&quot;x&quot;&gt;a &amp; b&lt;/p&gt;" sandbox="allow-scripts"></iframe>"#
        );
    }

    #[test]
    fn test_attr_replaces() {
        let el = Element::new("div").attr("class", "a").attr("class", "b");
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attribute("class"), Some("b"));
    }

    #[tokio::test]
    async fn test_container_lifecycle() {
        let container = Container::new("c1");
        assert_eq!(container.id(), "c1");
        assert_eq!(container.child_count().await, 0);

        container.append(Element::new("div").inner_html("x")).await;
        container.append(Element::new("div")).await;
        assert_eq!(container.child_count().await, 2);
        assert_eq!(container.to_html().await, "<div>x</div>\n<div></div>");

        container.replace(Element::new("p")).await;
        assert_eq!(container.to_html().await, "<p></p>");

        container.clear().await;
        assert_eq!(container.child_count().await, 0);
    }

    #[tokio::test]
    async fn test_adopt_if() {
        let target = Container::new("c1");
        target.append(Element::new("old")).await;

        let staged = Container::new("c1");
        staged.replace(Element::new("new")).await;
        assert!(!target.adopt_if(&staged, || false).await);
        assert_eq!(target.to_html().await, "<old></old>");

        staged.replace(Element::new("new")).await;
        assert!(target.adopt_if(&staged, || true).await);
        assert_eq!(target.to_html().await, "<new></new>");
        assert_eq!(staged.child_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replace_leaves_one_child() {
        let container = std::sync::Arc::new(Container::new("c1"));
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let container = container.clone();
                tokio::spawn(async move {
                    container
                        .replace(Element::new("div").inner_html(i.to_string()))
                        .await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(container.child_count().await, 1);
    }
}
