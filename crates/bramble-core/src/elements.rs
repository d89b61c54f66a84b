//! UI element snapshots and tree walks.
//!
//! A query evaluation produces a [`UIElements`] collection: an ordered,
//! read-only snapshot of what matched at that moment. The snapshot does not
//! track the live UI: if the screen changes, element references go stale and
//! actions on them fail with a stale-reference error rather than silently
//! re-resolving.
//!
//! Tree inspection produces a [`TreeWalk`], a lazy pre-order iterator of
//! elements annotated with their nesting depth (root at 0).

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bridge::BridgeSession;
use crate::error::{Error, Result};
use crate::protocol::{ElementDescriptor, TreeNode};

type SessionHandle = Arc<Mutex<BridgeSession>>;

/// One UI element captured by a query or tree dump.
///
/// Field reads come from the snapshot and never touch the device; the
/// action methods ([`touch`](Self::touch), [`set_text`](Self::set_text))
/// go through the owning bridge session.
#[derive(Clone)]
pub struct UIElement {
    descriptor: ElementDescriptor,
    depth: usize,
    session: SessionHandle,
}

impl UIElement {
    fn new(descriptor: ElementDescriptor, depth: usize, session: SessionHandle) -> Self {
        Self {
            descriptor,
            depth,
            session,
        }
    }

    /// Native widget class name (e.g. `android.widget.Button`).
    pub fn element_class(&self) -> &str {
        &self.descriptor.element_class
    }

    /// Visible text at snapshot time, if any.
    pub fn text(&self) -> Option<&str> {
        self.descriptor.text.as_deref()
    }

    /// Accessibility content description at snapshot time, if any.
    pub fn content_description(&self) -> Option<&str> {
        self.descriptor.content_description.as_deref()
    }

    /// Nesting depth within the dumped tree. Zero for query results and for
    /// the tree root; only meaningful during a [`TreeWalk`].
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The opaque reference addressing this element on the helper side.
    pub fn reference(&self) -> &str {
        &self.descriptor.reference
    }

    /// Touches this element.
    ///
    /// # Errors
    ///
    /// [`BridgeError::StaleElement`](crate::bridge::BridgeError::StaleElement)
    /// when the UI changed since this element was fetched.
    pub async fn touch(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        Ok(session.touch(&self.descriptor.reference).await?)
    }

    /// Replaces this element's text.
    pub async fn set_text(&self, value: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        Ok(session.set_text(&self.descriptor.reference, value).await?)
    }
}

impl std::fmt::Debug for UIElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UIElement")
            .field("class", &self.descriptor.element_class)
            .field("text", &self.descriptor.text)
            .field("content_description", &self.descriptor.content_description)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Ordered snapshot of the elements matched by one query evaluation.
pub struct UIElements {
    selector: String,
    items: Vec<UIElement>,
}

impl UIElements {
    pub(crate) fn new(
        selector: impl Into<String>,
        descriptors: Vec<ElementDescriptor>,
        session: SessionHandle,
    ) -> Self {
        let items = descriptors
            .into_iter()
            .map(|d| UIElement::new(d, 0, session.clone()))
            .collect();
        Self {
            selector: selector.into(),
            items,
        }
    }

    /// The selector this snapshot came from.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Number of matched elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing matched.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The first matched element.
    ///
    /// # Errors
    ///
    /// [`Error::ElementNotFound`] when the snapshot is empty. Check
    /// [`len`](Self::len) first when emptiness is an expected outcome.
    pub fn first(&self) -> Result<&UIElement> {
        self.items
            .first()
            .ok_or_else(|| Error::ElementNotFound(self.selector.clone()))
    }

    /// The element at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&UIElement> {
        self.items.get(index)
    }

    /// Iterates the snapshot in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, UIElement> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a UIElements {
    type Item = &'a UIElement;
    type IntoIter = std::slice::Iter<'a, UIElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl std::fmt::Debug for UIElements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UIElements")
            .field("selector", &self.selector)
            .field("len", &self.items.len())
            .finish()
    }
}

/// Lazy pre-order walk over a dumped UI tree.
///
/// Yields each element exactly once, parents before children, siblings in
/// document order, with the root at depth 0. Depth numbering is faithful
/// even when sibling subtrees have different depths.
pub struct TreeWalk {
    stack: Vec<(TreeNode, usize)>,
    session: SessionHandle,
}

impl TreeWalk {
    pub(crate) fn new(root: Option<TreeNode>, session: SessionHandle) -> Self {
        Self {
            stack: root.map(|node| (node, 0)).into_iter().collect(),
            session,
        }
    }
}

impl Iterator for TreeWalk {
    type Item = UIElement;

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        // Reverse so the first child is popped next.
        for child in node.children.into_iter().rev() {
            self.stack.push((child, depth + 1));
        }
        Some(UIElement::new(node.element, depth, self.session.clone()))
    }
}
