use tracing::{debug, info, warn};

use crate::field::{DeclaredKind, WidgetHandle};
use crate::selector::{Selector, Tag};
use crate::surface::{ElementRef, FormSurface};

/// Ordered lookup candidates for a field. The primary selector comes first;
/// fallbacks identical to it are dropped.
pub fn candidates(name: &str, declared: &DeclaredKind) -> Vec<Selector> {
    let primary = Selector::attr(declared.primary_tag(), "name", name);
    let mut out = vec![primary];
    for tag in [Tag::Input, Tag::TextArea] {
        for fallback in [
            Selector::attr(tag, "name", name),
            Selector::id(tag, name),
            Selector::attr_contains(tag, "placeholder", name),
        ] {
            if !out.contains(&fallback) {
                out.push(fallback);
            }
        }
    }
    out
}

/// Ordered lookup candidates for a searchable dropdown, as (selector, ordinal).
pub fn dropdown_candidates(handle: &WidgetHandle) -> Vec<(Selector, usize)> {
    let mut out = vec![(WidgetHandle::pattern(), handle.ordinal)];
    if let Some(id) = &handle.legacy_id {
        out.push((Selector::id(Tag::Input, id), 0));
    }
    out
}

/// Maps a logical field name to an element on the live page. Candidates are
/// tried in a fixed order and the first one with a match wins.
pub struct FieldLocator<'a> {
    surface: &'a dyn FormSurface,
}

impl<'a> FieldLocator<'a> {
    pub fn new(surface: &'a dyn FormSurface) -> Self {
        Self { surface }
    }

    /// Locate a regular field. `None` means every candidate was exhausted.
    pub async fn locate(&self, name: &str, declared: &DeclaredKind) -> Option<ElementRef> {
        let candidates = candidates(name, declared);
        for (rank, selector) in candidates.into_iter().enumerate() {
            if let Some(found) = self.nth_match(selector, 0).await {
                if rank == 0 {
                    debug!(field = name, selector = %found.selector, "located field");
                } else {
                    info!(field = name, selector = %found.selector, "located field with fallback selector");
                }
                return Some(found);
            }
            if rank == 0 {
                info!(field = name, "primary selector missed, trying fallbacks");
            }
        }
        warn!(field = name, "no selector matched field");
        None
    }

    /// Locate the text input of a searchable dropdown.
    pub async fn locate_dropdown(&self, name: &str, handle: &WidgetHandle) -> Option<ElementRef> {
        for (selector, ordinal) in dropdown_candidates(handle) {
            if let Some(found) = self.nth_match(selector, ordinal).await {
                debug!(field = name, selector = %found.selector, ordinal, "located dropdown");
                return Some(found);
            }
        }
        warn!(field = name, ordinal = handle.ordinal, "no dropdown widget found");
        None
    }

    async fn nth_match(&self, selector: Selector, index: usize) -> Option<ElementRef> {
        match self.surface.query(&selector).await {
            Ok(mut matches) if matches.len() > index => Some(ElementRef {
                info: matches.swap_remove(index),
                selector,
                index,
            }),
            Ok(_) => None,
            Err(e) => {
                warn!(selector = %selector, error = %e, "selector query failed");
                None
            }
        }
    }
}
