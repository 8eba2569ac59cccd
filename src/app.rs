//! Application bootstrap: one page, one theme controller, one viewer.
//!
//! Construction order is fixed. The theme is restored first so the page is
//! never painted without a `data-theme`, then the viewer lists documents.

use std::sync::Arc;

use crate::events::{ClickEvent, ListenerKind, ListenerRegistry};
use crate::fetch::Fetcher;
use crate::page::Page;
use crate::shell;
use crate::theme::{PreferenceStore, ThemeController};
use crate::viewer::{DocumentViewer, LoadOutcome, LoadTicket};

/// What a click did.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// No listener handled it.
    Ignored,
    /// The page changed and should be repainted.
    Repainted,
    /// An outline entry was activated; scroll to this anchor.
    Scroll(String),
    /// A document load has begun; run the ticket and [`App::complete`] it.
    Load(LoadTicket),
}

pub struct App<F, S> {
    page: Page,
    theme: ThemeController<S>,
    viewer: DocumentViewer,
    listeners: ListenerRegistry,
    fetcher: Arc<F>,
}

impl<F: Fetcher, S: PreferenceStore> App<F, S> {
    pub async fn start(fetcher: Arc<F>, store: S) -> Self {
        let mut page = Page::new();
        let mut listeners = ListenerRegistry::new();

        let theme = ThemeController::install(store, &mut page.root, &mut listeners);
        let mut viewer = DocumentViewer::new(&mut listeners);
        viewer.initialize(fetcher.as_ref(), &mut page.viewer).await;

        log::debug!("[app] started listeners={:?}", listeners.active());
        Self {
            page,
            theme,
            viewer,
            listeners,
            fetcher,
        }
    }

    /// Offer a click to each bound listener in registration order. The first
    /// one to handle it wins.
    pub fn dispatch(&mut self, click: &ClickEvent) -> Dispatch {
        for kind in self.listeners.active() {
            let handled = match kind {
                ListenerKind::ThemeToggle => self
                    .theme
                    .handle_click(&mut self.page.root, click)
                    .then_some(Dispatch::Repainted),
                ListenerKind::FileList => self
                    .viewer
                    .handle_file_click(click, &mut self.page.viewer)
                    .map(Dispatch::Load),
                ListenerKind::Outline => self
                    .viewer
                    .handle_outline_click(click, &mut self.page.viewer)
                    .map(|target| Dispatch::Scroll(target.anchor_id)),
            };
            if let Some(dispatch) = handled {
                return dispatch;
            }
        }
        log::debug!("[app] click ignored origin={:?}", click.origin());
        Dispatch::Ignored
    }

    /// Apply a finished load. `false` if it was stale.
    pub fn complete(&mut self, outcome: LoadOutcome) -> bool {
        self.viewer.complete_load(outcome, &mut self.page.viewer)
    }

    pub fn render(&self) -> String {
        shell::render_page(&self.page)
    }

    /// Unbind every listener. Later clicks are ignored.
    pub fn shutdown(&mut self) {
        self.theme.dispose(&mut self.listeners);
        self.viewer.dispose(&mut self.listeners);
        log::debug!("[app] shutdown listeners={:?}", self.listeners.active());
    }

    pub fn fetcher(&self) -> Arc<F> {
        Arc::clone(&self.fetcher)
    }
}

#[cfg(test)]
impl<F, S> App<F, S> {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn viewer(&self) -> &DocumentViewer {
        &self.viewer
    }

    pub fn theme(&self) -> &ThemeController<S> {
        &self.theme
    }
}
