use crate::error::Result;
use crate::ui::{Confirmation, Message, Presentation, UiContext};
use std::sync::Arc;

/// Asks whether a modified project may be discarded.
#[derive(Clone)]
pub struct ConfirmationGate {
    presentation: Arc<dyn Presentation>,
    ui: UiContext,
}

impl ConfirmationGate {
    pub fn new(presentation: Arc<dyn Presentation>, ui: UiContext) -> Self {
        Self { presentation, ui }
    }

    /// Suspends until the user answers.
    pub async fn confirm_discard(&self) -> Result<Confirmation> {
        let presentation = self.presentation.clone();
        self.ui
            .run(move || async move {
                presentation
                    .show_confirmation(&Message::new("project.save.beforeDiscard"))
                    .await
            })
            .await
    }
}
