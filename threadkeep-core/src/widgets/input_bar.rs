use anyhow::Result;
use std::collections::HashSet;

use super::InputWidget;
use crate::error::WidgetError;
use crate::events::SessionEvent;
use crate::session::ChatSession;
use crate::storage::traits::DataLayer;

/// The widget bar of a chat session
pub struct InputBar;

impl InputBar {
    /// Validate the widgets, register their callbacks on the session and send
    /// them to the client.
    ///
    /// Nothing is registered or sent when any widget is invalid.
    pub fn set_widgets<D: DataLayer + ?Sized>(
        session: &mut ChatSession<D>,
        widgets: Vec<InputWidget>,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        for widget in &widgets {
            widget.validate()?;
            if !seen.insert(widget.id.as_str()) {
                return Err(WidgetError::DuplicateId(widget.id.clone()).into());
            }
        }

        let dicts = widgets.iter().map(InputWidget::to_dict).collect();
        for widget in widgets {
            if let Some(callback) = widget.on_change {
                session.register_widget_callback(widget.id, callback);
            }
        }

        session.emit(SessionEvent::SetInputWidgets(dicts));
        Ok(())
    }
}
