//! Input widgets shown in the bar next to the message composer
//!
//! Widgets are sent to the client as JSON dicts. When the user changes one,
//! the client reports `{id, value}` and the session routes it to the
//! widget's `on_change` callback.

mod input_bar;

pub use input_bar::InputBar;

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::WidgetError;

/// Async handler for a widget value change
pub type WidgetCallback = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A `{label, value}` option of a select widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectItem {
    pub label: String,
    pub value: String,
}

impl SelectItem {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Kind-specific widget fields
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetKind {
    Switch {
        initial: bool,
    },
    Slider {
        initial: f64,
        min: f64,
        max: f64,
        step: f64,
    },
    /// Options come from exactly one of `values` or `items`
    Select {
        initial: Option<String>,
        initial_index: Option<usize>,
        values: Vec<String>,
        items: Vec<SelectItem>,
    },
    TextInput {
        initial: Option<String>,
        placeholder: Option<String>,
        multiline: bool,
    },
    NumberInput {
        initial: Option<f64>,
        placeholder: Option<String>,
    },
    Tags {
        initial: Vec<String>,
        values: Vec<String>,
    },
}

impl WidgetKind {
    /// Client type tag
    pub fn type_name(&self) -> &'static str {
        match self {
            WidgetKind::Switch { .. } => "switch",
            WidgetKind::Slider { .. } => "slider",
            WidgetKind::Select { .. } => "select",
            WidgetKind::TextInput { .. } => "textinput",
            WidgetKind::NumberInput { .. } => "numberinput",
            WidgetKind::Tags { .. } => "tags",
        }
    }
}

#[derive(Clone)]
pub struct InputWidget {
    pub id: String,
    /// May be empty for a compact bar
    pub label: String,
    pub tooltip: Option<String>,
    pub description: Option<String>,
    pub kind: WidgetKind,
    pub on_change: Option<WidgetCallback>,
}

impl fmt::Debug for InputWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputWidget")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl InputWidget {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: WidgetKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            tooltip: None,
            description: None,
            kind,
            on_change: None,
        }
    }

    pub fn switch(id: impl Into<String>, label: impl Into<String>, initial: bool) -> Self {
        Self::new(id, label, WidgetKind::Switch { initial })
    }

    pub fn slider(
        id: impl Into<String>,
        label: impl Into<String>,
        min: f64,
        max: f64,
        initial: f64,
        step: f64,
    ) -> Self {
        Self::new(id, label, WidgetKind::Slider { initial, min, max, step })
    }

    /// Select over plain values; each value is also its label
    pub fn select<I, S>(id: impl Into<String>, label: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            label,
            WidgetKind::Select {
                initial: None,
                initial_index: None,
                values: values.into_iter().map(Into::into).collect(),
                items: Vec::new(),
            },
        )
    }

    pub fn select_items(
        id: impl Into<String>,
        label: impl Into<String>,
        items: Vec<SelectItem>,
    ) -> Self {
        Self::new(
            id,
            label,
            WidgetKind::Select {
                initial: None,
                initial_index: None,
                values: Vec::new(),
                items,
            },
        )
    }

    pub fn text_input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(
            id,
            label,
            WidgetKind::TextInput {
                initial: None,
                placeholder: None,
                multiline: false,
            },
        )
    }

    pub fn number_input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(
            id,
            label,
            WidgetKind::NumberInput {
                initial: None,
                placeholder: None,
            },
        )
    }

    pub fn tags<I, S>(id: impl Into<String>, label: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            label,
            WidgetKind::Tags {
                initial: Vec::new(),
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Initial value of a select, text input or number input.
    ///
    /// Ignored by the other kinds.
    pub fn with_initial(mut self, initial: Value) -> Self {
        match &mut self.kind {
            WidgetKind::Select { initial: slot, .. } | WidgetKind::TextInput { initial: slot, .. } => {
                *slot = initial.as_str().map(str::to_string);
            }
            WidgetKind::NumberInput { initial: slot, .. } => *slot = initial.as_f64(),
            WidgetKind::Tags { initial: slot, .. } => {
                *slot = serde_json::from_value(initial).unwrap_or_default();
            }
            WidgetKind::Switch { initial: slot } => *slot = initial.as_bool().unwrap_or(*slot),
            WidgetKind::Slider { initial: slot, .. } => *slot = initial.as_f64().unwrap_or(*slot),
        }
        self
    }

    /// Select the option at `index` initially (select widgets only)
    pub fn with_initial_index(mut self, index: usize) -> Self {
        if let WidgetKind::Select { initial_index, .. } = &mut self.kind {
            *initial_index = Some(index);
        }
        self
    }

    pub fn with_placeholder(mut self, text: impl Into<String>) -> Self {
        match &mut self.kind {
            WidgetKind::TextInput { placeholder, .. } | WidgetKind::NumberInput { placeholder, .. } => {
                *placeholder = Some(text.into());
            }
            _ => {}
        }
        self
    }

    pub fn multiline(mut self) -> Self {
        if let WidgetKind::TextInput { multiline, .. } = &mut self.kind {
            *multiline = true;
        }
        self
    }

    /// Register the handler called with each new value
    pub fn on_change<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let callback: WidgetCallback = Arc::new(move |value| Box::pin(handler(value)));
        self.on_change = Some(callback);
        self
    }

    pub fn validate(&self) -> Result<(), WidgetError> {
        match &self.kind {
            WidgetKind::Select {
                initial_index,
                values,
                items,
                ..
            } => {
                if values.is_empty() && items.is_empty() {
                    return Err(WidgetError::SelectWithoutOptions(self.id.clone()));
                }
                if !values.is_empty() && !items.is_empty() {
                    return Err(WidgetError::SelectWithBothOptions(self.id.clone()));
                }
                if let Some(index) = *initial_index {
                    if index >= values.len().max(items.len()) {
                        return Err(WidgetError::InitialIndexOutOfRange {
                            id: self.id.clone(),
                            index,
                        });
                    }
                }
                Ok(())
            }
            WidgetKind::Slider {
                initial,
                min,
                max,
                step,
            } => {
                if min <= initial && initial <= max && *step > 0.0 {
                    Ok(())
                } else {
                    Err(WidgetError::InvalidSliderRange {
                        id: self.id.clone(),
                        min: *min,
                        max: *max,
                        initial: *initial,
                        step: *step,
                    })
                }
            }
            _ => Ok(()),
        }
    }

    /// JSON sent to the client
    pub fn to_dict(&self) -> Value {
        let mut dict = Map::new();
        dict.insert("type".into(), json!(self.kind.type_name()));
        dict.insert("id".into(), json!(self.id));
        dict.insert("label".into(), json!(self.label));
        dict.insert("tooltip".into(), json!(self.tooltip));
        dict.insert("description".into(), json!(self.description));

        match &self.kind {
            WidgetKind::Switch { initial } => {
                dict.insert("initial".into(), json!(initial));
            }
            WidgetKind::Slider {
                initial,
                min,
                max,
                step,
            } => {
                dict.insert("initial".into(), json!(initial));
                dict.insert("min".into(), json!(min));
                dict.insert("max".into(), json!(max));
                dict.insert("step".into(), json!(step));
            }
            WidgetKind::Select {
                initial,
                initial_index,
                values,
                items,
            } => {
                let options: Vec<SelectItem> = if items.is_empty() {
                    values.iter().map(|v| SelectItem::new(v.clone(), v.clone())).collect()
                } else {
                    items.clone()
                };
                let initial = initial_index
                    .and_then(|i| options.get(i))
                    .map(|item| item.value.clone())
                    .or_else(|| initial.clone());
                dict.insert("initial".into(), json!(initial));
                dict.insert("items".into(), json!(options));
            }
            WidgetKind::TextInput {
                initial,
                placeholder,
                multiline,
            } => {
                dict.insert("initial".into(), json!(initial));
                dict.insert("placeholder".into(), json!(placeholder));
                dict.insert("multiline".into(), json!(multiline));
            }
            WidgetKind::NumberInput { initial, placeholder } => {
                dict.insert("initial".into(), json!(initial));
                dict.insert("placeholder".into(), json!(placeholder));
            }
            WidgetKind::Tags { initial, values } => {
                dict.insert("initial".into(), json!(initial));
                dict.insert("values".into(), json!(values));
            }
        }
        Value::Object(dict)
    }
}
