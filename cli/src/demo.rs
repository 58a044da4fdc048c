//! The widget bar used by `threadkeep widgets`

use serde_json::Value;
use threadkeep_core::InputWidget;

pub const WIDGET_IDS: [&str; 5] = [
    "slider_demo",
    "select_demo",
    "switch_demo",
    "text_demo",
    "number_demo",
];

/// One widget of each common kind; two of them have empty labels
pub fn widgets() -> Vec<InputWidget> {
    vec![
        InputWidget::slider("slider_demo", "Demo Slider", 0.0, 100.0, 50.0, 1.0).on_change(
            |value: Value| async move {
                tracing::info!("slider_demo changed to {}", value);
                Ok::<(), anyhow::Error>(())
            },
        ),
        InputWidget::select("select_demo", "", ["Option 1", "Option 2", "Option 3"])
            .with_initial(Value::from("Option 1")),
        InputWidget::switch("switch_demo", "", false),
        InputWidget::text_input("text_demo", "Demo Text").with_initial(Value::from("Hello")),
        InputWidget::number_input("number_demo", "Demo Number").with_initial(Value::from(42)),
    ]
}
