use anyhow::Result;

use crate::storage::ids::{ElementId, StepId, ThreadId};
use crate::storage::traits::DataLayer;
use crate::storage::types::{Element, StepDict};

/// A data layer write held back until the first user message
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    CreateStep(StepDict),
    UpdateStep(StepDict),
    DeleteStep(StepId),
    CreateElement(Element),
    DeleteElement {
        element_id: ElementId,
        thread_id: Option<ThreadId>,
    },
}

impl PendingWrite {
    /// Name of the data layer operation
    pub fn operation(&self) -> &'static str {
        match self {
            PendingWrite::CreateStep(_) => "create_step",
            PendingWrite::UpdateStep(_) => "update_step",
            PendingWrite::DeleteStep(_) => "delete_step",
            PendingWrite::CreateElement(_) => "create_element",
            PendingWrite::DeleteElement { .. } => "delete_element",
        }
    }

    pub(crate) async fn apply<D: DataLayer + ?Sized>(&self, data_layer: &D) -> Result<()> {
        match self {
            PendingWrite::CreateStep(step) => data_layer.create_step(step).await,
            PendingWrite::UpdateStep(step) => data_layer.update_step(step).await,
            PendingWrite::DeleteStep(step_id) => data_layer.delete_step(step_id).await,
            PendingWrite::CreateElement(element) => data_layer.create_element(element).await,
            PendingWrite::DeleteElement {
                element_id,
                thread_id,
            } => data_layer.delete_element(element_id, thread_id.as_ref()).await,
        }
    }
}
