//! Storage types
//!
//! Records shared by the `DataLayer` trait and its implementations. All of
//! them serialise with camelCase keys, the shape the client expects.

pub mod element;
pub mod feedback;
pub mod pagination;
pub mod step;
pub mod thread;
pub mod user;

pub use element::{Element, ElementDict, ElementDisplay, ElementSize, ElementType, UploadedFile};
pub use feedback::{Feedback, FeedbackDict};
pub use pagination::{paginate, PageInfo, PaginatedResponse, Pagination, ThreadFilter};
pub use step::{ShowInput, StepDict, StepType};
pub use thread::{ThreadDict, ThreadUpdate};
pub use user::{PersistedUser, User};
