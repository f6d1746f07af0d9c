//! Core data types.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`StreamEvent`] | Normalized progress/result unit of a generation stream |
//! | [`GenerationResult`] | Terminal outcome (media or failure message) |
//! | [`ProgressUpdate`] | Stream event with carried-forward percentage |
//! | [`TextToVideoRequest`] and friends | Validated generation requests |
//! | [`Quota`], [`HistoryPage`] | Account endpoints |

pub mod account;
pub mod events;
pub mod request;

pub use account::{HistoryItem, HistoryPage, Quota};
pub use events::{GeneratedMedia, GenerationResult, GenerationStatus, ProgressUpdate, StreamEvent};
pub use request::{
    AspectRatio, CreateImageRequest, FramesToVideoRequest, ImageUpload,
    IngredientsToVideoRequest, TextToVideoRequest,
};
