pub mod client;
pub mod error;
pub mod types;

pub use client::{CaptionRequest, CaptionSender, GeminiClient, ImageData};
pub use error::GeminiError;
