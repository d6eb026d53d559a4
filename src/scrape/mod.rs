pub mod classify;
pub mod identity;
pub mod pipeline;
pub mod strategy;

pub use pipeline::{ScrapePipeline, NEW_MESSAGE_EVENT};
