pub mod story;

pub use story::{CardHandle, Resolution, Story};
