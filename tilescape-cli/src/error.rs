//! CLI error types.

use thiserror::Error;

/// Errors surfaced to the command line.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] tilescape::config::ConfigError),

    /// Invalid camera parameters.
    #[error("Invalid camera state: {0}")]
    State(#[from] tilescape::state::StateError),

    /// The composition cycle failed.
    #[error("Composition failed: {0}")]
    Compose(#[from] tilescape::buffer::ComposeError),

    /// Bad overlay input.
    #[error("Overlay error: {0}")]
    Overlay(#[from] tilescape::overlay::OverlayError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output image encoding failure.
    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),

    /// Front buffer could not be wrapped as an image.
    #[error("Front buffer has inconsistent dimensions")]
    BufferShape,
}
