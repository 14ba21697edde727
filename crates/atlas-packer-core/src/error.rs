use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasPackerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid page dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Power-of-two packing requires power-of-two max page size, got {width}x{height}")]
    NotPowerOfTwo { width: u32, height: u32 },
    #[error("No image was supplied for \"{name}\"")]
    NoImages { name: String },
    #[error("Image source \"{name}\" was already validated")]
    AlreadyValidated { name: String },
    #[error("No bitmap could be found or derived for \"{name}\" at scale {scale}")]
    MissingScale { name: String, scale: u32 },
    #[error("Scale factor {scale} for \"{name}\" is outside the supported range")]
    InvalidScaleFactor { name: String, scale: u32 },
    #[error("Invalid ninepatch guide pixel in \"{name}\" at {x},{y}: rgba {rgba:?}")]
    InvalidNinepatch {
        name: String,
        x: u32,
        y: u32,
        rgba: [u8; 4],
    },
    #[error("Malformed ninepatch \"{name}\": {reason}")]
    MalformedNinepatch { name: String, reason: String },
    #[error(
        "Image does not fit within max page size {max_width}x{max_height}: \"{name}\" ({width}x{height})"
    )]
    DoesNotFit {
        name: String,
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    #[error("No rectangle could be placed on an empty page ({remaining} remaining)")]
    OutOfSpace { remaining: usize },
    #[error("Failed to rasterize \"{name}\": {reason}")]
    Rasterize { name: String, reason: String },
    #[error("Manifest parse error at line {line}: {reason}")]
    Manifest { line: usize, reason: String },
    #[error("Nothing to pack")]
    Empty,
}

pub type Result<T> = std::result::Result<T, AtlasPackerError>;
