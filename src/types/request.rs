//! Generation request types.
//!
//! Requests are plain data; [`validate`](TextToVideoRequest::validate) returns
//! a normalized copy (trimmed prompt) or a validation error before anything
//! touches the network.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum number of outputs a single generation request may ask for.
pub const MAX_OUTPUTS_PER_REQUEST: u8 = 4;

const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Output orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    Landscape,
    Portrait,
    /// Only valid for image generation.
    Square,
}

impl AspectRatio {
    /// Wire value for video endpoints.
    pub fn video_wire(&self) -> Result<&'static str> {
        match self {
            Self::Landscape => Ok("VIDEO_ASPECT_RATIO_LANDSCAPE"),
            Self::Portrait => Ok("VIDEO_ASPECT_RATIO_PORTRAIT"),
            Self::Square => Err(Error::validation_with_context(
                "square aspect ratio is not supported for video",
                ErrorContext::new().with_field_path("request.aspect_ratio"),
            )),
        }
    }

    /// Wire value for image endpoints.
    pub fn image_wire(&self) -> &'static str {
        match self {
            Self::Landscape => "IMAGE_ASPECT_RATIO_LANDSCAPE",
            Self::Portrait => "IMAGE_ASPECT_RATIO_PORTRAIT",
            Self::Square => "IMAGE_ASPECT_RATIO_SQUARE",
        }
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landscape" | "16:9" | "video_aspect_ratio_landscape" | "image_aspect_ratio_landscape" => {
                Ok(Self::Landscape)
            }
            "portrait" | "9:16" | "video_aspect_ratio_portrait" | "image_aspect_ratio_portrait" => {
                Ok(Self::Portrait)
            }
            "square" | "1:1" | "image_aspect_ratio_square" => Ok(Self::Square),
            other => Err(Error::validation(format!(
                "Invalid aspect ratio '{}'. Must be one of: landscape, portrait, square",
                other
            ))),
        }
    }
}

fn validate_prompt(prompt: &str) -> Result<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(Error::validation_with_context(
            "Prompt cannot be empty",
            ErrorContext::new()
                .with_field_path("request.prompt")
                .with_source("request_validator"),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_count(count: u8, field: &str) -> Result<u8> {
    if !(1..=MAX_OUTPUTS_PER_REQUEST).contains(&count) {
        return Err(Error::validation_with_context(
            format!("{} must be between 1 and {}", field, MAX_OUTPUTS_PER_REQUEST),
            ErrorContext::new()
                .with_field_path(format!("request.{}", field))
                .with_details(format!("got {}", count))
                .with_source("request_validator"),
        ));
    }
    Ok(count)
}

/// Text-to-video generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextToVideoRequest {
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default = "one")]
    pub number_of_videos: u8,
}

fn one() -> u8 {
    1
}

impl TextToVideoRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::Landscape,
            number_of_videos: 1,
        }
    }

    pub fn aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn number_of_videos(mut self, n: u8) -> Self {
        self.number_of_videos = n;
        self
    }

    pub fn validate(&self) -> Result<Self> {
        self.aspect_ratio.video_wire()?;
        Ok(Self {
            prompt: validate_prompt(&self.prompt)?,
            aspect_ratio: self.aspect_ratio,
            number_of_videos: validate_count(self.number_of_videos, "number_of_videos")?,
        })
    }

    /// JSON body for `POST /veo/text-to-video`.
    pub fn to_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "prompt": self.prompt,
            "aspect_ratio": self.aspect_ratio.video_wire()?,
            "number_of_videos": self.number_of_videos,
        }))
    }
}

/// Frames-to-video: animate from a start frame, optionally towards an end frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramesToVideoRequest {
    pub prompt: String,
    pub start_frame: PathBuf,
    #[serde(default)]
    pub end_frame: Option<PathBuf>,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default)]
    pub number_of_videos: Option<u8>,
}

impl FramesToVideoRequest {
    pub fn new(prompt: impl Into<String>, start_frame: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            start_frame: start_frame.into(),
            end_frame: None,
            aspect_ratio: None,
            number_of_videos: None,
        }
    }

    pub fn end_frame(mut self, path: impl Into<PathBuf>) -> Self {
        self.end_frame = Some(path.into());
        self
    }

    pub fn aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    pub fn number_of_videos(mut self, n: u8) -> Self {
        self.number_of_videos = Some(n);
        self
    }

    pub fn validate(&self) -> Result<Self> {
        if let Some(ar) = self.aspect_ratio {
            ar.video_wire()?;
        }
        let number_of_videos = match self.number_of_videos {
            Some(n) => Some(validate_count(n, "number_of_videos")?),
            None => None,
        };
        check_image_extension(&self.start_frame)?;
        if let Some(end) = &self.end_frame {
            check_image_extension(end)?;
        }
        Ok(Self {
            prompt: validate_prompt(&self.prompt)?,
            start_frame: self.start_frame.clone(),
            end_frame: self.end_frame.clone(),
            aspect_ratio: self.aspect_ratio,
            number_of_videos,
        })
    }
}

/// Ingredients-to-video: compose a video from reference images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientsToVideoRequest {
    pub prompt: String,
    pub images: Vec<PathBuf>,
}

impl IngredientsToVideoRequest {
    pub fn new(prompt: impl Into<String>, images: Vec<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            images,
        }
    }

    pub fn validate(&self) -> Result<Self> {
        if self.images.is_empty() {
            return Err(Error::validation_with_context(
                "At least one reference image is required",
                ErrorContext::new().with_field_path("request.images"),
            ));
        }
        for image in &self.images {
            check_image_extension(image)?;
        }
        Ok(Self {
            prompt: validate_prompt(&self.prompt)?,
            images: self.images.clone(),
        })
    }
}

/// Image generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default = "one")]
    pub number_of_images: u8,
    #[serde(default)]
    pub reference_images: Vec<PathBuf>,
}

impl CreateImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::Landscape,
            number_of_images: 1,
            reference_images: Vec::new(),
        }
    }

    pub fn aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn number_of_images(mut self, n: u8) -> Self {
        self.number_of_images = n;
        self
    }

    pub fn reference_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_images.push(path.into());
        self
    }

    pub fn validate(&self) -> Result<Self> {
        for image in &self.reference_images {
            check_image_extension(image)?;
        }
        Ok(Self {
            prompt: validate_prompt(&self.prompt)?,
            aspect_ratio: self.aspect_ratio,
            number_of_images: validate_count(self.number_of_images, "number_of_images")?,
            reference_images: self.reference_images.clone(),
        })
    }
}

/// An image file read into memory for a multipart upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Read `path`, enforcing the allowed formats and `max_bytes`.
    pub async fn load(path: &Path, upload_name: &str, max_bytes: u64) -> Result<Self> {
        let ext = check_image_extension(path)?;
        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            Error::invalid_image(
                format!("cannot read image: {}", e),
                ErrorContext::new().with_field_path(path.display().to_string()),
            )
        })?;
        if meta.len() > max_bytes {
            return Err(Error::invalid_image(
                format!(
                    "image is {} bytes, larger than the {} byte limit",
                    meta.len(),
                    max_bytes
                ),
                ErrorContext::new().with_field_path(path.display().to_string()),
            ));
        }
        let bytes = tokio::fs::read(path).await?;
        let mime = match ext.as_str() {
            "png" => "image/png",
            "webp" => "image/webp",
            _ => "image/jpeg",
        };
        Ok(Self {
            file_name: format!("{}.{}", upload_name, ext),
            mime,
            bytes,
        })
    }

    pub fn into_part(self) -> Result<reqwest::multipart::Part> {
        reqwest::multipart::Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(self.mime)
            .map_err(|e| Error::configuration(format!("Invalid mime: {}", e)))
    }
}

fn check_image_extension(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(Error::invalid_image(
            format!(
                "unsupported image format '{}'; allowed: {}",
                ext,
                ALLOWED_IMAGE_EXTENSIONS.join(", ")
            ),
            ErrorContext::new().with_field_path(path.display().to_string()),
        ))
    }
}
