use std::fmt;

use crate::models::trip::TripError;

/// Odometer photo taken from the gallery or the camera input.
#[derive(Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn validate(&self, max_bytes: usize) -> Result<(), TripError> {
        if self.bytes.is_empty() {
            return Err(TripError::InvalidPhoto("a photo is required".into()));
        }
        if !self.content_type.starts_with("image/") {
            return Err(TripError::InvalidPhoto(format!(
                "`{}` is not an image",
                self.content_type
            )));
        }
        if self.bytes.len() > max_bytes {
            return Err(TripError::InvalidPhoto(format!(
                "photo is {} bytes, the limit is {max_bytes}",
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for PhotoUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
