use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File size {size} bytes exceeds maximum allowed {max} bytes ({} MB)", .max / 1024 / 1024)]
    FileTooLarge { size: usize, max: usize },
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::FileTooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}
