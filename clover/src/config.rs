use crate::common::{ReadExecutor, WriteExecutor};
use crate::errors::{CloverError, CloverResult, ErrorKind};
use crate::FIELD_SEPARATOR;

/// Process-wide settings of the document model.
///
/// The only setting today is the field separator used to address nested
/// fields (default: `.`). It is shared by every document of the process, so
/// change it once at startup, before documents are created.
///
/// # Examples
///
/// ```rust,ignore
/// use clover::config::CloverConfig;
///
/// let config = CloverConfig::new();
/// config.set_field_separator(":")?;
/// assert_eq!(config.field_separator(), ":");
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct CloverConfig;

impl CloverConfig {
    pub fn new() -> Self {
        CloverConfig
    }

    /// Returns the current field separator.
    pub fn field_separator(&self) -> String {
        FIELD_SEPARATOR.read_with(|it| it.clone())
    }

    /// Sets the field separator for nested field paths.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidOperation`] if the separator is empty.
    pub fn set_field_separator(&self, separator: &str) -> CloverResult<()> {
        if separator.is_empty() {
            log::error!("Field separator cannot be empty");
            return Err(CloverError::new(
                "Field separator cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }

        log::debug!("Field separator set to {:?}", separator);
        FIELD_SEPARATOR.write_with(|it| *it = separator.to_string());
        Ok(())
    }
}
