//! Header validation rules.

use meshbus_core::error::AppError;

use super::types::{Message, MessageKind};

/// Maximum allowed payload size in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 131_072;

/// Maximum length of a bus name.
const MAX_NAME_LEN: usize = 255;

/// Validates a message header before routing.
pub fn validate_message(msg: &Message) -> Result<(), AppError> {
    if msg.payload.len() > MAX_PAYLOAD_SIZE {
        return Err(AppError::invalid_argument(format!(
            "Payload exceeds maximum size of {} bytes",
            MAX_PAYLOAD_SIZE
        )));
    }

    if msg.is_broadcast() && msg.kind != MessageKind::Signal {
        return Err(AppError::invalid_argument(
            "Only signals may omit a destination",
        ));
    }

    if !msg.is_broadcast() {
        validate_bus_name(&msg.destination)?;
    }

    Ok(())
}

/// Validates bus name format.
///
/// Unique names start with `:`; well-known names are dotted identifiers.
pub fn validate_bus_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(AppError::invalid_argument("Invalid bus name length"));
    }

    let body = name.strip_prefix(':').unwrap_or(name);
    if body.is_empty()
        || !body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(AppError::invalid_argument(format!(
            "Bus name '{name}' contains invalid characters"
        )));
    }

    Ok(())
}
