//! Configuration validation
//!
//! Rules:
//! - derive rules declared on the settings types (`validator`)
//! - `boxName` / `bookName`, when set, are not blank
//! - network client needs `addr` as `host:port`
//! - network `format` is `json` or `bincode`
//! - network `max_frame_size` is a positive byte size
//! - file client `file_name` is a bare file name

use contracts::{BoxConfig, ClientType, ContractError, DeliveryConfig, UploaderSettings, Validate};

use crate::size::parse_byte_size;

/// Validate `box.json`
pub fn validate_box(config: &BoxConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|e| ContractError::config_validation("box.json", e.to_string()))?;
    validate_not_blank("boxName", config.box_name.as_deref())?;
    validate_not_blank("bookName", config.book_name.as_deref())?;
    Ok(())
}

fn validate_not_blank(field: &str, value: Option<&str>) -> Result<(), ContractError> {
    match value {
        Some(value) if value.trim().is_empty() => Err(ContractError::config_validation(
            field,
            format!("{field} must not be blank"),
        )),
        _ => Ok(()),
    }
}

/// Validate uploader settings
///
/// Returns the first error encountered, or Ok(()).
pub fn validate_settings(settings: &UploaderSettings) -> Result<(), ContractError> {
    settings
        .validate()
        .map_err(|e| ContractError::config_validation("uploader", e.to_string()))?;
    validate_delivery(&settings.delivery)?;
    Ok(())
}

fn validate_delivery(delivery: &DeliveryConfig) -> Result<(), ContractError> {
    match delivery.client {
        ClientType::Log => Ok(()),
        ClientType::File => validate_file_params(delivery),
        ClientType::Network => validate_network_params(delivery),
    }
}

fn validate_file_params(delivery: &DeliveryConfig) -> Result<(), ContractError> {
    if let Some(file_name) = delivery.params.get("file_name") {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(ContractError::config_validation(
                "delivery.params.file_name",
                format!("'{file_name}' must be a bare file name"),
            ));
        }
    }
    Ok(())
}

fn validate_network_params(delivery: &DeliveryConfig) -> Result<(), ContractError> {
    let addr = delivery.params.get("addr").ok_or_else(|| {
        ContractError::config_validation(
            "delivery.params.addr",
            "network client requires 'addr'",
        )
    })?;

    let valid_addr = addr
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if !valid_addr {
        return Err(ContractError::config_validation(
            "delivery.params.addr",
            format!("'{addr}' is not a host:port address"),
        ));
    }

    if let Some(format) = delivery.params.get("format") {
        if !matches!(format.as_str(), "json" | "bincode") {
            return Err(ContractError::config_validation(
                "delivery.params.format",
                format!("unsupported frame format '{format}', expected json or bincode"),
            ));
        }
    }

    if let Some(max_frame_size) = delivery.params.get("max_frame_size") {
        parse_byte_size(max_frame_size).map_err(|_| {
            ContractError::config_validation(
                "delivery.params.max_frame_size",
                format!("'{max_frame_size}' is not a positive byte size"),
            )
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network_settings(params: &[(&str, &str)]) -> UploaderSettings {
        let mut settings = UploaderSettings::default();
        settings.delivery.client = ClientType::Network;
        settings.delivery.params = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        settings
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(validate_settings(&UploaderSettings::default()).is_ok());
    }

    #[test]
    fn test_network_requires_addr() {
        let err = validate_settings(&network_settings(&[]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("requires 'addr'"), "got: {err}");
    }

    #[test]
    fn test_network_addr_format() {
        assert!(validate_settings(&network_settings(&[("addr", "localhost:9000")])).is_ok());
        assert!(validate_settings(&network_settings(&[("addr", "localhost")])).is_err());
        assert!(validate_settings(&network_settings(&[("addr", ":9000")])).is_err());
        assert!(validate_settings(&network_settings(&[("addr", "host:99999")])).is_err());
    }

    #[test]
    fn test_network_frame_options() {
        let ok = network_settings(&[
            ("addr", "127.0.0.1:9000"),
            ("format", "bincode"),
            ("max_frame_size", "64KB"),
        ]);
        assert!(validate_settings(&ok).is_ok());

        let bad_format = network_settings(&[("addr", "127.0.0.1:9000"), ("format", "xml")]);
        let err = validate_settings(&bad_format).unwrap_err().to_string();
        assert!(err.contains("unsupported frame format"), "got: {err}");

        let bad_size = network_settings(&[("addr", "127.0.0.1:9000"), ("max_frame_size", "0")]);
        assert!(validate_settings(&bad_size).is_err());
    }

    #[test]
    fn test_file_name_must_be_bare() {
        let mut settings = UploaderSettings::default();
        settings.delivery.client = ClientType::File;
        settings
            .delivery
            .params
            .insert("file_name".into(), "nested/events.jsonl".into());
        let err = validate_settings(&settings).unwrap_err().to_string();
        assert!(err.contains("bare file name"), "got: {err}");
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut settings = UploaderSettings::default();
        settings.queues.batch_buffer_size = 0;
        assert!(matches!(
            validate_settings(&settings),
            Err(ContractError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_blank_box_name() {
        let config = BoxConfig {
            box_name: Some(String::new()),
            book_name: None,
        };
        assert!(validate_box(&config).is_err());
    }

    #[test]
    fn test_whitespace_box_names_rejected() {
        let blank_book = BoxConfig {
            box_name: Some("box".to_string()),
            book_name: Some("   ".to_string()),
        };
        let err = validate_box(&blank_book).unwrap_err().to_string();
        assert!(err.contains("bookName"), "got: {err}");

        let blank_box = BoxConfig {
            box_name: Some("\t".to_string()),
            book_name: None,
        };
        let err = validate_box(&blank_box).unwrap_err().to_string();
        assert!(err.contains("boxName"), "got: {err}");

        assert!(validate_box(&BoxConfig::default()).is_ok());
        assert!(validate_box(&BoxConfig {
            box_name: Some("box".to_string()),
            book_name: Some("book".to_string()),
        })
        .is_ok());
    }
}
