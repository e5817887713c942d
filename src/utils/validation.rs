use crate::utils::error::{RemoteBuildError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(RemoteBuildError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(RemoteBuildError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(RemoteBuildError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(RemoteBuildError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RemoteBuildError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Joins items as `'a', 'b' and 'c'`.
pub fn humanize_list<S: AsRef<str>>(items: &[S], conjunction: &str) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{}'", i.as_ref())).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} {} {}", init.join(", "), conjunction, last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("farm.url", "https://example.com").is_ok());
        assert!(validate_url("farm.url", "http://example.com").is_ok());
        assert!(validate_url("farm.url", "").is_err());
        assert!(validate_url("farm.url", "invalid-url").is_err());
        assert!(validate_url("farm.url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("monitor.poll_interval_seconds", 5, 1).is_ok());
        assert!(validate_positive_number("monitor.poll_interval_seconds", 0, 1).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("project", "my-project").is_ok());
        assert!(validate_non_empty_string("project", "   ").is_err());
    }

    #[test]
    fn test_humanize_list() {
        assert_eq!(humanize_list::<&str>(&[], "and"), "");
        assert_eq!(humanize_list(&["amd64"], "and"), "'amd64'");
        assert_eq!(humanize_list(&["amd64", "arm64"], "and"), "'amd64' and 'arm64'");
        assert_eq!(
            humanize_list(&["amd64", "arm64", "riscv64"], "or"),
            "'amd64', 'arm64' or 'riscv64'"
        );
    }
}
