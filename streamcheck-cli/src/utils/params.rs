use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error};

use crate::error::AppError;

/// Parses a list of parameter strings into key-value pairs.
///
/// Each parameter string should be in the format "key=value". The function
/// splits each parameter at the first '=' character; keys and values are
/// trimmed.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` if any parameter string does not contain
/// an '=' character or has an empty key.
///
/// # Examples
///
/// ```
/// use streamcheck::utils::parse_params;
///
/// let params = vec!["Referer=https://a/".to_string()];
/// let result = parse_params(&params).unwrap();
/// assert_eq!(result, vec![("Referer".to_string(), "https://a/".to_string())]);
/// ```
pub fn parse_params(params: &[String]) -> Result<Vec<(String, String)>, AppError> {
    debug!("Parsing {} parameters", params.len());

    params
        .iter()
        .map(|param| {
            param
                .split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| {
                    error!("Invalid param format: {param}");
                    AppError::InvalidInput(format!("Invalid param format: {param}"))
                })
        })
        .collect()
}

/// Inserts `key=value` pairs into `headers`, replacing existing values.
pub fn apply_headers<I>(headers: &mut HeaderMap, pairs: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in pairs {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| AppError::InvalidInput(format!("Invalid header name `{key}`: {e}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| AppError::InvalidInput(format!("Invalid value for header `{key}`: {e}")))?;
        debug!(header = %name, "Added default header");
        headers.insert(name, value);
    }
    Ok(())
}
