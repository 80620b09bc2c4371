use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use super::{ApiError, PageParams};
use crate::models::PageRequest;
use crate::models::page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

static UTORID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{7,8}$").unwrap());
static EMAIL_LOCAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+$").unwrap());

pub const MAX_NAME_LEN: usize = 50;

pub fn validate_utorid(utorid: &str) -> Result<String, ApiError> {
    let utorid = utorid.trim();
    if !UTORID.is_match(utorid) {
        return Err(ApiError::validation(
            "utorid must be 7-8 alphanumeric characters",
        ));
    }
    Ok(utorid.to_lowercase())
}

pub fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "name must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Accepts only addresses in the campus domain.
pub fn validate_email(email: &str, domain: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let suffix = format!("@{}", domain.to_lowercase());

    let valid = email
        .strip_suffix(&suffix)
        .is_some_and(|local| EMAIL_LOCAL.is_match(local));

    if !valid {
        return Err(ApiError::validation(format!(
            "email must be a valid {suffix} address"
        )));
    }
    Ok(email)
}

/// `YYYY-MM-DD`, and a real calendar date.
pub fn validate_birthday(birthday: &str) -> Result<String, ApiError> {
    NaiveDate::parse_from_str(birthday, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| ApiError::validation("birthday must be a date in YYYY-MM-DD format"))
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` meaning midnight UTC.
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ApiError::validation(format!("{field} must be an ISO 8601 date or timestamp")))
}

pub fn validate_avatar_url(url: &str) -> Result<String, ApiError> {
    let parsed = url::Url::parse(url).map_err(|_| ApiError::validation("avatarUrl is not a URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::validation("avatarUrl must be an http(s) URL"));
    }
    Ok(parsed.to_string())
}

pub fn validate_page(params: PageParams) -> Result<PageRequest, ApiError> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    if page == 0 {
        return Err(ApiError::validation("page must be a positive integer"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {limit}. Limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    Ok(PageRequest { page, limit })
}

pub fn validate_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

pub fn require_text(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_utorid() {
        assert_eq!(validate_utorid("Smithj12").unwrap(), "smithj12");
        assert!(validate_utorid("abc1234").is_ok());
        assert!(validate_utorid("abc123").is_err());
        assert!(validate_utorid("abcdefghi").is_err());
        assert!(validate_utorid("abc-1234").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Jane Doe").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(51)).is_err());
        assert!(validate_name(&"x".repeat(50)).is_ok());
    }

    #[test]
    fn test_validate_email_requires_campus_domain() {
        let domain = "mail.utoronto.ca";
        assert_eq!(
            validate_email("Jane.Doe@MAIL.utoronto.ca", domain).unwrap(),
            "jane.doe@mail.utoronto.ca"
        );
        assert!(validate_email("jane@gmail.com", domain).is_err());
        assert!(validate_email("@mail.utoronto.ca", domain).is_err());
        assert!(validate_email("a b@mail.utoronto.ca", domain).is_err());
    }

    #[test]
    fn test_validate_birthday() {
        assert_eq!(validate_birthday("2000-02-29").unwrap(), "2000-02-29");
        assert!(validate_birthday("2001-02-29").is_err());
        assert!(validate_birthday("01/02/2000").is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("after", "2025-03-01T12:30:00-05:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-03-01T17:30:00+00:00");

        let day = parse_timestamp("before", "2025-03-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2025-03-01T00:00:00+00:00");

        assert!(parse_timestamp("after", "yesterday").is_err());
    }

    #[test]
    fn test_validate_page() {
        let page = validate_page(PageParams::default()).unwrap();
        assert_eq!((page.page, page.limit), (1, 10));

        assert!(validate_page(PageParams { page: Some(0), limit: None }).is_err());
        assert!(validate_page(PageParams { page: None, limit: Some(0) }).is_err());
        assert!(validate_page(PageParams { page: None, limit: Some(101) }).is_err());
        assert!(validate_page(PageParams { page: Some(3), limit: Some(100) }).is_ok());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id(1).is_ok());
        assert!(validate_id(0).is_err());
        assert!(validate_id(-1).is_err());
    }
}
