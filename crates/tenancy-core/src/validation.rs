//! Input validation for tenant registration
//!
//! Schema names become file names and partition identifiers, so they are held
//! to a strict character set. Lookups never go through these checks: any
//! string may be looked up and simply misses.

use crate::{DirectoryError, NewTenant, Result};

/// Maximum length for schema names (PostgreSQL identifier limit)
pub const MAX_SCHEMA_NAME_LEN: usize = 63;

/// Maximum length for display names
pub const MAX_DISPLAY_NAME_LEN: usize = 100;

/// Maximum length for font family names
pub const MAX_FONT_FAMILY_LEN: usize = 50;

/// Maximum length for domains
pub const MAX_DOMAIN_LEN: usize = 253;

/// Identifiers that can never be registered as tenants.
///
/// `public` already exists as the shared namespace; `www` is what a bare
/// `www.` host would resolve to.
pub const RESERVED_SCHEMA_NAMES: &[&str] = &["public", "www"];

/// Whether `name` is one of [`RESERVED_SCHEMA_NAMES`]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_SCHEMA_NAMES.contains(&name)
}

/// Whether `name` can never be routed to as a tenant on `base_host`
///
/// Covers the reserved words plus the base host itself and its first label,
/// which a host header can never yield as a subdomain.
pub fn is_reserved_for_host(name: &str, base_host: &str) -> bool {
    if is_reserved(name) {
        return true;
    }
    let base_host = base_host.trim();
    let label = base_host.split('.').next().unwrap_or(base_host);
    name.eq_ignore_ascii_case(base_host) || (!label.is_empty() && name.eq_ignore_ascii_case(label))
}

/// Validate a schema name for a new tenant
///
/// Requirements:
/// - Not empty
/// - <= 63 characters
/// - Lowercase ASCII letters, digits, underscore, hyphen
/// - Starts with a letter
/// - Not reserved
pub fn validate_schema_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DirectoryError::ValidationError(
            "Schema name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_SCHEMA_NAME_LEN {
        return Err(DirectoryError::ValidationError(format!(
            "Schema name too long: {} > {} characters",
            name.len(),
            MAX_SCHEMA_NAME_LEN
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(DirectoryError::ValidationError(
            "Schema name contains invalid characters (allowed: a-z, 0-9, _, -)".to_string(),
        ));
    }

    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(DirectoryError::ValidationError(
            "Schema name must start with a letter".to_string(),
        ));
    }

    if is_reserved(name) {
        return Err(DirectoryError::ReservedIdentifier(name.to_string()));
    }

    Ok(())
}

/// Validate a tenant display name
pub fn validate_display_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DirectoryError::ValidationError(
            "Tenant name cannot be empty".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(DirectoryError::ValidationError(format!(
            "Tenant name too long: > {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }

    Ok(())
}

/// Validate a domain string such as `pizza.localhost`
pub fn validate_domain(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(DirectoryError::ValidationError(
            "Domain cannot be empty".to_string(),
        ));
    }

    if domain.len() > MAX_DOMAIN_LEN {
        return Err(DirectoryError::ValidationError(format!(
            "Domain too long: {} > {} characters",
            domain.len(),
            MAX_DOMAIN_LEN
        )));
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(DirectoryError::ValidationError(
            "Domain contains invalid characters (allowed: alphanumeric, ., -)".to_string(),
        ));
    }

    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(DirectoryError::ValidationError(
            "Domain has an empty label".to_string(),
        ));
    }

    Ok(())
}

/// Validate a CSS hex color (`#RGB` or `#RRGGBB`)
pub fn validate_color(color: &str) -> Result<()> {
    let hex = color.strip_prefix('#').ok_or_else(|| {
        DirectoryError::ValidationError(format!("Color '{}' must start with '#'", color))
    })?;

    if !(hex.len() == 3 || hex.len() == 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DirectoryError::ValidationError(format!(
            "Color '{}' must be #RGB or #RRGGBB",
            color
        )));
    }

    Ok(())
}

/// Validate a font family name
pub fn validate_font_family(font: &str) -> Result<()> {
    if font.trim().is_empty() {
        return Err(DirectoryError::ValidationError(
            "Font family cannot be empty".to_string(),
        ));
    }

    if font.len() > MAX_FONT_FAMILY_LEN {
        return Err(DirectoryError::ValidationError(format!(
            "Font family too long: {} > {} characters",
            font.len(),
            MAX_FONT_FAMILY_LEN
        )));
    }

    Ok(())
}

/// Validate a logo URL (absolute http/https only)
pub fn validate_logo_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            DirectoryError::ValidationError("Logo URL must use http or https".to_string())
        })?;

    if rest.is_empty() || rest.chars().any(char::is_whitespace) {
        return Err(DirectoryError::ValidationError(
            "Logo URL is malformed".to_string(),
        ));
    }

    Ok(())
}

/// Validate every field of a registration request
pub fn validate_new_tenant(tenant: &NewTenant) -> Result<()> {
    validate_schema_name(&tenant.schema_name)?;
    validate_display_name(&tenant.name)?;
    validate_domain(&tenant.domain)?;
    validate_color(&tenant.branding.primary_color)?;
    validate_font_family(&tenant.branding.font_family)?;
    if let Some(ref url) = tenant.branding.logo_url {
        validate_logo_url(url)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Branding;

    #[test]
    fn test_valid_schema_names() {
        assert!(validate_schema_name("pizza").is_ok());
        assert!(validate_schema_name("sushi_master").is_ok());
        assert!(validate_schema_name("burger-2").is_ok());
        assert!(validate_schema_name("a").is_ok());
    }

    #[test]
    fn test_invalid_schema_names() {
        assert!(validate_schema_name("").is_err()); // Empty
        assert!(validate_schema_name(&"a".repeat(64)).is_err()); // Too long
        assert!(validate_schema_name("Pizza").is_err()); // Uppercase
        assert!(validate_schema_name("pizza place").is_err()); // Space
        assert!(validate_schema_name("2pizza").is_err()); // Leading digit
        assert!(validate_schema_name("../etc").is_err()); // Traversal
        assert!(validate_schema_name("pizza.localhost").is_err()); // Dot
    }

    #[test]
    fn test_reserved_schema_names() {
        assert!(matches!(
            validate_schema_name("public"),
            Err(DirectoryError::ReservedIdentifier(_))
        ));
        assert!(matches!(
            validate_schema_name("www"),
            Err(DirectoryError::ReservedIdentifier(_))
        ));
        assert!(is_reserved("public"));
        assert!(!is_reserved("pizza"));
    }

    #[test]
    fn test_reserved_for_host() {
        assert!(is_reserved_for_host("www", "localhost"));
        assert!(is_reserved_for_host("localhost", "localhost"));
        assert!(is_reserved_for_host("orderup", "orderup.com"));
        assert!(is_reserved_for_host("orderup", "OrderUp.com"));
        assert!(!is_reserved_for_host("pizza", "orderup.com"));
        assert!(!is_reserved_for_host("localhost", "orderup.com"));
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("pizza.localhost").is_ok());
        assert!(validate_domain("pizza.orderup.com").is_ok());
        assert!(validate_domain("localhost").is_ok());
        assert!(validate_domain("").is_err());
        assert!(validate_domain(".localhost").is_err());
        assert!(validate_domain("pizza..localhost").is_err());
        assert!(validate_domain("pizza/localhost").is_err());
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color("#e63946").is_ok());
        assert!(validate_color("#FFF").is_ok());
        assert!(validate_color("e63946").is_err()); // Missing '#'
        assert!(validate_color("#e6394").is_err()); // Wrong length
        assert!(validate_color("#zzzzzz").is_err()); // Not hex
    }

    #[test]
    fn test_validate_logo_url() {
        assert!(validate_logo_url("https://img.icons8.com/color/96/pizza.png").is_ok());
        assert!(validate_logo_url("http://cdn.local/logo.svg").is_ok());
        assert!(validate_logo_url("ftp://cdn.local/logo.svg").is_err());
        assert!(validate_logo_url("https://").is_err());
        assert!(validate_logo_url("https://cdn.local/my logo.png").is_err());
    }

    #[test]
    fn test_validate_new_tenant() {
        let ok = NewTenant::new("pizza", "Pizza Lover", "pizza.localhost").with_branding(Branding {
            primary_color: "#e63946".to_string(),
            font_family: "Roboto".to_string(),
            logo_url: Some("https://img.icons8.com/color/96/pizza.png".to_string()),
        });
        assert!(validate_new_tenant(&ok).is_ok());

        let blank_name = NewTenant::new("pizza", "   ", "pizza.localhost");
        assert!(validate_new_tenant(&blank_name).is_err());

        let mut bad_color = ok.clone();
        bad_color.branding.primary_color = "red".to_string();
        assert!(validate_new_tenant(&bad_color).is_err());
    }
}
