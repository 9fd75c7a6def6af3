use anyhow::{Result, bail};

/// Validate a Kubernetes-style resource name.
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 63 {
        bail!("name '{}' exceeds 63 characters (got {})", name, name.len());
    }
    if name.starts_with('-') || name.ends_with('-') {
        bail!("name '{}' must not start or end with a hyphen", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "name '{}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]",
            name
        );
    }
    Ok(())
}

/// Validate a deterministic child name (`<parent>-<suffix>`). Both parts
/// must be valid on their own and the joined name must still fit the
/// 63-character cap, otherwise child creation would be rejected later with
/// a far less helpful error.
pub fn validate_child_name(parent: &str, suffix: &str) -> Result<String> {
    validate_name(parent)?;
    validate_name(suffix)?;
    let joined = format!("{}-{}", parent, suffix);
    if joined.len() > 63 {
        bail!(
            "derived name '{}' exceeds 63 characters; shorten the parent name",
            joined
        );
    }
    Ok(joined)
}
