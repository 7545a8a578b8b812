//! Principal id masking for audit records

/// Characters of the identifier kept in clear.
pub const VISIBLE_PREFIX: usize = 4;

/// Fixed mask appended after the visible prefix.
pub const MASK: &str = "****";

/// Mask a principal identifier for storage in audit records.
///
/// Keeps the first four characters and replaces the rest with a fixed mask,
/// so the masked length never reveals the original length. For email-shaped
/// identifiers the domain is preserved: `alice.smith@example.com` becomes
/// `alic****@example.com`.
pub fn mask_principal(raw: &str) -> String {
    let raw = raw.trim();
    match raw.rsplit_once('@') {
        Some((local, domain)) if !domain.is_empty() => {
            format!("{}@{}", mask_token(local), domain)
        }
        _ => mask_token(raw),
    }
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(VISIBLE_PREFIX).collect();
    if visible.chars().count() < token.chars().count() {
        format!("{visible}{MASK}")
    } else {
        MASK.to_string()
    }
}
