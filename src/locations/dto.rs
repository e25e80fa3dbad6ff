use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
}

/// Trims surrounding whitespace; blank names are rejected.
pub fn normalize_name(raw: &str) -> Option<&str> {
    let name = raw.trim();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_rejects_blank() {
        assert_eq!(normalize_name("  Lahore Cantt "), Some("Lahore Cantt"));
        assert_eq!(normalize_name("   "), None);
        assert_eq!(normalize_name(""), None);
    }
}
