use web_time::{SystemTime, UNIX_EPOCH};

pub fn make_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

/// File name offered when saving a generated image.
pub fn download_name(timestamp: i64) -> String {
    format!("peel-a-banana-{timestamp}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downloads_are_named_after_their_timestamp() {
        assert_eq!(download_name(1_700_000_000_000), "peel-a-banana-1700000000000.png");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(make_id(), make_id());
    }
}
