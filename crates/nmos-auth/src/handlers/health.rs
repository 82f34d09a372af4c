//! Liveness probe.

/// Handler for GET /health
///
/// Returns "OK" while the process is running. Does not contact the
/// authorization server.
pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        assert_eq!(health_check().await, "OK");
    }
}
