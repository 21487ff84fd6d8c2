use serde::{Deserialize, Serialize};

/// Sentinel status recorded when a request failed at the transport level
/// (connect error, timeout) and no HTTP status exists.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// One completed request, as observed by a worker. Immutable once created;
/// owned by the per-user bucket it is appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub prompt: String,
    pub status_code: u16,
    /// Wall-clock response time in seconds.
    pub response_time: f64,
    pub prompt_token_count: u64,
    pub candidates_token_count: u64,
    pub total_token_count: u64,
}

impl RequestRecord {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_exactly_200() {
        let mut rec = RequestRecord {
            prompt: "hi".into(),
            status_code: 200,
            response_time: 0.1,
            prompt_token_count: 1,
            candidates_token_count: 2,
            total_token_count: 3,
        };
        assert!(rec.is_success());

        rec.status_code = 201;
        assert!(!rec.is_success());

        rec.status_code = TRANSPORT_FAILURE_STATUS;
        assert!(!rec.is_success());
    }
}
