use serde::Serialize;

/// Point-in-time view of the delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Records not yet taken by the worker. The record in flight is not counted.
    pub queue_length: usize,
    /// A delivery cycle is active.
    pub processing: bool,
}

/// Read-only queue observation for operational tooling.
pub trait StatusReporter: Send + Sync {
    fn report(&self) -> QueueStatus;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_names() {
        let status = QueueStatus {
            queue_length: 4,
            processing: true,
        };
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            serde_json::json!({ "queueLength": 4, "processing": true })
        );
    }
}
