//! Concurrent fan-out of one payload to every registered client

use std::time::Duration;

use bytes::Bytes;
use futures_util::future::join_all;

use crate::registry::{ClientId, ClientRegistry, SendFailure};

/// Outcome of one fan-out round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Clients whose queue accepted the payload
    pub delivered: usize,
    /// Clients that failed and were unregistered
    pub dropped: Vec<(ClientId, SendFailure)>,
}

/// Deliver `payload` to a snapshot of the registry
///
/// All sends run concurrently and each is bounded by `send_timeout`, so the
/// round takes at most about one timeout regardless of client count. Failed
/// clients are unregistered once the round completes.
pub async fn fan_out(
    registry: &ClientRegistry,
    payload: Bytes,
    send_timeout: Duration,
) -> FanoutReport {
    let members = registry.snapshot().await;
    if members.is_empty() {
        return FanoutReport::default();
    }

    let sends = members.into_iter().map(|member| {
        let payload = payload.clone();
        async move {
            let result = member.handle.deliver(payload, send_timeout).await;
            (member, result)
        }
    });

    let mut report = FanoutReport::default();
    for (member, result) in join_all(sends).await {
        match result {
            Ok(()) => report.delivered += 1,
            Err(failure) => {
                tracing::warn!(
                    client_id = %member.id,
                    peer = %member.handle.peer_addr(),
                    reason = %failure,
                    "Dropping client"
                );
                report.dropped.push((member.id, failure));
            }
        }
    }

    if !report.dropped.is_empty() {
        let ids: Vec<ClientId> = report.dropped.iter().map(|(id, _)| *id).collect();
        registry.unregister_many(&ids).await;
    }

    report
}
