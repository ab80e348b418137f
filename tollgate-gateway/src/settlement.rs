//! The detached settlement worker.
//!
//! Consumes jobs enqueued by the middleware after responses have been
//! written. Failures become log events, never client-visible errors; there
//! is no automatic retry.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tollgate::facilitator::Facilitator;
use tollgate::gate::{LocalSettle, SettlementJob};

use crate::settler::GatewaySettler;

/// Spawns the worker draining the settlement queue.
///
/// The task ends when every [`SettlementHandle`](tollgate::gate::SettlementHandle)
/// clone has been dropped and the queue is empty.
pub fn spawn_worker<F, S>(
    mut jobs: mpsc::Receiver<SettlementJob>,
    settler: GatewaySettler<F, S>,
) -> JoinHandle<()>
where
    F: Facilitator + 'static,
    S: LocalSettle + 'static,
{
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            let key = job.key;
            match settler.settle(&job).await {
                Ok(_) => {}
                Err(guard) => {
                    tracing::warn!(proof = %key, %guard, "settlement attempt rejected");
                }
            }
        }
        tracing::info!("settlement queue drained, worker exiting");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tollgate::facilitator::RemoteVerdict;
    use tollgate::gate::SettlementHandle;
    use tollgate::proto::SettleOutcome;

    use super::*;
    use crate::settler::{SettlementLedger, SettlementState};
    use crate::testutil::{MockFacilitator, MockLocalSettle, job};

    #[tokio::test]
    async fn worker_settles_submitted_jobs() {
        let ledger = Arc::new(SettlementLedger::new());
        let facilitator = Arc::new(MockFacilitator::settling(RemoteVerdict::Definitive(
            SettleOutcome::settled("5Sig", "solana:devnet"),
        )));
        let settler = GatewaySettler::new(
            Arc::clone(&facilitator),
            Arc::new(MockLocalSettle::settled()),
            Arc::clone(&ledger),
            Duration::from_secs(5),
        );

        let (handle, rx) = SettlementHandle::channel(8);
        let worker = spawn_worker(rx, settler);

        let job = job(b"queued-proof");
        ledger.mark_verified(job.key);
        assert!(handle.submit(job.clone()));

        drop(handle);
        worker.await.unwrap();

        assert_eq!(
            ledger.state(&job.key),
            Some(SettlementState::Settled("5Sig".to_owned()))
        );
        assert_eq!(facilitator.settle_calls(), 1);
    }

    #[tokio::test]
    async fn worker_survives_rejected_jobs() {
        let ledger = Arc::new(SettlementLedger::new());
        let settler = GatewaySettler::new(
            Arc::new(MockFacilitator::settling(RemoteVerdict::Definitive(
                SettleOutcome::settled("5Sig", "solana:devnet"),
            ))),
            Arc::new(MockLocalSettle::settled()),
            Arc::clone(&ledger),
            Duration::from_secs(5),
        );

        let (handle, rx) = SettlementHandle::channel(8);
        let worker = spawn_worker(rx, settler);

        // Never verified: the worker logs the rejection and keeps going.
        let unverified = job(b"unverified-proof");
        assert!(handle.submit(unverified.clone()));

        let verified = job(b"verified-proof");
        ledger.mark_verified(verified.key);
        assert!(handle.submit(verified.clone()));

        drop(handle);
        worker.await.unwrap();

        assert_eq!(ledger.state(&unverified.key), None);
        assert!(matches!(
            ledger.state(&verified.key),
            Some(SettlementState::Settled(_))
        ));
    }
}
