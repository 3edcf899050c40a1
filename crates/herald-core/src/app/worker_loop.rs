//! WorkerLoop - queue から 1 件ずつ取り出して配送する
//!
//! # フロー
//! 1. `MessageQueue::get()` で待つ
//! 2. Stop なら終了（以降は取り出さない）
//! 3. `DeliveryChannel::send()` で配送
//! 4. 200 以外・transport エラー・panic はログに残して次へ（retry しない）

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info};

use super::status::DeliveryCounters;
use crate::domain::Envelope;
use crate::ports::DeliveryChannel;
use crate::queue::{MessageQueue, QueueEntry};

/// Run one worker until it dequeues a stop sentinel.
///
/// A failed delivery never ends the loop; only `QueueEntry::Stop` does.
pub(crate) async fn worker_loop(
    label: String,
    queue: Arc<MessageQueue>,
    channel: Arc<dyn DeliveryChannel>,
    counters: Arc<DeliveryCounters>,
) {
    debug!(worker = %label, "worker started");

    loop {
        let envelope = match queue.get().await {
            QueueEntry::Stop => {
                info!(worker = %label, "worker was done");
                return;
            }
            QueueEntry::Envelope(envelope) => envelope,
        };

        deliver(&label, channel.as_ref(), &envelope, &counters).await;
    }
}

async fn deliver(
    label: &str,
    channel: &dyn DeliveryChannel,
    envelope: &Envelope,
    counters: &DeliveryCounters,
) {
    let result = AssertUnwindSafe(channel.send(envelope)).catch_unwind().await;

    match result {
        Ok(Ok(response)) if response.is_success() => {
            counters.record_delivered();
            debug!(worker = %label, message_id = %envelope.id(), "message delivered");
        }
        Ok(Ok(response)) => {
            counters.record_rejected();
            error!(
                worker = %label,
                message_id = %envelope.id(),
                status = response.status,
                "problem sending message, broker rejected it"
            );
        }
        Ok(Err(fault)) => {
            counters.record_faulted();
            error!(
                worker = %label,
                message_id = %envelope.id(),
                error = %fault,
                "problem sending message, transport fault"
            );
        }
        Err(panic) => {
            counters.record_faulted();
            error!(
                worker = %label,
                message_id = %envelope.id(),
                panic = %panic_message(&*panic),
                "delivery panicked"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::TransportError;
    use crate::impls::RecordingChannel;

    fn envelope(n: u64) -> Envelope {
        Envelope::build(json!({ "n": n }), ["t"]).unwrap()
    }

    async fn run(queue: Arc<MessageQueue>, channel: Arc<RecordingChannel>) -> Arc<DeliveryCounters> {
        let counters = Arc::new(DeliveryCounters::default());
        worker_loop("worker-test".into(), queue, channel, counters.clone()).await;
        counters
    }

    #[tokio::test]
    async fn delivers_in_order_until_stop() {
        let queue = Arc::new(MessageQueue::unbounded());
        for n in 0..3 {
            queue.put(envelope(n)).await.unwrap();
        }
        queue.close_with_stops(1);

        let channel = Arc::new(RecordingChannel::new());
        let counters = run(queue.clone(), channel.clone()).await;

        let seen: Vec<u64> = channel
            .sent()
            .iter()
            .map(|e| e.data()[0].payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(counters.snapshot().delivered, 3);
    }

    #[tokio::test]
    async fn returns_on_first_stop() {
        let queue = Arc::new(MessageQueue::unbounded());
        queue.put(envelope(1)).await.unwrap();
        queue.close_with_stops(2);

        let channel = Arc::new(RecordingChannel::new());
        run(queue.clone(), channel.clone()).await;

        assert_eq!(channel.attempts(), 1);
        // 2 つ目の stop は残ったまま
        assert!(queue.get().await.is_stop());
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_worker() {
        let queue = Arc::new(MessageQueue::unbounded());
        for n in 0..4 {
            queue.put(envelope(n)).await.unwrap();
        }
        queue.close_with_stops(1);

        let channel = Arc::new(RecordingChannel::new());
        channel.push_response(500, json!({}));
        channel.push_fault(TransportError::Connect("refused".into()));
        channel.push_panic("boom");

        let counters = run(queue, channel.clone()).await;

        assert_eq!(channel.attempts(), 4);
        let counts = counters.snapshot();
        assert_eq!(counts.rejected, 1);
        assert_eq!(counts.faulted, 2);
        assert_eq!(counts.delivered, 1);
    }

    #[test]
    fn panic_message_handles_both_string_kinds() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*s), "static");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*owned), "owned");

        let other: Box<dyn Any + Send> = Box::new(3_u8);
        assert_eq!(panic_message(&*other), "unknown panic");
    }
}
