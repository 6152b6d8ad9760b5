//! # Retry Until Success
//!
//! A failing handler is attempted again until it succeeds, whichever
//! substrate carries the call. The caller never sees handler errors.

#[cfg(test)]
mod tests {
    use crate::harness::{assert_quiet, next, Harness, RETRY_BACKOFF, WAIT};
    use bus_rpc::{by_pointer, by_value, Argument, Delivery};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;

    /// Fails `failures` times, then forwards the argument.
    fn flaky(
        failures: u32,
        calls: Arc<Mutex<Vec<Instant>>>,
        tx: mpsc::UnboundedSender<String>,
    ) -> impl bus_rpc::Handler<String> {
        by_value(move |s: String| {
            let calls = calls.clone();
            let tx = tx.clone();
            async move {
                let attempt = {
                    let mut calls = calls.lock().unwrap();
                    calls.push(Instant::now());
                    calls.len() as u32
                };
                if attempt <= failures {
                    anyhow::bail!("attempt {attempt} rejected");
                }
                let _ = tx.send(s);
                Ok(())
            }
        })
    }

    // =============================================================================
    // DIRECT MODE
    // =============================================================================

    #[tokio::test]
    async fn test_direct_k_failures_means_k_plus_one_attempts() {
        let harness = Harness::new();
        let endpoints = harness.direct();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let callable = endpoints
            .function("flaky", flaky(3, calls.clone(), tx))
            .await
            .unwrap();

        // The call itself reports no error.
        callable.call("payload".to_string()).await.unwrap();
        assert_eq!(next(&mut rx).await, "payload");

        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= RETRY_BACKOFF);
        }
    }

    #[tokio::test]
    async fn test_direct_handle_reports_attempts() {
        let harness = Harness::new();
        let endpoints = harness.direct();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (tx, _rx) = mpsc::unbounded_channel();

        let callable = endpoints
            .function("flaky", flaky(1, calls, tx))
            .await
            .unwrap();

        let delivery = callable
            .invoke(Argument::Pointer(Box::new("boxed".to_string())))
            .await
            .unwrap();
        let Delivery::Local(handle) = delivery else {
            panic!("direct endpoints published a message");
        };
        assert_eq!(handle.name(), "flaky");
        assert_eq!(tokio::time::timeout(WAIT, handle.wait()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_direct_always_failing_handler_keeps_retrying() {
        let harness = Harness::new();
        let endpoints = harness.direct();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let callable = endpoints
            .function(
                "doomed",
                by_value(move |_: u8| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(anyhow::anyhow!("never"))
                    }
                }),
            )
            .await
            .unwrap();

        let Delivery::Local(handle) = callable.invoke(Argument::Value(0)).await.unwrap() else {
            panic!("direct endpoints published a message");
        };
        tokio::time::sleep(RETRY_BACKOFF * 5).await;

        assert!(!handle.is_finished());
        assert!(handle.attempts() >= 3);
        assert_eq!(handle.attempts(), attempts.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_pointer_handler_mutates_private_copy() {
        let harness = Harness::new();
        let endpoints = harness.direct();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let callable = endpoints
            .function(
                "append",
                by_pointer(move |mut items: Box<Vec<String>>| {
                    let tx = tx.clone();
                    async move {
                        items.push("added by handler".to_string());
                        let _ = tx.send(*items);
                        Ok(())
                    }
                }),
            )
            .await
            .unwrap();

        let original = vec!["caller".to_string()];
        callable.call_ref(&original).await.unwrap();

        let seen = next(&mut rx).await;
        assert_eq!(seen, vec!["caller", "added by handler"]);
        assert_eq!(original, vec!["caller"]);
    }

    // =============================================================================
    // BUS-MEDIATED MODE
    // =============================================================================

    #[tokio::test]
    async fn test_bus_redelivers_until_success() {
        let harness = Harness::new();
        let endpoints = harness.server("workers");
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let callable = endpoints
            .function("flaky", flaky(3, calls.clone(), tx))
            .await
            .unwrap();

        let delivery = callable
            .invoke(Argument::Value("payload".to_string()))
            .await
            .unwrap();
        assert!(matches!(delivery, Delivery::Published(_)));

        assert_eq!(next(&mut rx).await, "payload");
        assert_quiet(&mut rx, Duration::from_millis(100)).await;
        assert_eq!(calls.lock().unwrap().len(), 4);
        assert_eq!(harness.bus.redeliveries(), 3);
        assert_eq!(harness.bus.messages_delivered(), 4);
    }

    #[tokio::test]
    async fn test_bus_handler_panic_is_redelivered() {
        let mut harness = Harness::new();
        harness.config = harness.config.clone().with_concurrency(1);
        let endpoints = harness.server("workers");
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let callable = endpoints
            .function(
                "fragile",
                by_value(move |s: String| {
                    let counter = counter.clone();
                    let tx = tx.clone();
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            panic!("handler bug on first call");
                        }
                        let _ = tx.send(s);
                        Ok(())
                    }
                }),
            )
            .await
            .unwrap();

        callable.call("first".to_string()).await.unwrap();
        callable.call("second".to_string()).await.unwrap();

        let mut seen = vec![next(&mut rx).await, next(&mut rx).await];
        seen.sort();
        assert_eq!(seen, ["first", "second"]);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(harness.bus.redeliveries(), 1);
        assert_eq!(harness.bus.group_members("fragile", "workers"), 1);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_not_retried() {
        let harness = Harness::new();
        let endpoints = harness.server("workers");
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        endpoints
            .function("typed", flaky(0, calls.clone(), tx))
            .await
            .unwrap();

        // Same topic, wrong argument type.
        let wrong = harness.client().client::<u64>("typed").await.unwrap();
        wrong.call(42).await.unwrap();

        assert_quiet(&mut rx, Duration::from_millis(150)).await;
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(harness.bus.messages_delivered(), 1);
        assert_eq!(harness.bus.redeliveries(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_reaches_caller() {
        let harness = Harness::new();
        let endpoints = harness.client();

        let err = endpoints.client::<String>("bad name").await.unwrap_err();
        assert!(matches!(err, bus_rpc::EndpointError::Connection(_)));
    }
}
