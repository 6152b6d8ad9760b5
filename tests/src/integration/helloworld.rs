//! # Call Flows
//!
//! The basic contract: bind a name, call it, the handler sees the argument
//! exactly once.
//!
//! ```text
//! client ──call("Hello world")──► topic "helloworld"
//!                                    ├──► group "alpha" ──► one member
//!                                    └──► group "beta"  ──► one member
//! ```

#[cfg(test)]
mod tests {
    use crate::harness::{assert_quiet, next, recorder, Harness};
    use bus_rpc::DeliveryMode;
    use std::time::Duration;

    // =============================================================================
    // SINGLE PROCESS
    // =============================================================================

    #[tokio::test]
    async fn test_helloworld_delivered_exactly_once() {
        let harness = Harness::new();
        let endpoints = harness.server("workers");

        let (handler, mut rx) = recorder::<String>();
        let hello = endpoints.function("helloworld", handler).await.unwrap();

        hello.call("Hello world".to_string()).await.unwrap();

        assert_eq!(next(&mut rx).await, "Hello world");
        assert_quiet(&mut rx, Duration::from_millis(150)).await;
        assert_eq!(harness.bus.messages_published(), 1);
        assert_eq!(harness.bus.messages_delivered(), 1);
        assert_eq!(harness.bus.redeliveries(), 0);
    }

    #[tokio::test]
    async fn test_helloworld_direct() {
        let harness = Harness::new();
        let endpoints = harness.direct();

        let (handler, mut rx) = recorder::<String>();
        let hello = endpoints.function("helloworld", handler).await.unwrap();
        assert_eq!(hello.mode(), DeliveryMode::Direct);

        hello.call("Hello world".to_string()).await.unwrap();

        assert_eq!(next(&mut rx).await, "Hello world");
        assert_quiet(&mut rx, Duration::from_millis(100)).await;
        assert_eq!(harness.bus.messages_published(), 0);
    }

    // =============================================================================
    // ACROSS PROCESSES
    // =============================================================================

    #[tokio::test]
    async fn test_client_reaches_remote_function() {
        let harness = Harness::new();
        let service = harness.server("service");
        let caller = harness.client();

        let (handler, mut rx) = recorder::<u64>();
        service.function("double", handler).await.unwrap();

        let double = caller.client::<u64>("double").await.unwrap();
        assert_eq!(double.mode(), DeliveryMode::BusMediated);
        double.call(21).await.unwrap();

        assert_eq!(next(&mut rx).await, 21);
    }

    #[tokio::test]
    async fn test_group_members_share_calls() {
        let harness = Harness::new();
        let first = harness.server("workers");
        let second = harness.server("workers");
        let caller = harness.client();

        let (handler_a, mut rx_a) = recorder::<u32>();
        let (handler_b, mut rx_b) = recorder::<u32>();
        first.function("jobs", handler_a).await.unwrap();
        second.function("jobs", handler_b).await.unwrap();
        assert_eq!(harness.bus.group_members("jobs", "workers"), 2);

        let jobs = caller.client::<u32>("jobs").await.unwrap();
        for n in 0..20 {
            jobs.call(n).await.unwrap();
        }

        let mut seen = Vec::new();
        while seen.len() < 20 {
            tokio::select! {
                Some(n) = rx_a.recv() => seen.push(n),
                Some(n) = rx_b.recv() => seen.push(n),
                _ = tokio::time::sleep(crate::harness::WAIT) => panic!("calls lost: {seen:?}"),
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
        assert_quiet(&mut rx_a, Duration::from_millis(100)).await;
        assert_quiet(&mut rx_b, Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_every_group_gets_a_copy() {
        let harness = Harness::new();
        let alpha = harness.server("alpha");
        let beta = harness.server("beta");

        let (handler_a, mut rx_a) = recorder::<String>();
        let (handler_b, mut rx_b) = recorder::<String>();
        let hello = alpha.function("helloworld", handler_a).await.unwrap();
        beta.function("helloworld", handler_b).await.unwrap();

        hello.call("Hello world".to_string()).await.unwrap();

        assert_eq!(next(&mut rx_a).await, "Hello world");
        assert_eq!(next(&mut rx_b).await, "Hello world");
    }

    #[tokio::test]
    async fn test_shutdown_stops_serving() {
        let harness = Harness::new();
        let service = harness.server("service");
        let caller = harness.client();

        let (handler, mut rx) = recorder::<String>();
        service.function("helloworld", handler).await.unwrap();
        assert_eq!(service.registration_count(), 1);

        service.shutdown();
        assert_eq!(harness.bus.group_members("helloworld", "service"), 0);

        // Durable topic survives; the call is accepted but nobody serves it.
        let hello = caller.client::<String>("helloworld").await.unwrap();
        hello.call("anyone?".to_string()).await.unwrap();
        assert_quiet(&mut rx, Duration::from_millis(100)).await;
    }

    // =============================================================================
    // REGISTRATIONS
    // =============================================================================

    #[tokio::test]
    async fn test_second_consume_fails_already_connected() {
        let harness = Harness::new();
        let endpoints = harness.server("workers");
        let registration = endpoints.registration("helloworld").await.unwrap();

        let (first, _rx_first) = recorder::<String>();
        let (second, _rx_second) = recorder::<String>();
        registration
            .consume(first, bus_rpc::ConsumeOptions::new())
            .await
            .unwrap();
        let err = registration
            .consume(second, bus_rpc::ConsumeOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            bus_rpc::EndpointError::AlreadyConnected { ref topic, ref group }
                if topic == "helloworld" && group == "workers"
        ));
        assert_eq!(harness.bus.group_members("helloworld", "workers"), 1);
    }
}
