//! 重试拦截器集成测试

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{ScriptedTransport, discovery, get, request, response};
use flare_client_lb::{
    ClientBuilder, Config, ConfigRetryFactory, LoadBalancedClient, LoadBalancerError, NoRetryFactory, RetryConfig,
    TransportError, TransportErrorKind,
};
use http::{Method, StatusCode};

fn retry_config(per_instance: usize, per_call: usize) -> RetryConfig {
    RetryConfig::new()
        .with_max_attempts_per_instance(per_instance)
        .with_max_instances_per_call(per_call)
        .with_retryable_errors(vec![TransportErrorKind::Connect])
}

async fn client(
    retry: RetryConfig,
    instances: usize,
    transport: Arc<ScriptedTransport>,
) -> LoadBalancedClient {
    let config = Config {
        retry,
        ..Config::default()
    };
    ClientBuilder::from_config(config)
        .discovery(discovery("orders", instances).await)
        .transport(transport)
        .build()
        .unwrap()
}

fn per_authority(authorities: &[String]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for authority in authorities {
        *counts.entry(authority.clone()).or_insert(0) += 1;
    }
    counts
}

#[tokio::test]
async fn test_exhausts_every_instance_then_returns_last_failure() {
    let transport = ScriptedTransport::refusing();
    let client = client(retry_config(2, 3), 3, transport.clone()).await;

    let err = client.handle(get("http://orders/items")).await.unwrap_err();

    let authorities = transport.authorities();
    assert_eq!(authorities.len(), 6);
    let counts = per_authority(&authorities);
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|c| *c == 2));
    // 同一实例的两次尝试连续进行
    for pair in authorities.chunks(2) {
        assert_eq!(pair[0], pair[1]);
    }

    assert_eq!(err.transport_kind(), Some(TransportErrorKind::Connect));
    let last = authorities.last().unwrap();
    assert!(err.to_string().contains(last.as_str()), "{err}");
}

#[tokio::test]
async fn test_succeeds_on_second_instance_without_choosing_third() {
    let first_host: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let seen = first_host.clone();
    let transport = ScriptedTransport::new(move |call, _| {
        let authority = call.authority();
        let mut guard = seen.lock().unwrap();
        let first = guard.get_or_insert_with(|| authority.clone());
        if *first == authority {
            Err(TransportError::connect("connection refused"))
        } else {
            Ok(response(StatusCode::OK, "done"))
        }
    });
    let client = client(retry_config(2, 3), 3, transport.clone()).await;

    let response = client.handle(get("http://orders/items")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_ref(), b"done");

    let authorities = transport.authorities();
    assert_eq!(authorities.len(), 3);
    let counts = per_authority(&authorities);
    assert_eq!(counts.len(), 2);
    assert_eq!(authorities[0], authorities[1]);
    assert_ne!(authorities[2], authorities[0]);
}

#[tokio::test]
async fn test_terminal_failure_is_not_retried() {
    let transport = ScriptedTransport::new(|_, _| Err(TransportError::other("tls handshake")));
    let client = client(retry_config(2, 3), 3, transport.clone()).await;

    let err = client.handle(get("http://orders/items")).await.unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::Other));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_non_retryable_status_is_returned_as_success() {
    let transport = ScriptedTransport::new(|_, _| Ok(response(StatusCode::NOT_FOUND, "missing")));
    let retry = retry_config(2, 3).with_retryable_status(503);
    let client = client(retry, 3, transport.clone()).await;

    let response = client.handle(get("http://orders/items/9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_retryable_status_exhaustion_surfaces_upstream_response() {
    let transport = ScriptedTransport::new(|_, index| {
        if index == 0 {
            Ok(response(StatusCode::BAD_GATEWAY, "first"))
        } else {
            Ok(response(StatusCode::SERVICE_UNAVAILABLE, "busy"))
        }
    });
    let retry = retry_config(1, 2)
        .with_retryable_status(502)
        .with_retryable_status(503);
    let client = client(retry, 3, transport.clone()).await;

    let err = client.handle(get("http://orders/items")).await.unwrap_err();
    assert_eq!(transport.call_count(), 2);
    assert_eq!(err.upstream_status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    let response = err.into_response().unwrap();
    assert_eq!(response.body().as_ref(), b"busy");
}

#[tokio::test]
async fn test_recovers_after_retryable_status_on_same_instance() {
    let transport = ScriptedTransport::new(|_, index| {
        if index == 0 {
            Ok(response(StatusCode::SERVICE_UNAVAILABLE, "busy"))
        } else {
            Ok(response(StatusCode::OK, "ok"))
        }
    });
    let retry = retry_config(2, 1).with_retryable_status(503);
    let client = client(retry, 3, transport.clone()).await;

    let response = client.handle(get("http://orders/items")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let authorities = transport.authorities();
    assert_eq!(authorities.len(), 2);
    assert_eq!(authorities[0], authorities[1]);
}

#[tokio::test]
async fn test_pool_smaller_than_instance_budget() {
    let transport = ScriptedTransport::refusing();
    let client = client(retry_config(1, 5), 2, transport.clone()).await;

    let err = client.handle(get("http://orders/items")).await.unwrap_err();
    // 两个实例都试过后，发现中没有新实例，返回最后一次失败而不是 NoInstanceAvailable
    assert_eq!(transport.call_count(), 2);
    assert_eq!(per_authority(&transport.authorities()).len(), 2);
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::Connect));
}

#[tokio::test]
async fn test_no_instances_under_retry() {
    let transport = ScriptedTransport::ok();
    let client = client(retry_config(2, 3), 0, transport.clone()).await;

    let err = client.handle(get("http://orders/items")).await.unwrap_err();
    assert!(matches!(err, LoadBalancerError::NoInstanceAvailable { .. }));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_non_idempotent_methods_respect_switch() {
    let transport = ScriptedTransport::refusing();
    let idempotent_only = client(retry_config(2, 3), 3, transport.clone()).await;
    idempotent_only
        .handle(request(Method::POST, "http://orders/items"))
        .await
        .unwrap_err();
    assert_eq!(transport.call_count(), 1);

    let transport = ScriptedTransport::refusing();
    let retry = retry_config(2, 3).with_retry_on_all_operations(true);
    let all_operations = client(retry, 3, transport.clone()).await;
    all_operations
        .handle(request(Method::POST, "http://orders/items"))
        .await
        .unwrap_err();
    assert_eq!(transport.call_count(), 6);
    assert!(transport.calls().iter().all(|c| c.method == Method::POST));
}

#[tokio::test]
async fn test_missing_retry_policy_degrades_to_single_attempt() {
    let transport = ScriptedTransport::refusing();
    let config = Config {
        retry: retry_config(2, 3),
        ..Config::default()
    };
    let client = ClientBuilder::from_config(config)
        .discovery(discovery("orders", 3).await)
        .transport(transport.clone())
        .retry_factory(Arc::new(NoRetryFactory))
        .build()
        .unwrap();

    let err = client.handle(get("http://orders/items")).await.unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::Connect));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_explicit_factory_enables_retry() {
    let transport = ScriptedTransport::refusing();
    let config = Config {
        retry: RetryConfig::new().with_enabled(false),
        ..Config::default()
    };
    let client = ClientBuilder::from_config(config)
        .discovery(discovery("orders", 3).await)
        .transport(transport.clone())
        .retry_factory(Arc::new(ConfigRetryFactory::new(retry_config(2, 3)).unwrap()))
        .build()
        .unwrap();
    assert_eq!(client.interceptor_names(), vec!["retry_load_balancer"]);

    client.handle(get("http://orders/items")).await.unwrap_err();
    assert_eq!(transport.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_between_attempts() {
    let transport = ScriptedTransport::refusing();
    let retry = retry_config(3, 1).with_backoff(RetryConfig::fixed_backoff(Duration::from_millis(200)));
    let client = client(retry, 1, transport.clone()).await;

    let started = tokio::time::Instant::now();
    client.handle(get("http://orders/items")).await.unwrap_err();

    assert_eq!(transport.call_count(), 3);
    assert!(started.elapsed() >= Duration::from_millis(400));
}
