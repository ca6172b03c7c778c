//! 普通拦截器、URI 重建、请求转换器和选择并发的集成测试

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use common::{ScriptedTransport, discovery, get};
use flare_client_lb::{
    ClientBuilder, Config, DiscoveryLoadBalancerClient, LoadBalancerError, RetryConfig,
    RoundRobinStrategy, ServiceInstance, ServiceInstanceChooser, SimpleDiscoveryClient,
};
use http::{HeaderValue, Request, StatusCode};
use tower::ServiceExt;

fn plain_config() -> Config {
    Config {
        retry: RetryConfig::new().with_enabled(false),
        ..Config::default()
    }
}

#[tokio::test]
async fn test_request_is_rewritten_to_instance() {
    let transport = ScriptedTransport::ok();
    let discovery = SimpleDiscoveryClient::new();
    discovery
        .set_instances(
            "orders",
            vec![ServiceInstance::new("orders", "10.0.0.1", 8080).unwrap()],
        )
        .await
        .unwrap();

    let client = ClientBuilder::from_config(plain_config())
        .discovery(Arc::new(discovery))
        .transport(transport.clone())
        .build()
        .unwrap();

    let response = client.handle(get("http://orders/p?q=1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].uri.to_string(), "http://10.0.0.1:8080/p?q=1");
    assert_eq!(calls[0].body.as_ref(), b"payload");
}

#[tokio::test]
async fn test_secure_instance_uses_https() {
    let transport = ScriptedTransport::ok();
    let discovery = SimpleDiscoveryClient::new();
    discovery
        .set_instances(
            "billing",
            vec![ServiceInstance::new("billing", "billing.internal", 8443)
                .unwrap()
                .with_secure(true)],
        )
        .await
        .unwrap();

    let client = ClientBuilder::from_config(plain_config())
        .discovery(Arc::new(discovery))
        .transport(transport.clone())
        .build()
        .unwrap();

    client.handle(get("http://billing/invoices/7")).await.unwrap();
    assert_eq!(
        transport.calls()[0].uri.to_string(),
        "https://billing.internal:8443/invoices/7"
    );
}

#[tokio::test]
async fn test_missing_service_name_makes_no_transport_call() {
    for retry in [false, true] {
        let transport = ScriptedTransport::ok();
        let config = Config {
            retry: RetryConfig::new()
                .with_enabled(retry)
                .with_max_instances_per_call(3),
            ..Config::default()
        };
        let client = ClientBuilder::from_config(config)
            .discovery(discovery("orders", 3).await)
            .transport(transport.clone())
            .build()
            .unwrap();

        let err = client.handle(get("/orders/1")).await.unwrap_err();
        assert!(matches!(err, LoadBalancerError::MissingServiceName { .. }));
        assert!(err.is_fatal());
        assert_eq!(transport.call_count(), 0);
    }
}

#[tokio::test]
async fn test_no_instance_available_is_surfaced_without_retry() {
    let transport = ScriptedTransport::ok();
    let client = ClientBuilder::from_config(plain_config())
        .discovery(Arc::new(SimpleDiscoveryClient::new()))
        .transport(transport.clone())
        .build()
        .unwrap();

    let err = client.handle(get("http://orders/items")).await.unwrap_err();
    match err {
        LoadBalancerError::NoInstanceAvailable { service_id } => assert_eq!(service_id, "orders"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_plain_interceptor_propagates_transport_failure_once() {
    let transport = ScriptedTransport::refusing();
    let client = ClientBuilder::from_config(plain_config())
        .discovery(discovery("orders", 3).await)
        .transport(transport.clone())
        .build()
        .unwrap();

    let err = client.handle(get("http://orders/items")).await.unwrap_err();
    assert!(matches!(err, LoadBalancerError::Transport { .. }));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_transformers_run_in_registration_order() {
    let transport = ScriptedTransport::ok();
    let client = ClientBuilder::from_config(plain_config())
        .discovery(discovery("orders", 1).await)
        .transport(transport.clone())
        .transformer(Arc::new(
            |mut request: Request<Bytes>, _instance: &ServiceInstance| -> flare_client_lb::Result<Request<Bytes>> {
                request
                    .headers_mut()
                    .append("x-chain", HeaderValue::from_static("a"));
                request
                    .headers_mut()
                    .append("x-a", HeaderValue::from_static("1"));
                Ok(request)
            },
        ))
        .transformer(Arc::new(
            |mut request: Request<Bytes>, instance: &ServiceInstance| -> flare_client_lb::Result<Request<Bytes>> {
                // 能看到前一个转换器的输出
                assert!(request.headers().contains_key("x-a"));
                request
                    .headers_mut()
                    .append("x-chain", HeaderValue::from_static("b"));
                request.headers_mut().append(
                    "x-b",
                    HeaderValue::from_str(instance.host()).unwrap(),
                );
                Ok(request)
            },
        ))
        .build()
        .unwrap();

    client.handle(get("http://orders/")).await.unwrap();

    let headers = &transport.calls()[0].headers;
    let chain: Vec<_> = headers.get_all("x-chain").iter().collect();
    assert_eq!(chain, vec!["a", "b"]);
    assert_eq!(headers.get_all("x-a").iter().count(), 1);
    assert_eq!(headers.get_all("x-b").iter().count(), 1);
    assert_eq!(headers["x-b"], "10.0.0.1");
}

#[tokio::test]
async fn test_instance_headers_from_config() {
    let transport = ScriptedTransport::ok();
    let config = Config::from_toml_str(
        r#"
        [load_balancer]
        instance_id_header = true
        forward_metadata = ["zone"]

        [retry]
        enabled = false

        [[services]]
        service_id = "orders"

        [[services.instances]]
        instance_id = "orders-a"
        host = "10.0.0.7"
        port = 9000
        metadata = { zone = "cn-beijing-a" }
        "#,
    )
    .unwrap();

    let client = ClientBuilder::from_config(config)
        .transport(transport.clone())
        .build()
        .unwrap();
    client.handle(get("http://orders/")).await.unwrap();

    let call = &transport.calls()[0];
    assert_eq!(call.uri.to_string(), "http://10.0.0.7:9000/");
    assert_eq!(call.headers["x-lb-instance-id"], "orders-a");
    assert_eq!(call.headers["x-lb-meta-zone"], "cn-beijing-a");
}

#[tokio::test]
async fn test_round_robin_across_calls() {
    let transport = ScriptedTransport::ok();
    let client = ClientBuilder::from_config(plain_config())
        .discovery(discovery("orders", 3).await)
        .transport(transport.clone())
        .build()
        .unwrap();

    for _ in 0..6 {
        client.handle(get("http://orders/")).await.unwrap();
    }
    assert_eq!(
        transport.authorities(),
        vec![
            "10.0.0.1:8080",
            "10.0.0.2:8080",
            "10.0.0.3:8080",
            "10.0.0.1:8080",
            "10.0.0.2:8080",
            "10.0.0.3:8080",
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_round_robin_choose() {
    const INSTANCES: usize = 8;
    const CALLS: usize = 800;

    let balancer = Arc::new(DiscoveryLoadBalancerClient::new(
        discovery("orders", INSTANCES).await,
        Arc::new(RoundRobinStrategy::new()),
    ));

    let mut handles = Vec::with_capacity(CALLS);
    for _ in 0..CALLS {
        let balancer = balancer.clone();
        handles.push(tokio::spawn(async move {
            balancer.choose("orders").await.unwrap().key()
        }));
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        *counts.entry(handle.await.unwrap()).or_insert(0) += 1;
    }

    assert_eq!(counts.len(), INSTANCES);
    assert_eq!(counts.values().sum::<usize>(), CALLS);
    assert!(counts.values().all(|count| *count == CALLS / INSTANCES));
}

#[tokio::test]
async fn test_tower_service_adapter() {
    let transport = ScriptedTransport::ok();
    let client = ClientBuilder::from_config(plain_config())
        .discovery(discovery("orders", 1).await)
        .transport(transport.clone())
        .with_attempt_logging(true)
        .build()
        .unwrap();
    assert_eq!(client.interceptor_names(), vec!["load_balancer", "logging"]);

    let response = client.oneshot(get("http://orders/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(transport.calls()[0].uri.path(), "/health");
}
