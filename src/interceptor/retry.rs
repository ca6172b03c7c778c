use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tracing::{debug, info, warn};

use super::{ClientHttpInterceptor, Execution};
use crate::error::{LoadBalancerError, Result};
use crate::loadbalancer::{LoadBalancerClient, service_name};
use crate::request::LoadBalancerRequestFactory;
use crate::retry::{LoadBalancedRetryFactory, Outcome, RetryState};

/// 带重试的负载均衡拦截器
///
/// 同一实例最多尝试 `max_attempts_per_instance` 次，用尽后换一个本次调用中
/// 未用过的实例，最多 `max_instances_per_call` 个。尝试严格串行。
/// 重试工厂没有为该服务提供策略时，行为与 `LoadBalancerInterceptor` 相同。
pub struct RetryLoadBalancerInterceptor {
    balancer: Arc<dyn LoadBalancerClient>,
    request_factory: LoadBalancerRequestFactory,
    retry_factory: Arc<dyn LoadBalancedRetryFactory>,
}

impl RetryLoadBalancerInterceptor {
    pub fn new(
        balancer: Arc<dyn LoadBalancerClient>,
        request_factory: LoadBalancerRequestFactory,
        retry_factory: Arc<dyn LoadBalancedRetryFactory>,
    ) -> Self {
        Self {
            balancer,
            request_factory,
            retry_factory,
        }
    }
}

#[async_trait]
impl ClientHttpInterceptor for RetryLoadBalancerInterceptor {
    async fn intercept(
        &self,
        request: Request<Bytes>,
        next: Arc<dyn Execution>,
    ) -> Result<Response<Bytes>> {
        let service_id = service_name(request.uri()).inspect_err(|err| {
            warn!(error = %err, "Rejecting request without service name");
        })?;
        let lb_request = self.request_factory.create_request(request, next);

        let Some(policy) = self.retry_factory.create_retry_policy(&service_id) else {
            debug!(service_id = %service_id, "No retry policy, executing once");
            return self.balancer.execute(&service_id, &lb_request).await;
        };
        let backoff = self.retry_factory.create_back_off_policy(&service_id);
        let retry_allowed = policy.can_retry(lb_request.method());

        let mut state = RetryState::new(service_id.as_str());
        loop {
            if state.needs_instance(policy.max_attempts_per_instance()) {
                if state.instances_tried() >= policy.max_instances_per_call() {
                    warn!(
                        service_id = %service_id,
                        attempts = state.total_attempts(),
                        instances = state.instances_tried(),
                        "Retries exhausted"
                    );
                    return Err(state.finish(LoadBalancerError::no_instance(&service_id)));
                }
                match self
                    .balancer
                    .choose_excluding(&service_id, state.excluded())
                    .await
                {
                    Ok(instance) => state.select(instance),
                    Err(err) => {
                        warn!(
                            service_id = %service_id,
                            attempts = state.total_attempts(),
                            error = %err,
                            "No further instance to try"
                        );
                        return Err(state.finish(err));
                    }
                }
            }

            if state.total_attempts() > 0 {
                let delay = backoff.backoff_duration(state.total_attempts());
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let Some(instance) = state.current().cloned() else {
                return Err(state.finish(LoadBalancerError::no_instance(&service_id)));
            };
            let outcome = self
                .balancer
                .execute_with_instance(&service_id, &instance, &lb_request)
                .await;
            state.record_attempt();

            match outcome {
                Ok(response) => {
                    if retry_allowed && policy.is_retryable(Outcome::Response(&response)) {
                        info!(
                            service_id = %service_id,
                            instance = %instance,
                            attempt = state.total_attempts(),
                            status = response.status().as_u16(),
                            "Retryable status received"
                        );
                        state.record_failure(LoadBalancerError::upstream(&service_id, response));
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    if retry_allowed && policy.is_retryable(Outcome::Error(&err)) {
                        info!(
                            service_id = %service_id,
                            instance = %instance,
                            attempt = state.total_attempts(),
                            error = %err,
                            "Retryable failure"
                        );
                        state.record_failure(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "retry_load_balancer"
    }
}
