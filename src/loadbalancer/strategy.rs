//! 实例选择策略
//!
//! 拦截器只依赖 `SelectionStrategy` trait，不依赖具体实现。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::config::StrategyKind;
use crate::discovery::ServiceInstance;

/// 权重所在的元数据键
pub const WEIGHT_METADATA_KEY: &str = "weight";

/// 选择策略 trait
pub trait SelectionStrategy: Send + Sync {
    /// 从候选实例中选择一个，候选为空时返回 None
    fn select<'a>(
        &self,
        service_id: &str,
        instances: &'a [ServiceInstance],
    ) -> Option<&'a ServiceInstance>;

    /// 策略名称
    fn name(&self) -> &'static str;
}

/// 根据配置创建策略
pub fn strategy_for(kind: StrategyKind) -> Arc<dyn SelectionStrategy> {
    match kind {
        StrategyKind::RoundRobin => Arc::new(RoundRobinStrategy::new()),
        StrategyKind::Random => Arc::new(RandomStrategy),
        StrategyKind::WeightedRandom => Arc::new(WeightedRandomStrategy),
    }
}

/// 轮询
///
/// 每个服务一个游标，游标归策略实例所有，用原子操作推进。
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    cursors: Mutex<HashMap<String, Arc<AtomicUsize>>>,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn cursor(&self, service_id: &str) -> Arc<AtomicUsize> {
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        cursors
            .entry(service_id.to_string())
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .clone()
    }
}

impl SelectionStrategy for RoundRobinStrategy {
    fn select<'a>(
        &self,
        service_id: &str,
        instances: &'a [ServiceInstance],
    ) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let index = self.cursor(service_id).fetch_add(1, Ordering::Relaxed);
        instances.get(index % instances.len())
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

/// 随机
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomStrategy;

impl SelectionStrategy for RandomStrategy {
    fn select<'a>(
        &self,
        _service_id: &str,
        instances: &'a [ServiceInstance],
    ) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..instances.len());
        instances.get(index)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// 加权随机
///
/// 权重读取元数据 `weight`，缺失或无法解析时为 1；全部为 0 时退化为均匀随机。
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedRandomStrategy;

impl WeightedRandomStrategy {
    /// 单个权重不超过 `u32::MAX`，累加在 `u64` 上进行，不会溢出
    fn weight(instance: &ServiceInstance) -> u64 {
        instance
            .metadata()
            .get(WEIGHT_METADATA_KEY)
            .and_then(|w| w.trim().parse::<u32>().ok())
            .map_or(1, u64::from)
    }
}

impl SelectionStrategy for WeightedRandomStrategy {
    fn select<'a>(
        &self,
        service_id: &str,
        instances: &'a [ServiceInstance],
    ) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        match WeightedIndex::new(instances.iter().map(Self::weight)) {
            Ok(dist) => instances.get(dist.sample(&mut rand::thread_rng())),
            Err(_) => RandomStrategy.select(service_id, instances),
        }
    }

    fn name(&self) -> &'static str {
        "weighted_random"
    }
}
