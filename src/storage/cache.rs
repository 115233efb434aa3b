use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

struct Inner<T> {
    entries: HashMap<String, T>,
    order: VecDeque<String>,
}

/// 容量固定的FIFO缓存：插入超过容量时淘汰最早写入的键。
/// 评估结果体量小但生成昂贵，按内容哈希缓存最近的若干次。
pub struct AssessmentCache<T: Clone> {
    inner: Arc<RwLock<Inner<T>>>,
    capacity: usize,
}

impl<T: Clone> AssessmentCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            })),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let inner = self.inner.read().unwrap();
        inner.entries.get(key).cloned()
    }

    pub fn set(&self, key: String, data: T) {
        let mut inner = self.inner.write().unwrap();

        // 已有键只更新值，不改变淘汰顺序
        if inner.entries.insert(key.clone(), data).is_none() {
            inner.order.push_back(key);
        }

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_cached_value() {
        let cache: AssessmentCache<String> = AssessmentCache::new(2);
        cache.set("k1".into(), "v1".into());
        assert_eq!(cache.get("k1").as_deref(), Some("v1"));
        assert_eq!(cache.get("k2"), None);
    }

    #[test]
    fn eviction_is_first_in_first_out() {
        let cache: AssessmentCache<u32> = AssessmentCache::new(2);
        cache.set("a".into(), 1);
        cache.set("b".into(), 2);
        cache.set("c".into(), 3);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn overwriting_a_key_keeps_its_position() {
        let cache: AssessmentCache<u32> = AssessmentCache::new(2);
        cache.set("a".into(), 1);
        cache.set("b".into(), 2);
        cache.set("a".into(), 10);
        cache.set("c".into(), 3);

        // "a" 仍按首次写入的顺序被淘汰
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }
}
