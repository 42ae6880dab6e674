use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::trace;

use crate::error::Result;
use crate::query::parser::Parser;
use crate::query::planner::{self, QueryPlan};

pub const DEFAULT_PLAN_CACHE_CAPACITY: usize = 128;

/// Compiled plans keyed by query text.
#[derive(Debug)]
pub struct PlanCache {
    plans: LruCache<String, Arc<QueryPlan>>,
}

impl PlanCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            plans: LruCache::new(capacity),
        }
    }

    pub fn get_or_compile(&mut self, text: &str) -> Result<Arc<QueryPlan>> {
        if let Some(plan) = self.plans.get(text) {
            return Ok(Arc::clone(plan));
        }
        let plan = Arc::new(compile(text)?);
        self.plans.put(text.to_owned(), Arc::clone(&plan));
        trace!(cached = self.plans.len(), "plan_cache.insert");
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn clear(&mut self) {
        self.plans.clear();
    }
}

pub fn compile(text: &str) -> Result<QueryPlan> {
    Parser::parse(text).map(planner::plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_shares_one_plan() {
        let mut cache = PlanCache::new(4);
        let a = cache.get_or_compile("select (a) return a").unwrap();
        let b = cache.get_or_compile("select (a) return a").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn parse_failures_are_not_cached() {
        let mut cache = PlanCache::new(4);
        assert!(cache.get_or_compile("select (a return a").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn least_recent_plan_is_dropped_at_capacity() {
        let mut cache = PlanCache::new(2);
        let first = cache.get_or_compile("select (a) return a").unwrap();
        cache.get_or_compile("select (b) return b").unwrap();
        cache.get_or_compile("select (c) return c").unwrap();
        assert_eq!(cache.len(), 2);

        let again = cache.get_or_compile("select (a) return a").unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(*first, *again);
    }
}
