use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::collab::{ApprovalRegistry, Collaborators, SubscriberRegistry};
use crate::engine::{Engine, EngineConfig};
use crate::limits::*;
use crate::occupancy::{self, OccupancySample, OccupancyTracker};
use crate::reaper;

/// Everything one database name owns.
pub struct Tenant {
    pub engine: Arc<Engine>,
    pub approvals: Arc<ApprovalRegistry>,
    pub subscribers: Arc<SubscriberRegistry>,
    pub occupancy: Arc<OccupancyTracker>,
    pub occupancy_tx: mpsc::Sender<OccupancySample>,
}

/// Manages per-tenant engines. Each tenant gets its own Engine + WAL + reaper.
/// Tenant = database name from the pgwire connection.
pub struct TenantManager {
    tenants: DashMap<String, Arc<Tenant>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    engine_config: EngineConfig,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, engine_config: EngineConfig) -> Self {
        Self {
            tenants: DashMap::new(),
            data_dir,
            compact_threshold,
            engine_config,
        }
    }

    /// Get or lazily create the tenant for a database name.
    pub fn get_or_create(&self, name: &str) -> std::io::Result<Arc<Tenant>> {
        if let Some(tenant) = self.tenants.get(name) {
            return Ok(tenant.value().clone());
        }
        if name.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        if self.tenants.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        // Keep the WAL inside data_dir
        let safe_name: String = name
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }

        // Two connections may race to create the same tenant; the entry lock
        // makes the loser reuse the winner's engine.
        let tenant = match self.tenants.entry(name.to_string()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let tenant = Arc::new(self.load(&safe_name)?);
                slot.insert(tenant.clone());
                tenant
            }
        };
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.tenants.len() as f64);
        tracing::info!("tenant {safe_name} loaded");
        Ok(tenant)
    }

    /// Replay the tenant's WAL and start its background tasks.
    fn load(&self, safe_name: &str) -> std::io::Result<Tenant> {
        let approvals = Arc::new(ApprovalRegistry::new());
        let subscribers = Arc::new(SubscriberRegistry::new());
        let collab = Collaborators::in_memory(approvals.clone(), subscribers.clone());
        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let engine = Arc::new(Engine::new(wal_path, collab, self.engine_config)?);

        tokio::spawn(reaper::run_reaper(engine.clone()));
        tokio::spawn(reaper::run_compactor(engine.clone(), self.compact_threshold));

        let tracker = Arc::new(OccupancyTracker::new());
        let (occupancy_tx, occupancy_rx) = occupancy::channel();
        tokio::spawn(occupancy::run_occupancy(tracker.clone(), occupancy_rx));

        Ok(Tenant {
            engine,
            approvals,
            subscribers,
            occupancy: tracker,
            occupancy_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::fs;
    use ulid::Ulid;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("parkslot_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manager(dir: PathBuf) -> TenantManager {
        TenantManager::new(dir, 1000, EngineConfig::default())
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let tm = manager(test_data_dir("isolation"));
        let a = tm.get_or_create("tenant_a").unwrap();
        let b = tm.get_or_create("tenant_b").unwrap();

        let mut config = FacilityConfig::new(Ulid::new());
        a.engine.create_facility(config.clone()).await.unwrap();
        config.capacity = 2;
        b.engine.create_facility(config.clone()).await.unwrap();

        assert_eq!(a.engine.list_facilities().await[0].capacity, 10);
        assert_eq!(b.engine.list_facilities().await[0].capacity, 2);

        a.approvals.approve("rex");
        assert!(!b.approvals.revoke("rex"));
    }

    #[tokio::test]
    async fn tenant_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = manager(dir.clone());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        let _tenant = tm.get_or_create("my_db").unwrap();
        assert!(dir.join("my_db.wal").exists());
    }

    #[tokio::test]
    async fn tenant_same_engine_returned() {
        let tm = manager(test_data_dir("same_eng"));
        let t1 = tm.get_or_create("foo").unwrap();
        let t2 = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&t1, &t2));
        assert!(Arc::ptr_eq(&t1.engine, &t2.engine));
    }

    #[tokio::test]
    async fn tenant_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = manager(dir.clone());
        let _tenant = tm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());
        assert!(tm.get_or_create("../..").is_err());
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let tm = manager(test_data_dir("name_too_long"));
        let err = tm
            .get_or_create(&"x".repeat(MAX_TENANT_NAME_LEN + 1))
            .err()
            .unwrap();
        assert!(err.to_string().contains("tenant name too long"));
    }

    #[tokio::test]
    async fn occupancy_feed_is_per_tenant() {
        let tm = manager(test_data_dir("occupancy"));
        let a = tm.get_or_create("a").unwrap();
        let b = tm.get_or_create("b").unwrap();
        let facility_id = Ulid::new();
        a.occupancy_tx
            .send(OccupancySample {
                facility_id,
                at: 0,
                headcount: 4,
                capacity: 10,
            })
            .await
            .unwrap();
        // the feed task drains asynchronously
        for _ in 0..50 {
            if !a.occupancy.history(facility_id).is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(a.occupancy.history(facility_id).len(), 1);
        assert!(b.occupancy.history(facility_id).is_empty());
    }
}
