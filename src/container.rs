//! Process-wide service container.
//!
//! All singletons (executor pool, stores, directory gateway, PA engine,
//! scheduler) are constructed here once at startup and shut down
//! deterministically in reverse order. Components receive shared handles,
//! never module-level globals.

use {
    crate::{
        config::{Config, DbBackend},
        error::Error,
        ldap::{DirectoryGateway, LdapPool},
        pa::PaEngine,
        store::{
            create_schema, AuditLogStore, CertificateStore, CrlStore, IcaoVersionStore,
            QueryExecutor, ReconciliationStore, SqliteExecutor, SyncConfigStore, SyncStatusStore,
            VerificationStore,
        },
        sync::{DailyTasks, ReconcileOptions, ReconciliationEngine, SyncScheduler, SyncService},
    },
    std::{path::PathBuf, sync::Arc},
    tracing::{info, warn},
};

pub struct ServiceContainer {
    pub config:        Config,
    pub executor:      Arc<dyn QueryExecutor>,
    pub certificates:  CertificateStore,
    pub crls:          CrlStore,
    pub verifications: VerificationStore,
    pub sync_statuses: SyncStatusStore,
    pub recon_store:   ReconciliationStore,
    pub versions:      IcaoVersionStore,
    pub sync_config:   SyncConfigStore,
    pub audit:         AuditLogStore,
    pub gateway:       Arc<DirectoryGateway>,
    pub pa_engine:     Arc<PaEngine>,
    pub sync_service:  Arc<SyncService>,
    pub reconciler:    Arc<ReconciliationEngine>,
    scheduler:         Option<SyncScheduler>,
}

impl ServiceContainer {
    /// Build every component bottom-up: executor, schema, stores,
    /// directory gateway, engines. The scheduler is created separately by
    /// [`ServiceContainer::start_scheduler`] because not every entry point
    /// wants one.
    pub fn initialize(config: Config) -> Result<Self, Error> {
        let executor: Arc<dyn QueryExecutor> = match config.db.backend {
            DbBackend::Sqlite => {
                let path = PathBuf::from(format!("{}.db", config.db.name));
                Arc::new(
                    SqliteExecutor::open(&path, config.db.pool_max, config.db.pool_timeout)
                        .map_err(Error::Store)?,
                )
            }
            DbBackend::Postgres | DbBackend::Oracle => {
                // The SQL layer renders for these dialects, but this build
                // ships only the embedded executor.
                return Err(Error::ConfigMissing(format!(
                    "DB_TYPE={} requires an external executor; this build supports sqlite",
                    match config.db.backend {
                        DbBackend::Postgres => "postgres",
                        _ => "oracle",
                    }
                )));
            }
        };
        create_schema(executor.as_ref())?;
        info!(dialect = executor.dialect().tag(), "database schema ready");

        let certificates = CertificateStore::new(Arc::clone(&executor));
        let crls = CrlStore::new(Arc::clone(&executor));
        let verifications = VerificationStore::new(Arc::clone(&executor));
        let sync_statuses = SyncStatusStore::new(Arc::clone(&executor));
        let recon_store = ReconciliationStore::new(Arc::clone(&executor));
        let versions = IcaoVersionStore::new(Arc::clone(&executor));
        let sync_config = SyncConfigStore::new(Arc::clone(&executor));
        let audit = AuditLogStore::new(Arc::clone(&executor));

        let pool = LdapPool::new(config.ldap.clone());
        let gateway = Arc::new(DirectoryGateway::new(pool, &config.ldap.base_dn));

        let pa_engine = Arc::new(PaEngine::new(
            certificates.clone(),
            verifications.clone(),
            audit.clone(),
        ));
        let sync_service = Arc::new(SyncService::new(
            certificates.clone(),
            crls.clone(),
            sync_statuses.clone(),
            versions.clone(),
            audit.clone(),
        ));
        let reconciler = Arc::new(ReconciliationEngine::new(
            certificates.clone(),
            crls.clone(),
            recon_store.clone(),
            audit.clone(),
        ));

        Ok(Self {
            config,
            executor,
            certificates,
            crls,
            verifications,
            sync_statuses,
            recon_store,
            versions,
            sync_config,
            audit,
            gateway,
            pa_engine,
            sync_service,
            reconciler,
            scheduler: None,
        })
    }

    /// Wire the daily task callbacks and start the scheduler.
    ///
    /// Auto-reconcile only fires when the latest sync-check reported
    /// discrepancies.
    pub fn start_scheduler(&mut self) -> Result<(), Error> {
        let settings = self.sync_config.load()?;
        let batch_size = settings.max_reconcile_batch_size;

        let sync_service = Arc::clone(&self.sync_service);
        let gateway = Arc::clone(&self.gateway);
        let sync_check = Box::new(move || {
            if let Err(error) = sync_service.run_sync_check(&gateway) {
                warn!(%error, "scheduled sync check failed");
            }
        });

        let sync_service = Arc::clone(&self.sync_service);
        let gateway = Arc::clone(&self.gateway);
        let revalidate = Box::new(move || {
            if let Err(error) = sync_service.run_revalidation(&gateway, "DAILY_SYNC") {
                warn!(%error, "scheduled revalidation failed");
            }
        });

        let reconciler = Arc::clone(&self.reconciler);
        let statuses = self.sync_statuses.clone();
        let gateway = Arc::clone(&self.gateway);
        let reconcile = Box::new(move || {
            let latest = match statuses.find_latest() {
                Ok(latest) => latest,
                Err(error) => {
                    warn!(%error, "cannot read latest sync status");
                    return;
                }
            };
            let Some(latest) = latest else { return };
            if latest.total_discrepancy() == 0 {
                info!("directory in sync; auto-reconcile skipped");
                return;
            }
            let options = ReconcileOptions {
                triggered_by: "DAILY_SYNC".to_string(),
                sync_status_id: Some(latest.id.clone()),
                max_batch_size: batch_size,
                ..ReconcileOptions::default()
            };
            if let Err(error) = reconciler.reconcile(&gateway, &options) {
                warn!(%error, "scheduled reconciliation failed");
            }
        });

        let scheduler = SyncScheduler::new(settings, DailyTasks {
            sync_check,
            revalidate,
            reconcile,
        });
        scheduler.start();
        self.scheduler = Some(scheduler);
        Ok(())
    }

    pub fn scheduler(&self) -> Option<&SyncScheduler> {
        self.scheduler.as_ref()
    }

    /// Reload the persisted sync configuration into a running scheduler.
    pub fn reload_scheduler(&self) -> Result<(), Error> {
        let settings = self.sync_config.load()?;
        if let Some(scheduler) = &self.scheduler {
            scheduler.reload(settings);
        }
        Ok(())
    }

    /// Persist new sync settings, audit the change and restart the
    /// scheduler on them.
    pub fn update_sync_config(
        &self,
        settings: &crate::store::SyncConfig,
        subject: Option<&str>,
    ) -> Result<(), Error> {
        self.sync_config.save(settings)?;

        let mut audit = crate::store::AuditRecord::new("CONFIG_CHANGE");
        audit.subject = subject.map(str::to_string);
        audit.metadata = serde_json::to_value(settings).ok();
        self.audit.record(&audit);

        self.reload_scheduler()
    }

    /// Tear everything down in reverse construction order: scheduler
    /// first, then the pools drop with the container.
    pub fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        info!("service container shut down");
    }
}
