use metrics_exporter_prometheus::PrometheusHandle;
use protest_desk::config::{AppConfig, StoreBackend, StoreConfig};
use protest_desk::gateways::{InMemoryIdentityDirectory, TracingJobDispatcher};
use protest_desk::store::{seed_demo_referrer, DataStore, MemoryStore, SqliteStore, StoreError};
use protest_desk::workflows::deletion::CustomerDeletion;
use protest_desk::workflows::intake::IntakeWorkflow;
use protest_desk::workflows::protest::ProtestReviewService;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type SharedStore = dyn DataStore;
pub(crate) type Intake = IntakeWorkflow<SharedStore, InMemoryIdentityDirectory, TracingJobDispatcher>;
pub(crate) type Deletion = CustomerDeletion<SharedStore, InMemoryIdentityDirectory>;
pub(crate) type ProtestReview = ProtestReviewService<SharedStore>;

/// The workflow services over one shared store and identity directory.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) store: Arc<SharedStore>,
    pub(crate) identity: Arc<InMemoryIdentityDirectory>,
    pub(crate) intake: Arc<Intake>,
    pub(crate) deletion: Arc<Deletion>,
    pub(crate) protests: Arc<ProtestReview>,
}

impl Services {
    pub(crate) fn build(config: &AppConfig) -> Result<Self, StoreError> {
        let store = open_store(&config.store)?;
        Ok(Self::with_store(store, config))
    }

    pub(crate) fn with_store(store: Arc<SharedStore>, config: &AppConfig) -> Self {
        let identity = Arc::new(InMemoryIdentityDirectory::new());
        let intake = Arc::new(IntakeWorkflow::new(
            store.clone(),
            identity.clone(),
            Arc::new(TracingJobDispatcher),
            config.workflows.intake_settings(),
        ));
        let deletion = Arc::new(CustomerDeletion::new(
            store.clone(),
            identity.clone(),
            config.workflows.compensation,
        ));
        let protests = Arc::new(ProtestReviewService::new(
            store.clone(),
            config.workflows.billing_policy(),
        ));

        Self {
            store,
            identity,
            intake,
            deletion,
            protests,
        }
    }
}

pub(crate) fn open_store(config: &StoreConfig) -> Result<Arc<SharedStore>, StoreError> {
    let store: Arc<SharedStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open_at(&config.sqlite_path)?),
    };
    if config.seed_demo && seed_demo_referrer(store.as_ref())? {
        tracing::info!(backend = ?config.backend, "demo referrer seeded");
    }
    Ok(store)
}
