use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use super::ModelPool;
use crate::forecast::{FeatureTable, ModelLoader, ParameterAdaptor, Prediction, PredictiveModel};
use crate::{AppError, AppResult};

const SHORT: Duration = Duration::from_millis(50);

/// Adaptor handing a prepared table straight to the model
#[derive(Default)]
struct Params {
    table: FeatureTable,
}

impl ParameterAdaptor for Params {
    fn required_features(&self) -> &[String] {
        &[]
    }

    fn transform(&mut self, input: FeatureTable) -> AppResult<()> {
        self.table = input;
        Ok(())
    }

    fn parameters(&self) -> &FeatureTable {
        &self.table
    }
}

/// Tracks how many predictions run at the same time across all instances
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct Probe {
    id: usize,
    gauge: Arc<Gauge>,
    loaded_from: Option<PathBuf>,
}

impl PredictiveModel for Probe {
    fn load(&mut self, path: &Path, _loader: Option<&dyn ModelLoader>) -> AppResult<()> {
        self.loaded_from = Some(path.to_path_buf());
        Ok(())
    }

    fn predict(&self, _parameters: &dyn ParameterAdaptor) -> AppResult<Prediction> {
        Ok(Prediction::from([("instance".to_string(), self.id as f64)]))
    }
}

/// Sleeps 20ms per row; fails when the table carries a `fail` column
struct Scripted {
    gauge: Arc<Gauge>,
}

impl PredictiveModel for Scripted {
    fn load(&mut self, _path: &Path, _loader: Option<&dyn ModelLoader>) -> AppResult<()> {
        Ok(())
    }

    fn predict(&self, parameters: &dyn ParameterAdaptor) -> AppResult<Prediction> {
        let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);

        let rows = parameters.parameters().len();
        std::thread::sleep(Duration::from_millis(20 * rows as u64));

        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
        if parameters.parameters().columns().iter().any(|c| c == "fail") {
            return Err(AppError::Validation("scripted failure".to_string()));
        }
        Ok(Prediction::from([("q50".to_string(), 1.0)]))
    }
}

fn scripted_pool(size: usize) -> (ModelPool<Scripted>, Arc<Gauge>) {
    let gauge = Arc::new(Gauge::default());
    let g = gauge.clone();
    let pool = ModelPool::new(size, None, move || Scripted { gauge: g.clone() }).unwrap();
    (pool, gauge)
}

fn params(rows: usize, fail: bool) -> Params {
    let mut columns = vec!["x".to_string()];
    if fail {
        columns.push("fail".to_string());
    }
    let width = columns.len();
    let table = FeatureTable::new(columns, vec![vec![0.0.into(); width]; rows]).unwrap();
    Params { table }
}

#[test]
fn test_zero_size_rejected() {
    let result = ModelPool::new(0, None, || Scripted { gauge: Arc::default() });
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_creates_instances() {
    let (pool, _) = scripted_pool(2);
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn test_predict_returns_result_and_releases() {
    let (pool, _) = scripted_pool(1);
    let result = pool.predict(params(1, false), SHORT).await.unwrap();
    assert_eq!(result["q50"], 1.0);
    assert_eq!(pool.available(), 1);
}

#[tokio::test]
async fn test_exhausted_pool_times_out() {
    let (pool, _) = scripted_pool(2);
    let first = assert_ok!(pool.acquire(SHORT).await);
    let second = assert_ok!(pool.acquire(SHORT).await);
    assert_eq!(pool.available(), 0);

    match pool.predict(params(1, false), SHORT).await {
        Err(AppError::PoolExhausted(waited)) => assert_eq!(waited, SHORT),
        other => panic!("Expected PoolExhausted, got {:?}", other),
    }

    drop(first);
    drop(second);
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn test_waiter_served_when_instance_returned() {
    let (pool, _) = scripted_pool(1);
    let held = pool.acquire(SHORT).await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.predict(params(1, false), Duration::from_secs(2)).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!waiter.is_finished());

    drop(held);
    let result = waiter.await.unwrap();
    assert_ok!(result);
    assert_eq!(pool.available(), 1);
}

#[tokio::test]
async fn test_failed_prediction_returns_instance() {
    let (pool, _) = scripted_pool(2);

    for _ in 0..5 {
        let result = pool.predict(params(1, true), SHORT).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    assert_eq!(pool.available(), 2);
    assert_ok!(pool.predict(params(1, false), SHORT).await);
}

#[tokio::test]
async fn test_panicking_prediction_returns_instance() {
    struct Explodes;

    impl PredictiveModel for Explodes {
        fn load(&mut self, _path: &Path, _loader: Option<&dyn ModelLoader>) -> AppResult<()> {
            Ok(())
        }

        fn predict(&self, _parameters: &dyn ParameterAdaptor) -> AppResult<Prediction> {
            panic!("model blew up");
        }
    }

    let pool = ModelPool::new(1, None, || Explodes).unwrap();
    let result = pool.predict(params(1, false), SHORT).await;
    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(pool.available(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bounded_by_pool_size() {
    let (pool, gauge) = scripted_pool(3);

    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.predict(params(2, false), Duration::from_secs(5)).await })
        })
        .collect();

    for task in tasks {
        assert_ok!(task.await.unwrap());
    }

    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {} exceeded pool size", peak);
    assert!(peak >= 1);
    assert_eq!(pool.available(), 3);
}

#[tokio::test]
async fn test_load_reaches_every_instance() {
    let gauge = Arc::new(Gauge::default());
    let mut next = 0;
    let pool = ModelPool::new(3, None, || {
        next += 1;
        Probe { id: next, gauge: gauge.clone(), loaded_from: None }
    })
    .unwrap();

    // Check one instance out; load must still reach it
    let held = pool.acquire(SHORT).await.unwrap();
    pool.load(Path::new("models/quantile_forecast")).unwrap();
    drop(held);

    for instance in &pool.inner.instances {
        let probe = instance.lock();
        assert_eq!(probe.loaded_from.as_deref(), Some(Path::new("models/quantile_forecast")));
        assert!(Arc::ptr_eq(&probe.gauge, &gauge));
    }
}

#[tokio::test]
async fn test_load_error_propagates() {
    struct Broken;

    impl PredictiveModel for Broken {
        fn load(&mut self, path: &Path, _loader: Option<&dyn ModelLoader>) -> AppResult<()> {
            Err(AppError::ArtifactNotFound(path.to_path_buf()))
        }

        fn predict(&self, _parameters: &dyn ParameterAdaptor) -> AppResult<Prediction> {
            Err(AppError::ModelNotLoaded("broken".to_string()))
        }
    }

    let pool = ModelPool::new(2, None, || Broken).unwrap();
    assert_err!(pool.load(Path::new("missing")));
    assert!(matches!(
        pool.predict(params(1, false), SHORT).await,
        Err(AppError::ModelNotLoaded(_))
    ));
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn test_instances_rotate_fifo() {
    let gauge = Arc::new(Gauge::default());
    let mut next = 0;
    let pool = ModelPool::new(2, None, || {
        next += 1;
        Probe { id: next, gauge: gauge.clone(), loaded_from: None }
    })
    .unwrap();

    let mut seen = Vec::new();
    for _ in 0..4 {
        let result = pool.predict(Params::default(), SHORT).await.unwrap();
        seen.push(result["instance"] as usize);
    }
    assert_eq!(seen, vec![1, 2, 1, 2]);
}

#[tokio::test]
async fn test_waiters_served_in_arrival_order() {
    let (pool, _) = scripted_pool(1);
    let held = pool.acquire(SHORT).await.unwrap();
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut waiters = Vec::new();
    for id in 0..4 {
        let pool = pool.clone();
        let order = order.clone();
        waiters.push(tokio::spawn(async move {
            let instance = pool.acquire(Duration::from_secs(2)).await?;
            order.lock().push(id);
            drop(instance);
            Ok::<_, AppError>(())
        }));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(order.lock().is_empty());
    drop(held);

    for waiter in waiters {
        assert_ok!(waiter.await.unwrap());
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    assert_eq!(pool.available(), 1);
}
