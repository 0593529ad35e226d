//! Concurrent first access to the shared graph, and many analyses running
//! in parallel against one handle.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use tradegraph_agents::test_support::{CountingFactory, ScriptedInvoker};
use tradegraph_agents::{run_analysis, GraphManager, GraphStatus};
use tradegraph_models::AnalysisRequest;

const COMPANIES: [&str; 6] = ["AAPL", "MSFT", "NVDA", "TSLA", "AMZN", "GOOG"];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_builds_once() {
    let factory = Arc::new(
        CountingFactory::new(Arc::new(ScriptedInvoker::new()))
            .with_delay(Duration::from_millis(100)),
    );
    let manager = Arc::new(GraphManager::new(factory.clone()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_resource().await })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(factory.builds(), 1);
    assert!(results.iter().all(|handle| handle.ptr_eq(&results[0])));
    assert_eq!(manager.status(), GraphStatus::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_shares_one_error() {
    let factory = Arc::new(
        CountingFactory::failing("market data provider unreachable")
            .with_delay(Duration::from_millis(100)),
    );
    let manager = Arc::new(GraphManager::new(factory.clone()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_resource().await })
        })
        .collect();

    let errors: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap_err())
        .collect();

    assert_eq!(factory.builds(), 1);
    assert!(errors.iter().all(|e| *e == errors[0]));
    assert!(errors[0].message.contains("market data provider unreachable"));

    // sticky: no rebuild on later calls
    manager.get_resource().await.unwrap_err();
    assert_eq!(factory.builds(), 1);

    manager.reset().await;
    manager.get_resource().await.unwrap_err();
    assert_eq!(factory.builds(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_first_caller_leaves_construction_running() {
    let factory = Arc::new(
        CountingFactory::new(Arc::new(ScriptedInvoker::new()))
            .with_delay(Duration::from_millis(200)),
    );
    let manager = Arc::new(GraphManager::new(factory.clone()));

    let first = tokio::spawn({
        let manager = manager.clone();
        async move { manager.get_resource().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.status(), GraphStatus::Initializing);

    // client went away mid-build
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());
    assert_eq!(manager.status(), GraphStatus::Initializing);

    let second = manager.get_resource().await.unwrap();
    let third = manager.get_resource().await.unwrap();

    assert_eq!(factory.builds(), 1);
    assert!(second.ptr_eq(&third));
    assert_eq!(manager.status(), GraphStatus::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_analyses_share_one_graph() {
    let invoker = Arc::new(ScriptedInvoker::new().with_delay(Duration::from_millis(10)));
    let factory = Arc::new(CountingFactory::new(invoker.clone()));
    let manager = Arc::new(GraphManager::new(factory.clone()));
    let date = NaiveDate::from_ymd_opt(2024, 12, 19).unwrap();

    let runs = COMPANIES.map(|company| {
        let manager = manager.clone();
        tokio::spawn(async move {
            let graph = manager.get_resource().await.unwrap();
            run_analysis(
                graph.resource(),
                AnalysisRequest::new(company, date),
                None,
                Duration::from_secs(10),
            )
            .await
        })
    });

    for (joined, company) in join_all(runs).await.into_iter().zip(COMPANIES) {
        let outcome = joined.unwrap().unwrap();
        assert_eq!(outcome.company, company);
        assert_eq!(outcome.decision, "BUY");
    }

    assert_eq!(factory.builds(), 1);
    assert_eq!(invoker.calls(), 6 * 9);
}
