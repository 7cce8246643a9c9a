use std::{sync::Arc, time::Duration};

use barrage::{
    BoxError, Config, Environment, Report, Reporter, ScenarioEntry, ScenarioFn, Session,
    action::{HttpAction, HttpOptions, Repeat},
    client::ReqwestClient,
    report::{JsonReporter, StdoutReporter},
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // One client for everything, connection pool included
    let client = Arc::new(ReqwestClient::new(reqwest::Client::new()));

    let browse = ScenarioFn::new("browse", |session: Session| async move {
        let session = session.run(Repeat::new(HttpAction::get("/"), 10)).await?;
        let session = session.delay(Duration::from_millis(200)).await;
        let search = HttpAction::get("/search").with_params(vec![("q".into(), "rust".into())]);
        Ok::<_, BoxError>(session.run(search).await?)
    });

    let checkout = ScenarioFn::new("checkout", |session: Session| async move {
        let order = HttpOptions::new().json(json!({ "sku": "A-1", "qty": 2 }));
        let session = match session.run(HttpAction::post("/orders", order)).await {
            Ok(session) => session,
            // keep going, just count it
            Err(e) => e.session.add_metric("failed_orders", 1u64),
        };
        Ok::<_, BoxError>(session)
    });

    let merged = Environment::builder()
        .name("shop")
        .config(
            Config::builder()
                .base_url("http://localhost:3000")
                .scenario_timeout(Duration::from_secs(30))
                .skip_metrics_in_query_params(true)
                .build(),
        )
        .scenarios(vec![
            ScenarioEntry::new(browse, Config::default()),
            ScenarioEntry::new(checkout, Config::default()),
            ScenarioEntry::new(
                ScenarioFn::new("health", |session: Session| async move {
                    Ok::<_, BoxError>(session.run(HttpAction::head("/health")).await?)
                }),
                Config::builder().scenario_timeout(Duration::from_secs(2)).build(),
            ),
        ])
        .client(client)
        .build()
        .run()
        .await?;

    let report = Report::from(&merged);
    StdoutReporter.report(&report).await?;
    JsonReporter.report(&report).await
}
