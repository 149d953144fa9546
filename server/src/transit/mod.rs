pub mod emt;
pub mod types;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::database::TenantConfig;
use crate::utils::eta_minutes;
use emt::EmtClient;
use types::EmtArrivalResponse;

/// Line placeholder meaning "every line at this stop".
pub const ALL_LINES: &str = "0";

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalItem {
    pub stop: String,
    pub line: String,
    pub destination: String,
    pub eta_seconds: i64,
    pub eta_minutes: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalsResponse {
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ArrivalItem>,
}

/// Flattens stop responses into one list ordered by time to arrival.
/// Arrivals without an estimate are dropped.
pub fn collect_arrivals<I>(responses: I) -> Vec<ArrivalItem>
where
    I: IntoIterator<Item = EmtArrivalResponse>,
{
    let mut items: Vec<ArrivalItem> = responses
        .into_iter()
        .flat_map(|response| response.data)
        .flat_map(|data| data.arrive)
        .filter(|arrive| arrive.estimate_arrive >= 0)
        .map(|arrive| ArrivalItem {
            eta_minutes: eta_minutes(arrive.estimate_arrive),
            eta_seconds: arrive.estimate_arrive,
            stop: arrive.stop,
            line: arrive.line,
            destination: arrive.destination,
        })
        .collect();

    items.sort_by_key(|item| item.eta_seconds);
    items
}

#[derive(Clone)]
pub struct ArrivalsService {
    client: Arc<EmtClient>,
}

impl ArrivalsService {
    pub fn new(client: Arc<EmtClient>) -> Self {
        Self { client }
    }

    /// Queries every configured stop concurrently. Stops that fail are
    /// logged and left out.
    pub async fn get_arrivals(&self, config: &TenantConfig) -> ArrivalsResponse {
        let line = config
            .line_arrive_default
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(ALL_LINES);

        let requests = config
            .stops
            .iter()
            .map(|stop| self.client.get_arrival_bus(stop, line));
        let results = join_all(requests).await;

        let responses = config
            .stops
            .iter()
            .zip(results)
            .filter_map(|(stop, result)| match result {
                Ok(response) => Some(response),
                Err(e) => {
                    tracing::warn!(stop = %stop, line, error = %e, "EMT arrivals failed");
                    None
                }
            });

        ArrivalsResponse {
            updated_at: Utc::now(),
            items: collect_arrivals(responses),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::tenant::{ConfigDefaults, TenantService};
    use crate::database::mock::MockDatabase;
    use types::tests::arrival_body;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn parsed(stop: &str, line: &str, eta: i64) -> EmtArrivalResponse {
        serde_json::from_value(arrival_body(stop, line, "X", eta)).unwrap()
    }

    fn tenant_config(stops: &[&str], line: Option<&str>) -> TenantConfig {
        let service = TenantService::new(
            Arc::new(MockDatabase::new()),
            ConfigDefaults::from(&test_config()),
        );
        let mut config = service.default_config("tenant-1");
        config.stops = stops.iter().map(|s| s.to_string()).collect();
        config.line_arrive_default = line.map(str::to_string);
        config
    }

    #[test]
    fn test_collect_sorts_and_filters() {
        let items = collect_arrivals(vec![
            parsed("100", "10", 300),
            parsed("200", "20", 120),
            parsed("300", "30", -1),
            parsed("400", "40", 0),
        ]);

        let stops: Vec<_> = items.iter().map(|i| i.stop.as_str()).collect();
        assert_eq!(stops, vec!["400", "200", "100"]);
        assert_eq!(items[0].eta_minutes, 1);
        assert_eq!(items[1].eta_minutes, 2);
        assert_eq!(items[2].eta_minutes, 5);
    }

    #[tokio::test]
    async fn test_merges_stops_and_skips_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/transport/busemtmad/stops/100/arrives/0/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(arrival_body("100", "10", "A", 300)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/transport/busemtmad/stops/200/arrives/0/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(arrival_body("200", "20", "B", 120)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/transport/busemtmad/stops/300/arrives/0/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = test_config();
        config.emt_base_url = server.uri();
        let service = ArrivalsService::new(Arc::new(EmtClient::new(&config).unwrap()));

        let response = service
            .get_arrivals(&tenant_config(&["100", "200", "300"], Some("  ")))
            .await;
        assert_eq!(response.items.len(), 2);
        assert_eq!(response.items[0].stop, "200");
        assert_eq!(response.items[0].eta_minutes, 2);
        assert_eq!(response.items[1].stop, "100");
    }

    #[tokio::test]
    async fn test_configured_line_used() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/transport/busemtmad/stops/100/arrives/27/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(arrival_body("100", "27", "A", 61)))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config();
        config.emt_base_url = server.uri();
        let service = ArrivalsService::new(Arc::new(EmtClient::new(&config).unwrap()));

        let response = service.get_arrivals(&tenant_config(&["100"], Some("27"))).await;
        assert_eq!(response.items[0].eta_minutes, 2);
    }

    #[tokio::test]
    async fn test_no_stops_no_requests() {
        let server = MockServer::start().await;
        let mut config = test_config();
        config.emt_base_url = server.uri();
        let service = ArrivalsService::new(Arc::new(EmtClient::new(&config).unwrap()));

        let response = service.get_arrivals(&tenant_config(&[], None)).await;
        assert!(response.items.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
