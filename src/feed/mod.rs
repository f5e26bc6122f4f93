//! Paginated reader for the billing system's fiber-client list.

pub mod json;

use crate::config::FeedConfig;
use crate::data::models::FiberClientRecord;
use crate::utils::fmt_duration;
use async_trait::async_trait;
use json::parse_json_with_context;
use serde::{Deserialize, Deserializer};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Upper bound on pages fetched in one pass, in case the feed never reports its total.
const MAX_PAGES: u32 = 10_000;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed returned HTTP {status} for page {page}")]
    Status { status: u16, page: u32 },
    #[error("malformed feed page {page}: {message}")]
    Decode { page: u32, message: String },
}

/// Source of fiber-client records.
#[async_trait]
pub trait ClientFeed: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<FiberClientRecord>, FeedError>;
}

/// One page of the feed. Field names of the billing system are accepted as aliases.
#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default, alias = "registros")]
    records: Vec<FeedRecord>,
    #[serde(default, deserialize_with = "lenient_u64")]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    mac: Option<String>,
    #[serde(default, alias = "nome", deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default)]
    geo: Option<Geo>,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    #[serde(default, alias = "endereco", deserialize_with = "lenient_string")]
    address: Option<String>,
    #[serde(default, alias = "id_caixa_ftth", deserialize_with = "lenient_string")]
    container_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geo {
    #[serde(default, alias = "lat", deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, alias = "lng", alias = "lon", deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
}

impl FeedRecord {
    /// Records without both matching keys cannot be correlated and are dropped.
    fn into_client(self) -> Option<FiberClientRecord> {
        let mac_key = self.mac?;
        let name = self.name?;
        let (geo_lat, geo_lon) = self
            .geo
            .map(|g| (g.latitude, g.longitude))
            .unwrap_or_default();
        Some(FiberClientRecord {
            mac_key,
            name,
            latitude: self.latitude.or(geo_lat),
            longitude: self.longitude.or(geo_lon),
            address: self.address,
            container_id: self.container_id,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
    Bool(bool),
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Scalar::Number(n)) if n.fract() == 0.0 && n.abs() < 1e15 => {
            Some(format!("{}", n as i64))
        }
        Some(Scalar::Number(n)) => Some(n.to_string()),
        Some(Scalar::Bool(b)) => Some(b.to_string()),
        None => None,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(lenient_string(deserializer)?.and_then(|s| s.replace(',', ".").parse().ok()))
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(lenient_string(deserializer)?.and_then(|s| s.parse().ok()))
}

/// HTTP implementation that pages with `page` / `rp` query parameters.
pub struct HttpFeed {
    http: reqwest::Client,
    config: FeedConfig,
}

impl HttpFeed {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("oltsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    async fn fetch_page(&self, page: u32) -> Result<FeedPage, FeedError> {
        let mut request = self.http.get(&self.config.url).query(&[
            ("page", page.to_string()),
            ("rp", self.config.page_size.to_string()),
        ]);
        if let Some(auth) = &self.config.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                page,
            });
        }

        let body = response.text().await?;
        trace!(page, bytes = body.len(), "received feed page");
        parse_json_with_context(&body).map_err(|message| FeedError::Decode { page, message })
    }
}

#[async_trait]
impl ClientFeed for HttpFeed {
    async fn fetch_all(&self) -> Result<Vec<FiberClientRecord>, FeedError> {
        let start = Instant::now();
        let mut clients = Vec::new();
        let mut rows_seen: u64 = 0;
        let mut dropped = 0usize;
        let mut page = 1;

        loop {
            let FeedPage { records, total } = self.fetch_page(page).await?;
            let count = records.len();
            rows_seen += count as u64;

            for record in records {
                match record.into_client() {
                    Some(client) => clients.push(client),
                    None => dropped += 1,
                }
            }
            debug!(page, count, total = ?total, "fetched feed page");

            let exhausted = count == 0
                || total.is_some_and(|t| rows_seen >= t)
                || (count as u64) < u64::from(self.config.page_size)
                || page >= MAX_PAGES;
            if exhausted {
                break;
            }
            page += 1;
        }

        info!(
            clients = clients.len(),
            dropped,
            pages = page,
            duration = fmt_duration(start.elapsed()),
            "Fetched fiber clients"
        );
        Ok(clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Query;
    use axum::routing::get;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_page_with_billing_aliases() {
        let body = r#"{
            "total": "2",
            "registros": [
                {"mac": "ALCL:B3A1C2D4", "nome": "MARIA SOUZA", "latitude": "-23,55",
                 "longitude": "-46.63", "endereco": "RUA A 10", "id_caixa_ftth": 17},
                {"mac": "", "nome": "NO MAC"}
            ]
        }"#;
        let page: FeedPage = parse_json_with_context(body).unwrap();
        assert_eq!(page.total, Some(2));

        let clients: Vec<_> = page
            .records
            .into_iter()
            .filter_map(FeedRecord::into_client)
            .collect();
        assert_eq!(
            clients,
            vec![FiberClientRecord {
                mac_key: "ALCL:B3A1C2D4".into(),
                name: "MARIA SOUZA".into(),
                latitude: Some(-23.55),
                longitude: Some(-46.63),
                address: Some("RUA A 10".into()),
                container_id: Some("17".into()),
            }]
        );
    }

    #[test]
    fn test_page_with_geo_object() {
        let body = r#"{"records": [{"mac": "X:1", "name": "N", "geo": {"lat": 1.5, "lng": -2.0},
                       "containerId": "CTO-4"}]}"#;
        let page: FeedPage = parse_json_with_context(body).unwrap();
        let client = page
            .records
            .into_iter()
            .next()
            .and_then(FeedRecord::into_client)
            .unwrap();
        assert_eq!(client.latitude, Some(1.5));
        assert_eq!(client.longitude, Some(-2.0));
        assert_eq!(client.container_id.as_deref(), Some("CTO-4"));
    }

    #[tokio::test]
    async fn test_http_feed_pages_until_total() {
        let app = Router::new().route(
            "/clients",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                let records: Vec<_> = match page {
                    1 => vec![
                        serde_json::json!({"mac": "A:1", "name": "ONE"}),
                        serde_json::json!({"mac": "A:2", "name": "TWO"}),
                    ],
                    2 => vec![serde_json::json!({"mac": "A:3", "name": "THREE"})],
                    _ => vec![],
                };
                axum::Json(serde_json::json!({"total": 3, "records": records}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let feed = HttpFeed::new(FeedConfig {
            url: format!("http://{addr}/clients"),
            authorization: None,
            page_size: 2,
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let clients = feed.fetch_all().await.unwrap();
        let names: Vec<_> = clients.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ONE", "TWO", "THREE"]);
    }

    #[tokio::test]
    async fn test_http_feed_reports_decode_errors() {
        let app = Router::new().route(
            "/clients",
            get(|| async { axum::Json(serde_json::json!({"records": {"mac": 1}})) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let feed = HttpFeed::new(FeedConfig {
            url: format!("http://{addr}/clients"),
            authorization: None,
            page_size: 10,
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = feed.fetch_all().await.unwrap_err();
        assert!(matches!(err, FeedError::Decode { page: 1, .. }), "{err}");
    }
}
