//! Subgraph GraphQL client
//!
//! Peg crosses come from the bean subgraph, season statistics from the
//! beanstalk subgraph. Both are plain GraphQL POSTs over reqwest.
//!
//! Created: 2026-10-18

use super::GraphDataSource;
use crate::error::MonitorError;
use crate::types::{de_u64, CrossRecord, SeasonStats};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BEAN_SUBGRAPH_URL: &str =
    "https://api.thegraph.com/subgraphs/name/cujowolf/bean";
pub const DEFAULT_BEANSTALK_SUBGRAPH_URL: &str =
    "https://api.thegraph.com/subgraphs/name/cujowolf/beanstalk";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CROSS_FIELDS: &str = "id timestamp above";

const SEASON_FIELDS: &str = "id timestamp price weather newFarmableBeans newHarvestablePods \
     newDepositedBeans newWithdrawnBeans newDepositedLP newWithdrawnLP newPods \
     pooledEth pooledBeans lp";

#[derive(Deserialize)]
struct GraphResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Deserialize)]
struct CrossesData {
    crosses: Vec<CrossDto>,
}

#[derive(Deserialize)]
struct CrossDto {
    #[serde(deserialize_with = "de_u64")]
    id: u64,
    #[serde(deserialize_with = "de_u64")]
    timestamp: u64,
    above: bool,
}

impl From<CrossDto> for CrossRecord {
    fn from(dto: CrossDto) -> Self {
        CrossRecord {
            id: dto.id,
            timestamp: dto.timestamp,
            above: dto.above,
        }
    }
}

#[derive(Deserialize)]
struct SeasonsData {
    seasons: Vec<SeasonStats>,
}

/// Latest `count` crosses, newest first
fn crosses_query(count: u64) -> String {
    format!(
        "{{ crosses(first: {}, orderBy: timestamp, orderDirection: desc) {{ {} }} }}",
        count, CROSS_FIELDS
    )
}

/// Latest `count` seasons, newest first
fn seasons_query(count: u64) -> String {
    format!(
        "{{ seasons(first: {}, orderBy: timestamp, orderDirection: desc) {{ {} }} }}",
        count, SEASON_FIELDS
    )
}

/// GraphQL client for both subgraphs
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    http: reqwest::Client,
    bean_url: String,
    beanstalk_url: String,
}

impl SubgraphClient {
    pub fn new(bean_url: impl Into<String>, beanstalk_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            bean_url: bean_url.into(),
            beanstalk_url: beanstalk_url.into(),
        })
    }

    async fn query<T: DeserializeOwned>(&self, url: &str, query: String) -> Result<T> {
        debug!("GraphQL query to {}: {}", url, query);
        let response = self
            .http
            .post(url)
            .json(&json!({ "query": query }))
            .send()
            .await
            .with_context(|| format!("GraphQL request to {} failed", url))?
            .error_for_status()
            .map_err(|e| MonitorError::source_err(e.to_string()))?;

        let body: GraphResponse<T> = response
            .json()
            .await
            .map_err(|e| MonitorError::source_err(format!("malformed GraphQL response: {}", e)))?;
        parse_response(body)
    }

    async fn latest_crosses(&self, count: u64) -> Result<Vec<CrossRecord>> {
        let data: CrossesData = self.query(&self.bean_url, crosses_query(count)).await?;
        Ok(data.crosses.into_iter().map(CrossRecord::from).collect())
    }

    async fn latest_seasons(&self) -> Result<(SeasonStats, SeasonStats)> {
        let data: SeasonsData = self.query(&self.beanstalk_url, seasons_query(2)).await?;
        let mut seasons = data.seasons.into_iter();
        match (seasons.next(), seasons.next()) {
            (Some(current), Some(previous)) => Ok((current, previous)),
            _ => Err(MonitorError::source_err("expected two seasons from the subgraph").into()),
        }
    }
}

fn parse_response<T>(body: GraphResponse<T>) -> Result<T> {
    if let Some(first) = body.errors.first() {
        return Err(MonitorError::source_err(format!("GraphQL error: {}", first.message)).into());
    }
    body.data
        .ok_or_else(|| MonitorError::source_err("GraphQL response has no data").into())
}

#[async_trait]
impl GraphDataSource for SubgraphClient {
    async fn latest_cross(&self) -> Result<CrossRecord> {
        self.latest_crosses(1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MonitorError::source_err("no peg crosses recorded").into())
    }

    async fn crosses_since(&self, id: u64, count: u64) -> Result<Vec<CrossRecord>> {
        let mut crosses: Vec<CrossRecord> = self
            .latest_crosses(count)
            .await?
            .into_iter()
            .filter(|c| c.id > id)
            .collect();
        crosses.reverse();
        Ok(crosses)
    }

    async fn current_season_stats(&self) -> Result<SeasonStats> {
        Ok(self.latest_seasons().await?.0)
    }

    async fn previous_season_stats(&self) -> Result<SeasonStats> {
        Ok(self.latest_seasons().await?.1)
    }

    async fn seasons_stats(&self) -> Result<(SeasonStats, SeasonStats)> {
        self.latest_seasons().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crosses() {
        let raw = r#"{"data":{"crosses":[
            {"id":"12","timestamp":"1630000100","above":false},
            {"id":"11","timestamp":"1630000000","above":true}
        ]}}"#;
        let body: GraphResponse<CrossesData> = serde_json::from_str(raw).unwrap();
        let crosses: Vec<CrossRecord> = parse_response(body)
            .unwrap()
            .crosses
            .into_iter()
            .map(CrossRecord::from)
            .collect();
        assert_eq!(crosses[0], CrossRecord { id: 12, timestamp: 1_630_000_100, above: false });
        assert!(crosses[1].above);
    }

    #[test]
    fn test_graphql_errors_are_source_errors() {
        let raw = r#"{"errors":[{"message":"indexer unavailable"}]}"#;
        let body: GraphResponse<CrossesData> = serde_json::from_str(raw).unwrap();
        let err = parse_response(body).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<MonitorError>(),
            Some(MonitorError::TransientSource(msg)) if msg.contains("indexer unavailable")
        ));
    }

    #[test]
    fn test_queries() {
        assert_eq!(
            crosses_query(3),
            "{ crosses(first: 3, orderBy: timestamp, orderDirection: desc) { id timestamp above } }"
        );
        assert!(seasons_query(2).contains("newDepositedLP newWithdrawnLP"));
    }
}
