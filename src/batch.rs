//! Batch driver: runs the resolver over every input row once per user agent.
//!
//! With the memo enabled, each user agent gets a full pass over the input;
//! rows settled by an earlier agent come back as memo hits, so later passes
//! only spend geocoder calls on rows still unresolved. Without the memo a
//! single pass is made with the first user agent.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::correction::Corrector;
use crate::error::{AppError, AppResult};
use crate::geocoder::Geocoder;
use crate::resolver::{PassStats, ResolvedRow, Resolver};

/// Summary of one pass over the input.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub user_agent: String,
    pub stats: PassStats,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u128,
}

/// Rows of the final pass plus a report per pass.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub rows: Vec<ResolvedRow>,
    pub passes: Vec<PassReport>,
}

/// Drives a [`Resolver`] across an ordered list of user agents.
pub struct Locator<G, C> {
    resolver: Resolver<G, C>,
    user_agents: Vec<String>,
}

impl<G: Geocoder, C: Corrector> Locator<G, C> {
    pub fn new(resolver: Resolver<G, C>, user_agents: Vec<String>) -> Self {
        Self {
            resolver,
            user_agents,
        }
    }

    pub fn resolver(&self) -> &Resolver<G, C> {
        &self.resolver
    }

    pub fn into_resolver(self) -> Resolver<G, C> {
        self.resolver
    }

    /// Resolve every query, returning one row per query in input order.
    pub async fn run(&mut self, queries: &[String]) -> AppResult<BatchOutcome> {
        let use_memo = self.resolver.settings().use_memo;
        let pass_count = if use_memo { self.user_agents.len() } else { 1 };
        let agents: Vec<String> = self.user_agents.iter().take(pass_count).cloned().collect();

        if agents.is_empty() {
            return Err(AppError::Config {
                message: "at least one user agent is required".to_string(),
            });
        }

        let mut rows = Vec::new();
        let mut passes = Vec::with_capacity(agents.len());

        for agent in agents {
            let (pass_rows, report) = self.run_pass(&agent, queries).await;
            rows = pass_rows;
            passes.push(report);

            if use_memo {
                if let Err(e) = self.resolver.save_memo() {
                    error!(error = %e, "Failed to save memo after pass");
                }
            }
        }

        Ok(BatchOutcome { rows, passes })
    }

    async fn run_pass(&mut self, agent: &str, queries: &[String]) -> (Vec<ResolvedRow>, PassReport) {
        self.resolver.set_user_agent(agent);
        self.resolver.reset_stats();

        info!(user_agent = %agent, rows = queries.len(), "Starting location searches");
        let started_at = Utc::now();
        let timer = Instant::now();

        let mut rows = Vec::with_capacity(queries.len());
        for (index, query) in queries.iter().enumerate() {
            debug!(row = index + 1, of = queries.len(), "Locating row");
            rows.push(self.resolver.locate(query).await);
        }

        let stats = self.resolver.stats();
        let elapsed_ms = timer.elapsed().as_millis();
        info!(
            user_agent = %agent,
            geolocated = stats.geolocated,
            memolocated = stats.memolocated,
            not_located = stats.not_located,
            total = stats.total(),
            elapsed_ms,
            "Finished location searches"
        );

        let report = PassReport {
            user_agent: agent.to_string(),
            stats,
            started_at,
            elapsed_ms,
        };
        (rows, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::NoCorrection;
    use crate::geocoder::MockGeocoder;
    use crate::memo::Memo;
    use crate::resolver::ResolverSettings;

    #[tokio::test]
    async fn test_run_requires_user_agent() {
        let resolver = Resolver::new(
            MockGeocoder::new(),
            NoCorrection,
            Memo::in_memory(),
            ResolverSettings::default(),
            "",
        );
        let mut locator = Locator::new(resolver, Vec::new());

        let err = locator.run(&["paris".to_string()]).await.unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[tokio::test]
    async fn test_without_memo_single_pass() {
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_geocode().times(2).returning(|_, _| Ok(None));

        let settings = ResolverSettings {
            use_memo: false,
            ..ResolverSettings::default()
        };
        let resolver = Resolver::new(geocoder, NoCorrection, Memo::in_memory(), settings, "a");
        let mut locator = Locator::new(resolver, vec!["a".to_string(), "b".to_string()]);

        let outcome = locator
            .run(&["nowhere".to_string(), "elsewhere".to_string()])
            .await
            .unwrap();

        assert_eq!(outcome.passes.len(), 1);
        assert_eq!(outcome.passes[0].user_agent, "a");
        assert_eq!(outcome.passes[0].stats.not_located, 2);
        assert_eq!(outcome.rows.len(), 2);
    }
}
