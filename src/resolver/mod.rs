//! The location resolution pipeline.
//!
//! [`Resolver::locate`] tries, in order: the memo, a live geocoder call, then
//! (when correction is enabled) a quick-corrected and a fully corrected
//! variant of the query, each again through memo then geocoder. Every
//! shortcut multiplies the confidence of the eventual result:
//!
//! - [`SKIP_DECAY`] when a variant is skipped because the current user agent
//!   already failed on it,
//! - [`CORRECTION_DECAY`] for each correction tier used.
//!
//! Misses confirmed by the geocoder are recorded per user agent so that later
//! rows with the same text cost no network call, and successes clear any stale
//! negative entries. A failed call (transport error, timeout, bad payload) is
//! only a miss for the current row and is not recorded.

mod row;

pub use row::{PassStats, Resolution, ResolvedRow, RESULT_COLUMNS, UNRESOLVED};

use tracing::{debug, error, info, warn};

use crate::correction::Corrector;
use crate::error::MemoResult;
use crate::geocoder::Geocoder;
use crate::memo::{format_location, osm_id, LocationRecord, Memo, OsmId};

/// Confidence multiplier for a variant skipped as known-unknown.
pub const SKIP_DECAY: f64 = 0.9;
/// Confidence multiplier for each correction tier.
pub const CORRECTION_DECAY: f64 = 0.7;

/// Switches that shape the pipeline.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub use_memo: bool,
    pub use_autocorrect: bool,
    /// Store mutations tolerated before the memo is flushed mid-pass.
    pub save_threshold: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            use_memo: true,
            use_autocorrect: false,
            save_threshold: 50,
        }
    }
}

#[derive(Debug, Clone)]
struct Found {
    id: OsmId,
    record: LocationRecord,
}

/// What a live geocoder call told us about one variant.
enum Lookup {
    Hit(Found),
    /// The provider answered and had nothing usable.
    Miss,
    /// The call itself failed; nothing is known about the name.
    Failed,
}

/// Result of trying one variant of a query.
struct Attempt {
    found: Option<Found>,
    confidence: f64,
    /// Set when no call confirmed the variant as unresolvable.
    failed: bool,
}

/// Resolves queries against the memo and a geocoder, on behalf of one user
/// agent at a time.
pub struct Resolver<G, C> {
    geocoder: G,
    corrector: C,
    memo: Memo,
    settings: ResolverSettings,
    user_agent: String,
    stats: PassStats,
}

impl<G: Geocoder, C: Corrector> Resolver<G, C> {
    pub fn new(
        geocoder: G,
        corrector: C,
        memo: Memo,
        settings: ResolverSettings,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            geocoder,
            corrector,
            memo,
            settings,
            user_agent: user_agent.into(),
            stats: PassStats::default(),
        }
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub fn into_memo(self) -> Memo {
        self.memo
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Switch to another user agent for subsequent calls.
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = user_agent.into();
    }

    pub fn stats(&self) -> PassStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = PassStats::default();
    }

    /// Flush the memo and restart mutation counting.
    pub fn save_memo(&mut self) -> MemoResult<()> {
        self.memo.save()?;
        self.memo.reset_pending();
        Ok(())
    }

    /// Resolve one query.
    pub async fn locate(&mut self, query: &str) -> ResolvedRow {
        let query = query.to_lowercase();
        debug!(query = %query, user_agent = %self.user_agent, "Starting locate attempt");

        let mut variants = vec![query.clone()];
        let mut confirmed_misses = Vec::new();
        let primary = self.attempt(&query, 1.0).await;
        if primary.found.is_none() && !primary.failed {
            confirmed_misses.push(query.clone());
        }
        let mut confidence = primary.confidence;
        let mut found = primary.found;

        if found.is_none() && self.settings.use_autocorrect {
            let quick = self.corrector.quick_correct(&query);
            if quick != query {
                confidence *= CORRECTION_DECAY;
                let attempt = self.attempt(&quick, confidence).await;
                if attempt.found.is_none() && !attempt.failed {
                    confirmed_misses.push(quick.clone());
                }
                confidence = attempt.confidence;
                found = attempt.found;
                if let Some(f) = &found {
                    info!(
                        query = %query,
                        corrected = %quick,
                        confidence,
                        "Location found with quick correction"
                    );
                    self.alias(&query, f.id, confidence);
                }
                variants.push(quick.clone());
            } else {
                debug!(query = %query, "Quick correction left the query unchanged");
            }

            if found.is_none() {
                let full = self.corrector.full_correct(&query);
                if full != query && !variants.contains(&full) {
                    confidence *= CORRECTION_DECAY;
                    let attempt = self.attempt(&full, confidence).await;
                    if attempt.found.is_none() && !attempt.failed {
                        confirmed_misses.push(full.clone());
                    }
                    confidence = attempt.confidence;
                    found = attempt.found;
                    if let Some(f) = &found {
                        info!(
                            query = %query,
                            corrected = %full,
                            confidence,
                            "Location found with full correction"
                        );
                        self.alias(&query, f.id, confidence);
                        if quick != query {
                            self.alias(&quick, f.id, confidence);
                        }
                    }
                    variants.push(full);
                } else {
                    debug!(query = %query, "Full correction produced nothing new to try");
                }
            }
        }

        match &found {
            None => {
                warn!(
                    query = %query,
                    user_agent = %self.user_agent,
                    autocorrect = self.settings.use_autocorrect,
                    unrecorded = variants.len() - confirmed_misses.len(),
                    "No location found"
                );
                self.stats.not_located += 1;
                if self.settings.use_memo {
                    for variant in &confirmed_misses {
                        self.memo.add_unknown(&self.user_agent, variant);
                    }
                }
            }
            Some(_) if self.settings.use_memo => {
                for variant in &variants {
                    self.memo.remove_unknown(variant);
                }
            }
            Some(_) => {}
        }

        self.flush_if_needed();

        ResolvedRow {
            query,
            resolution: found.map(|f| Resolution {
                id: f.id,
                record: f.record,
                confidence,
            }),
        }
    }

    /// Memo check then live geocode for one variant.
    async fn attempt(&mut self, name: &str, confidence: f64) -> Attempt {
        if self.settings.use_memo {
            if self.memo.is_unknown(name, Some(self.user_agent.as_str())) {
                debug!(
                    name = %name,
                    user_agent = %self.user_agent,
                    "Already unknown for this user agent, skipping geocoder"
                );
                return Attempt {
                    found: None,
                    confidence: confidence * SKIP_DECAY,
                    failed: false,
                };
            }
            if self.memo.is_unknown(name, None) {
                debug!(
                    name = %name,
                    user_agent = %self.user_agent,
                    "Unknown for another user agent, trying the geocoder"
                );
            } else if let Some(found) = self.memo_lookup(name) {
                self.stats.memolocated += 1;
                return Attempt {
                    found: Some(found),
                    confidence,
                    failed: false,
                };
            }
        }

        match self.geocode(name, confidence).await {
            Lookup::Hit(found) => Attempt {
                found: Some(found),
                confidence,
                failed: false,
            },
            Lookup::Miss => Attempt {
                found: None,
                confidence,
                failed: false,
            },
            Lookup::Failed => Attempt {
                found: None,
                confidence,
                failed: true,
            },
        }
    }

    fn memo_lookup(&mut self, name: &str) -> Option<Found> {
        let record = self.memo.search(name, None)?;
        let id = self.memo.alias(name)?.id;
        Some(Found { id, record })
    }

    async fn geocode(&mut self, name: &str, confidence: f64) -> Lookup {
        debug!(name = %name, user_agent = %self.user_agent, "Starting geocode");

        let raw = match self.geocoder.geocode(name, &self.user_agent).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!(name = %name, user_agent = %self.user_agent, "Geocoder has no match");
                return Lookup::Miss;
            }
            Err(e) => {
                warn!(
                    name = %name,
                    user_agent = %self.user_agent,
                    error = %e,
                    "Geocoder call failed, not recording the name as unknown"
                );
                return Lookup::Failed;
            }
        };

        let Some(id) = osm_id(&raw) else {
            warn!(name = %name, "Geocoder result has no osm_id, ignoring it");
            return Lookup::Failed;
        };

        let record = if self.settings.use_memo {
            self.memo.add(name, id, &raw, confidence)
        } else {
            format_location(&raw)
        };

        match record {
            Ok(record) => {
                self.stats.geolocated += 1;
                info!(
                    name = %name,
                    user_agent = %self.user_agent,
                    osm_id = id,
                    confidence,
                    "Location geocoded"
                );
                Lookup::Hit(Found { id, record })
            }
            Err(e) => {
                warn!(name = %name, osm_id = id, error = %e, "Unusable geocoder result");
                Lookup::Failed
            }
        }
    }

    fn alias(&mut self, name: &str, id: OsmId, confidence: f64) {
        if self.settings.use_memo {
            self.memo.add_known(name, id, confidence);
        }
    }

    fn flush_if_needed(&mut self) {
        if !self.settings.use_memo {
            return;
        }
        let pending = self.memo.pending_changes();
        if pending < self.settings.save_threshold.max(1) {
            return;
        }
        debug!(pending, "Memo save threshold reached");
        if let Err(e) = self.save_memo() {
            error!(error = %e, "Failed to save memo, continuing with in-memory state");
        }
    }
}
