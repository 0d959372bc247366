//! Cache-then-fetch orchestration.

use std::sync::Arc;
use std::time::Duration;

use common::config::LocatorConfig;
use common::PlotRegistry;
use geometry::{bounds_of, centroid_of, polygon_area_sqm};
use overpass_client::{
    parcel_candidates_query, plot_by_ref_query, region_plots_query, OsmWay, OverpassClient,
};
use plot_cache::PlotCache;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::merge::{merge_plot, ResolvedPlot};
use crate::parcel::select_parcel;

const REGION_KEY: &str = "garden_region";

fn plot_key(number: &str) -> String {
    format!("garden_{number}")
}

/// Exact `ref` match preferred when the query returned several ways, else
/// the first element.
fn pick_plot(elements: Vec<OsmWay>, number: &str) -> Option<OsmWay> {
    if let Some(pos) = elements.iter().position(|w| w.plot_ref() == Some(number)) {
        return elements.into_iter().nth(pos);
    }
    elements.into_iter().next()
}

/// The plot resolution service.
///
/// Every operation follows the same shape: cache first, then a consent-gated
/// fetch, then a stale-cache fallback. Consumers see "found", "stale", or
/// "absent" — never a transport error. Consent not given is an expected
/// branch: the fetch path is skipped and whatever the fresh cache holds is
/// the answer.
pub struct PlotResolver {
    config: LocatorConfig,
    registry: PlotRegistry,
    client: OverpassClient,
    cache: PlotCache,
}

impl PlotResolver {
    pub fn new(config: LocatorConfig, registry: PlotRegistry) -> Self {
        let client = OverpassClient::new(config.endpoints.clone(), config.retry.clone());
        let cache = PlotCache::new(
            config.cache.dir.clone(),
            config.cache.prefix.clone(),
            Duration::from_secs(config.cache.default_ttl_secs),
        );
        Self::with_parts(config, registry, client, cache)
    }

    /// Assemble from pre-built parts; the seam tests use to inject a
    /// scripted transport and a temp-dir cache.
    pub fn with_parts(
        config: LocatorConfig,
        registry: PlotRegistry,
        client: OverpassClient,
        cache: PlotCache,
    ) -> Self {
        Self {
            config,
            registry,
            client,
            cache,
        }
    }

    pub fn registry(&self) -> &PlotRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &PlotCache {
        &self.cache
    }

    fn fetch_allowed(&self) -> bool {
        self.config.consent.map_data
    }

    /// Geometry for one plot number.
    ///
    /// Cache (skipped when `force_refresh`), then a targeted region+ref
    /// query; a successful hit is cached with the plot TTL. Any fetch
    /// failure degrades to a stale cache read.
    pub async fn find_by_number(&self, number: &str, force_refresh: bool) -> Option<OsmWay> {
        let key = plot_key(number);
        if !force_refresh {
            if let Some(way) = self.cache.get::<OsmWay>(&key) {
                debug!("cache hit for plot {}", number);
                return Some(way);
            }
        }
        if !self.fetch_allowed() {
            debug!("no map data consent, skipping fetch for plot {}", number);
            return None;
        }

        let query = plot_by_ref_query(
            &self.config.home_region,
            number,
            self.config.retry.query_timeout_secs,
        );
        match self.client.execute(&query).await {
            Ok(resp) => {
                let way = pick_plot(resp.elements, number)?;
                self.cache.set(
                    &key,
                    &way,
                    Duration::from_secs(self.config.cache.plot_ttl_secs),
                );
                Some(way)
            }
            Err(e) => {
                warn!("fetch for plot {} failed, trying stale cache: {}", number, e);
                self.cache.get_stale::<OsmWay>(&key)
            }
        }
    }

    /// Every numbered plot in the home region.
    ///
    /// An empty successful response is returned but not cached — it is more
    /// likely a partial outage than a region that genuinely lost all its
    /// plots, and must not shadow a good cache entry. Fetch failure
    /// degrades to stale cache, else an empty list.
    pub async fn load_region(&self, force_refresh: bool) -> Vec<OsmWay> {
        if !force_refresh {
            if let Some(ways) = self.cache.get::<Vec<OsmWay>>(REGION_KEY) {
                debug!("cache hit for region ({} plots)", ways.len());
                return ways;
            }
        }
        if !self.fetch_allowed() {
            debug!("no map data consent, skipping region fetch");
            return Vec::new();
        }

        let query =
            region_plots_query(&self.config.home_region, self.config.retry.query_timeout_secs);
        match self.client.execute(&query).await {
            Ok(resp) => {
                if resp.elements.is_empty() {
                    warn!("region fetch returned no plots, not caching");
                } else {
                    info!("region fetch returned {} plots", resp.elements.len());
                    self.cache.set(
                        REGION_KEY,
                        &resp.elements,
                        Duration::from_secs(self.config.cache.region_ttl_secs),
                    );
                }
                resp.elements
            }
            Err(e) => {
                warn!("region fetch failed, trying stale cache: {}", e);
                self.cache
                    .get_stale::<Vec<OsmWay>>(REGION_KEY)
                    .unwrap_or_default()
            }
        }
    }

    /// Name of the smallest sensible parcel enclosing `way`, or `None`.
    ///
    /// Parcel attribution is advisory: a failed query or an empty candidate
    /// set is `None`, never an error.
    pub async fn find_enclosing_parcel(&self, way: &OsmWay) -> Option<String> {
        if !self.fetch_allowed() {
            return None;
        }
        let centroid = centroid_of(&way.geometry)?;
        let search_box = bounds_of(&way.geometry)?
            .expanded(self.config.parcel.search_margin_deg)
            .clamped_to(&self.config.outer_region);

        let query =
            parcel_candidates_query(&search_box, self.config.retry.query_timeout_secs);
        let resp = match self.client.execute(&query).await {
            Ok(r) => r,
            Err(e) => {
                debug!("parcel candidate query failed: {}", e);
                return None;
            }
        };

        let plot_area = polygon_area_sqm(&way.geometry);
        select_parcel(
            way.id,
            centroid,
            plot_area,
            &resp.elements,
            &self.config.parcel,
        )
    }

    /// The full lookup a consumer actually wants: geometry, enclosing
    /// parcel, registry record, merged into one [`ResolvedPlot`].
    ///
    /// A failed parcel lookup degrades to the registry's parcel name.
    pub async fn resolve_plot(&self, number: &str, force_refresh: bool) -> Option<ResolvedPlot> {
        let way = self.find_by_number(number, force_refresh).await?;
        let parcel = self.find_enclosing_parcel(&way).await;
        let record = self.registry.lookup(number);
        merge_plot(&way, record, parcel.as_deref())
    }

    /// Merged views of every registry record marked available, in registry
    /// order. Plots the region geometry does not cover still appear, with
    /// derived fields absent.
    pub async fn available_plots(&self, force_refresh: bool) -> Vec<ResolvedPlot> {
        let region = self.load_region(force_refresh).await;
        self.registry
            .available_plots()
            .map(|record| {
                let way = region
                    .iter()
                    .find(|w| w.plot_ref() == Some(record.number.as_str()));
                match way {
                    Some(way) => merge_plot(way, Some(record), None)
                        .unwrap_or_else(|| ResolvedPlot::from_registry(record)),
                    None => ResolvedPlot::from_registry(record),
                }
            })
            .collect()
    }

    /// Non-blocking read for plot `number`: the current fresh-cache value
    /// immediately, plus a background refresh task.
    ///
    /// The task resolves to `Some(new_state)` only when the refresh result
    /// differs materially from what was cached (different id, different
    /// geometry or tags, or a previously present plot disappearing — the
    /// inner `None`). It resolves to `None` when nothing changed. Refresh
    /// errors are swallowed by the fetch path. Dropping the handle detaches
    /// the task; `abort()` cancels it on teardown.
    pub fn find_by_number_with_update(
        self: &Arc<Self>,
        number: &str,
    ) -> (Option<OsmWay>, JoinHandle<Option<Option<OsmWay>>>) {
        let key = plot_key(number);
        let snapshot = self.cache.get::<OsmWay>(&key);
        let prior = self.cache.get_stale::<OsmWay>(&key);
        let this = Arc::clone(self);
        let number = number.to_string();

        let handle = tokio::spawn(async move {
            let fresh = this.find_by_number(&number, false).await;
            if fresh != prior {
                debug!("background refresh changed plot {}", number);
                Some(fresh)
            } else {
                None
            }
        });
        (snapshot, handle)
    }

    /// Non-blocking region read with background refresh; see
    /// [`PlotResolver::find_by_number_with_update`].
    pub fn load_region_with_update(
        self: &Arc<Self>,
    ) -> (Vec<OsmWay>, JoinHandle<Option<Vec<OsmWay>>>) {
        let snapshot = self
            .cache
            .get::<Vec<OsmWay>>(REGION_KEY)
            .unwrap_or_default();
        let prior = self
            .cache
            .get_stale::<Vec<OsmWay>>(REGION_KEY)
            .unwrap_or_default();
        let this = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let fresh = this.load_region(false).await;
            if fresh != prior {
                debug!("background refresh changed region ({} plots)", fresh.len());
                Some(fresh)
            } else {
                None
            }
        });
        (snapshot, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::{plot_key, PlotResolver, REGION_KEY};
    use async_trait::async_trait;
    use common::config::{LocatorConfig, RetryConfig};
    use common::{Error, PlotRegistry, Result};
    use geometry::LatLon;
    use overpass_client::{OsmWay, OverpassClient, QueryTransport, TransportResponse};
    use plot_cache::PlotCache;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    const REGISTRY: &str = r#"
updated = "2026-03-01"

[[plots]]
number = "1027"
parcel = "Süd"
size_sqm = 385.0
available_from = "sofort"
valuation_cents = 412_500

[[plots]]
number = "1050"
size_sqm = 412.0
available_from = "2026-10-01"

[[plots]]
number = "1103"
size_sqm = 298.0
"#;

    /// Answers every query by matching a substring of the OverpassQL text.
    struct ScriptedTransport {
        rules: Vec<(&'static str, Result<TransportResponse>)>,
    }

    #[async_trait]
    impl QueryTransport for ScriptedTransport {
        async fn post_query(
            &self,
            _endpoint: &str,
            query: &str,
            _timeout: Duration,
        ) -> Result<TransportResponse> {
            let (_, outcome) = self
                .rules
                .iter()
                .find(|(needle, _)| query.contains(needle))
                .expect("unscripted query");
            match outcome {
                Ok(resp) => Ok(resp.clone()),
                Err(e) => Err(Error::Http(e.to_string())),
            }
        }
    }

    fn ok_body(elements: &[OsmWay]) -> Result<TransportResponse> {
        Ok(TransportResponse {
            status: 200,
            body: format!(
                r#"{{"elements": {}}}"#,
                serde_json::to_string(elements).unwrap()
            ),
        })
    }

    fn status(code: u16) -> Result<TransportResponse> {
        Ok(TransportResponse {
            status: code,
            body: String::new(),
        })
    }

    fn way(id: i64, tags: &[(&str, &str)], geometry: Vec<LatLon>) -> OsmWay {
        OsmWay {
            id,
            nodes: Vec::new(),
            geometry,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// Square ring of roughly `side_m` meters centered on (lat, lon).
    fn ring(center: LatLon, side_m: f64) -> Vec<LatLon> {
        let half_lat = side_m / 2.0 / 111_320.0;
        let half_lon = half_lat / center.lat.to_radians().cos();
        vec![
            LatLon::new(center.lat - half_lat, center.lon - half_lon),
            LatLon::new(center.lat - half_lat, center.lon + half_lon),
            LatLon::new(center.lat + half_lat, center.lon + half_lon),
            LatLon::new(center.lat + half_lat, center.lon - half_lon),
        ]
    }

    const CENTER: LatLon = LatLon { lat: 52.26, lon: 10.52 };

    fn plot_way(id: i64, number: &str) -> OsmWay {
        way(
            id,
            &[("allotments", "plot"), ("ref", number)],
            ring(CENTER, 20.0),
        )
    }

    fn make_resolver(
        dir: &tempfile::TempDir,
        rules: Vec<(&'static str, Result<TransportResponse>)>,
        consent: bool,
    ) -> (PlotResolver, PlotCache) {
        let mut config = LocatorConfig::default();
        config.consent.map_data = consent;
        config.endpoints = vec!["https://a/api/interpreter".into()];
        config.retry = RetryConfig {
            max_retries_per_server: 1,
            base_delay_ms: 1,
            first_attempt_timeout_secs: 1,
            retry_attempt_timeout_secs: 1,
            query_timeout_secs: 1,
        };

        let registry = PlotRegistry::from_toml_str(REGISTRY).unwrap();
        let client = OverpassClient::with_transport(
            config.endpoints.clone(),
            config.retry.clone(),
            Arc::new(ScriptedTransport { rules }),
        );
        let cache = PlotCache::new(dir.path(), "plotloc_", Duration::from_secs(3600));
        (
            PlotResolver::with_parts(config, registry, client, cache.clone()),
            cache,
        )
    }

    #[tokio::test]
    async fn test_find_by_number_prefers_exact_ref_match() {
        let dir = tempfile::tempdir().unwrap();
        let elements = vec![plot_way(1, "1013"), plot_way(2, "1027")];
        let (resolver, cache) = make_resolver(
            &dir,
            vec![("\"ref\"=\"1027\"", ok_body(&elements))],
            true,
        );

        let found = resolver.find_by_number("1027", false).await.unwrap();
        assert_eq!(found.id, 2);
        assert_eq!(found.plot_ref(), Some("1027"));

        // Cached for the next lookup.
        assert!(cache.get::<OsmWay>(&plot_key("1027")).is_some());

        // A 20m x 20m square merges to ~400 m².
        let record = resolver.registry().lookup("1027").cloned();
        let merged = super::merge_plot(&found, record.as_ref(), None).unwrap();
        let derived = merged.derived_area_sqm.unwrap();
        assert!(
            (derived - 400.0).abs() <= 40.0,
            "expected ~400 m², got {derived}"
        );
    }

    #[tokio::test]
    async fn test_stale_cache_survives_total_outage() {
        let dir = tempfile::tempdir().unwrap();
        let (resolver, cache) = make_resolver(&dir, vec![("", status(504))], true);

        // Expired entry: absent for fresh reads, still on disk.
        let cached = plot_way(9, "1050");
        cache.set(&plot_key("1050"), &cached, Duration::ZERO);
        assert!(cache.get::<OsmWay>(&plot_key("1050")).is_none());

        let found = resolver.find_by_number("1050", false).await;
        assert_eq!(found, Some(cached));
    }

    #[tokio::test]
    async fn test_outage_without_cache_is_absent_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let (resolver, _cache) = make_resolver(&dir, vec![("", status(504))], true);
        assert_eq!(resolver.find_by_number("1027", false).await, None);
        assert!(resolver.load_region(false).await.is_empty());
    }

    #[tokio::test]
    async fn test_consent_gate_skips_fetch_but_serves_cache() {
        let dir = tempfile::tempdir().unwrap();
        // Unscripted transport: any fetch attempt would panic the test.
        let (resolver, cache) = make_resolver(&dir, vec![], false);

        assert_eq!(resolver.find_by_number("1027", false).await, None);
        assert!(resolver.load_region(false).await.is_empty());

        let cached = plot_way(2, "1027");
        cache.set_default(&plot_key("1027"), &cached);
        assert_eq!(resolver.find_by_number("1027", false).await, Some(cached));
    }

    #[tokio::test]
    async fn test_empty_region_result_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (resolver, cache) = make_resolver(&dir, vec![("", ok_body(&[]))], true);

        assert!(resolver.load_region(false).await.is_empty());
        assert!(
            cache.get_stale::<Vec<OsmWay>>(REGION_KEY).is_none(),
            "an empty fetch must not become ground truth"
        );
    }

    #[tokio::test]
    async fn test_region_result_cached_when_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        let elements = vec![plot_way(1, "1013"), plot_way(2, "1027")];
        let (resolver, cache) = make_resolver(&dir, vec![("", ok_body(&elements))], true);

        let ways = resolver.load_region(false).await;
        assert_eq!(ways.len(), 2);
        assert_eq!(
            cache.get::<Vec<OsmWay>>(REGION_KEY).map(|w| w.len()),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_resolve_plot_attributes_parcel() {
        let dir = tempfile::tempdir().unwrap();
        let plot = plot_way(2, "1027");
        let parcel_candidates = vec![
            plot.clone(),
            way(
                3,
                &[("allotments", "yes"), ("name", "Parzelle Süd")],
                ring(CENTER, 60.0),
            ),
            way(
                4,
                &[("landuse", "allotments"), ("name", "Gartenverein")],
                ring(CENTER, 300.0),
            ),
        ];
        let (resolver, _cache) = make_resolver(
            &dir,
            vec![
                ("\"ref\"=\"1027\"", ok_body(&[plot.clone()])),
                ("leisure", ok_body(&parcel_candidates)),
            ],
            true,
        );

        let resolved = resolver.resolve_plot("1027", false).await.unwrap();
        assert_eq!(resolved.number, "1027");
        // Geometry-derived parcel beats the registry's "Süd".
        assert_eq!(resolved.parcel, "Parzelle Süd");
        assert_eq!(resolved.registry_size_sqm, Some(385.0));
        assert!(resolved.derived_area_sqm.unwrap() > 0.0);
        assert_eq!(
            resolved.availability(),
            Some(common::Availability::Immediately)
        );
    }

    #[tokio::test]
    async fn test_parcel_lookup_failure_degrades_to_registry_parcel() {
        let dir = tempfile::tempdir().unwrap();
        let plot = plot_way(2, "1027");
        let (resolver, _cache) = make_resolver(
            &dir,
            vec![
                ("\"ref\"=\"1027\"", ok_body(&[plot.clone()])),
                ("leisure", status(400)),
            ],
            true,
        );

        let resolved = resolver.resolve_plot("1027", false).await.unwrap();
        assert_eq!(resolved.parcel, "Süd");
    }

    #[tokio::test]
    async fn test_available_plots_keeps_geometryless_records() {
        let dir = tempfile::tempdir().unwrap();
        // Region covers 1027 but not 1050; 1103 is not available at all.
        let (resolver, _cache) =
            make_resolver(&dir, vec![("", ok_body(&[plot_way(2, "1027")]))], true);

        let plots = resolver.available_plots(false).await;
        let numbers: Vec<&str> = plots.iter().map(|p| p.number.as_str()).collect();
        assert_eq!(numbers, vec!["1027", "1050"]);

        assert!(plots[0].derived_area_sqm.is_some());
        assert_eq!(plots[0].way_id, Some(2));
        assert!(plots[1].derived_area_sqm.is_none());
        assert_eq!(plots[1].way_id, None);
    }

    #[tokio::test]
    async fn test_background_refresh_is_silent_when_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let cached = plot_way(2, "1027");
        let (resolver, cache) = make_resolver(
            &dir,
            vec![("\"ref\"=\"1027\"", ok_body(&[cached.clone()]))],
            true,
        );
        cache.set_default(&plot_key("1027"), &cached);

        let resolver = Arc::new(resolver);
        let (snapshot, handle) = resolver.find_by_number_with_update("1027");
        assert_eq!(snapshot, Some(cached));
        assert_eq!(handle.await.unwrap(), None, "identical data must not notify");
    }

    #[tokio::test]
    async fn test_background_refresh_notifies_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let old = plot_way(2, "1027");
        let mut new = old.clone();
        new.geometry = ring(CENTER, 22.0);

        let (resolver, cache) = make_resolver(
            &dir,
            vec![("\"ref\"=\"1027\"", ok_body(&[new.clone()]))],
            true,
        );
        // Expired snapshot forces the background task onto the fetch path.
        cache.set(&plot_key("1027"), &old, Duration::ZERO);

        let resolver = Arc::new(resolver);
        let (snapshot, handle) = resolver.find_by_number_with_update("1027");
        assert_eq!(snapshot, None, "expired entry is absent for the foreground");
        assert_eq!(handle.await.unwrap(), Some(Some(new)));
    }

    #[tokio::test]
    async fn test_region_background_refresh_detects_change() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = vec![plot_way(1, "1013"), plot_way(2, "1027")];
        let (resolver, cache) = make_resolver(&dir, vec![("", ok_body(&fresh))], true);
        cache.set(REGION_KEY, &vec![plot_way(1, "1013")], Duration::ZERO);

        let resolver = Arc::new(resolver);
        let (snapshot, handle) = resolver.load_region_with_update();
        assert!(snapshot.is_empty());
        assert_eq!(handle.await.unwrap(), Some(fresh));
    }
}
