//! End-to-end run: sitemaps → URL list → paced Save Page Now submissions.

use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};
use url::Url;

use sitearchiver_discovery::{DiscoveryOptions, SitemapFetcher};
use sitearchiver_shared::{
    AppConfig, Credentials, PageUrl, Result, SitemapErrorPolicy, SubmitConfig, UrlList,
    sitemap_urls,
};
use sitearchiver_submitter::{
    ArchiveSubmitter, Clock, Pacer, SubmitOutcome, TokioClock, check_interval,
};

use crate::report::report_outcome;

/// Configuration for a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Sitemaps to read, in order.
    pub sitemaps: Vec<Url>,
    /// What to do when a sitemap fails.
    pub on_sitemap_error: SitemapErrorPolicy,
    /// Sitemap fetch options.
    pub discovery: DiscoveryOptions,
    /// Submission options.
    pub submit: SubmitConfig,
}

impl RunConfig {
    /// Build a run configuration from the loaded app config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        let run_config = Self {
            sitemaps: sitemap_urls(config)?,
            on_sitemap_error: config.sitemaps.on_error,
            discovery: DiscoveryOptions::from(config),
            submit: SubmitConfig::from(config),
        };
        run_config.validate()?;
        Ok(run_config)
    }

    /// Reject settings that cannot be scheduled. Call again after overrides.
    pub fn validate(&self) -> Result<()> {
        check_interval(self.submit.interval)
    }
}

/// URLs gathered from all sitemaps.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    /// Concatenated URLs in configuration order.
    pub urls: UrlList,
    /// Number of sitemaps read successfully.
    pub sitemaps_fetched: usize,
    /// Sitemaps that failed under the skip policy (URL, error message).
    pub sitemaps_skipped: Vec<(String, String)>,
}

/// Per-outcome counts for the submission phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitTally {
    /// Requests attempted.
    pub submitted: usize,
    /// HTTP 200 with a JSON body.
    pub succeeded: usize,
    /// Non-200 responses.
    pub rejected: usize,
    /// Transport or decode failures.
    pub failed: usize,
}

impl SubmitTally {
    fn record(&mut self, outcome: &SubmitOutcome) {
        self.submitted += 1;
        match outcome {
            SubmitOutcome::Success { .. } => self.succeeded += 1,
            SubmitOutcome::Rejected { .. } => self.rejected += 1,
            SubmitOutcome::TransportFailure { .. } => self.failed += 1,
        }
    }
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Number of sitemaps read successfully.
    pub sitemaps_fetched: usize,
    /// Number of sitemaps skipped after a failure.
    pub sitemaps_skipped: usize,
    /// Length of the URL list.
    pub urls_discovered: usize,
    /// Submission counts.
    pub tally: SubmitTally,
    /// Total elapsed wall time.
    pub elapsed: Duration,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a sitemap has been read.
    fn sitemap_fetched(&self, url: &Url, count: usize);
    /// Called after each submission.
    fn page_submitted(&self, url: &PageUrl, current: usize, total: usize, outcome: &SubmitOutcome);
    /// Called when the run completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn sitemap_fetched(&self, _url: &Url, _count: usize) {}
    fn page_submitted(&self, _url: &PageUrl, _current: usize, _total: usize, _outcome: &SubmitOutcome) {}
    fn done(&self, _result: &RunResult) {}
}

/// Read every sitemap in order and concatenate their URLs.
///
/// Under [`SitemapErrorPolicy::Abort`] the first failure is returned and no
/// partial list survives. Under [`SitemapErrorPolicy::Skip`] the failure is
/// logged and the next sitemap is read.
pub async fn collect_urls(
    fetcher: &SitemapFetcher,
    sitemaps: &[Url],
    policy: SitemapErrorPolicy,
    progress: &dyn ProgressReporter,
) -> Result<Collected> {
    let mut collected = Collected::default();

    for sitemap in sitemaps {
        match fetcher.fetch_urls(sitemap).await {
            Ok(urls) => {
                progress.sitemap_fetched(sitemap, urls.len());
                collected.urls.append(urls);
                collected.sitemaps_fetched += 1;
            }
            Err(e) if policy == SitemapErrorPolicy::Skip => {
                warn!(%sitemap, error = %e, "skipping sitemap");
                collected.sitemaps_skipped.push((sitemap.to_string(), e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        sitemaps = collected.sitemaps_fetched,
        skipped = collected.sitemaps_skipped.len(),
        urls = collected.urls.len(),
        "url discovery completed"
    );

    Ok(collected)
}

/// Submit every URL in order, one paced request each.
///
/// Outcomes are logged and counted; nothing here can fail the run.
pub async fn submit_all<C: Clock>(
    submitter: &ArchiveSubmitter,
    urls: &UrlList,
    pacer: &mut Pacer<C>,
    progress: &dyn ProgressReporter,
) -> SubmitTally {
    let mut tally = SubmitTally::default();
    let total = urls.len();

    for (i, url) in urls.iter().enumerate() {
        pacer.wait().await;
        let outcome = submitter.submit(url).await;
        report_outcome(url, &outcome);
        tally.record(&outcome);
        progress.page_submitted(url, i + 1, total, &outcome);
    }

    tally
}

/// Discover URLs only, without submitting anything.
pub async fn discover(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<Collected> {
    progress.phase("Reading sitemaps");
    let fetcher = SitemapFetcher::new(&config.discovery)?;
    collect_urls(&fetcher, &config.sitemaps, config.on_sitemap_error, progress).await
}

/// Run the full pipeline on wall-clock time.
pub async fn run(
    config: &RunConfig,
    credentials: &Credentials,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    run_with_clock(config, credentials, progress, TokioClock).await
}

/// Run the full pipeline, pacing submissions with `clock`.
///
/// 1. Discovery: read each sitemap (fatal under the abort policy)
/// 2. Submission: one paced capture request per URL (never fatal)
#[instrument(skip_all, fields(sitemaps = config.sitemaps.len()))]
pub async fn run_with_clock<C: Clock>(
    config: &RunConfig,
    credentials: &Credentials,
    progress: &dyn ProgressReporter,
    clock: C,
) -> Result<RunResult> {
    let start = Instant::now();
    info!(
        interval_secs = config.submit.interval.as_secs_f64(),
        endpoint = %config.submit.endpoint,
        "starting archive run"
    );

    // Build the submitter before any network I/O so a bad endpoint fails fast.
    config.validate()?;
    let submitter = ArchiveSubmitter::new(&config.submit, credentials)?;

    // --- Phase 1: Discovery ---
    let collected = discover(config, progress).await?;

    // --- Phase 2: Submission ---
    progress.phase("Submitting pages");
    let mut pacer = Pacer::new(clock, config.submit.interval)?;
    let tally = submit_all(&submitter, &collected.urls, &mut pacer, progress).await;

    let result = RunResult {
        sitemaps_fetched: collected.sitemaps_fetched,
        sitemaps_skipped: collected.sitemaps_skipped.len(),
        urls_discovered: collected.urls.len(),
        tally,
        elapsed: start.elapsed(),
    };

    info!(
        urls = result.urls_discovered,
        submitted = result.tally.submitted,
        succeeded = result.tally.succeeded,
        rejected = result.tally.rejected,
        failed = result.tally.failed,
        duration_ms = result.elapsed.as_millis() as u64,
        "archive run completed"
    );

    progress.done(&result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitearchiver_shared::SiteArchiverError;
    use sitearchiver_submitter::ManualClock;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sitemap_xml(locs: &[&str]) -> String {
        let entries: String = locs
            .iter()
            .map(|loc| format!("  <url><loc>{loc}</loc></url>\n"))
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{entries}</urlset>\n"
        )
    }

    async fn mount_sitemap(server: &MockServer, route: &str, status: u16, body: String) -> Url {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
        Url::parse(&format!("{}{route}", server.uri())).unwrap()
    }

    fn run_config(server: &MockServer, sitemaps: Vec<Url>) -> RunConfig {
        RunConfig {
            sitemaps,
            on_sitemap_error: SitemapErrorPolicy::Abort,
            discovery: DiscoveryOptions { timeout_secs: 5 },
            submit: SubmitConfig {
                endpoint: format!("{}/save", server.uri()),
                interval: Duration::from_secs(10),
                timeout: Duration::from_secs(5),
                delay_wb_availability: true,
                skip_first_archive: true,
                if_not_archived_within: "15h".into(),
            },
        }
    }

    /// `url` form field of every request the mock received at `/save`.
    async fn submitted_urls(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|req| req.url.path() == "/save")
            .filter_map(|req| {
                url::form_urlencoded::parse(&req.body)
                    .find(|(key, _)| key == "url")
                    .map(|(_, value)| value.into_owned())
            })
            .collect()
    }

    #[tokio::test]
    async fn test_collect_concatenates_in_config_order() {
        let server = MockServer::start().await;
        let a = mount_sitemap(
            &server,
            "/a.xml",
            200,
            sitemap_xml(&["https://a.com/1", "https://a.com/2"]),
        )
        .await;
        let b = mount_sitemap(
            &server,
            "/b.xml",
            200,
            sitemap_xml(&["https://a.com/3", "https://a.com/1", "https://a.com/4"]),
        )
        .await;

        let fetcher = SitemapFetcher::new(&DiscoveryOptions::default()).unwrap();
        let collected = collect_urls(&fetcher, &[a, b], SitemapErrorPolicy::Abort, &SilentProgress)
            .await
            .unwrap();

        let urls: Vec<&str> = collected.urls.iter().map(PageUrl::as_str).collect();
        assert_eq!(
            urls,
            [
                "https://a.com/1",
                "https://a.com/2",
                "https://a.com/3",
                "https://a.com/1",
                "https://a.com/4",
            ]
        );
        assert_eq!(collected.sitemaps_fetched, 2);
    }

    #[tokio::test]
    async fn test_collect_aborts_on_first_failure() {
        let server = MockServer::start().await;
        let good = mount_sitemap(&server, "/good.xml", 200, sitemap_xml(&["https://a.com/1"])).await;
        let bad = mount_sitemap(&server, "/bad.xml", 500, "boom".into()).await;
        let never = mount_sitemap(&server, "/never.xml", 200, sitemap_xml(&["https://a.com/9"])).await;

        let fetcher = SitemapFetcher::new(&DiscoveryOptions::default()).unwrap();
        let err = collect_urls(
            &fetcher,
            &[good, bad, never],
            SitemapErrorPolicy::Abort,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), Some(500));
        let requested: Vec<String> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert!(!requested.contains(&"/never.xml".to_string()));
    }

    #[tokio::test]
    async fn test_collect_skip_policy_continues() {
        let server = MockServer::start().await;
        let bad = mount_sitemap(&server, "/bad.xml", 200, "<urlset><url>".into()).await;
        let good = mount_sitemap(&server, "/good.xml", 200, sitemap_xml(&["https://a.com/1"])).await;

        let fetcher = SitemapFetcher::new(&DiscoveryOptions::default()).unwrap();
        let collected = collect_urls(&fetcher, &[bad, good], SitemapErrorPolicy::Skip, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(collected.urls.len(), 1);
        assert_eq!(collected.sitemaps_fetched, 1);
        assert_eq!(collected.sitemaps_skipped.len(), 1);
        assert!(collected.sitemaps_skipped[0].0.ends_with("/bad.xml"));
    }

    #[tokio::test]
    async fn test_end_to_end_three_urls_thirty_seconds() {
        let server = MockServer::start().await;
        let sitemap = mount_sitemap(
            &server,
            "/page-sitemap.xml",
            200,
            sitemap_xml(&["https://a.com/1", "https://a.com/2", "https://a.com/3"]),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/save"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"url": "https://a.com/", "job_id": "j"})),
            )
            .expect(3)
            .mount(&server)
            .await;

        let config = run_config(&server, vec![sitemap]);
        let clock = ManualClock::new();
        let result = run_with_clock(&config, &Credentials::new("k", "s"), &SilentProgress, &clock)
            .await
            .unwrap();

        assert_eq!(clock.total_slept(), Duration::from_secs(30));
        assert_eq!(result.urls_discovered, 3);
        assert_eq!(result.tally.submitted, 3);
        assert_eq!(result.tally.succeeded, 3);
        assert_eq!(
            submitted_urls(&server).await,
            ["https://a.com/1", "https://a.com/2", "https://a.com/3"]
        );
    }

    #[tokio::test]
    async fn test_submission_failures_never_stop_the_run() {
        let server = MockServer::start().await;
        let sitemap = mount_sitemap(
            &server,
            "/page-sitemap.xml",
            200,
            sitemap_xml(&["https://a.com/rejected", "https://a.com/garbled", "https://a.com/ok"]),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/save"))
            .and(wiremock::matchers::body_string_contains("rejected"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/save"))
            .and(wiremock::matchers::body_string_contains("garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/save"))
            .and(wiremock::matchers::body_string_contains("ok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"url": "https://a.com/ok", "job_id": "1"})),
            )
            .mount(&server)
            .await;

        let config = run_config(&server, vec![sitemap]);
        let clock = ManualClock::new();
        let result = run_with_clock(&config, &Credentials::default(), &SilentProgress, &clock)
            .await
            .unwrap();

        assert_eq!(
            result.tally,
            SubmitTally {
                submitted: 3,
                succeeded: 1,
                rejected: 1,
                failed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_archive_endpoint_is_not_fatal() {
        let server = MockServer::start().await;
        let sitemap = mount_sitemap(
            &server,
            "/page-sitemap.xml",
            200,
            sitemap_xml(&["https://a.com/1", "https://a.com/2"]),
        )
        .await;

        let mut config = run_config(&server, vec![sitemap]);
        config.submit.endpoint = "http://127.0.0.1:9/save".into();
        config.submit.timeout = Duration::from_secs(2);

        let clock = ManualClock::new();
        let result = run_with_clock(&config, &Credentials::default(), &SilentProgress, &clock)
            .await
            .unwrap();

        assert_eq!(result.tally.submitted, 2);
        assert_eq!(result.tally.failed, 2);
    }

    #[tokio::test]
    async fn test_sitemap_failure_aborts_before_any_submission() {
        let server = MockServer::start().await;
        let sitemap = mount_sitemap(&server, "/page-sitemap.xml", 404, "gone".into()).await;
        Mock::given(method("POST"))
            .and(path("/save"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = run_config(&server, vec![sitemap]);
        let clock = ManualClock::new();
        let err = run_with_clock(&config, &Credentials::default(), &SilentProgress, &clock)
            .await
            .unwrap_err();

        assert!(matches!(err, SiteArchiverError::Fetch { status: 404, .. }));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_run_config_from_defaults() {
        let config = RunConfig::from_app_config(&AppConfig::default()).unwrap();
        assert_eq!(config.sitemaps.len(), 1);
        assert_eq!(config.on_sitemap_error, SitemapErrorPolicy::Abort);
        assert_eq!(config.submit.interval, Duration::from_secs(10));
        assert_eq!(config.discovery.timeout_secs, 30);
    }

    #[test]
    fn test_unschedulable_interval_is_config_error() {
        let mut app = AppConfig::default();
        app.archive.interval_secs = u64::MAX;

        let err = RunConfig::from_app_config(&app).unwrap_err();
        assert!(matches!(err, SiteArchiverError::Config { .. }));
    }

    #[tokio::test]
    async fn test_unschedulable_interval_fails_before_discovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_xml(&["https://a.com/1"])))
            .expect(0)
            .mount(&server)
            .await;
        let sitemap = Url::parse(&format!("{}/page-sitemap.xml", server.uri())).unwrap();

        let mut config = run_config(&server, vec![sitemap]);
        config.submit.interval = Duration::from_secs(u64::MAX);

        let clock = ManualClock::new();
        let err = run_with_clock(&config, &Credentials::default(), &SilentProgress, &clock)
            .await
            .unwrap_err();
        assert!(matches!(err, SiteArchiverError::Config { .. }));
    }
}
