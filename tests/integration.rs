use std::cell::RefCell;

use chrono::NaiveDate;
use gsc_scorecard::{
    client::{Credentials, IdentityProvider, ReportingApi},
    export::ExportCache,
    pipeline::{Report, Selection, run_report},
    processor::{
        AggregateOp, DateWindow, Dimension, Metric, ScorecardError, SearchType,
        query_builder::{ApiRow, SearchAnalyticsRequest, SearchAnalyticsResponse},
    },
    session::Session,
};

const SITE: &str = "https://shop.example/";

struct FakeIdentity;

impl IdentityProvider for FakeIdentity {
    fn exchange_code(&self, code: &str) -> Result<Credentials, ScorecardError> {
        if code == "good-code" {
            Ok(Credentials::bearer("access-1"))
        } else {
            Err(ScorecardError::AuthExchange("invalid_grant".into()))
        }
    }
}

/// Serves canned rows and records every request it receives
struct FakeApi {
    rows: Vec<ApiRow>,
    fail_with: Option<String>,
    requests: RefCell<Vec<(String, SearchAnalyticsRequest)>>,
}

impl FakeApi {
    fn with_rows(rows: Vec<ApiRow>) -> Self {
        FakeApi {
            rows,
            fail_with: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        FakeApi {
            fail_with: Some(message.to_string()),
            ..FakeApi::with_rows(Vec::new())
        }
    }
}

impl ReportingApi for FakeApi {
    fn list_sites(&self, _credentials: &Credentials) -> Result<Vec<String>, ScorecardError> {
        Ok(vec![SITE.to_string(), "sc-domain:blog.example".to_string()])
    }

    fn query(
        &self,
        credentials: &Credentials,
        site_url: &str,
        request: &SearchAnalyticsRequest,
    ) -> Result<SearchAnalyticsResponse, ScorecardError> {
        assert_eq!(credentials.access_token, "access-1");
        self.requests
            .borrow_mut()
            .push((site_url.to_string(), request.clone()));

        if let Some(message) = &self.fail_with {
            return Err(ScorecardError::Query(message.clone()));
        }

        // Project canned rows onto the requested dimensions; the fake rows
        // carry keys for [query, page, device].
        let positions: Vec<usize> = request
            .dimensions
            .iter()
            .map(|d| match d {
                Dimension::Query => 0,
                Dimension::Page => 1,
                Dimension::Device => 2,
                other => panic!("fake API has no data for {other}"),
            })
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| ApiRow {
                keys: positions.iter().map(|&p| row.keys[p].clone()).collect(),
                ..row.clone()
            })
            .collect();
        Ok(SearchAnalyticsResponse { rows })
    }
}

fn row(query: &str, page: &str, device: &str, clicks: f64) -> ApiRow {
    ApiRow {
        keys: vec![query.into(), page.into(), device.into()],
        clicks,
        impressions: clicks * 20.0,
        ctr: 0.05,
        position: 7.5,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
}

fn selection(dimensions: &[&str], metrics: &[Metric]) -> Selection {
    Selection {
        site_url: SITE.to_string(),
        search_type: SearchType::Web,
        date_window: DateWindow::Last30Days,
        dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
        metrics: metrics.to_vec(),
        op: AggregateOp::Sum,
    }
}

fn session(api: &FakeApi) -> Session {
    Session::authorize(&FakeIdentity, api, "good-code").unwrap()
}

#[test]
fn test_rows_sharing_a_query_are_summed() {
    let api = FakeApi::with_rows(vec![row("a", "/x", "MOBILE", 3.0), row("a", "/y", "DESKTOP", 5.0)]);
    let report = run_report(
        &session(&api),
        &api,
        &selection(&["query", "none", "none"], &[Metric::Clicks]),
        today(),
    )
    .unwrap();

    match report {
        Report::Ready { total_rows, table } => {
            assert_eq!(total_rows, 2);
            assert_eq!(table.len(), 1);
            assert_eq!(table.rows[0].keys, vec!["a"]);
            assert_eq!(table.value(0, "clicks"), Some(8.0));
        }
        Report::Empty => panic!("expected aggregated rows"),
    }
}

#[test]
fn test_request_drops_none_and_keeps_order() {
    let api = FakeApi::with_rows(vec![row("a", "/x", "MOBILE", 1.0)]);
    run_report(
        &session(&api),
        &api,
        &selection(&["page", "none", "query"], &[Metric::Impressions]),
        today(),
    )
    .unwrap();

    let requests = api.requests.borrow();
    assert_eq!(requests.len(), 1);
    let (site, request) = &requests[0];
    assert_eq!(site, SITE);
    assert_eq!(request.dimensions, vec![Dimension::Page, Dimension::Query]);
    assert_eq!(request.row_limit, 25_000);
    assert_eq!(request.start_date, NaiveDate::from_ymd_opt(2024, 4, 10).unwrap());
    assert_eq!(request.end_date, NaiveDate::from_ymd_opt(2024, 5, 9).unwrap());
}

#[test]
fn test_empty_result_reports_empty() {
    let api = FakeApi::with_rows(Vec::new());
    let report = run_report(
        &session(&api),
        &api,
        &selection(&["query", "none", "none"], &[Metric::Clicks]),
        today(),
    )
    .unwrap();
    assert_eq!(report, Report::Empty);
}

#[test]
fn test_no_metric_selected_skips_query() {
    let api = FakeApi::with_rows(vec![row("a", "/x", "MOBILE", 1.0)]);
    let err = run_report(
        &session(&api),
        &api,
        &selection(&["query", "none", "none"], &[]),
        today(),
    )
    .unwrap_err();

    assert!(matches!(err, ScorecardError::NoMetricSelected));
    assert_eq!(err.to_string(), "no metric selected");
    assert!(api.requests.borrow().is_empty());
}

#[test]
fn test_repeated_selections_rejected_before_query() {
    let api = FakeApi::with_rows(vec![row("a", "/x", "MOBILE", 1.0)]);
    let session = session(&api);

    let err = run_report(
        &session,
        &api,
        &selection(&["query", "none", "none"], &[Metric::Clicks, Metric::Clicks]),
        today(),
    )
    .unwrap_err();
    assert!(matches!(err, ScorecardError::InvalidSelection(ref m) if m.contains("clicks")));

    let err = run_report(
        &session,
        &api,
        &selection(&["query", "query", "none"], &[Metric::Clicks]),
        today(),
    )
    .unwrap_err();
    assert!(err.is_validation());
    assert!(api.requests.borrow().is_empty());
}

#[test]
fn test_only_none_slots_is_no_dimension() {
    let api = FakeApi::with_rows(vec![row("a", "/x", "MOBILE", 1.0)]);
    let err = run_report(
        &session(&api),
        &api,
        &selection(&["none", "none"], &[Metric::Clicks]),
        today(),
    )
    .unwrap_err();
    assert!(matches!(err, ScorecardError::NoDimensionSelected));
}

#[test]
fn test_query_failure_leaves_session_usable() {
    let failing = FakeApi::failing("HTTP 401: token expired");
    let session = session(&failing);
    let sel = selection(&["query", "none", "none"], &[Metric::Clicks]);

    let err = run_report(&session, &failing, &sel, today()).unwrap_err();
    assert!(matches!(err, ScorecardError::Query(ref m) if m.contains("401")));
    assert_eq!(failing.requests.borrow().len(), 1);

    let healthy = FakeApi::with_rows(vec![row("a", "/x", "MOBILE", 2.0)]);
    let report = run_report(&session, &healthy, &sel, today()).unwrap();
    assert!(matches!(report, Report::Ready { .. }));
}

#[test]
fn test_bad_code_never_creates_a_session() {
    let api = FakeApi::with_rows(Vec::new());
    let err = Session::authorize(&FakeIdentity, &api, "stale-code").unwrap_err();
    assert!(matches!(err, ScorecardError::AuthExchange(_)));
}

#[test]
fn test_unknown_property_rejected_before_query() {
    let api = FakeApi::with_rows(vec![row("a", "/x", "MOBILE", 1.0)]);
    let mut sel = selection(&["query"], &[Metric::Clicks]);
    sel.site_url = "https://elsewhere.example/".into();

    let err = run_report(&session(&api), &api, &sel, today()).unwrap_err();
    assert!(err.is_validation());
    assert!(api.requests.borrow().is_empty());
}

#[test]
fn test_top_fifty_sorted_by_first_metric() {
    let rows = (0..80)
        .map(|i| row(&format!("kw{i}"), "/", "MOBILE", ((i * 37) % 80) as f64))
        .collect();
    let api = FakeApi::with_rows(rows);
    let report = run_report(
        &session(&api),
        &api,
        &selection(&["query", "none", "none"], &[Metric::Clicks, Metric::Impressions]),
        today(),
    )
    .unwrap();

    let Report::Ready { total_rows, table } = report else {
        panic!("expected aggregated rows");
    };
    assert_eq!(total_rows, 80);
    assert_eq!(table.len(), 50);
    assert_eq!(table.measures, vec!["clicks", "impressions"]);
    assert!(
        table
            .rows
            .windows(2)
            .all(|w| w[0].values[0] >= w[1].values[0])
    );
    assert_eq!(table.value(0, "clicks"), Some(79.0));
}

#[test]
fn test_multi_dimension_average_and_export() {
    let api = FakeApi::with_rows(vec![
        row("a", "/x", "MOBILE", 2.0),
        row("a", "/x", "DESKTOP", 6.0),
        row("b", "/y", "MOBILE", 1.0),
    ]);
    let mut sel = selection(&["query", "page", "none"], &[Metric::Clicks]);
    sel.op = AggregateOp::Avg;

    let Report::Ready { table, .. } = run_report(&session(&api), &api, &sel, today()).unwrap()
    else {
        panic!("expected aggregated rows");
    };
    assert_eq!(table.dimensions, vec!["query", "page"]);
    assert_eq!(table.rows[0].keys, vec!["a", "/x"]);
    assert_eq!(table.value(0, "clicks"), Some(4.0));

    let cache = ExportCache::new();
    let csv = String::from_utf8(cache.to_csv(&table).unwrap().to_vec()).unwrap();
    assert_eq!(csv.lines().next(), Some("query,page,clicks"));
    assert_eq!(csv.lines().count(), 3);
}
