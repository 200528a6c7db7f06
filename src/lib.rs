//! # GSC Scorecard
//!
//! `gsc_scorecard` queries the Search Console search-analytics API on behalf
//! of an OAuth-authorized user and turns the returned rows into top-N tables.
//! It supports:
//!
//! - Authorization-code exchange and a session holding credentials and the
//!   account's property list
//! - Query construction from dimension, search type and date-range selections
//! - Typed result tables with a declared, validated column set
//! - Group-by aggregation (sum or average) on one or more dimensions, sorted
//!   by the first metric and cut to the top 50 rows
//! - Memoized Excel (xlsx) or CSV export of aggregated tables
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::Local;
//! use gsc_scorecard::{
//!     client::{HttpReportingApi, OAuthClient},
//!     config::Config,
//!     pipeline::{Report, Selection, run_report},
//!     processor::{AggregateOp, DateWindow, Metric, SearchType},
//!     session::Session,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Some("client_secrets.toml".as_ref()))?;
//!     let oauth = OAuthClient::new(&config.installed, None)?;
//!     let api = HttpReportingApi::new(&config.api)?;
//!
//!     println!("Authorize at {}", oauth.authorization_url());
//!     let session = Session::authorize(&oauth, &api, "4/0Ab...")?;
//!
//!     let selection = Selection {
//!         site_url: session.site_urls()[0].clone(),
//!         search_type: SearchType::Web,
//!         date_window: DateWindow::Last30Days,
//!         dimensions: vec!["query".into(), "none".into(), "none".into()],
//!         metrics: vec![Metric::Clicks],
//!         op: AggregateOp::Sum,
//!     };
//!
//!     match run_report(&session, &api, &selection, Local::now().date_naive())? {
//!         Report::Empty => println!("No data for this selection"),
//!         Report::Ready { table, .. } => println!("{table}"),
//!     }
//!     Ok(())
//! }
//! ```

mod helpers;

pub mod client;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod processor;
pub mod session;
