//! Unit testing for Kapacitor TICKscripts
//!
//! Each test loads a TICKscript into Kapacitor, feeds it line-protocol data
//! (straight into Kapacitor for stream scripts, through a throwaway InfluxDB
//! database for batch scripts), reads back the alert counters and compares
//! them with the counts the test expects. The task and any database created
//! for it are removed afterwards, whether or not the test passed.
//!
//! It can be used as both a standalone CLI tool (`kapacitor-unit`) and as a
//! library.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::Duration;
//!
//! use kapacitor_unit::{InfluxDbClient, KapacitorClient, RunOptions, Runner, TestSuite};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let suite = TestSuite::load(Path::new("tests.yaml"))?;
//!     let kapacitor = KapacitorClient::new("http://localhost:9092", Duration::from_secs(30))?;
//!     let influxdb = InfluxDbClient::new("http://localhost:8086", Duration::from_secs(30))?;
//!
//!     let runner = Runner::new(&kapacitor, &influxdb, RunOptions::default());
//!     let report = runner.run_suite(&suite, Path::new("tick/")).await;
//!     println!("{}", kapacitor_unit::report::render_summary(&report));
//!     Ok(())
//! }
//! ```

pub mod case;
pub mod config;
pub mod counter;
pub mod error;
pub mod io;
pub mod metric;
pub mod report;
pub mod result;
pub mod runner;
pub mod task;

pub use case::{Phase, TestCase, TestKind};
pub use config::{RunOptions, TestDefinition, TestSuite};
pub use counter::Counter;
pub use error::{ConfigError, ParseError, SerializeError, TaskLoadError, TestError};
pub use io::{ClientError, ExecutionEngine, InfluxDbClient, KapacitorClient, Store};
pub use metric::{FieldValue, Metric};
pub use report::{CaseReport, CaseStatus, SuiteReport};
pub use result::TestResult;
pub use runner::Runner;
pub use task::Task;
