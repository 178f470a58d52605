//! Scripted in-memory collaborators shared by the integration tests.
//!
//! Both fakes append every call to one shared [`Journal`], so tests can assert
//! on cross-service ordering (e.g. the database is dropped before the task is
//! deleted). Any method can be made to fail, hang or panic.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kapacitor_unit::config::{RunOptions, TestDefinition};
use kapacitor_unit::io::{AlertStats, ClientError, ExecutionEngine, Store, TaskDefinition};
use kapacitor_unit::{Task, TestCase, TestKind, TestResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LoadTask {
        id: String,
        kind: TestKind,
        script: String,
        dbrps: Vec<(String, String)>,
    },
    DeleteTask(String),
    EngineWrite {
        record: String,
        db: String,
        rp: String,
    },
    QueryStats(String),
    Replay {
        task: String,
        recording: String,
    },
    CreateDatabase {
        name: String,
        rp: String,
    },
    DropDatabase(String),
    StoreWrite {
        record: String,
        db: String,
        rp: String,
    },
    Query(String),
}

impl Call {
    pub fn method(&self) -> Method {
        match self {
            Self::LoadTask { .. } => Method::LoadTask,
            Self::DeleteTask(_) => Method::DeleteTask,
            Self::EngineWrite { .. } => Method::EngineWrite,
            Self::QueryStats(_) => Method::QueryStats,
            Self::Replay { .. } => Method::Replay,
            Self::CreateDatabase { .. } => Method::CreateDatabase,
            Self::DropDatabase(_) => Method::DropDatabase,
            Self::StoreWrite { .. } => Method::StoreWrite,
            Self::Query(_) => Method::Query,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    LoadTask,
    DeleteTask,
    EngineWrite,
    QueryStats,
    Replay,
    CreateDatabase,
    DropDatabase,
    StoreWrite,
    Query,
}

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Return an HTTP 500.
    Fail,
    /// Never complete.
    Hang,
    Panic,
}

/// Ordered record of every collaborator call.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<Method> {
        self.calls().iter().map(Call::method).collect()
    }

    pub fn count(&self, method: Method) -> usize {
        self.methods().into_iter().filter(|m| *m == method).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }

    /// Records written through either service, in order.
    pub fn engine_records(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::EngineWrite { record, .. } => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn store_records(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::StoreWrite { record, .. } => Some(record),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct Faults(Mutex<HashMap<Method, Fault>>);

impl Faults {
    fn set(&self, method: Method, fault: Fault) {
        self.0.lock().unwrap().insert(method, fault);
    }

    async fn apply(&self, method: Method) -> Result<(), ClientError> {
        let fault = self.0.lock().unwrap().get(&method).copied();
        match fault {
            None => Ok(()),
            Some(Fault::Fail) => Err(ClientError::Http {
                status: 500,
                body: format!("{method:?} failed"),
            }),
            Some(Fault::Hang) => std::future::pending().await,
            Some(Fault::Panic) => panic!("{method:?} panicked"),
        }
    }
}

pub struct MockEngine {
    journal: Journal,
    faults: Faults,
    stats: Mutex<Option<AlertStats>>,
}

impl MockEngine {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            faults: Faults::default(),
            stats: Mutex::new(None),
        }
    }

    /// Statistics returned by `query_alert_stats`; without them it reports
    /// [`ClientError::NoAlertData`].
    pub fn with_stats(self, stats: &[(&str, i64)]) -> Self {
        *self.stats.lock().unwrap() =
            Some(stats.iter().map(|(k, v)| (k.to_string(), *v)).collect());
        self
    }

    pub fn with_fault(self, method: Method, fault: Fault) -> Self {
        self.faults.set(method, fault);
        self
    }
}

#[async_trait]
impl ExecutionEngine for MockEngine {
    async fn load_task(&self, definition: &TaskDefinition) -> Result<(), ClientError> {
        self.journal.push(Call::LoadTask {
            id: definition.id.clone(),
            kind: definition.kind,
            script: definition.script.clone(),
            dbrps: definition
                .dbrps
                .iter()
                .map(|d| (d.db.clone(), d.rp.clone()))
                .collect(),
        });
        self.faults.apply(Method::LoadTask).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), ClientError> {
        self.journal.push(Call::DeleteTask(id.to_string()));
        self.faults.apply(Method::DeleteTask).await
    }

    async fn inject_data(
        &self,
        records: &[Vec<u8>],
        db: &str,
        rp: &str,
    ) -> Result<(), ClientError> {
        for record in records {
            self.journal.push(Call::EngineWrite {
                record: String::from_utf8_lossy(record).into_owned(),
                db: db.to_string(),
                rp: rp.to_string(),
            });
            self.faults.apply(Method::EngineWrite).await?;
        }
        Ok(())
    }

    async fn query_alert_stats(&self, id: &str) -> Result<AlertStats, ClientError> {
        self.journal.push(Call::QueryStats(id.to_string()));
        self.faults.apply(Method::QueryStats).await?;
        self.stats.lock().unwrap().clone().ok_or(ClientError::NoAlertData)
    }

    async fn replay_recording(&self, task_id: &str, recording_id: &str) -> Result<(), ClientError> {
        self.journal.push(Call::Replay {
            task: task_id.to_string(),
            recording: recording_id.to_string(),
        });
        self.faults.apply(Method::Replay).await
    }
}

pub struct MockStore {
    journal: Journal,
    faults: Faults,
}

impl MockStore {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            faults: Faults::default(),
        }
    }

    pub fn with_fault(self, method: Method, fault: Fault) -> Self {
        self.faults.set(method, fault);
        self
    }
}

#[async_trait]
impl Store for MockStore {
    async fn create_database(&self, name: &str, rp: &str) -> Result<(), ClientError> {
        self.journal.push(Call::CreateDatabase {
            name: name.to_string(),
            rp: rp.to_string(),
        });
        self.faults.apply(Method::CreateDatabase).await
    }

    async fn drop_database(&self, name: &str) -> Result<(), ClientError> {
        self.journal.push(Call::DropDatabase(name.to_string()));
        self.faults.apply(Method::DropDatabase).await
    }

    async fn inject_data(
        &self,
        records: &[Vec<u8>],
        db: &str,
        rp: &str,
    ) -> Result<(), ClientError> {
        for record in records {
            self.journal.push(Call::StoreWrite {
                record: String::from_utf8_lossy(record).into_owned(),
                db: db.to_string(),
                rp: rp.to_string(),
            });
            self.faults.apply(Method::StoreWrite).await?;
        }
        Ok(())
    }

    async fn query(&self, statement: &str) -> Result<(), ClientError> {
        self.journal.push(Call::Query(statement.to_string()));
        self.faults.apply(Method::Query).await
    }
}

pub const STREAM_SCRIPT: &str = "stream\n    |from()\n        .measurement('weather')\n    |alert()\n        .warn(lambda: \"temperature\" > 80)\n";

pub const BATCH_SCRIPT: &str = "batch\n    |query('SELECT mean(usage_idle) FROM \"telegraf\".\"autogen\".\"cpu\"')\n        .period(5m)\n        .every(10m)\n    |alert()\n        .crit(lambda: \"mean\" < 10)\n";

pub fn definition(kind: TestKind, data: &[&str]) -> TestDefinition {
    TestDefinition {
        name: "weather warning".to_string(),
        task_name: "alert_weather.tick".to_string(),
        db: "weather".to_string(),
        rp: "default".to_string(),
        kind,
        data_period: Duration::from_secs(1),
        data: data.iter().map(|s| s.to_string()).collect(),
        expects: TestResult::expecting([("ok", 0), ("warn", 1), ("crit", 0)]),
        ..TestDefinition::default()
    }
}

pub fn case(definition: TestDefinition, script: &str) -> TestCase {
    let mut case = TestCase::from(definition);
    case.attach_task(Task::from_script(case.task_name.clone(), script));
    case
}

pub fn options() -> RunOptions {
    RunOptions {
        call_timeout: Duration::from_secs(1),
        ..RunOptions::default()
    }
}

/// Trailing nanosecond timestamp of a serialized record.
pub fn record_timestamp(record: &str) -> i64 {
    record
        .trim_end()
        .rsplit(' ')
        .next()
        .and_then(|ts| ts.parse().ok())
        .unwrap_or_else(|| panic!("record without timestamp: {record:?}"))
}
