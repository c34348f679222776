//! In-memory driver for tests.
//!
//! Stores documents per namespace, supports top-level equality filters,
//! skip/limit, replace/set updates, deletes and the `count` and `aggregate`
//! commands. Failures can be queued per call kind.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use mongodb::bson::{doc, Bson, Document};
use mongodb::options::WriteConcern;
use parking_lot::{Mutex, MutexGuard};

use super::driver::{Driver, Namespace, QueryOptions, Session, Update};
use super::identifier::ID_FIELD;
use crate::error::{MongoError, Result};

#[derive(Debug, Default)]
pub struct MockState {
    pub collections: HashMap<String, Vec<Document>>,
    pub uris: Vec<String>,
    pub connects: u32,
    pub pings: u32,
    /// Filters exactly as they reached the wire.
    pub filters: Vec<Document>,
    pub commands: Vec<Document>,
    pub concerns: Vec<WriteConcern>,
    pub connect_failures: VecDeque<MongoError>,
    pub ping_failures: VecDeque<MongoError>,
    pub op_failures: VecDeque<MongoError>,
}

impl MockState {
    fn fail_op(&mut self) -> Result<()> {
        match self.op_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn rows(&mut self, namespace: &str) -> &mut Vec<Document> {
        self.collections.entry(namespace.to_string()).or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock()
    }

    pub fn seed(&self, namespace: &str, documents: impl IntoIterator<Item = Document>) {
        self.state().rows(namespace).extend(documents);
    }

    pub fn rows(&self, namespace: &str) -> Vec<Document> {
        self.state().rows(namespace).clone()
    }

    pub fn fail_connects(&self, errors: impl IntoIterator<Item = MongoError>) {
        self.state().connect_failures.extend(errors);
    }

    pub fn fail_pings(&self, errors: impl IntoIterator<Item = MongoError>) {
        self.state().ping_failures.extend(errors);
    }

    pub fn fail_ops(&self, errors: impl IntoIterator<Item = MongoError>) {
        self.state().op_failures.extend(errors);
    }
}

impl Driver for MockDriver {
    type Session = MockSession;

    async fn connect(&self, uri: &str) -> Result<MockSession> {
        let mut state = self.state();
        state.connects += 1;
        state.uris.push(uri.to_string());
        if let Some(err) = state.connect_failures.pop_front() {
            return Err(err);
        }
        Ok(MockSession {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

impl Session for MockSession {
    async fn ping(&self, _database: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.pings += 1;
        match state.ping_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn find(
        &self,
        namespace: &Namespace,
        filter: Document,
        options: &QueryOptions,
    ) -> Result<Vec<Document>> {
        let mut state = self.state.lock();
        state.filters.push(filter.clone());
        state.fail_op()?;

        let skip = options.positive_skip().unwrap_or(0) as usize;
        let limit = options.positive_limit().map_or(usize::MAX, |l| l as usize);
        Ok(state
            .rows(&namespace.to_string())
            .iter()
            .filter(|d| matches(d, &filter))
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert(
        &self,
        namespace: &Namespace,
        documents: Vec<Document>,
        concern: &WriteConcern,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.concerns.push(concern.clone());
        state.fail_op()?;
        state.rows(&namespace.to_string()).extend(documents);
        Ok(())
    }

    async fn update(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Update,
        concern: &WriteConcern,
    ) -> Result<u64> {
        let mut state = self.state.lock();
        state.filters.push(filter.clone());
        state.concerns.push(concern.clone());
        state.fail_op()?;

        let mut matched = 0;
        for row in state.rows(&namespace.to_string()).iter_mut() {
            if !matches(row, &filter) {
                continue;
            }
            match &update {
                Update::ReplaceAll(replacement) => {
                    let mut next = Document::new();
                    if let Some(id) = row.get(ID_FIELD) {
                        next.insert(ID_FIELD, id.clone());
                    }
                    for (key, value) in replacement.iter().filter(|(k, _)| *k != ID_FIELD) {
                        next.insert(key.clone(), value.clone());
                    }
                    *row = next;
                }
                Update::SetFirst(fields) => {
                    for (key, value) in fields {
                        row.insert(key.clone(), value.clone());
                    }
                }
            }
            matched += 1;
            if matches!(update, Update::SetFirst(_)) {
                break;
            }
        }
        Ok(matched)
    }

    async fn delete(
        &self,
        namespace: &Namespace,
        filter: Document,
        limit_one: bool,
        concern: &WriteConcern,
    ) -> Result<u64> {
        let mut state = self.state.lock();
        state.filters.push(filter.clone());
        state.concerns.push(concern.clone());
        state.fail_op()?;

        let rows = state.rows(&namespace.to_string());
        let mut deleted = 0;
        rows.retain(|row| {
            if (limit_one && deleted == 1) || !matches(row, &filter) {
                return true;
            }
            deleted += 1;
            false
        });
        Ok(deleted)
    }

    async fn run_command(&self, database: &str, command: Document) -> Result<Document> {
        let mut state = self.state.lock();
        state.commands.push(command.clone());
        state.fail_op()?;

        if let Ok(collection) = command.get_str("count") {
            let filter = command.get_document("query").cloned().unwrap_or_default();
            state.filters.push(filter.clone());
            let n = state
                .rows(&format!("{database}.{collection}"))
                .iter()
                .filter(|d| matches(d, &filter))
                .count();
            return Ok(doc! { "n": n as i32, "ok": 1.0 });
        }

        if let Ok(collection) = command.get_str("aggregate") {
            let batch: Vec<Bson> = state
                .rows(&format!("{database}.{collection}"))
                .iter()
                .cloned()
                .map(Bson::Document)
                .collect();
            return Ok(doc! { "cursor": { "firstBatch": batch, "id": 0_i64 }, "ok": 1.0 });
        }

        Ok(doc! { "ok": 1.0 })
    }
}
