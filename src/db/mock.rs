//! Recording in-memory driver for unit tests.

use crate::db::driver::{Cursor, Database, RawConnection};
use crate::error::{DbError, DbResult};
use crate::models::{PlaceholderStyle, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect,
    Query(String, Vec<Value>),
    Execute(String, Vec<Value>),
    Commit,
    Rollback,
    Close,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Stats {
    pub connects: usize,
    pub closes: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    rows_affected: u64,
    fail_connect: bool,
    fail_commit: bool,
    fail_rollback: bool,
    fail_statements: bool,
}

#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<State>>,
}

impl MockDriver {
    pub fn new() -> Self {
        let driver = Self::default();
        driver.state.lock().unwrap().rows_affected = 1;
        driver
    }

    /// Result set returned by every `query` call.
    pub fn with_result(self, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.columns = columns.iter().map(|c| c.to_string()).collect();
            state.rows = rows;
        }
        self
    }

    pub fn with_rows_affected(self, rows_affected: u64) -> Self {
        self.state.lock().unwrap().rows_affected = rows_affected;
        self
    }

    pub fn failing_connect(self) -> Self {
        self.state.lock().unwrap().fail_connect = true;
        self
    }

    pub fn failing_commit(self) -> Self {
        self.state.lock().unwrap().fail_commit = true;
        self
    }

    pub fn failing_rollback(self) -> Self {
        self.state.lock().unwrap().fail_rollback = true;
        self
    }

    pub fn failing_statements(self) -> Self {
        self.state.lock().unwrap().fail_statements = true;
        self
    }

    pub fn factory(&self) -> impl Fn() -> DbResult<Box<dyn RawConnection>> + Send + Sync + 'static {
        let state = Arc::clone(&self.state);
        move || {
            let mut guard = state.lock().unwrap();
            if guard.fail_connect {
                return Err(DbError::connection("mock connect refused", "none"));
            }
            guard.events.push(Event::Connect);
            Ok(Box::new(MockConnection {
                state: Arc::clone(&state),
            }) as Box<dyn RawConnection>)
        }
    }

    pub fn database(&self) -> Arc<Database> {
        self.database_with(PlaceholderStyle::QuestionMark)
    }

    pub fn database_with(&self, placeholder: PlaceholderStyle) -> Arc<Database> {
        Arc::new(Database::new(self.factory(), placeholder).with_label("mock"))
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn stats(&self) -> Stats {
        let state = self.state.lock().unwrap();
        let mut stats = Stats::default();
        for event in &state.events {
            match event {
                Event::Connect => stats.connects += 1,
                Event::Close => stats.closes += 1,
                Event::Commit => stats.commits += 1,
                Event::Rollback => stats.rollbacks += 1,
                _ => {}
            }
        }
        stats
    }
}

struct MockConnection {
    state: Arc<Mutex<State>>,
}

impl RawConnection for MockConnection {
    fn cursor(&mut self) -> DbResult<Box<dyn Cursor + '_>> {
        Ok(Box::new(MockCursor {
            state: &self.state,
            columns: Vec::new(),
            rows: VecDeque::new(),
        }))
    }

    fn commit(&mut self) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Commit);
        if state.fail_commit {
            return Err(DbError::database("mock commit failed", None, "none"));
        }
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Rollback);
        if state.fail_rollback {
            return Err(DbError::database("mock rollback failed", None, "none"));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> DbResult<()> {
        self.state.lock().unwrap().events.push(Event::Close);
        Ok(())
    }
}

struct MockCursor<'c> {
    state: &'c Mutex<State>,
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
}

impl Cursor for MockCursor<'_> {
    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .events
            .push(Event::Query(sql.to_string(), params.to_vec()));
        if state.fail_statements {
            return Err(DbError::database("mock statement failed", None, "none"));
        }
        self.columns = state.columns.clone();
        self.rows = state.rows.iter().cloned().collect();
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let mut state = self.state.lock().unwrap();
        state
            .events
            .push(Event::Execute(sql.to_string(), params.to_vec()));
        if state.fail_statements {
            return Err(DbError::database("mock statement failed", None, "none"));
        }
        Ok(state.rows_affected)
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn fetch_one(&mut self) -> DbResult<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }

    fn fetch_all(&mut self) -> DbResult<Vec<Vec<Value>>> {
        Ok(self.rows.drain(..).collect())
    }
}
