use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::TransportError, executor::QueryExecutor};

type Handler = Box<dyn Fn(&str, &Value) -> Result<Value, TransportError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub query: String,
    pub variables: Value,
}

/// [`QueryExecutor`] answering from a closure and recording every call.
pub(crate) struct MockExecutor {
    handler: Handler,
    calls: Mutex<Vec<Call>>,
}

impl MockExecutor {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers calls with `responses` in order, whatever they ask for.
    pub fn scripted(responses: Vec<Result<Value, TransportError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_, _| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::new("no scripted response left")))
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, TransportError> {
        let result = (self.handler)(query, &variables);
        self.calls.lock().unwrap().push(Call {
            query: query.to_string(),
            variables,
        });
        result
    }
}
