use std::collections::VecDeque;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CommandError, CommandResult};
use crate::models::{Deleted, NewTask, Task, TaskPatch};

/// Wire names shared with the webview bridge.
pub mod channel {
    pub const QUERY: &str = "db:query";
    pub const GET_TASKS: &str = "db:getTasks";
    pub const ADD_TASK: &str = "db:addTask";
    pub const UPDATE_TASK: &str = "db:updateTask";
    pub const DELETE_TASK: &str = "db:deleteTask";
    pub const GENERATE: &str = "ai:generate";
    pub const EMBED_TEXT: &str = "ai:embedText";
    pub const SEARCH: &str = "ai:search";
    pub const OPEN_EXTERNAL: &str = "sys:openExternal";
    pub const LOG: &str = "sys:log";
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Query { sql: String, params: Vec<Value> },
    GetTasks,
    AddTask(NewTask),
    UpdateTask(TaskPatch),
    DeleteTask { id: i64 },
    Generate { prompt: String },
    EmbedText { text: String },
    Search { query: String },
    OpenExternal { url: String },
    Log { message: String },
}

impl Request {
    pub fn channel(&self) -> &'static str {
        match self {
            Request::Query { .. } => channel::QUERY,
            Request::GetTasks => channel::GET_TASKS,
            Request::AddTask(_) => channel::ADD_TASK,
            Request::UpdateTask(_) => channel::UPDATE_TASK,
            Request::DeleteTask { .. } => channel::DELETE_TASK,
            Request::Generate { .. } => channel::GENERATE,
            Request::EmbedText { .. } => channel::EMBED_TEXT,
            Request::Search { .. } => channel::SEARCH,
            Request::OpenExternal { .. } => channel::OPEN_EXTERNAL,
            Request::Log { .. } => channel::LOG,
        }
    }

    /// Build a request from a channel name and its positional JSON arguments,
    /// in the order the webview passes them (`db:addTask` takes `[task]`,
    /// `db:query` takes `[sql, params?]`, and so on).
    pub fn from_wire(channel_name: &str, args: Vec<Value>) -> CommandResult<Self> {
        let mut args = WireArgs::new(channel_name, args);

        let request = match channel_name {
            channel::QUERY => Request::Query {
                sql: args.required()?,
                params: args.optional()?.unwrap_or_default(),
            },
            channel::GET_TASKS => Request::GetTasks,
            channel::ADD_TASK => Request::AddTask(args.required()?),
            channel::UPDATE_TASK => Request::UpdateTask(args.required()?),
            channel::DELETE_TASK => Request::DeleteTask {
                id: args.required()?,
            },
            channel::GENERATE => Request::Generate {
                prompt: args.required()?,
            },
            channel::EMBED_TEXT => Request::EmbedText {
                text: args.required()?,
            },
            channel::SEARCH => Request::Search {
                query: args.required()?,
            },
            channel::OPEN_EXTERNAL => Request::OpenExternal {
                url: args.required()?,
            },
            channel::LOG => Request::Log {
                message: args.required()?,
            },
            other => return Err(CommandError::UnknownChannel(other.to_string())),
        };

        args.finish()?;
        Ok(request)
    }
}

struct WireArgs<'a> {
    channel: &'a str,
    values: VecDeque<Value>,
    position: usize,
}

impl<'a> WireArgs<'a> {
    fn new(channel: &'a str, values: Vec<Value>) -> Self {
        Self {
            channel,
            values: values.into(),
            position: 0,
        }
    }

    fn invalid(&self, reason: String) -> CommandError {
        CommandError::InvalidArguments {
            channel: self.channel.to_string(),
            reason,
        }
    }

    fn required<T: DeserializeOwned>(&mut self) -> CommandResult<T> {
        match self.optional()? {
            Some(value) => Ok(value),
            None => Err(self.invalid(format!("missing argument {}", self.position))),
        }
    }

    fn optional<T: DeserializeOwned>(&mut self) -> CommandResult<Option<T>> {
        self.position += 1;
        match self.values.pop_front() {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| self.invalid(format!("argument {}: {}", self.position, e))),
        }
    }

    fn finish(self) -> CommandResult<()> {
        if self.values.is_empty() {
            Ok(())
        } else {
            let extra = self.values.len();
            Err(self.invalid(format!("{} unexpected trailing argument(s)", extra)))
        }
    }
}

/// Serializes as the bare payload the webview expects (`null` for `Unit`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Tasks(Vec<Task>),
    Task(Task),
    Deleted(Deleted),
    Text(String),
    Embedding(Vec<f32>),
    SearchResults(Vec<Value>),
    Unit,
}
