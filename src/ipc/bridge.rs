use std::fmt::Write;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{CommandError, CommandResult};
use crate::ipc::request::{channel, Request, Response};
use crate::ipc::surface::CommandSurface;
use crate::models::{Deleted, NewTask, Task, TaskPatch};

/// One callable installed under `window.api.<namespace>.<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeFunction {
    pub namespace: &'static str,
    pub name: &'static str,
    pub channel: &'static str,
    /// Host command handler the call is routed to.
    pub handler: &'static str,
    pub params: &'static [&'static str],
}

/// Everything the webview may call. Nothing outside this table is reachable.
pub const EXPOSED: &[BridgeFunction] = &[
    BridgeFunction {
        namespace: "db",
        name: "query",
        channel: channel::QUERY,
        handler: "db_query",
        params: &["sql", "params"],
    },
    BridgeFunction {
        namespace: "db",
        name: "getTasks",
        channel: channel::GET_TASKS,
        handler: "db_get_tasks",
        params: &[],
    },
    BridgeFunction {
        namespace: "db",
        name: "addTask",
        channel: channel::ADD_TASK,
        handler: "db_add_task",
        params: &["task"],
    },
    BridgeFunction {
        namespace: "db",
        name: "updateTask",
        channel: channel::UPDATE_TASK,
        handler: "db_update_task",
        params: &["task"],
    },
    BridgeFunction {
        namespace: "db",
        name: "deleteTask",
        channel: channel::DELETE_TASK,
        handler: "db_delete_task",
        params: &["id"],
    },
    BridgeFunction {
        namespace: "ai",
        name: "generate",
        channel: channel::GENERATE,
        handler: "ai_generate",
        params: &["prompt"],
    },
    BridgeFunction {
        namespace: "ai",
        name: "embedText",
        channel: channel::EMBED_TEXT,
        handler: "ai_embed_text",
        params: &["text"],
    },
    BridgeFunction {
        namespace: "ai",
        name: "search",
        channel: channel::SEARCH,
        handler: "ai_search",
        params: &["query"],
    },
    BridgeFunction {
        namespace: "sys",
        name: "openExternal",
        channel: channel::OPEN_EXTERNAL,
        handler: "sys_open_external",
        params: &["url"],
    },
    BridgeFunction {
        namespace: "sys",
        name: "log",
        channel: channel::LOG,
        handler: "sys_log",
        params: &["message"],
    },
];

/// Script injected into the webview before page scripts run. Defines a
/// frozen, non-configurable `window.api` whose functions return the invoke
/// Promise.
pub fn init_script() -> String {
    let mut namespaces: Vec<&str> = Vec::new();
    for function in EXPOSED {
        if !namespaces.contains(&function.namespace) {
            namespaces.push(function.namespace);
        }
    }

    let mut js = String::new();
    js.push_str("(function () {\n");
    js.push_str("  const invoke = (cmd, args) => window.__TAURI_INTERNALS__.invoke(cmd, args);\n");
    js.push_str("  const api = {\n");
    for namespace in namespaces {
        let _ = writeln!(js, "    {}: Object.freeze({{", namespace);
        for function in EXPOSED.iter().filter(|f| f.namespace == namespace) {
            let params = function.params.join(", ");
            let args = if params.is_empty() {
                "{}".to_string()
            } else {
                format!("{{ {} }}", params)
            };
            let _ = writeln!(
                js,
                "      {}: ({}) => invoke(\"{}\", {}),",
                function.name, params, function.handler, args
            );
        }
        js.push_str("    }),\n");
    }
    js.push_str("  };\n");
    js.push_str(
        "  Object.defineProperty(window, \"api\", { value: Object.freeze(api), writable: false, configurable: false });\n",
    );
    js.push_str("})();\n");
    js
}

/// Typed in-process counterpart of `window.api`.
#[derive(Clone)]
pub struct Bridge {
    surface: Arc<CommandSurface>,
}

impl Bridge {
    pub fn new(surface: Arc<CommandSurface>) -> Self {
        Self { surface }
    }

    pub fn db(&self) -> DbApi<'_> {
        DbApi {
            surface: &self.surface,
        }
    }

    pub fn ai(&self) -> AiApi<'_> {
        AiApi {
            surface: &self.surface,
        }
    }

    pub fn sys(&self) -> SysApi<'_> {
        SysApi {
            surface: &self.surface,
        }
    }

    /// Untyped entry for callers speaking the channel protocol directly.
    pub async fn invoke(&self, channel_name: &str, args: Vec<Value>) -> CommandResult<Value> {
        let request = Request::from_wire(channel_name, args)?;
        let response = self.surface.dispatch(request).await?;
        serde_json::to_value(response).map_err(CommandError::Encode)
    }
}

pub struct DbApi<'a> {
    surface: &'a CommandSurface,
}

impl DbApi<'_> {
    /// The task store has no SQL surface, so this always fails with
    /// `CommandError::Unsupported`.
    pub async fn query(&self, sql: &str, params: Vec<Value>) -> CommandResult<()> {
        let request = Request::Query {
            sql: sql.to_string(),
            params,
        };
        self.surface.dispatch(request).await.map(|_| ())
    }

    pub async fn get_tasks(&self) -> CommandResult<Vec<Task>> {
        match self.surface.dispatch(Request::GetTasks).await? {
            Response::Tasks(tasks) => Ok(tasks),
            _ => Err(CommandError::UnexpectedResponse(channel::GET_TASKS)),
        }
    }

    pub async fn add_task(&self, task: NewTask) -> CommandResult<Task> {
        match self.surface.dispatch(Request::AddTask(task)).await? {
            Response::Task(task) => Ok(task),
            _ => Err(CommandError::UnexpectedResponse(channel::ADD_TASK)),
        }
    }

    pub async fn update_task(&self, patch: TaskPatch) -> CommandResult<Task> {
        match self.surface.dispatch(Request::UpdateTask(patch)).await? {
            Response::Task(task) => Ok(task),
            _ => Err(CommandError::UnexpectedResponse(channel::UPDATE_TASK)),
        }
    }

    pub async fn delete_task(&self, id: i64) -> CommandResult<Deleted> {
        match self.surface.dispatch(Request::DeleteTask { id }).await? {
            Response::Deleted(deleted) => Ok(deleted),
            _ => Err(CommandError::UnexpectedResponse(channel::DELETE_TASK)),
        }
    }
}

pub struct AiApi<'a> {
    surface: &'a CommandSurface,
}

impl AiApi<'_> {
    pub async fn generate(&self, prompt: &str) -> CommandResult<String> {
        let request = Request::Generate {
            prompt: prompt.to_string(),
        };
        match self.surface.dispatch(request).await? {
            Response::Text(text) => Ok(text),
            _ => Err(CommandError::UnexpectedResponse(channel::GENERATE)),
        }
    }

    pub async fn embed_text(&self, text: &str) -> CommandResult<Vec<f32>> {
        let request = Request::EmbedText {
            text: text.to_string(),
        };
        match self.surface.dispatch(request).await? {
            Response::Embedding(vector) => Ok(vector),
            _ => Err(CommandError::UnexpectedResponse(channel::EMBED_TEXT)),
        }
    }

    pub async fn search(&self, query: &str) -> CommandResult<Vec<Value>> {
        let request = Request::Search {
            query: query.to_string(),
        };
        match self.surface.dispatch(request).await? {
            Response::SearchResults(results) => Ok(results),
            _ => Err(CommandError::UnexpectedResponse(channel::SEARCH)),
        }
    }
}

pub struct SysApi<'a> {
    surface: &'a CommandSurface,
}

impl SysApi<'_> {
    pub async fn open_external(&self, url: &str) -> CommandResult<()> {
        let request = Request::OpenExternal {
            url: url.to_string(),
        };
        self.surface.dispatch(request).await.map(|_| ())
    }

    pub async fn log(&self, message: &str) -> CommandResult<()> {
        let request = Request::Log {
            message: message.to_string(),
        };
        self.surface.dispatch(request).await.map(|_| ())
    }
}
