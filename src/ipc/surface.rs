use std::sync::Arc;

use tokio::sync::Mutex;

use crate::database::TaskStore;
use crate::error::{CommandError, CommandResult};
use crate::ipc::request::{channel, Request, Response};
use crate::services::ai::{AiProvider, DisabledAi};
use crate::services::log_sink::{LogSink, RendererLog};
use crate::services::shell::{parse_external_url, Shell, SystemShell};

/// External systems the command surface delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub ai: Arc<dyn AiProvider>,
    pub shell: Arc<dyn Shell>,
    pub log: Arc<dyn LogSink>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            ai: Arc::new(DisabledAi),
            shell: Arc::new(SystemShell),
            log: Arc::new(RendererLog),
        }
    }
}

/// Executes requests against the task store or a collaborator.
///
/// Store commands hold the store lock for their whole read-modify-write, so
/// concurrent invocations are applied one at a time.
pub struct CommandSurface {
    store: Mutex<TaskStore>,
    collaborators: Collaborators,
}

impl CommandSurface {
    pub fn new(store: TaskStore, collaborators: Collaborators) -> Self {
        Self {
            store: Mutex::new(store),
            collaborators,
        }
    }

    pub async fn dispatch(&self, request: Request) -> CommandResult<Response> {
        let channel = request.channel();
        log::debug!("[IPC] {}", channel);

        let result = self.handle(request).await;
        if let Err(e) = &result {
            log::warn!("[IPC] {} failed: {}", channel, e);
        }
        result
    }

    async fn handle(&self, request: Request) -> CommandResult<Response> {
        match request {
            Request::Query { .. } => Err(CommandError::Unsupported(channel::QUERY)),
            Request::GetTasks => {
                let store = self.store.lock().await;
                Ok(Response::Tasks(store.list_tasks()))
            }
            Request::AddTask(new_task) => {
                let mut store = self.store.lock().await;
                Ok(Response::Task(store.create_task(new_task)?))
            }
            Request::UpdateTask(patch) => {
                let mut store = self.store.lock().await;
                Ok(Response::Task(store.update_task(patch)?))
            }
            Request::DeleteTask { id } => {
                let mut store = self.store.lock().await;
                Ok(Response::Deleted(store.delete_task(id)?))
            }
            Request::Generate { prompt } => {
                let text = self.collaborators.ai.generate(&prompt).await?;
                Ok(Response::Text(text))
            }
            Request::EmbedText { text } => {
                let vector = self.collaborators.ai.embed(&text).await?;
                Ok(Response::Embedding(vector))
            }
            Request::Search { query } => {
                let results = self.collaborators.ai.search(&query).await?;
                Ok(Response::SearchResults(results))
            }
            Request::OpenExternal { url } => {
                let url = parse_external_url(&url)?;
                self.collaborators.shell.open_url(&url)?;
                Ok(Response::Unit)
            }
            Request::Log { message } => {
                self.collaborators.log.log(&message);
                Ok(Response::Unit)
            }
        }
    }

    /// Write the current store contents to disk. Called on shutdown.
    pub async fn flush(&self) -> CommandResult<()> {
        let store = self.store.lock().await;
        store.flush()?;
        Ok(())
    }
}
