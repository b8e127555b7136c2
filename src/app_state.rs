use std::sync::Arc;

use crate::ipc::{CommandSurface, Request, Response};

/// Host state managed by the desktop shell.
pub struct AppState {
    pub surface: Arc<CommandSurface>,
}

impl AppState {
    pub fn new(surface: Arc<CommandSurface>) -> Self {
        Self { surface }
    }

    /// Dispatch and flatten the error for the webview.
    pub async fn dispatch(&self, request: Request) -> Result<Response, String> {
        self.surface.dispatch(request).await.map_err(|e| e.to_string())
    }
}
