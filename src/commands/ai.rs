use tauri::State;

use crate::app_state::AppState;
use crate::ipc::{Request, Response};

#[tauri::command]
pub async fn ai_generate(state: State<'_, AppState>, prompt: String) -> Result<Response, String> {
    state.dispatch(Request::Generate { prompt }).await
}

#[tauri::command]
pub async fn ai_embed_text(state: State<'_, AppState>, text: String) -> Result<Response, String> {
    state.dispatch(Request::EmbedText { text }).await
}

#[tauri::command]
pub async fn ai_search(state: State<'_, AppState>, query: String) -> Result<Response, String> {
    state.dispatch(Request::Search { query }).await
}
