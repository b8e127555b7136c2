use tauri::State;

use crate::app_state::AppState;
use crate::ipc::{Request, Response};

#[tauri::command]
pub async fn sys_open_external(
    state: State<'_, AppState>,
    url: String,
) -> Result<Response, String> {
    state.dispatch(Request::OpenExternal { url }).await
}

#[tauri::command]
pub async fn sys_log(state: State<'_, AppState>, message: String) -> Result<Response, String> {
    state.dispatch(Request::Log { message }).await
}
