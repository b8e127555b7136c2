use tauri::State;

use crate::app_state::AppState;
use crate::ipc::{Request, Response};
use crate::models::{NewTask, TaskPatch};

#[tauri::command]
pub async fn db_query(
    state: State<'_, AppState>,
    sql: String,
    params: Option<Vec<serde_json::Value>>,
) -> Result<Response, String> {
    state
        .dispatch(Request::Query {
            sql,
            params: params.unwrap_or_default(),
        })
        .await
}

#[tauri::command]
pub async fn db_get_tasks(state: State<'_, AppState>) -> Result<Response, String> {
    state.dispatch(Request::GetTasks).await
}

#[tauri::command]
pub async fn db_add_task(state: State<'_, AppState>, task: NewTask) -> Result<Response, String> {
    state.dispatch(Request::AddTask(task)).await
}

#[tauri::command]
pub async fn db_update_task(
    state: State<'_, AppState>,
    task: TaskPatch,
) -> Result<Response, String> {
    state.dispatch(Request::UpdateTask(task)).await
}

#[tauri::command]
pub async fn db_delete_task(state: State<'_, AppState>, id: i64) -> Result<Response, String> {
    state.dispatch(Request::DeleteTask { id }).await
}
