pub mod app_state;
pub mod database;
pub mod error;
pub mod ipc;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(feature = "gui")]
mod commands;

#[cfg(feature = "gui")]
pub fn run() {
    use std::sync::Arc;
    use tauri::{Manager, WebviewUrl, WebviewWindowBuilder};

    utils::config::load_dotenv();

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            log::info!("Another instance tried to launch, focusing main window");
            if let Some(window) = app.get_webview_window("main") {
                let _ = window.unminimize();
                let _ = window.show();
                let _ = window.set_focus();
            }
        }))
        .setup(|app| {
            let platform_dir = app.path().app_data_dir()?;
            let data_dir = utils::config::resolve_data_dir(platform_dir);

            // Logging comes up before env overrides so their warnings are kept.
            let mut settings = utils::config::read_settings(&data_dir)?;
            utils::config::init_logging(&settings.logging.level);
            utils::config::apply_env_defaults(&mut settings);
            log::info!("Using data directory {}", data_dir.display());

            let store = database::init_store(&data_dir, &settings.storage.tasks_file)?;
            let surface = Arc::new(ipc::CommandSurface::new(
                store,
                ipc::Collaborators::default(),
            ));
            app.manage(app_state::AppState::new(surface));

            if settings.proxy.enabled {
                let port = settings.proxy.port;
                tauri::async_runtime::spawn(async move {
                    if let Err(e) = services::proxy::start_proxy_server(port).await {
                        log::error!("[Proxy] {}", e);
                    }
                });
            }

            WebviewWindowBuilder::new(app, "main", WebviewUrl::default())
                .title("Gidit")
                .inner_size(1280.0, 800.0)
                .min_inner_size(1024.0, 640.0)
                .initialization_script(ipc::bridge::init_script().as_str())
                .build()?;

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // db
            commands::db::db_query,
            commands::db::db_get_tasks,
            commands::db::db_add_task,
            commands::db::db_update_task,
            commands::db::db_delete_task,
            // ai
            commands::ai::ai_generate,
            commands::ai::ai_embed_text,
            commands::ai::ai_search,
            // sys
            commands::sys::sys_open_external,
            commands::sys::sys_log,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let tauri::RunEvent::Exit = event {
            if let Some(state) = app_handle.try_state::<app_state::AppState>() {
                match tauri::async_runtime::block_on(state.surface.flush()) {
                    Ok(()) => log::info!("Task store flushed"),
                    Err(e) => log::error!("Failed to flush task store: {}", e),
                }
            }
        }
    });
}
