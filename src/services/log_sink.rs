pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Forwards webview messages to the host log under the `renderer` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct RendererLog;

impl LogSink for RendererLog {
    fn log(&self, message: &str) {
        log::info!(target: "renderer", "[Renderer] {}", message);
    }
}
