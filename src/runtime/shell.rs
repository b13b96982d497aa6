use tracing::info;

/// What the runtime needs from the application shell hosting the page.
pub trait Shell {
    /// Show a blocking message (the `system-alert` notification mode).
    fn alert(&self, message: &str);

    /// Reload the whole application shell, as after signing out.
    fn reload(&self);
}

/// Shell for headless use: both capabilities only log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogShell;

impl Shell for LogShell {
    fn alert(&self, message: &str) {
        info!(target: "shell", %message, "alert");
    }

    fn reload(&self) {
        info!(target: "shell", "reload requested");
    }
}
