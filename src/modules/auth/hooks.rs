use log::info;

/// Callbacks into the embedding UI when the session ends on its own
pub trait SessionHooks {
    /// Show a message to the user
    fn notify(&self, message: &str);

    /// Send the user back to the login surface
    fn redirect_to_login(&self);
}

/// Default hooks that only write to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl SessionHooks for LoggingHooks {
    fn notify(&self, message: &str) {
        info!("Session notice: {}", message);
    }

    fn redirect_to_login(&self) {
        info!("Redirecting to login");
    }
}
