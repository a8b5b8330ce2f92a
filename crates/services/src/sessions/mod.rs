mod manager;
mod timers;

// Public API of the session subsystem.
pub use manager::SessionManager;
pub use timers::SessionTimers;
