// Protected handlers: session_middleware runs first and injects the Session
pub mod accounts;
pub mod session;
