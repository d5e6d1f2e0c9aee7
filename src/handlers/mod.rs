// handlers/mod.rs - two security tiers
//
// Public (no auth): provisioning forms, home, health
// Protected (session required): whoami, logout, account management
pub mod protected;
pub mod public;
