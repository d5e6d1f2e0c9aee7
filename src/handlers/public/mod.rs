// Public handlers: anyone may open a provisioning form. Account creation is
// still gated by an admin's approval code or by the empty-store bootstrap.
pub mod provision;
