// Resume Service: CRUD with soft delete, section writes, preview and change
// notifications for stored resumes.

pub mod handlers;
pub mod repository;
