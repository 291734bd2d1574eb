//! CrudService: generic CRUD using safe SQL builder.

mod crud;
pub use crud::{CrudService, ListQuery};
