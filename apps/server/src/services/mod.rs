//! Business logic layer
//!
//! Services apply validation and domain rules on top of the `RecordStore`.

pub mod crud;
pub mod rides;
pub mod users;

pub use crud::CrudService;
pub use rides::RideService;
pub use users::UserService;
