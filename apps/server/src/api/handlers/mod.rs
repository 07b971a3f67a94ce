pub mod health;
pub mod realtime;
pub mod records;
pub mod rides;
pub mod users;
