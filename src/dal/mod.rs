pub mod contact_db;
pub mod cursor_db;
