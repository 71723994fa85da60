pub mod csv_table;
pub mod location;
pub mod store;
