pub mod auth_state;
pub mod geo;
pub mod readings;
pub mod sensor_catalog;
pub mod snapshots;
