pub mod command;
pub mod driver;
pub mod error;
pub mod frame;
pub mod gate;
pub mod health;
pub mod status;
pub mod tracker;
pub mod transport;

// Re-export the driver for easy access
pub use driver::TFminiPlus;
