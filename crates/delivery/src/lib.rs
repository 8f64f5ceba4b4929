pub mod deliverer;
pub mod error;
pub mod log;

pub use deliverer::{Deliverer, DynDeliverer, settle};
pub use error::DeliveryError;
pub use log::LogDeliverer;
