mod device_patch;
mod device_rules;
mod device_service;

pub use device_patch::*;
pub use device_rules::*;
pub use device_service::*;
