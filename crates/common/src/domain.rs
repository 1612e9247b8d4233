mod device;
mod page;
mod result;
mod violation;

pub use device::*;
pub use page::*;
pub use result::*;
pub use violation::*;
