//! Recognition proxy - signs and forwards identify requests

mod server;
mod vendor;

pub use server::{handle_request, ProxyServer, IDENTIFY_PATH};
pub use vendor::{ForwardError, SignedVendor, VendorClient};
