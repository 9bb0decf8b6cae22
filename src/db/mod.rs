pub mod credentials;
pub mod deliveries;
pub mod destinations;
pub mod endpoint_destinations;
pub mod endpoints;
pub mod locks;
pub mod organizations;
pub mod process_queue;
pub mod submissions;
pub mod users;
