pub mod delivery;
pub mod destination;
pub mod endpoint;
pub mod endpoint_destination;
pub mod organization;
pub mod queue_item;
pub mod submission;
pub mod template;
pub mod user;

pub use delivery::Delivery;
pub use destination::Destination;
pub use endpoint::Endpoint;
pub use endpoint_destination::EndpointDestination;
pub use organization::Organization;
pub use queue_item::QueueItem;
pub use submission::Submission;
pub use template::{EmailTemplate, SheetTemplate, WebhookTemplate};
pub use user::User;
