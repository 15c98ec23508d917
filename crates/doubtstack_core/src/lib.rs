pub mod activity;
pub mod domain;
pub mod ports;
pub mod reputation;
pub mod validation;

pub use activity::Activity;
pub use domain::{Answer, Doubt, Notification, Role, Tag, User, UserCredentials, VoteKind};
pub use ports::{DatabaseService, NotificationPublisher, PortError, PortResult};
pub use reputation::ReputationAction;
pub use validation::{FieldError, ValidationErrors};
