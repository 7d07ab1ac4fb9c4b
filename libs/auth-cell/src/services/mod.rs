pub mod broker;
pub mod management;

pub use broker::ManagementTokenBroker;
pub use management::ManagementApiClient;
