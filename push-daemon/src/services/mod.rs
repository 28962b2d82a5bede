pub mod credentials;
pub mod metrics;
pub mod providers;

pub use credentials::{CredentialsSource, ServiceAccountKey};
pub use metrics::{record_provider_call, record_sent};
pub use providers::{
    FailAt, FcmProvider, FirebaseApp, MessagingClient, MockPushProvider, ProviderError,
    ProviderResponse, PushApp, PushProvider,
};
