// Sign-in domain services
// Provisioner and session issuer are composed by the Authenticator

pub mod authenticator;
pub mod provisioner;
pub mod sessions;

pub use authenticator::{
    Authenticator, AuthenticatorSettings, ChallengeRejection, LoginAttempt, LoginError,
    LoginStage, LoginSuccess,
};
pub use provisioner::{IdentityProvisioner, ProvisionError, ProvisionedIdentity};
pub use sessions::SessionIssuer;
