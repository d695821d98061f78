/// Client side of the Garden of Giving wallet sign-in
///
/// [`AuthClient`] drives challenge, wallet signature and verification
/// against an [`AuthBackend`], and publishes the resulting [`AuthState`].
pub mod backend;
pub mod client;
pub mod error;
pub mod signer;
pub mod state;

pub use backend::{AuthBackend, HttpAuthBackend};
pub use client::AuthClient;
pub use error::{ClientError, SignerError};
pub use signer::{LocalWallet, WalletSignature};
pub use state::{AuthEvent, AuthState};
