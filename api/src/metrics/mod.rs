use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Sign-in counters exported on `/metrics`
#[derive(Clone)]
pub struct AppMetrics {
    registry: Registry,
    challenges_issued: IntCounter,
    verifications: IntCounterVec,
    identities_provisioned: IntCounter,
    sessions_revoked: IntCounter,
}

impl AppMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let challenges_issued = IntCounter::with_opts(Opts::new(
            "garden_auth_challenges_issued_total",
            "Sign-in challenges handed out",
        ))?;
        registry.register(Box::new(challenges_issued.clone()))?;

        let verifications = IntCounterVec::new(
            Opts::new(
                "garden_auth_verifications_total",
                "Sign-in verification attempts by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(verifications.clone()))?;

        let identities_provisioned = IntCounter::with_opts(Opts::new(
            "garden_auth_identities_provisioned_total",
            "Profiles created on first sign-in",
        ))?;
        registry.register(Box::new(identities_provisioned.clone()))?;

        let sessions_revoked = IntCounter::with_opts(Opts::new(
            "garden_auth_sessions_revoked_total",
            "Sessions ended through logout",
        ))?;
        registry.register(Box::new(sessions_revoked.clone()))?;

        tracing::info!("AppMetrics initialized");
        Ok(Self {
            registry,
            challenges_issued,
            verifications,
            identities_provisioned,
            sessions_revoked,
        })
    }

    pub fn challenge_issued(&self) {
        self.challenges_issued.inc();
    }

    /// `outcome` is `success` or a login error kind
    pub fn verification(&self, outcome: &str) {
        self.verifications.with_label_values(&[outcome]).inc();
    }

    pub fn identity_provisioned(&self) {
        self.identities_provisioned.inc();
    }

    pub fn session_revoked(&self) {
        self.sessions_revoked.inc();
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
