//! Route policies and the shared state the gatekeeper middleware runs them against.
//!
//! A [`RoutePolicy`] is an immutable, per-route declaration of which pipeline stages apply. Stages always run in the
//! same order:
//!
//! 1. IP and partner rate limits
//! 2. Authentication (bearer token or partner signature)
//! 3. Subject rate limit
//! 4. Verification tier
//! 5. Two-factor step-up
//! 6. Permission
//!
//! Stages a route does not declare are skipped. The first stage that fails produces the response, and nothing after
//! it runs.
//!
//! [`Gatekeeper`] holds everything that outlives a request: the store, the policy engine, the verification gate, the
//! token verifier and the rate limiters. It is built once at startup and shared between workers.
use std::{fmt::Display, sync::Arc, time::Duration};

use gate_common::{HttpMethod, Secret};
use gate_engine::{
    db_types::Permission,
    GatekeeperStore,
    PolicyEngine,
    RateLimitRule,
    SlidingWindowLimiter,
    VerificationGate,
    VerificationHook,
    VerificationTier,
};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    auth::TokenVerifier,
    config::{AuthConfig, GatekeeperConfig, ProxyConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitClass {
    /// Keyed on the client address.
    Ip,
    /// Keyed on the signing partner, falling back to the client address when no partner id is presented.
    Partner,
    /// Keyed on the authenticated subject. Only applies when per-subject limiting is configured.
    Subject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerScheme {
    /// `X-Brand-Id` and `X-Brand-Signature`, keyed per partner from the credential store.
    Brand,
    /// `X-Groove-Signature` over the canonical query string, with the configured Groove secret.
    Groove,
}

impl Display for PartnerScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Brand => f.write_str("brand"),
            Self::Groove => f.write_str("groove"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authentication {
    #[default]
    None,
    Bearer,
    Partner(PartnerScheme),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRequirement {
    /// A permission for one HTTP method, resolved role by role.
    Exact(Permission),
    /// A method-agnostic named permission guarding a whole group of routes.
    Scope(String),
}

impl Display for PermissionRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(p) => write!(f, "{p}"),
            Self::Scope(name) => write!(f, "'{name}' (any method)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutePolicyError {
    #[error("{0} requires bearer authentication")]
    RequiresBearer(&'static str),
    #[error("A permission name cannot be empty")]
    EmptyPermission,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    rate_limits: Vec<RateLimitClass>,
    authentication: Authentication,
    tier: Option<VerificationTier>,
    two_factor: bool,
    permission: Option<PermissionRequirement>,
}

impl RoutePolicy {
    pub fn builder() -> RoutePolicyBuilder {
        RoutePolicyBuilder::default()
    }

    /// A policy with no stages at all.
    pub fn public() -> Self {
        Self::default()
    }

    pub fn rate_limits(&self) -> &[RateLimitClass] {
        &self.rate_limits
    }

    pub fn is_rate_limited(&self, class: RateLimitClass) -> bool {
        self.rate_limits.contains(&class)
    }

    pub fn authentication(&self) -> Authentication {
        self.authentication
    }

    pub fn tier(&self) -> Option<VerificationTier> {
        self.tier
    }

    pub fn requires_two_factor(&self) -> bool {
        self.two_factor
    }

    pub fn permission(&self) -> Option<&PermissionRequirement> {
        self.permission.as_ref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutePolicyBuilder {
    policy: RoutePolicy,
}

impl RoutePolicyBuilder {
    pub fn rate_limited(mut self, class: RateLimitClass) -> Self {
        if !self.policy.rate_limits.contains(&class) {
            self.policy.rate_limits.push(class);
        }
        self
    }

    pub fn bearer(mut self) -> Self {
        self.policy.authentication = Authentication::Bearer;
        self
    }

    pub fn partner(mut self, scheme: PartnerScheme) -> Self {
        self.policy.authentication = Authentication::Partner(scheme);
        self
    }

    pub fn verification(mut self, tier: VerificationTier) -> Self {
        self.policy.tier = Some(tier);
        self
    }

    pub fn two_factor(mut self) -> Self {
        self.policy.two_factor = true;
        self
    }

    pub fn permission(mut self, name: &str, method: HttpMethod) -> Self {
        self.policy.permission = Some(PermissionRequirement::Exact(Permission::new(name, method)));
        self
    }

    pub fn scope_permission(mut self, name: &str) -> Self {
        self.policy.permission = Some(PermissionRequirement::Scope(name.to_string()));
        self
    }

    /// Checks that every declared stage has what it needs from the stages before it.
    pub fn build(self) -> Result<RoutePolicy, RoutePolicyError> {
        let policy = self.policy;
        if policy.authentication != Authentication::Bearer {
            if policy.tier.is_some() {
                return Err(RoutePolicyError::RequiresBearer("A verification tier"));
            }
            if policy.two_factor {
                return Err(RoutePolicyError::RequiresBearer("Two-factor step-up"));
            }
            if policy.permission.is_some() {
                return Err(RoutePolicyError::RequiresBearer("A permission check"));
            }
            if policy.rate_limits.contains(&RateLimitClass::Subject) {
                return Err(RoutePolicyError::RequiresBearer("Per-subject rate limiting"));
            }
        }
        let empty = match &policy.permission {
            Some(PermissionRequirement::Exact(p)) => p.name.trim().is_empty(),
            Some(PermissionRequirement::Scope(name)) => name.trim().is_empty(),
            None => false,
        };
        if empty {
            return Err(RoutePolicyError::EmptyPermission);
        }
        Ok(policy)
    }
}

//-------------------------------------------------  Gatekeeper  -------------------------------------------------------
pub struct Gatekeeper<B> {
    store: Arc<B>,
    policy_engine: PolicyEngine<B>,
    verification: VerificationGate,
    tokens: TokenVerifier,
    ip_limiter: Arc<SlidingWindowLimiter>,
    partner_limiter: Arc<SlidingWindowLimiter>,
    subject_limiter: Option<Arc<SlidingWindowLimiter>>,
    groove_secret: Secret<String>,
    proxy: ProxyConfig,
    store_timeout: Duration,
}

impl<B: GatekeeperStore> Gatekeeper<B> {
    pub fn new(store: Arc<B>, auth: &AuthConfig, config: &GatekeeperConfig) -> Self {
        let policy_engine = PolicyEngine::new(Arc::clone(&store), config.store_timeout);
        let limiter = |name, rule: RateLimitRule| {
            debug!("🚦️ {name} limiter admits {} requests per {:?}", rule.limit, rule.window);
            Arc::new(SlidingWindowLimiter::new(name, rule))
        };
        Self {
            policy_engine,
            verification: VerificationGate::new(config.store_timeout),
            tokens: TokenVerifier::new(&auth.jwt_secret),
            ip_limiter: limiter("ip", config.ip_rate_limit),
            partner_limiter: limiter("partner", config.partner_rate_limit),
            subject_limiter: config.subject_rate_limit.map(|rule| limiter("subject", rule)),
            groove_secret: config.groove_secret.clone(),
            proxy: ProxyConfig::default(),
            store_timeout: config.store_timeout,
            store,
        }
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_verification_hook(mut self, hook: VerificationHook) -> Self {
        self.verification = self.verification.with_hook(hook);
        self
    }
}

impl<B> Gatekeeper<B> {
    pub fn store(&self) -> &Arc<B> {
        &self.store
    }

    pub fn policy_engine(&self) -> &PolicyEngine<B> {
        &self.policy_engine
    }

    pub fn verification(&self) -> &VerificationGate {
        &self.verification
    }

    pub fn tokens(&self) -> &TokenVerifier {
        &self.tokens
    }

    /// The limiter for `class`, if that class is configured.
    pub fn limiter(&self, class: RateLimitClass) -> Option<&SlidingWindowLimiter> {
        match class {
            RateLimitClass::Ip => Some(&self.ip_limiter),
            RateLimitClass::Partner => Some(&self.partner_limiter),
            RateLimitClass::Subject => self.subject_limiter.as_deref(),
        }
    }

    pub fn limiters(&self) -> Vec<Arc<SlidingWindowLimiter>> {
        let mut limiters = vec![Arc::clone(&self.ip_limiter), Arc::clone(&self.partner_limiter)];
        limiters.extend(self.subject_limiter.iter().cloned());
        limiters
    }

    pub fn groove_secret(&self) -> &Secret<String> {
        &self.groove_secret
    }

    pub fn proxy(&self) -> ProxyConfig {
        self.proxy
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }
}
