use std::{
    fmt::Display,
    future::{ready, Ready},
    marker::PhantomData,
    rc::Rc,
};

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use gate_engine::{db_types::SubjectId, AuthorizationError, GatekeeperStore};
use log::*;

use super::{bearer, policy, rate_limit, signature, two_factor, verification};
use crate::{
    errors::ServerError,
    helpers::get_remote_ip,
    pipeline::{Authentication, Gatekeeper, RoutePolicy},
};

/// The pipeline stage a request was rejected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RateLimit,
    Authentication,
    Verification,
    TwoFactor,
    Authorization,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => f.write_str("rate limit"),
            Self::Authentication => f.write_str("authentication"),
            Self::Verification => f.write_str("verification"),
            Self::TwoFactor => f.write_str("two-factor"),
            Self::Authorization => f.write_str("authorization"),
        }
    }
}

struct Denial {
    stage: Stage,
    subject: Option<SubjectId>,
    error: AuthorizationError,
}

impl Denial {
    fn at(stage: Stage, subject: Option<SubjectId>) -> impl FnOnce(AuthorizationError) -> Self {
        move |error| Self { stage, subject, error }
    }

    fn log(&self, req: &ServiceRequest, remote_ip: &str) {
        let subject = self.subject.map(|s| s.to_string()).unwrap_or_else(|| "anonymous".to_string());
        let (method, path, stage, e) = (req.method(), req.path(), self.stage, &self.error);
        match &self.error {
            AuthorizationError::StoreUnavailable(_) => {
                error!("🔐️ {method} {path} from {remote_ip} ({subject}) failed at the {stage} stage. {e}")
            },
            AuthorizationError::RateLimited(_) => {
                info!("🚦️ {method} {path} from {remote_ip} ({subject}) was rate limited. {e}")
            },
            _ => warn!("🔐️ {method} {path} from {remote_ip} ({subject}) denied at the {stage} stage. {e}"),
        }
    }
}

/// Runs every stage `policy` declares, in order, stopping at the first failure.
async fn run_stages<A: GatekeeperStore>(
    gatekeeper: &Gatekeeper<A>,
    policy: &RoutePolicy,
    req: &mut ServiceRequest,
    remote_ip: &str,
) -> Result<(), Denial> {
    rate_limit::check_connection_limits(gatekeeper, policy, req, remote_ip)
        .map_err(Denial::at(Stage::RateLimit, None))?;
    let claim = match policy.authentication() {
        Authentication::None => return Ok(()),
        Authentication::Partner(scheme) => {
            signature::verify_partner(gatekeeper, req, scheme).await.map_err(Denial::at(Stage::Authentication, None))?;
            return Ok(());
        },
        Authentication::Bearer => {
            bearer::authenticate(gatekeeper, req).map_err(Denial::at(Stage::Authentication, None))?
        },
    };
    let subject = claim.subject_id;
    rate_limit::check_subject_limit(gatekeeper, policy, &subject).map_err(Denial::at(Stage::RateLimit, Some(subject)))?;
    if let Some(tier) = policy.tier() {
        verification::verify(gatekeeper, req, &claim, tier)
            .await
            .map_err(Denial::at(Stage::Verification, Some(subject)))?;
    }
    if policy.requires_two_factor() {
        two_factor::step_up(gatekeeper, req, &subject).await.map_err(Denial::at(Stage::TwoFactor, Some(subject)))?;
    }
    if let Some(requirement) = policy.permission() {
        policy::authorize(gatekeeper, &subject, requirement)
            .await
            .map_err(Denial::at(Stage::Authorization, Some(subject)))?;
    }
    Ok(())
}

/// Guards one route with its [`RoutePolicy`]. The [`Gatekeeper`] for store type `A` must be registered as app data.
pub struct GatekeeperMiddlewareFactory<A> {
    policy: Rc<RoutePolicy>,
    _store: PhantomData<fn() -> A>,
}

impl<A> GatekeeperMiddlewareFactory<A> {
    pub fn new(policy: RoutePolicy) -> Self {
        Self { policy: Rc::new(policy), _store: PhantomData }
    }
}

impl<S, B, A> Transform<S, ServiceRequest> for GatekeeperMiddlewareFactory<A>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
    A: GatekeeperStore + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = GatekeeperMiddlewareService<S, A>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(GatekeeperMiddlewareService {
            policy: Rc::clone(&self.policy),
            service: Rc::new(service),
            _store: PhantomData,
        }))
    }
}

pub struct GatekeeperMiddlewareService<S, A> {
    policy: Rc<RoutePolicy>,
    service: Rc<S>,
    _store: PhantomData<fn() -> A>,
}

impl<S, B, A> Service<ServiceRequest> for GatekeeperMiddlewareService<S, A>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
    A: GatekeeperStore + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let policy = Rc::clone(&self.policy);
        Box::pin(async move {
            let Some(gatekeeper) = req.app_data::<web::Data<Gatekeeper<A>>>().cloned() else {
                error!("💻️ No gatekeeper has been registered for {}. Denying the request.", req.path());
                let err = ServerError::InitializeError("The request gatekeeper is not configured".to_string());
                return Ok(req.error_response(err).map_into_right_body());
            };
            let remote_ip = get_remote_ip(req.request(), gatekeeper.proxy())
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            match run_stages(&gatekeeper, &policy, &mut req, &remote_ip).await {
                Ok(()) => {
                    trace!("🔐️ {} {} from {remote_ip} passed the gatekeeper", req.method(), req.path());
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                },
                Err(denial) => {
                    denial.log(&req, &remote_ip);
                    Ok(req.error_response(ServerError::Denied(denial.error)).map_into_right_body())
                },
            }
        })
    }
}
