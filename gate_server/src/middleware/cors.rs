//! A small CORS layer for browser clients.
//!
//! The request's `Origin` is echoed back when it is allowed, and any `OPTIONS` request is answered immediately with
//! `204 No Content`. When no origin list is configured, every origin is allowed.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{
            HeaderMap,
            HeaderValue,
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
            ORIGIN,
            VARY,
        },
        Method,
    },
    Error,
    HttpResponse,
};
use futures::future::LocalBoxFuture;
use log::*;

const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type, X-Brand-Id, X-Brand-Signature, X-Groove-Signature, \
                               X-2FA-Token, X-2FA-Backup-Code";

pub struct CorsMiddlewareFactory {
    allowed_origins: Option<Rc<Vec<String>>>,
}

impl CorsMiddlewareFactory {
    pub fn new(allowed_origins: Option<Vec<String>>) -> Self {
        Self { allowed_origins: allowed_origins.map(Rc::new) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CorsMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = CorsMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorsMiddlewareService { allowed_origins: self.allowed_origins.clone(), service: Rc::new(service) }))
    }
}

pub struct CorsMiddlewareService<S> {
    allowed_origins: Option<Rc<Vec<String>>>,
    service: Rc<S>,
}

impl<S> CorsMiddlewareService<S> {
    fn allowed_origin(&self, req: &ServiceRequest) -> Option<HeaderValue> {
        let origin = req.headers().get(ORIGIN)?;
        let allowed = match (&self.allowed_origins, origin.to_str()) {
            (None, _) => true,
            (Some(list), Ok(o)) => list.iter().any(|a| a == o),
            (Some(_), Err(_)) => false,
        };
        if !allowed {
            debug!("💻️ Origin {origin:?} is not on the CORS list");
        }
        allowed.then(|| origin.clone())
    }
}

fn insert_cors_headers(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
    headers.insert(VARY, HeaderValue::from_static("Origin"));
}

impl<S, B> Service<ServiceRequest> for CorsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let origin = self.allowed_origin(&req);
        if *req.method() == Method::OPTIONS {
            trace!("💻️ Answering preflight request for {}", req.path());
            let mut res = HttpResponse::NoContent().finish();
            if let Some(origin) = origin {
                insert_cors_headers(res.headers_mut(), origin);
            }
            return Box::pin(ready(Ok(req.into_response(res).map_into_right_body())));
        }
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let mut res = service.call(req).await?;
            if let Some(origin) = origin {
                insert_cors_headers(res.headers_mut(), origin);
            }
            Ok(res.map_into_left_body())
        })
    }
}
