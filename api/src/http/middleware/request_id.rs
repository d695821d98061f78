/// Request ID middleware
///
/// Extracts or generates request ID and adds it to response headers
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    rc::Rc,
};
use uuid::Uuid;

const MAX_REQUEST_ID_LEN: usize = 128;

pub struct RequestId {
    header_name: String,
}

impl RequestId {
    pub fn new(header_name: String) -> Self {
        Self { header_name }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestId
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestIdMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdMiddleware {
            service: Rc::new(service),
            header_name: self.header_name.clone(),
        }))
    }
}

pub struct RequestIdMiddleware<S> {
    service: Rc<S>,
    header_name: String,
}

impl<S, B> Service<ServiceRequest> for RequestIdMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = req
            .headers()
            .get(&self.header_name)
            .and_then(|h| h.to_str().ok())
            .filter(|s| is_acceptable_request_id(s))
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        req.extensions_mut()
            .insert(RequestIdValue(request_id.clone()));

        let service = self.service.clone();
        let header_name = self.header_name.clone();

        Box::pin(async move {
            let mut res = service.call(req).await?;
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(header_name.as_bytes()),
                HeaderValue::from_str(&request_id),
            ) {
                res.headers_mut().insert(name, value);
            }
            Ok(res)
        })
    }
}

/// Echo caller-supplied ids only when they are short printable ASCII
fn is_acceptable_request_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value.bytes().all(|b| b.is_ascii_graphic())
}

#[derive(Clone)]
pub struct RequestIdValue(pub String);
