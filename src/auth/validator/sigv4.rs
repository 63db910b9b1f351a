//! SigV4 signing of body-less GET probes through `aws-sigv4`

use std::fmt::Display;
use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;

use crate::auth::error::AuthError;

/// Static IAM key material plus the signing scope
pub(crate) struct SigningParams<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
    pub region: &'a str,
    pub service: &'a str,
    pub time: SystemTime,
}

/// Sign a GET request for `url`.
///
/// Returns the headers the caller must add (`authorization`, `x-amz-date`
/// and `x-amz-security-token` when a session token is present).
pub(crate) fn sign_get(url: &str, params: &SigningParams<'_>) -> Result<Vec<(String, String)>, AuthError> {
    let credentials = Credentials::new(
        params.access_key_id,
        params.secret_access_key,
        params.session_token.map(str::to_string),
        None,
        "environment",
    );
    let identity = Identity::new(credentials, None);

    let signing_params = v4::SigningParams::builder()
        .identity(&identity)
        .region(params.region)
        .name(params.service)
        .time(params.time)
        .settings(SigningSettings::default())
        .build()
        .map_err(signing_error)?;

    let request = SignableRequest::new(
        "GET",
        url,
        std::iter::empty::<(&str, &str)>(),
        SignableBody::Bytes(&[]),
    )
    .map_err(signing_error)?;

    let (instructions, _) = sign(request, &signing_params.into())
        .map_err(signing_error)?
        .into_parts();

    Ok(instructions
        .headers()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}

fn signing_error(e: impl Display) -> AuthError {
    AuthError::Internal(format!("SigV4 signing failed: {e}"))
}
