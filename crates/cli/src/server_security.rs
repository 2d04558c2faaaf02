use anyhow::{Context as AnyhowContext, Result};
use std::net::SocketAddr;

pub(crate) const AUTH_TOKEN_ENV: &str = "LOCATOR_AUTH_TOKEN";

/// Shared secret expected as `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub(crate) struct AuthToken {
    token: String,
}

impl AuthToken {
    pub(crate) fn parse(raw: Option<&str>) -> Result<Option<Self>> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let token = raw.trim();
        if token.is_empty() {
            anyhow::bail!("auth token must be non-empty")
        }
        Ok(Some(Self {
            token: token.to_string(),
        }))
    }

    /// Token from `--auth-token`, falling back to `LOCATOR_AUTH_TOKEN`.
    pub(crate) fn from_arg_or_env(arg: Option<&str>) -> Result<Option<Self>> {
        let raw = arg
            .map(ToString::to_string)
            .or_else(|| std::env::var(AUTH_TOKEN_ENV).ok());
        Self::parse(raw.as_deref())
    }

    pub(crate) fn matches_bearer(&self, header_value: &str) -> bool {
        let Some(rest) = header_value.trim().strip_prefix("Bearer ") else {
            return false;
        };
        constant_time_eq(rest.trim(), &self.token)
    }
}

/// Resolve `bind` and refuse non-loopback addresses unless `public` is set.
pub(crate) async fn guarded_bind_addrs(bind: &str, public: bool) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(bind)
        .await
        .with_context(|| format!("Failed to resolve bind address: {bind}"))?
        .collect();
    if addrs.is_empty() {
        anyhow::bail!("Bind address resolved to zero socket addrs: {bind}")
    }
    check_loopback(bind, &addrs, public)?;
    Ok(addrs)
}

fn check_loopback(bind: &str, addrs: &[SocketAddr], public: bool) -> Result<()> {
    if !public && addrs.iter().any(|addr| !addr.ip().is_loopback()) {
        anyhow::bail!(
            "Refusing to bind to non-loopback address without --public: {bind}. \
             To expose the resolver, pass --public and set {AUTH_TOKEN_ENV} (or --auth-token)."
        )
    }
    Ok(())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_must_carry_the_token() {
        let token = AuthToken::parse(Some("  s3cret  ")).unwrap().unwrap();
        assert!(token.matches_bearer("Bearer s3cret"));
        assert!(token.matches_bearer("  Bearer  s3cret "));
        assert!(!token.matches_bearer("s3cret"));
        assert!(!token.matches_bearer("Basic s3cret"));
        assert!(!token.matches_bearer("Bearer s3cre"));
    }

    #[test]
    fn blank_token_is_rejected() {
        assert!(AuthToken::parse(Some("   ")).is_err());
        assert!(AuthToken::parse(None).unwrap().is_none());
        assert!(AuthToken::from_arg_or_env(Some("abc")).unwrap().is_some());
    }

    #[tokio::test]
    async fn non_loopback_needs_public() {
        guarded_bind_addrs("127.0.0.1:0", false).await.unwrap();
        let err = guarded_bind_addrs("0.0.0.0:0", false).await.unwrap_err();
        assert!(err.to_string().contains("--public"));
        guarded_bind_addrs("0.0.0.0:0", true).await.unwrap();
    }
}
