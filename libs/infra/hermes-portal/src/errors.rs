// [libs/infra/hermes-portal/src/errors.rs]
//! Error catalog for the portal navigator — the `portal_transient`,
//! `portal_blocked`, and `portal_permanent` kinds from the error-handling
//! design.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("[portal_transient]: navigation failed: {0}")]
    Navigation(String),

    #[error("[portal_transient]: timed out waiting for selector candidates {0:?}")]
    SelectorTimeout(Vec<&'static str>),

    /// The portal presented a CAPTCHA, IP block page, or maintenance
    /// notice. Retrying immediately will not help; the caller should
    /// back off and consider the state's scrape run aborted.
    #[error("[portal_blocked]: {0}")]
    Blocked(String),

    /// The portal's structure changed in a way none of the known
    /// selector candidates can resolve — requires a code change, not a
    /// retry.
    #[error("[portal_permanent]: {0}")]
    StructureChanged(String),

    #[error("[portal_permanent]: document download failed after exhausting fallback chain: {0}")]
    DownloadExhausted(String),
}
