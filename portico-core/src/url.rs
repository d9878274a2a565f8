//! Generated route urls and url signatures.
//!
//! A signed url carries a `signature` query parameter (and optionally
//! `expires`, a unix timestamp). The signature is an HMAC-SHA256 over the
//! route name, the route path relative to the router base and the expiry.

use crate::{Error, Result};
use hmac::{Hmac, Mac};
use indexmap::IndexMap;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PARAM: &str = "signature";
pub const EXPIRES_PARAM: &str = "expires";

/// Signs and verifies route urls.
#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
}

impl UrlSigner {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    fn mac(&self, name: &str, path: &str, expires: Option<i64>) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::Internal(format!("invalid signature key: {}", e)))?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(path.trim_matches('/').as_bytes());
        mac.update(b"|");
        if let Some(expires) = expires {
            mac.update(expires.to_string().as_bytes());
        }
        Ok(mac)
    }

    pub fn sign(&self, name: &str, path: &str, expires: Option<i64>) -> Result<String> {
        Ok(hex::encode(self.mac(name, path, expires)?.finalize().into_bytes()))
    }

    /// Verify `signature` and that `expires` lies in the future.
    pub fn verify(
        &self,
        name: &str,
        path: &str,
        expires: Option<i64>,
        signature: &str,
    ) -> Result<()> {
        if let Some(expires) = expires
            && expires < unix_now()
        {
            return Err(Error::InvalidSignature("signature expired".to_string()));
        }

        let expected = hex::decode(signature)
            .map_err(|_| Error::InvalidSignature("malformed signature".to_string()))?;

        self.mac(name, path, expires)?
            .verify_slice(&expected)
            .map_err(|_| Error::InvalidSignature("signature mismatch".to_string()))
    }
}

impl fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UrlSigner(..)")
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// A generated url.
#[derive(Debug, Clone)]
pub struct Url {
    name: String,
    base: String,
    path: String,
    query: Vec<(String, String)>,
    signer: Option<Arc<UrlSigner>>,
    translated: IndexMap<String, String>,
    domained: IndexMap<String, String>,
}

impl Url {
    pub(crate) fn new(
        name: impl Into<String>,
        base: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            path: path.into(),
            query: Vec::new(),
            signer: None,
            translated: IndexMap::new(),
            domained: IndexMap::new(),
        }
    }

    pub(crate) fn with_signer(mut self, signer: Option<Arc<UrlSigner>>) -> Self {
        self.signer = signer;
        self
    }

    pub(crate) fn with_translated(mut self, translated: IndexMap<String, String>) -> Self {
        self.translated = translated;
        self
    }

    pub(crate) fn with_domained(mut self, domained: IndexMap<String, String>) -> Self {
        self.domained = domained;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a signature, valid until `expires` when given.
    pub fn sign(mut self, expires: Option<i64>) -> Result<Self> {
        let signer = self
            .signer
            .clone()
            .ok_or_else(|| Error::Url("no signature key configured".to_string()))?;

        let signature = signer.sign(&self.name, &self.path, expires)?;
        self.query.retain(|(k, _)| k != SIGNATURE_PARAM && k != EXPIRES_PARAM);
        self.query.push((SIGNATURE_PARAM.to_string(), signature));
        if let Some(expires) = expires {
            self.query.push((EXPIRES_PARAM.to_string(), expires.to_string()));
        }
        Ok(self)
    }

    /// Path relative to the router base.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Urls per locale for routes with translated uris.
    pub fn translated(&self) -> &IndexMap<String, String> {
        &self.translated
    }

    /// Urls per domain for domain bound routes.
    pub fn domained(&self) -> &IndexMap<String, String> {
        &self.domained
    }

    pub fn get(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_url(&self.base, &self.path))?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, urlencoding::encode(key), urlencoding::encode(value))?;
        }
        Ok(())
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}
