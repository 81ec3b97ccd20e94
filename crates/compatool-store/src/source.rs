use crate::StoreError;
use std::io::{self, Write};

/// Where artifact archives are fetched from.
pub trait ArtifactSource: Send + Sync {
    /// Stream the body at `url` into `dest`, returning the number of bytes written.
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<u64, StoreError>;
}

/// Plain HTTP(S) download.
pub struct HttpSource {
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactSource for HttpSource {
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<u64, StoreError> {
        let failed = |reason: String| StoreError::Acquisition {
            url: url.to_owned(),
            reason,
        };

        tracing::debug!("GET {url}");
        let resp = match self.agent.get(url).call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(failed(format!("HTTP {code}")));
            }
            Err(e) => return Err(failed(e.to_string())),
        };

        let code = resp.status().as_u16();
        if code >= 400 {
            return Err(failed(format!("HTTP {code}")));
        }

        let mut reader = resp.into_body().into_reader();
        let written = io::copy(&mut reader, dest).map_err(|e| failed(e.to_string()))?;
        tracing::debug!("received {written} bytes from {url}");
        Ok(written)
    }
}
